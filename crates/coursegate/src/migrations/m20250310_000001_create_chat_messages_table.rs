use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ChatMessages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ChatMessages::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ChatMessages::UserId).integer().not_null())
                    .col(ColumnDef::new(ChatMessages::SenderId).integer().not_null())
                    .col(ColumnDef::new(ChatMessages::SenderRole).string().not_null())
                    .col(ColumnDef::new(ChatMessages::Body).text().not_null())
                    .col(
                        ColumnDef::new(ChatMessages::IsRead)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(ChatMessages::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_chat_messages_user")
                    .table(ChatMessages::Table)
                    .col(ChatMessages::UserId)
                    .col(ChatMessages::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ChatMessages::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ChatMessages {
    Table,
    Id,
    UserId,
    SenderId,
    SenderRole,
    Body,
    IsRead,
    CreatedAt,
}
