use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                    .col(ColumnDef::new(Users::Username).string().not_null().unique_key())
                    .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                    .col(ColumnDef::new(Users::Name).string().null())
                    .col(ColumnDef::new(Users::Phone).string().null())
                    .col(ColumnDef::new(Users::Birthday).date().null())
                    .col(ColumnDef::new(Users::Street).string().null())
                    .col(ColumnDef::new(Users::City).string().null())
                    .col(ColumnDef::new(Users::State).string().null())
                    .col(ColumnDef::new(Users::ZipCode).string().null())
                    .col(ColumnDef::new(Users::Country).string().null())
                    .col(
                        ColumnDef::new(Users::Role)
                            .string()
                            .not_null()
                            .default("user"),
                    )
                    .col(
                        ColumnDef::new(Users::AuthProvider)
                            .string()
                            .not_null()
                            .default("local"),
                    )
                    .col(
                        ColumnDef::new(Users::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Users::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Users::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // ── Password reset codes ──
        manager
            .create_table(
                Table::create()
                    .table(SecurityTokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SecurityTokens::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SecurityTokens::UserId).integer().not_null())
                    .col(ColumnDef::new(SecurityTokens::TokenHash).string().not_null())
                    .col(ColumnDef::new(SecurityTokens::TokenType).string().not_null())
                    .col(ColumnDef::new(SecurityTokens::ExpiresAt).timestamp().not_null())
                    .col(
                        ColumnDef::new(SecurityTokens::Used)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(SecurityTokens::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_security_tokens_user_type")
                    .table(SecurityTokens::Table)
                    .col(SecurityTokens::UserId)
                    .col(SecurityTokens::TokenType)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SecurityTokens::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Email,
    Username,
    PasswordHash,
    Name,
    Phone,
    Birthday,
    Street,
    City,
    State,
    ZipCode,
    Country,
    Role,
    AuthProvider,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum SecurityTokens {
    Table,
    Id,
    UserId,
    TokenHash,
    TokenType,
    ExpiresAt,
    Used,
    CreatedAt,
}
