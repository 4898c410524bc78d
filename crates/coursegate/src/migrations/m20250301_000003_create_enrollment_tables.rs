use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ── Enrollments ──
        manager
            .create_table(
                Table::create()
                    .table(Enrollments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Enrollments::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Enrollments::UserId).integer().not_null())
                    .col(ColumnDef::new(Enrollments::CourseId).integer().not_null())
                    .col(
                        ColumnDef::new(Enrollments::PaymentStatus)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Enrollments::AmountPaid)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Enrollments::PaymentOrderId).string().null())
                    .col(ColumnDef::new(Enrollments::CouponId).integer().null())
                    .col(ColumnDef::new(Enrollments::Source).string().not_null())
                    .col(
                        ColumnDef::new(Enrollments::Progress)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Enrollments::IsCompleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Enrollments::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Enrollments::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_enrollments_user_course")
                    .table(Enrollments::Table)
                    .col(Enrollments::UserId)
                    .col(Enrollments::CourseId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_enrollments_order")
                    .table(Enrollments::Table)
                    .col(Enrollments::PaymentOrderId)
                    .to_owned(),
            )
            .await?;

        // ── Progress records ──
        manager
            .create_table(
                Table::create()
                    .table(ProgressRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProgressRecords::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProgressRecords::UserId).integer().not_null())
                    .col(ColumnDef::new(ProgressRecords::CourseId).integer().not_null())
                    .col(ColumnDef::new(ProgressRecords::ContentId).integer().not_null())
                    .col(
                        ColumnDef::new(ProgressRecords::CompletedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_progress_user_content")
                    .table(ProgressRecords::Table)
                    .col(ProgressRecords::UserId)
                    .col(ProgressRecords::ContentId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProgressRecords::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Enrollments::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Enrollments {
    Table,
    Id,
    UserId,
    CourseId,
    PaymentStatus,
    AmountPaid,
    PaymentOrderId,
    CouponId,
    Source,
    Progress,
    IsCompleted,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ProgressRecords {
    Table,
    Id,
    UserId,
    CourseId,
    ContentId,
    CompletedAt,
}
