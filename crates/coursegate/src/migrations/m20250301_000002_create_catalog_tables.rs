use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ── Courses ──
        manager
            .create_table(
                Table::create()
                    .table(Courses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Courses::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Courses::Title).string().not_null())
                    .col(ColumnDef::new(Courses::Slug).string().not_null().unique_key())
                    .col(ColumnDef::new(Courses::Description).text().not_null())
                    .col(
                        ColumnDef::new(Courses::Price)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Courses::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Courses::EnrollmentCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Courses::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Courses::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // ── Content items ──
        manager
            .create_table(
                Table::create()
                    .table(ContentItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ContentItems::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ContentItems::CourseId).integer().not_null())
                    .col(ColumnDef::new(ContentItems::Title).string().not_null())
                    .col(ColumnDef::new(ContentItems::Description).text().null())
                    .col(ColumnDef::new(ContentItems::ContentType).string().not_null())
                    .col(
                        ColumnDef::new(ContentItems::SortOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ContentItems::IsFreePreview)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ContentItems::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(ContentItems::VideoUrl).string().null())
                    .col(ColumnDef::new(ContentItems::VideoFilePath).string().null())
                    .col(ColumnDef::new(ContentItems::VideoFileName).string().null())
                    .col(ColumnDef::new(ContentItems::VideoFileSize).big_integer().null())
                    .col(ColumnDef::new(ContentItems::VideoMimeType).string().null())
                    .col(ColumnDef::new(ContentItems::DocumentUrl).string().null())
                    .col(ColumnDef::new(ContentItems::DocumentFilePath).string().null())
                    .col(ColumnDef::new(ContentItems::DocumentFileName).string().null())
                    .col(
                        ColumnDef::new(ContentItems::DocumentFileSize)
                            .big_integer()
                            .null(),
                    )
                    .col(ColumnDef::new(ContentItems::DocumentMimeType).string().null())
                    .col(ColumnDef::new(ContentItems::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(ContentItems::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_content_items_course")
                            .from(ContentItems::Table, ContentItems::CourseId)
                            .to(Courses::Table, Courses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_content_items_course_order")
                    .table(ContentItems::Table)
                    .col(ContentItems::CourseId)
                    .col(ContentItems::SortOrder)
                    .to_owned(),
            )
            .await?;

        // ── Coupons ──
        manager
            .create_table(
                Table::create()
                    .table(Coupons::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Coupons::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Coupons::Code).string().not_null().unique_key())
                    .col(ColumnDef::new(Coupons::DiscountPercent).integer().not_null())
                    .col(ColumnDef::new(Coupons::CourseId).integer().null())
                    .col(
                        ColumnDef::new(Coupons::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Coupons::MaxUses).integer().null())
                    .col(
                        ColumnDef::new(Coupons::UsedCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Coupons::ExpiresAt).timestamp().null())
                    .col(ColumnDef::new(Coupons::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Coupons::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ContentItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Courses::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Courses {
    Table,
    Id,
    Title,
    Slug,
    Description,
    Price,
    IsActive,
    EnrollmentCount,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ContentItems {
    Table,
    Id,
    CourseId,
    Title,
    Description,
    ContentType,
    SortOrder,
    IsFreePreview,
    IsActive,
    VideoUrl,
    VideoFilePath,
    VideoFileName,
    VideoFileSize,
    VideoMimeType,
    DocumentUrl,
    DocumentFilePath,
    DocumentFileName,
    DocumentFileSize,
    DocumentMimeType,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Coupons {
    Table,
    Id,
    Code,
    DiscountPercent,
    CourseId,
    IsActive,
    MaxUses,
    UsedCount,
    ExpiresAt,
    CreatedAt,
}
