pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_users_table;
mod m20250301_000002_create_catalog_tables;
mod m20250301_000003_create_enrollment_tables;
mod m20250310_000001_create_chat_messages_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_users_table::Migration),
            Box::new(m20250301_000002_create_catalog_tables::Migration),
            Box::new(m20250301_000003_create_enrollment_tables::Migration),
            Box::new(m20250310_000001_create_chat_messages_table::Migration),
        ]
    }
}
