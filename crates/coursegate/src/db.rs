use sea_orm::{ConnectOptions, Database as SeaDatabase, DatabaseConnection};
use std::time::Duration;

use crate::config::Config;

/// Initialize the database connection from config.
pub async fn connect(config: &Config) -> Result<DatabaseConnection, sea_orm::DbErr> {
    let mut opts = ConnectOptions::new(&config.database_url);

    // Every connection to `sqlite::memory:` opens its own empty database.
    if config.database_url.contains(":memory:") {
        opts.max_connections(1).min_connections(1);
    } else {
        opts.max_connections(50).min_connections(2);
    }

    opts.connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .sqlx_logging(config.is_dev());

    SeaDatabase::connect(opts).await
}
