use std::path::PathBuf;

use clap::{Parser, Subcommand};
use coursegate::migrations::Migrator;
use coursegate::openapi::ApiDoc;
use coursegate::{App, Config};
use sea_orm_migration::MigratorTrait;
use utoipa::OpenApi;

#[derive(Parser)]
#[command(name = "coursegate")]
#[command(about = "Course platform service: catalog, enrollments, secure media and bulk import")]
#[command(version)]
struct Cli {
    /// Log as JSON lines instead of human readable text
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Apply pending migrations (shorthand for `db migrate`)
    Migrate,
    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbCommands,
    },
    /// Import users from a CSV export and enroll them by label
    Import {
        /// Path to the CSV file
        file: PathBuf,
    },
    /// OpenAPI documentation operations
    Docs {
        #[command(subcommand)]
        action: DocsCommands,
    },
}

#[derive(Subcommand)]
enum DbCommands {
    /// Run pending migrations
    Migrate,
    /// Roll back applied migrations
    Rollback {
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
}

#[derive(Subcommand)]
enum DocsCommands {
    /// Export the OpenAPI document as JSON
    Export {
        #[arg(long, default_value = "openapi.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.json_logs {
        coursegate::init_logging_json();
    } else {
        coursegate::init_logging();
    }

    match cli.command {
        Commands::Serve => App::new().await?.run().await?,
        Commands::Migrate => migrate(DbCommands::Migrate).await?,
        Commands::Db { action } => migrate(action).await?,
        Commands::Import { file } => {
            let app = App::new().await?;
            let summary = app.state().importer.import_path(&file).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Docs { action } => match action {
            DocsCommands::Export { output } => {
                std::fs::write(&output, ApiDoc::openapi().to_pretty_json()?)?;
                println!("OpenAPI spec exported to: {}", output.display());
            }
        },
    }

    Ok(())
}

async fn migrate(action: DbCommands) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let db = coursegate::db::connect(&config).await?;
    match action {
        DbCommands::Migrate => {
            Migrator::up(&db, None).await?;
            tracing::info!("Migrations complete");
        }
        DbCommands::Rollback { steps } => {
            Migrator::down(&db, Some(steps)).await?;
            tracing::info!(steps, "Rollback complete");
        }
    }
    Ok(())
}
