use std::path::PathBuf;

use anyhow::{Context, Result};
use campus_core::config::CampusConfig;
use campus_core::db::{self, PostgresStore};
use campus_core::store::{MemoryStore, RecordStore, ReportStore};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(author, version, about = "Catalog import and AI maturity scoring", long_about = None)]
struct Cli {
    /// Path to a TOML config file (defaults to $CAMPUS_CONFIG or ./campus.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run database migrations
    Migrate,
    /// Import courses, advisories and certifications from a JSON file
    Import {
        path: PathBuf,
        /// Write to a throwaway in-process store instead of Postgres
        #[arg(long)]
        in_memory: bool,
    },
    /// Score a maturity questionnaire and store the report
    Score {
        path: PathBuf,
        #[arg(long)]
        in_memory: bool,
        /// Skip the action-plan narrative even when a generator is configured
        #[arg(long)]
        no_narrative: bool,
    },
}

/// Where the command writes.
pub enum Backend {
    Memory(MemoryStore),
    Postgres(PostgresStore),
}

impl Backend {
    pub fn records(&self) -> &dyn RecordStore {
        match self {
            Backend::Memory(store) => store,
            Backend::Postgres(store) => store,
        }
    }

    pub fn reports(&self) -> &dyn ReportStore {
        match self {
            Backend::Memory(store) => store,
            Backend::Postgres(store) => store,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let config = CampusConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Migrate => {
            let pool = connect_pool(&config).await?;
            db::run_migrations(&pool).await?;
            info!("Database migrations applied");
            Ok(())
        }
        Command::Import { path, in_memory } => {
            let backend = backend(&config, in_memory).await?;
            commands::import::run(&config, &backend, &path).await
        }
        Command::Score {
            path,
            in_memory,
            no_narrative,
        } => {
            let backend = backend(&config, in_memory).await?;
            commands::score::run(&config, &backend, &path, !no_narrative).await
        }
    }
}

async fn backend(config: &CampusConfig, in_memory: bool) -> Result<Backend> {
    if in_memory {
        return Ok(Backend::Memory(MemoryStore::new()));
    }
    let pool = connect_pool(config).await?;
    db::run_migrations(&pool).await?;
    Ok(Backend::Postgres(PostgresStore::new(pool)))
}

async fn connect_pool(config: &CampusConfig) -> Result<db::DbPool> {
    let database_url = config
        .database_url
        .as_deref()
        .context("CAMPUS_DATABASE_URL (or DATABASE_URL) must be set, or pass --in-memory")?;
    db::connect(database_url, config.batch.pool_connections()).await
}
