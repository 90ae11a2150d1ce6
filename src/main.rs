use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codebase_indexer::config::Config;
use codebase_indexer::indexing::RepositoryIndexer;
use codebase_indexer::paths::PlatformPaths;
use codebase_indexer::store::{MetadataStore, SqliteStore};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "codebase-indexer")]
#[command(about = "Index a source tree into chunk and metadata stores", version)]
struct Cli {
    /// Configuration file (defaults to the platform config location)
    #[arg(long, global = true, env = "CODEBASE_INDEXER_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database path, overriding the configuration
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one indexing pass over a directory
    Index {
        path: PathBuf,
        #[arg(long)]
        repo_id: i64,
    },
    /// Print the latest run summary of a repository
    Status {
        #[arg(long)]
        repo_id: i64,
    },
    /// List the indexed file records of a repository
    Files {
        #[arg(long)]
        repo_id: i64,
    },
    /// Write the default configuration as TOML
    InitConfig {
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load_or_default()?,
    };
    config.apply_env_overrides();
    if let Some(db) = &cli.db {
        config.storage.database_path = db.clone();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Command::InitConfig { path } = &cli.command {
        let path = path
            .clone()
            .unwrap_or_else(PlatformPaths::default_config_path);
        Config::default().save(&path)?;
        println!("{}", path.display());
        return Ok(());
    }

    let config = load_config(&cli)?;
    let store = Arc::new(
        SqliteStore::open(&config.storage.database_path)
            .await
            .context("Failed to open index database")?,
    );

    match cli.command {
        Command::Index { path, repo_id } => {
            let indexer = RepositoryIndexer::new(repo_id, config, store.clone(), store);
            let stats = indexer.index_directory(&path).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Status { repo_id } => match store.repository_summary(repo_id).await? {
            Some(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
            None => anyhow::bail!("Repository {} has not been indexed", repo_id),
        },
        Command::Files { repo_id } => {
            let records = store.list_file_records(repo_id).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Command::InitConfig { .. } => {}
    }

    Ok(())
}
