//! `multa`: the enrichment server and its maintenance commands.
//!
//! Reads `multa.toml` (or the path given with `--config`), opens the SQLite
//! store, and either serves the JSON API or runs one maintenance command.

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use multa_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

#[derive(Parser)]
#[command(author, version, about = "Multa traffic-infraction enrichment server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "multa.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the JSON API.
  Serve,
  /// Load the export file into the store.
  Reconcile,
  /// Write every judgment to the export file.
  Export,
  /// Load, then enrich records from judgments.
  Backfill,
  /// Geocode unresolved locations, most affected first.
  ResolvePending {
    #[arg(long)]
    limit: Option<usize>,
  },
  /// Write unjudged descriptions with suggestions for offline curation.
  BatchExport {
    file:  PathBuf,
    #[arg(long)]
    limit: Option<usize>,
  },
  /// Persist the choices left in a curated batch file.
  BatchImport { file: PathBuf },
  /// Merge a JSON array of articles into the catalog.
  SeedArticles { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = ServerConfig::load(&cli.config)?;

  if let Some(dir) = cfg.store_path.parent() {
    if !dir.as_os_str().is_empty() {
      std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create store directory {dir:?}"))?;
    }
  }
  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;

  match cli.command {
    Command::Serve => commands::serve(&cfg, store).await,
    Command::Reconcile => commands::reconcile(&cfg, store, false).await,
    Command::Backfill => commands::reconcile(&cfg, store, true).await,
    Command::Export => commands::export(&cfg, store).await,
    Command::ResolvePending { limit } => commands::resolve_pending(&cfg, store, limit).await,
    Command::BatchExport { file, limit } => {
      commands::batch_export(&cfg, store, &file, limit).await
    }
    Command::BatchImport { file } => commands::batch_import(store, &file).await,
    Command::SeedArticles { file } => commands::seed_articles(store, &file).await,
  }
}
