// src/main.rs — Foresight entry point

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use foresight::cli::{commands, Cli};
use foresight::engine::PredictiveEngine;
use foresight::infra::config::Config;
use foresight::infra::{logger, paths};
use foresight::memory::SqliteStorage;
use foresight::patterns::StaticContextProvider;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config (falls back to defaults if no config.toml)
    let config = match cli.config {
        Some(ref path) => Config::load_from(Path::new(path))?,
        None => Config::load()?,
    };
    logger::init_logging(&config.logging.level);

    let db_path = match cli.db.as_ref() {
        Some(path) => PathBuf::from(path),
        None => {
            paths::ensure_dirs()?;
            config.storage.db_path()
        }
    };
    tracing::debug!("Using database {}", db_path.display());
    let storage = SqliteStorage::open(&db_path)?;

    let (width, location) = cli.command.surroundings();
    let engine = PredictiveEngine::builder(config.engine)
        .storage(Arc::new(storage))
        .context_provider(Arc::new(StaticContextProvider::new(width, location)))
        .build();

    commands::execute(&engine, &cli.command)
}
