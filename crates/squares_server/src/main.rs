//! Squares pool server binary.

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use squares_server::{ServerConfig, SquareStore, SquaresService, router};
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config, port } => serve(config, port).await,
        Command::Migrate { database_path } => migrate(database_path),
    }
}

#[instrument(skip_all, fields(config_path = %config_path.display()))]
async fn serve(config_path: std::path::PathBuf, port_override: Option<u16>) -> Result<()> {
    let config = if config_path.exists() {
        ServerConfig::from_file(&config_path)?
    } else {
        info!("Config file not found at {}, using defaults", config_path.display());
        ServerConfig::default()
    }
    .with_env_overrides();

    let port = port_override.unwrap_or(*config.port());
    if config.admin_key().is_none() {
        tracing::warn!("No admin key configured; admin routes are closed");
    }

    let service = SquaresService::open(config.database_path())?;
    let app = router(service, config.admin_key().clone());

    let listener = tokio::net::TcpListener::bind((config.host().as_str(), port)).await?;
    info!(host = %config.host(), port, "Squares server ready");

    axum::serve(listener, app).await?;
    Ok(())
}

#[instrument]
fn migrate(database_path: String) -> Result<()> {
    let store = SquareStore::new(database_path)?;
    store.run_migrations()?;
    info!("Database is up to date");
    Ok(())
}
