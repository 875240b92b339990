//! # taxadmin-api: Binary Entry Point
//!
//! Reads the configuration from the environment, connects to PostgreSQL
//! when `DATABASE_URL` is set, hydrates and seeds the stores, and serves
//! the API.

use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use taxadmin_api::config::{AppConfig, LogFormat};
use taxadmin_api::state::AppState;

/// Tax administration back office API server.
#[derive(Debug, Parser)]
#[command(name = "taxadmin-api", version, about)]
struct Cli {
    /// Port to listen on. Overrides `PORT`.
    #[arg(long)]
    port: Option<u16>,

    /// Emit JSON log lines. Overrides `LOG_FORMAT`.
    #[arg(long)]
    json_logs: bool,

    /// Skip seeding reference data at startup.
    #[arg(long)]
    no_seed: bool,
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.json_logs {
        config.log_format = LogFormat::Json;
    }
    init_tracing(config.log_format);
    tracing::info!(config = ?config, "configuration loaded");
    if config.auth_token.is_none() {
        tracing::warn!("AUTH_TOKEN not set, every request acts as the system administrator");
    }

    let db_pool = taxadmin_api::db::init_pool(config.database_url.as_deref())
        .await
        .context("database initialization failed")?;

    let port = config.port;
    let state = AppState::with_config(config, db_pool);

    state
        .hydrate_from_db()
        .await
        .map_err(anyhow::Error::msg)
        .context("database hydration failed")?;

    if !cli.no_seed {
        taxadmin_api::bootstrap::seed(&state)
            .await
            .context("seeding reference data failed")?;
    }

    let app = taxadmin_api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("taxadmin API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
