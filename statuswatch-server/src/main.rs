//! Statuswatch Server
//!
//! Receives Statuspage-style status webhooks and optionally polls a summary
//! feed, printing one notification per unique status update.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use server::{build_router, run_server};
use state::AppState;
use statuswatch_core::dedup;
use statuswatch_core::ingest::Coordinator;
use statuswatch_core::poller::SummaryPoller;
use statuswatch_core::sink::ConsoleSink;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Statuswatch - Statuspage webhook receiver and summary poller
#[derive(Parser, Debug)]
#[command(name = "statuswatch-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./statuswatch-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:8000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting statuswatch-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let loader = ConfigLoader::new(&args.config, args.listen);
    let cfg = loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    // Dedup backend: durable when DATABASE_URL is set and reachable,
    // volatile in-memory otherwise. Unreachable durable storage degrades,
    // it never aborts startup.
    let store = dedup::select_store(
        get_database_url().as_deref(),
        cfg.dedup_capacity,
        cfg.dedup_expiry,
    )
    .await;
    let dedup_backend = store.name();

    let coordinator = Arc::new(Coordinator::new(store, Arc::new(ConsoleSink)));

    // Spawn the poller task when enabled, wired to a shutdown channel.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller_enabled = cfg.poller.is_some();
    let poller_handle = cfg.poller.map(|poller_config| {
        tracing::info!(
            url = %poller_config.summary_url,
            interval = ?poller_config.interval,
            "Poller enabled"
        );
        tokio::spawn(
            SummaryPoller::new(poller_config, coordinator.clone(), shutdown_rx.clone()).run(),
        )
    });
    if poller_handle.is_none() {
        tracing::info!("Poller disabled. Waiting for incoming webhooks at /webhook");
    }

    // Build the router
    let app_state = AppState {
        coordinator,
        signing_secret: cfg.signing_secret.map(Arc::from),
        dedup_backend,
        poller_enabled,
    };
    let router = build_router(app_state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", cfg.listen);
    let result = run_server(router, cfg.listen).await;

    // Stop the poller and wait for it to finish its current iteration.
    let _ = shutdown_tx.send(true);
    if let Some(handle) = poller_handle {
        let _ = handle.await;
    }
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
