//! Backup Dashboard - Main entry point

use anyhow::Result;
use backup_core::utils::logger;
use backup_core::{BackupStore, Config, Orchestrator};
use backup_dashboard::{routes, seed, AppConfig, AppState};
use backup_dashboard::ws::ui::UiBroadcaster;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the core configuration file (overrides CORE_CONFIG)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Start with an empty store instead of the sample backups
    #[arg(long)]
    no_seed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::from_env();
    if let Some(path) = args.config {
        config.core_config = Some(path);
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.no_seed {
        config.seed_sample_data = false;
    }

    // Load core configuration
    let core_config = match &config.core_config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    // Initialize logging
    let log_level = args
        .log_level
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| core_config.log.level.clone());
    logger::init(&log_level)?;

    tracing::info!(
        "Starting backup-dashboard v{} on port {}",
        env!("CARGO_PKG_VERSION"),
        config.port
    );

    let store = if config.seed_sample_data {
        BackupStore::with_records(seed::sample_backups())?
    } else {
        BackupStore::new()
    };
    tracing::info!(backups = store.len().await, "Backup store ready");

    let ui = UiBroadcaster::new();
    let orchestrator = Orchestrator::from_config(&core_config, store, Arc::new(ui.clone()));
    let state = Arc::new(AppState::new(config.clone(), orchestrator.clone(), ui));

    // Build router
    let app = routes::create_router(state.clone());

    // Start HTTP server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    // Graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.shutdown.clone()))
        .await?;

    // Cleanup
    tracing::info!("Shutting down...");
    orchestrator.shutdown();
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }

    cancel.cancel();
}
