//! AV Controls server
//!
//! Serves the control page, the settings editor and the IR relay endpoint.

use anyhow::{Context, Result};
use av_controls::{
    api::{build_router, AppState},
    config::load_config,
    control::ControlService,
    device::HttpTransport,
    logging::{init_tracing, LogGate},
    store::{ConfigStore, SnapshotHandle},
};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = load_config().context("Failed to load server configuration")?;

    // Device configuration decides the log level, so read it before logging starts
    let store = ConfigStore::new(config.config_path());
    store
        .ensure_initialized()
        .with_context(|| format!("Failed to initialize {}", store.path().display()))?;
    let snapshot = store
        .load()
        .with_context(|| format!("Failed to load {}", store.path().display()))?;

    // Initialize logging
    let log_gate = LogGate::new(snapshot.global.log_level);
    let _log_guard = init_tracing(&log_gate, &config.log_path())?;

    tracing::info!("Starting AV Controls");
    tracing::info!(?config, "Configuration loaded");
    tracing::info!(
        receivers = snapshot.receivers.len(),
        transmitters = snapshot.transmitters.len(),
        "Device configuration loaded"
    );

    let snapshot = SnapshotHandle::new(snapshot);
    let control = ControlService::new(
        Arc::new(HttpTransport::new()),
        snapshot.clone(),
        config.payloads_path(),
        config.targets_path(),
    );
    let app = build_router(AppState::new(control, store, snapshot, log_gate));

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
