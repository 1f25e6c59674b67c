//! Spin relay entry point
//!
//! Orchestrates:
//! 1. Config + logging initialization
//! 2. Prize store, hub, queue and gift intake
//! 3. axum control plane + WebSocket server
//! 4. Ctrl+C graceful shutdown

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use spin_relay::config::{self, constants, init_logging, AppConfig, ConfigPort, JsonFileStore};
use spin_relay::server::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // =========================================================================
    // 1. Config + logging
    // =========================================================================
    dotenvy::dotenv().ok();
    init_logging();

    info!("=== Spin relay ===");

    let config_path = constants::config_path();
    let mut app_config = match config::load_config(Path::new(&config_path)) {
        Ok(cfg) => {
            info!(path = %config_path, "Config loaded");
            cfg
        }
        Err(e) => {
            warn!(error = %e, "Could not load config file, using defaults");
            AppConfig::default()
        }
    };
    app_config.apply_env_overrides();
    app_config.validate()?;

    info!(
        port = app_config.server.port,
        per_spin_ms = app_config.pacing.per_spin_ms,
        buffer_ms = app_config.pacing.buffer_ms,
        prizes = %app_config.storage.prize_config_path.display(),
        target = %app_config.live.target_identity,
        "Starting with configuration"
    );

    // =========================================================================
    // 2. Store, hub, queue, intake
    // =========================================================================
    let store: Arc<dyn ConfigPort> = Arc::new(JsonFileStore::new(
        app_config.storage.prize_config_path.clone(),
        app_config.live.target_identity.clone(),
    ));

    match store.load().await {
        Ok(items) if items.is_empty() => warn!("Prize table is empty, spins will be skipped"),
        Ok(items) => info!(prizes = items.len(), "Prize table loaded"),
        Err(e) => error!(error = %e, "Prize table unreadable"),
    }

    let (state, live_rx) = AppState::build(&app_config, store);
    let intake_handle = tokio::spawn(state.intake.clone().run(live_rx));

    // =========================================================================
    // 3. axum server
    // =========================================================================
    let port = app_config.server.port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server::start_server(state, port).await {
            error!(error = %e, "Server failed");
        }
    });

    // =========================================================================
    // 4. Wait for Ctrl+C → graceful shutdown
    // =========================================================================
    info!("Server running on http://0.0.0.0:{}", port);
    info!("Viewer endpoint: ws://0.0.0.0:{}/ws", port);
    info!("Connector endpoint: ws://0.0.0.0:{}/ingest", port);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    server_handle.abort();
    intake_handle.abort();

    info!("=== Shutdown complete ===");
    Ok(())
}
