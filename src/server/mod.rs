//! HTTP control plane and WebSocket endpoints.
//!
//! Uses `axum` for HTTP/WS routing with CORS support.

pub mod api;
pub mod ws;

use std::sync::Arc;

use axum::{
    response::Json,
    routing::{get, post},
    Router,
};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::adapters::{GiftIntake, LiveEvent};
use crate::config::constants::DEFAULT_LIVE_EVENT_CAPACITY;
use crate::config::{AppConfig, ConfigPort};
use crate::core::{BroadcastHub, SpinQueue, WinnerLog};

/// Shared application state for the HTTP/WS server.
#[derive(Clone)]
pub struct AppState {
    pub queue: SpinQueue,
    pub hub: Arc<BroadcastHub>,
    pub store: Arc<dyn ConfigPort>,
    pub intake: GiftIntake,
    pub winners: Arc<WinnerLog>,
    /// Connector messages received on `/ingest` go here
    pub live_tx: mpsc::Sender<LiveEvent>,
}

impl AppState {
    /// Wire up hub, queue, intake and winner ledger from configuration.
    ///
    /// The returned receiver must be handed to [`GiftIntake::run`].
    pub fn build(config: &AppConfig, store: Arc<dyn ConfigPort>) -> (Self, mpsc::Receiver<LiveEvent>) {
        let hub = Arc::new(BroadcastHub::new(config.hub.subscriber_buffer));
        let queue = SpinQueue::new(store.clone(), hub.clone(), config.pacing.clone());
        let intake = GiftIntake::new(queue.clone(), hub.clone(), store.clone());
        let winners = Arc::new(WinnerLog::new(config.storage.winners_path.clone()));
        let (live_tx, live_rx) = mpsc::channel(DEFAULT_LIVE_EVENT_CAPACITY);

        let state = Self {
            queue,
            hub,
            store,
            intake,
            winners,
            live_tx,
        };
        (state, live_rx)
    }
}

/// Build the router with every route mounted.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/status", get(api::status_handler))
        .route("/api/config/prizes", post(api::save_prizes_handler))
        .route("/api/config/target", post(api::target_handler))
        .route("/api/test-spin", post(api::test_spin_handler))
        .route("/api/control/clear-queue", post(api::clear_queue_handler))
        .route(
            "/api/winners",
            get(api::list_winners_handler).post(api::record_winner_handler),
        )
        .route("/ws", get(ws::ws_handler))
        .route("/ingest", get(ws::ingest_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP/WebSocket server.
///
/// Blocks until the server shuts down.
pub async fn start_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(address = %addr, "Starting spin relay server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// GET /health
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": crate::core::types::current_time_ms(),
    }))
}
