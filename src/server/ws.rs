//! WebSocket handlers.
//!
//! `/ws` streams viewer events as JSON:
//! - `{ "type": "queue_status", "queueLength": 0, "isProcessing": false }`
//! - `{ "type": "spin_request", "user": "...", "spins": 2, ... }`
//! - `{ "type": "system", "message": "..." }`
//!
//! `/ingest` accepts live events from an external stream connector.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use tracing::{debug, info, warn};

use crate::adapters::LiveEvent;
use crate::core::{ServerEvent, Subscription};

use super::AppState;

/// Greeting sent to every new viewer ahead of the queue status.
pub const WELCOME_MESSAGE: &str = "Connected to spin relay";

/// WebSocket upgrade handler at GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_viewer(socket, state))
}

/// Forward hub events to one viewer until either side goes away.
async fn handle_viewer(mut socket: WebSocket, state: AppState) {
    let Subscription { id, mut events } = state
        .queue
        .subscribe_viewer([ServerEvent::system(WELCOME_MESSAGE)]);
    info!(subscriber = id, viewers = state.hub.subscriber_count(), "Viewer connected");

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(evt) => {
                        match serde_json::to_string(&evt) {
                            Ok(json) => {
                                if socket.send(Message::Text(json.into())).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "Failed to serialize event");
                            }
                        }
                    }
                    // Evicted by the hub
                    None => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    _ => {
                        // Viewers are read-only
                    }
                }
            }
        }
    }

    state.hub.unsubscribe(id);
    info!(subscriber = id, "Viewer disconnected");
}

/// Connector upgrade handler at GET /ingest
pub async fn ingest_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connector(socket, state))
}

/// Parse connector messages and hand them to the intake task.
async fn handle_connector(mut socket: WebSocket, state: AppState) {
    info!("Live connector attached");

    while let Some(msg) = socket.recv().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };

        match LiveEvent::from_json(&text) {
            Some(event) => {
                if state.live_tx.send(event).await.is_err() {
                    warn!("Gift intake stopped, dropping connector");
                    break;
                }
            }
            None => debug!(payload = %text, "Ignoring unrecognised connector message"),
        }
    }

    info!("Live connector detached");
}
