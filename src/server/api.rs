//! Control plane REST handlers.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::adapters::{ConnectionState, LiveEvent};
use crate::core::{PrizeItem, ServerEvent, Winner};
use crate::error::AppError;

use super::AppState;

/// Error returned by control plane handlers.
#[derive(Debug)]
pub enum ApiError {
    App(AppError),
    BadRequest(String),
}

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        ApiError::App(e)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::App(AppError::InvalidSpin(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::App(AppError::Config(_)) | ApiError::App(AppError::EmptyPrizeTable) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::App(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            ApiError::App(e) => e.to_string(),
            ApiError::BadRequest(msg) => msg.clone(),
        };
        if status.is_server_error() {
            error!(error = %message, "Control plane request failed");
        }
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn ok_message(message: impl Into<String>) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "message": message.into() }))
}

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub connection_identity: String,
    pub connection_state: String,
    pub queue_length: usize,
    pub is_processing: bool,
    pub prizes: Vec<PrizeItem>,
    /// Set when queued spins cannot be resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// GET /api/status
pub async fn status_handler(State(state): State<AppState>) -> ApiResult<StatusResponse> {
    let prizes = state.store.load().await?;
    let queue = state.queue.status();
    let warning = prizes
        .is_empty()
        .then(|| AppError::EmptyPrizeTable.to_string());

    Ok(Json(StatusResponse {
        connection_identity: state.store.target_identity(),
        connection_state: state.intake.connection_state().to_string(),
        queue_length: queue.queue_length,
        is_processing: queue.is_processing,
        prizes,
        warning,
    }))
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SavePrizesRequest {
    pub items: Vec<PrizeItem>,
}

/// POST /api/config/prizes
pub async fn save_prizes_handler(
    State(state): State<AppState>,
    Json(body): Json<SavePrizesRequest>,
) -> ApiResult<serde_json::Value> {
    if body.items.is_empty() {
        warn!("Saving an empty prize table, spins will be refused");
    }
    state.store.save(body.items).await?;
    Ok(ok_message("Prize config updated"))
}

#[derive(Debug, Default, Deserialize)]
pub struct TargetRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
}

/// POST /api/config/target
///
/// `{"action": "disconnect"}` marks the live source disconnected; otherwise
/// `username` becomes the new target identity.
pub async fn target_handler(
    State(state): State<AppState>,
    Json(body): Json<TargetRequest>,
) -> ApiResult<serde_json::Value> {
    if body.action.as_deref() == Some("disconnect") {
        if state.intake.connection_state() != ConnectionState::Disconnected {
            state.intake.handle_event(LiveEvent::Disconnected);
        }
        return Ok(ok_message("Disconnected"));
    }

    let username = body
        .username
        .map(|u| u.trim().trim_start_matches('@').to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Username required".to_string()))?;

    state.store.set_target_identity(username.clone());
    info!(target = %username, "Live target updated");
    state
        .hub
        .publish(ServerEvent::system(format!("Live target set to @{}", username)));

    Ok(ok_message(format!("Target set to @{}", username)))
}

// ============================================================================
// Queue control
// ============================================================================

fn default_test_user() -> String {
    "test_admin".to_string()
}

fn default_test_coins() -> u64 {
    10
}

#[derive(Debug, Deserialize)]
pub struct TestSpinRequest {
    #[serde(default = "default_test_user")]
    pub username: String,
    #[serde(default = "default_test_coins")]
    pub coins: u64,
}

/// POST /api/test-spin
pub async fn test_spin_handler(
    State(state): State<AppState>,
    Json(body): Json<TestSpinRequest>,
) -> ApiResult<serde_json::Value> {
    let batch = state
        .intake
        .manual_trigger(&body.username, body.coins)
        .await
        .map_err(|e| match e {
            AppError::InvalidSpin(_) => {
                ApiError::BadRequest("Not enough coins for a spin (min 10)".to_string())
            }
            other => ApiError::App(other),
        })?;

    Ok(ok_message(format!(
        "Added {} spins for {}",
        batch.spins, batch.user
    )))
}

/// POST /api/control/clear-queue
pub async fn clear_queue_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.queue.clear();
    ok_message("Queue cleared")
}

// ============================================================================
// Winners
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RecordWinnerRequest {
    pub username: String,
    pub item: String,
}

/// GET /api/winners
pub async fn list_winners_handler(State(state): State<AppState>) -> Json<Vec<Winner>> {
    Json(state.winners.list().await)
}

/// POST /api/winners
pub async fn record_winner_handler(
    State(state): State<AppState>,
    Json(body): Json<RecordWinnerRequest>,
) -> ApiResult<Winner> {
    let winner = state.winners.record(body.username, body.item).await?;
    state.hub.publish(ServerEvent::NewWinner {
        winner: winner.clone(),
    });
    Ok(Json(winner))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(
            ApiError::from(AppError::InvalidSpin("x".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AppError::Config("x".into())).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::from(AppError::EmptyPrizeTable).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::from(AppError::Store("disk".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_response_status() {
        let response = ApiError::BadRequest("Username required".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_test_spin_request_defaults() {
        let body: TestSpinRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(body.username, "test_admin");
        assert_eq!(body.coins, 10);
    }

    #[test]
    fn test_status_response_field_names() {
        let response = StatusResponse {
            connection_identity: "streamer".into(),
            connection_state: "Connected".into(),
            queue_length: 2,
            is_processing: true,
            prizes: vec![],
            warning: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["connectionIdentity"], "streamer");
        assert_eq!(json["connectionState"], "Connected");
        assert_eq!(json["queueLength"], 2);
        assert_eq!(json["isProcessing"], true);
        assert!(json.get("warning").is_none());
    }
}
