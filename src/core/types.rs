//! Core data types for the spin queue and the viewer event stream.
//!
//! Field names on the wire are camelCase to match what overlay clients
//! already consume (`queueLength`, `giftName`, `prizeResults`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Coins required to buy a single spin.
pub const COINS_PER_SPIN: u64 = 10;

// =============================================================================
// Prize table
// =============================================================================

/// One entry of the prize table.
///
/// `weight` is percentage-scale and serialises as `prob` so that existing
/// prize files and clients keep working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrizeItem {
    pub label: String,
    #[serde(rename = "prob")]
    pub weight: f64,
    #[serde(default)]
    pub value: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl PrizeItem {
    pub fn new(label: impl Into<String>, weight: f64, value: i64) -> Self {
        Self {
            label: label.into(),
            weight,
            value,
            image: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

// =============================================================================
// Spin batches
// =============================================================================

/// Number of spins bought by `coins`: `floor(coins / 10)`.
#[inline]
pub fn spins_for_coins(coins: u64) -> u32 {
    u32::try_from(coins / COINS_PER_SPIN).unwrap_or(u32::MAX)
}

/// A gift-triggered group of independent weighted draws.
///
/// Built once by the intake path and consumed by the drain loop; it is never
/// written back into the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct SpinBatchRequest {
    pub user: String,
    pub gift_name: String,
    pub coin: u64,
    pub spins: u32,
    pub created_at: DateTime<Utc>,
}

impl SpinBatchRequest {
    /// Build a batch from a coin total.
    ///
    /// Fails with `InvalidSpin` when the coins do not buy at least one spin.
    pub fn from_coins(
        user: impl Into<String>,
        gift_name: impl Into<String>,
        coin: u64,
    ) -> Result<Self> {
        let spins = spins_for_coins(coin);
        if spins < 1 {
            return Err(AppError::InvalidSpin(format!(
                "{} coins is below the {} coin minimum",
                coin, COINS_PER_SPIN
            )));
        }

        Ok(Self {
            user: user.into(),
            gift_name: gift_name.into(),
            coin,
            spins,
            created_at: Utc::now(),
        })
    }
}

/// Snapshot of the queue as seen by status queries and viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub queue_length: usize,
    pub is_processing: bool,
}

impl QueueStatus {
    pub const IDLE: QueueStatus = QueueStatus {
        queue_length: 0,
        is_processing: false,
    };
}

// =============================================================================
// Winners
// =============================================================================

/// A recorded prize winner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Winner {
    pub id: String,
    pub username: String,
    pub item: String,
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Server event (union type for WebSocket viewers)
// =============================================================================

/// Events fanned out to viewers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Queue length and drain state
    QueueStatus(QueueStatus),
    /// Resolved results for one batch; clients animate `spins` wheel turns
    #[serde(rename_all = "camelCase")]
    SpinRequest {
        user: String,
        spins: u32,
        gift_name: String,
        coin: u64,
        prize_results: Vec<PrizeItem>,
    },
    /// Free-form operator/system notice
    System { message: String },
    /// A winner was recorded through the control plane
    NewWinner { winner: Winner },
}

impl ServerEvent {
    pub fn system(message: impl Into<String>) -> Self {
        ServerEvent::System {
            message: message.into(),
        }
    }

    /// Wire name of the event, as written in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::QueueStatus(_) => "queue_status",
            ServerEvent::SpinRequest { .. } => "spin_request",
            ServerEvent::System { .. } => "system",
            ServerEvent::NewWinner { .. } => "new_winner",
        }
    }
}

impl From<QueueStatus> for ServerEvent {
    fn from(status: QueueStatus) -> Self {
        ServerEvent::QueueStatus(status)
    }
}

/// Get current time in milliseconds since epoch.
#[inline]
pub fn current_time_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}
