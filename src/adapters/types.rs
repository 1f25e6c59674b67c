//! Live event types delivered by an external stream connector
//!
//! Connectors push JSON objects tagged with an `event` field:
//! - `{ "event": "connected" }`
//! - `{ "event": "disconnected" }`
//! - `{ "event": "error", "message": "..." }`
//! - `{ "event": "gift", "uniqueId": "...", "giftName": "...", "diamondCount": 1, "repeatCount": 5 }`
//!
//! Gift payloads are read leniently: wrong types and missing fields become
//! defaults instead of rejecting the event.

use serde::Serialize;
use serde_json::Value;

pub const UNKNOWN_IDENTITY: &str = "Unknown";
pub const UNKNOWN_GIFT: &str = "Unknown Gift";

/// State of the upstream live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ConnectionState {
    Connected,
    #[default]
    Disconnected,
    Error,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Error => write!(f, "Error"),
        }
    }
}

/// Raw gift notification, every field optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GiftNotification {
    pub source_identity: Option<String>,
    pub gift_label: Option<String>,
    pub unit_value: Option<i64>,
    pub repeat_count: Option<i64>,
}

/// Gift after normalisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedGift {
    pub source_identity: String,
    pub gift_label: String,
    pub total_coins: u64,
}

impl GiftNotification {
    /// Fill defaults: unknown identity/label, zero value, a repeat count of 1
    /// when missing or zero. Negative values count as zero.
    pub fn normalize(&self) -> NormalizedGift {
        let source_identity = non_blank(self.source_identity.as_deref())
            .unwrap_or(UNKNOWN_IDENTITY)
            .to_string();
        let gift_label = non_blank(self.gift_label.as_deref())
            .unwrap_or(UNKNOWN_GIFT)
            .to_string();

        let unit_value = u64::try_from(self.unit_value.unwrap_or(0)).unwrap_or(0);
        let repeat_count = match self.repeat_count {
            None | Some(0) => 1,
            Some(n) => u64::try_from(n).unwrap_or(0),
        };

        NormalizedGift {
            source_identity,
            gift_label,
            total_coins: unit_value.saturating_mul(repeat_count),
        }
    }

    /// Extract a notification from a connector payload.
    pub fn from_value(value: &Value) -> Self {
        let source_identity = string_field(value, &["sourceIdentity", "uniqueId"])
            .or_else(|| value.get("user").and_then(|u| string_field(u, &["uniqueId"])));

        Self {
            source_identity,
            gift_label: string_field(value, &["giftLabel", "giftName"]),
            unit_value: int_field(value, &["unitValue", "diamondCount"]),
            repeat_count: int_field(value, &["repeatCount"]),
        }
    }
}

/// Event pushed by a live connector.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    Connected,
    Disconnected,
    Error(String),
    Gift(GiftNotification),
}

impl LiveEvent {
    /// Parse a connector message. Unknown or non-object payloads → `None`.
    pub fn from_json(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw).ok()?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        match value.get("event")?.as_str()? {
            "connected" => Some(LiveEvent::Connected),
            "disconnected" => Some(LiveEvent::Disconnected),
            "error" => Some(LiveEvent::Error(
                string_field(value, &["message"]).unwrap_or_else(|| "unknown error".to_string()),
            )),
            "gift" => Some(LiveEvent::Gift(GiftNotification::from_value(value))),
            _ => None,
        }
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| value.get(*k))
        .find_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

fn int_field(value: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter()
        .filter_map(|k| value.get(*k))
        .find_map(|v| match v {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
}
