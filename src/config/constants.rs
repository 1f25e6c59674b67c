//! Application constants and configuration defaults
//!
//! Defaults live here so `config.yaml` can stay sparse. Each value can be
//! overridden by an environment variable, which wins over the YAML file.

use std::str::FromStr;

// =============================================================================
// Defaults
// =============================================================================

/// HTTP/WebSocket listen port
pub const DEFAULT_PORT: u16 = 3002;

/// Animation time per spin on the overlay
pub const DEFAULT_SPIN_DURATION_MS: u64 = 5_000;

/// Extra time after the last spin of a batch
pub const DEFAULT_SPIN_BUFFER_MS: u64 = 2_000;

/// Per-subscriber event buffer before a stalled viewer is evicted
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = crate::core::broadcast::DEFAULT_SUBSCRIBER_BUFFER;

/// Capacity of the live-event intake channel
pub const DEFAULT_LIVE_EVENT_CAPACITY: usize = 256;

pub const DEFAULT_PRIZE_CONFIG_PATH: &str = "data/prize-config.json";
pub const DEFAULT_WINNERS_PATH: &str = "data/winners.json";
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

// =============================================================================
// Environment variable names
// =============================================================================

pub const ENV_PORT: &str = "PORT";
pub const ENV_SPIN_DURATION_MS: &str = "SPIN_DURATION_MS";
pub const ENV_SPIN_BUFFER_MS: &str = "SPIN_BUFFER_MS";
pub const ENV_SUBSCRIBER_BUFFER: &str = "SUBSCRIBER_BUFFER";
pub const ENV_LIVE_TARGET: &str = "LIVE_TARGET";
pub const ENV_PRIZE_CONFIG_PATH: &str = "PRIZE_CONFIG_PATH";
pub const ENV_WINNERS_PATH: &str = "WINNERS_PATH";
pub const ENV_CONFIG_PATH: &str = "CONFIG_PATH";

/// Read and parse an environment variable. Unset or unparsable → `None`.
pub fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Read a non-empty string environment variable.
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Path of the YAML config file (default: `config.yaml`)
///
/// Environment variable: `CONFIG_PATH`
pub fn config_path() -> String {
    env_string(ENV_CONFIG_PATH).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}
