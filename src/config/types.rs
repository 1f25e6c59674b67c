//! Configuration types
//!
//! Loaded from YAML, then patched with environment overrides. Every section
//! is optional in the file and falls back to the defaults in `constants`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

use super::constants::{
    env_parse, env_string, DEFAULT_PORT, DEFAULT_PRIZE_CONFIG_PATH, DEFAULT_SPIN_BUFFER_MS,
    DEFAULT_SPIN_DURATION_MS, DEFAULT_SUBSCRIBER_BUFFER, DEFAULT_WINNERS_PATH, ENV_LIVE_TARGET,
    ENV_PORT, ENV_PRIZE_CONFIG_PATH, ENV_SPIN_BUFFER_MS, ENV_SPIN_DURATION_MS,
    ENV_SUBSCRIBER_BUFFER, ENV_WINNERS_PATH,
};

// ============================================================================
// Sections
// ============================================================================

/// HTTP/WebSocket server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

/// Timing of the pause between batches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Overlay animation time per spin
    pub per_spin_ms: u64,
    /// Fixed tail after each batch
    pub buffer_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            per_spin_ms: DEFAULT_SPIN_DURATION_MS,
            buffer_ms: DEFAULT_SPIN_BUFFER_MS,
        }
    }
}

/// File locations for the prize table and winner ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub prize_config_path: PathBuf,
    pub winners_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            prize_config_path: PathBuf::from(DEFAULT_PRIZE_CONFIG_PATH),
            winners_path: PathBuf::from(DEFAULT_WINNERS_PATH),
        }
    }
}

/// Live event source settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Identity of the live stream the connector should follow
    pub target_identity: String,
}

/// Viewer fan-out settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub subscriber_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

// ============================================================================
// Root
// ============================================================================

/// Root application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub pacing: PacingConfig,
    pub storage: StorageConfig,
    pub live: LiveConfig,
    pub hub: HubConfig,
}

impl AppConfig {
    /// Apply `PORT`, `SPIN_DURATION_MS`, `SPIN_BUFFER_MS`, `SUBSCRIBER_BUFFER`,
    /// `LIVE_TARGET`, `PRIZE_CONFIG_PATH` and `WINNERS_PATH` on top of the
    /// loaded values.
    pub fn apply_env_overrides(&mut self) {
        if let Some(port) = env_parse(ENV_PORT) {
            self.server.port = port;
        }
        if let Some(ms) = env_parse(ENV_SPIN_DURATION_MS) {
            self.pacing.per_spin_ms = ms;
        }
        if let Some(ms) = env_parse(ENV_SPIN_BUFFER_MS) {
            self.pacing.buffer_ms = ms;
        }
        if let Some(buffer) = env_parse(ENV_SUBSCRIBER_BUFFER) {
            self.hub.subscriber_buffer = buffer;
        }
        if let Some(target) = env_string(ENV_LIVE_TARGET) {
            self.live.target_identity = target;
        }
        if let Some(path) = env_string(ENV_PRIZE_CONFIG_PATH) {
            self.storage.prize_config_path = PathBuf::from(path);
        }
        if let Some(path) = env_string(ENV_WINNERS_PATH) {
            self.storage.winners_path = PathBuf::from(path);
        }
    }

    /// Validate all configuration rules
    pub fn validate(&self) -> Result<(), AppError> {
        if self.server.port == 0 {
            return Err(AppError::Config("server.port must be non-zero".to_string()));
        }

        if self.pacing.per_spin_ms == 0 {
            return Err(AppError::Config(
                "pacing.per_spin_ms must be > 0".to_string(),
            ));
        }

        if self.hub.subscriber_buffer == 0 {
            return Err(AppError::Config(
                "hub.subscriber_buffer must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
