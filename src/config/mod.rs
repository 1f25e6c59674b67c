//! Configuration: YAML/env settings, logging, and prize storage
//!
//! This module provides:
//! - Configuration types (`AppConfig`, `PacingConfig`, ...) and YAML loading
//! - Application constants with environment variable overrides
//! - Logging initialisation
//! - The `ConfigPort` storage contract and its backings

pub mod constants;
pub mod logging;
mod loader;
pub mod store;
mod types;

pub use types::{AppConfig, HubConfig, LiveConfig, PacingConfig, ServerConfig, StorageConfig};

pub use loader::{load_config, load_config_from_str};

pub use logging::init_logging;

pub use store::{default_prize_table, ConfigPort, JsonFileStore, MemoryStore};
