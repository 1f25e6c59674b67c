//! Application-wide error types using thiserror
//!
//! Every fallible operation in the crate returns `AppError`. The drain loop
//! and the subscriber fan-out never propagate these; they log and move on.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Prize table is empty")]
    EmptyPrizeTable,

    #[error("Invalid spin request: {0}")]
    InvalidSpin(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
