//! Spin relay
//!
//! Gift-driven prize wheel backend:
//! - Live gift intake (connector events → spin batches)
//! - Serialized spin queue with weighted prize draws and animation pacing
//! - WebSocket fan-out to overlay viewers plus an HTTP control plane

pub mod adapters;
pub mod config;
pub mod core;
pub mod error;
pub mod server;

pub use error::AppError;
