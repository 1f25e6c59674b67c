//! Append-only winner ledger stored as a JSON array.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::core::types::Winner;
use crate::error::{AppError, Result};

#[derive(Debug)]
pub struct WinnerLog {
    path: PathBuf,
    /// Serialises read-modify-write cycles on the file
    write_lock: Mutex<()>,
}

impl WinnerLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All recorded winners, oldest first. Missing or unreadable file → empty.
    pub async fn list(&self) -> Vec<Winner> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Winner ledger unreadable");
            Vec::new()
        })
    }

    /// Append a winner and return it.
    ///
    /// # Errors
    /// `Store` when the existing ledger cannot be parsed; the file is left
    /// untouched.
    pub async fn record(&self, username: impl Into<String>, item: impl Into<String>) -> Result<Winner> {
        let _guard = self.write_lock.lock().await;

        let winner = Winner {
            id: Uuid::new_v4().to_string(),
            username: username.into(),
            item: item.into(),
            timestamp: Utc::now(),
        };

        let mut winners = self.read_existing().await?;
        winners.push(winner.clone());

        if let Err(e) = self.write_all(&winners).await {
            error!(error = %e, "Failed to save winner");
            return Err(e);
        }

        info!(user = %winner.username, item = %winner.item, "Winner saved");
        Ok(winner)
    }

    async fn read_existing(&self) -> Result<Vec<Winner>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw).map_err(|e| {
            AppError::Store(format!(
                "winner ledger '{}' is corrupt: {}",
                self.path.display(),
                e
            ))
        })
    }

    async fn write_all(&self, winners: &[Winner]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_string_pretty(winners)?;
        tokio::fs::write(&self.path, body).await?;
        Ok(())
    }
}
