//! Prize table and live-target storage
//!
//! The drain loop and the control plane only see the `ConfigPort` trait.
//! Two backings are provided: `JsonFileStore` (the prize table lives in a
//! JSON file, `{"items": [...]}`) and `MemoryStore`.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::types::PrizeItem;
use crate::error::{AppError, Result};

/// Storage contract for the prize table and the live target identity.
#[async_trait]
pub trait ConfigPort: Send + Sync {
    /// Current prize table, in resolution order.
    async fn load(&self) -> Result<Vec<PrizeItem>>;

    /// Replace the prize table.
    async fn save(&self, items: Vec<PrizeItem>) -> Result<()>;

    /// Identity of the live stream being followed.
    fn target_identity(&self) -> String;

    fn set_target_identity(&self, identity: String);
}

/// On-disk layout of the prize file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PrizeFile {
    items: Vec<PrizeItem>,
}

/// Image shown for the built-in prizes when an entry has none.
pub fn default_image(label: &str) -> Option<&'static str> {
    match label {
        "gladiator" => Some("/assets/gladiator.png"),
        "fb" => Some("/assets/fb.png"),
        "scare" => Some("/assets/scare.png"),
        "mitos" => Some("/assets/mitos-new.png"),
        _ => None,
    }
}

/// Table used when no prize file exists yet.
pub fn default_prize_table() -> Vec<PrizeItem> {
    [
        ("gladiator", 0.1, 0),
        ("fb", 3.0, 50),
        ("scare", 17.0, 10),
        ("mitos", 79.9, 0),
    ]
    .into_iter()
    .map(|(label, weight, value)| {
        let item = PrizeItem::new(label, weight, value);
        match default_image(label) {
            Some(image) => item.with_image(image),
            None => item,
        }
    })
    .collect()
}

/// Check weights are finite and within 0–100 and labels are non-empty.
pub fn validate_prize_table(items: &[PrizeItem]) -> Result<()> {
    for (index, item) in items.iter().enumerate() {
        if item.label.trim().is_empty() {
            return Err(AppError::Config(format!(
                "Prize #{}: label cannot be empty",
                index
            )));
        }
        if !item.weight.is_finite() || !(0.0..=100.0).contains(&item.weight) {
            return Err(AppError::Config(format!(
                "Prize '{}': weight must be within 0-100 (got {})",
                item.label, item.weight
            )));
        }
    }
    Ok(())
}

fn fill_default_images(items: &mut [PrizeItem]) {
    for item in items.iter_mut().filter(|i| i.image.is_none()) {
        item.image = default_image(&item.label).map(str::to_string);
    }
}

fn read_target(lock: &RwLock<String>) -> String {
    lock.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn write_target(lock: &RwLock<String>, identity: String) {
    *lock.write().unwrap_or_else(PoisonError::into_inner) = identity;
}

// ============================================================================
// JSON file store
// ============================================================================

/// Prize table persisted as pretty JSON.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    target: RwLock<String>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>, target_identity: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            target: RwLock::new(target_identity.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigPort for JsonFileStore {
    async fn load(&self) -> Result<Vec<PrizeItem>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Prize file missing, using default table");
                return Ok(default_prize_table());
            }
            Err(e) => return Err(e.into()),
        };

        let mut file: PrizeFile = serde_json::from_str(&raw).map_err(|e| {
            AppError::Store(format!(
                "Invalid prize file '{}': {}",
                self.path.display(),
                e
            ))
        })?;
        fill_default_images(&mut file.items);

        Ok(file.items)
    }

    async fn save(&self, items: Vec<PrizeItem>) -> Result<()> {
        validate_prize_table(&items)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let count = items.len();
        let body = serde_json::to_string_pretty(&PrizeFile { items })?;

        // Write-then-rename so a concurrent load never sees a torn file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        info!(path = %self.path.display(), prizes = count, "Prize config saved");
        Ok(())
    }

    fn target_identity(&self) -> String {
        read_target(&self.target)
    }

    fn set_target_identity(&self, identity: String) {
        write_target(&self.target, identity);
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// `ConfigPort` held entirely in memory.
#[derive(Debug)]
pub struct MemoryStore {
    items: RwLock<Vec<PrizeItem>>,
    target: RwLock<String>,
}

impl MemoryStore {
    pub fn new(items: Vec<PrizeItem>) -> Self {
        Self {
            items: RwLock::new(items),
            target: RwLock::new(String::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(default_prize_table())
    }
}

#[async_trait]
impl ConfigPort for MemoryStore {
    async fn load(&self) -> Result<Vec<PrizeItem>> {
        Ok(self
            .items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn save(&self, items: Vec<PrizeItem>) -> Result<()> {
        validate_prize_table(&items)?;
        *self.items.write().unwrap_or_else(PoisonError::into_inner) = items;
        Ok(())
    }

    fn target_identity(&self) -> String {
        read_target(&self.target)
    }

    fn set_target_identity(&self, identity: String) {
        write_target(&self.target, identity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_table_sums_to_100() {
        let total: f64 = default_prize_table().iter().map(|p| p.weight).sum();
        assert!((total - 100.0).abs() < 1e-9, "Got: {}", total);
        assert!(default_prize_table().iter().all(|p| p.image.is_some()));
    }

    #[test]
    fn test_validate_rejects_out_of_range_weight() {
        let err = validate_prize_table(&[PrizeItem::new("A", 120.0, 0)]).unwrap_err();
        assert!(err.to_string().contains("within 0-100"), "Got: {}", err);
        assert!(validate_prize_table(&[PrizeItem::new("A", -1.0, 0)]).is_err());
        assert!(validate_prize_table(&[PrizeItem::new("A", f64::NAN, 0)]).is_err());
    }

    #[test]
    fn test_validate_rejects_blank_label() {
        assert!(validate_prize_table(&[PrizeItem::new("  ", 10.0, 0)]).is_err());
    }

    #[test]
    fn test_validate_accepts_empty_table() {
        assert!(validate_prize_table(&[]).is_ok());
    }

    #[tokio::test]
    async fn test_file_store_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("prizes.json"), "");
        assert_eq!(store.load().await.unwrap(), default_prize_table());
    }

    #[tokio::test]
    async fn test_file_store_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/prizes.json"), "");
        let items = vec![PrizeItem::new("A", 30.0, 5), PrizeItem::new("B", 70.0, 0)];

        store.save(items.clone()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), items);

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"prob\""), "Got: {}", raw);
    }

    #[tokio::test]
    async fn test_file_store_fills_known_images() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prizes.json");
        std::fs::write(
            &path,
            r#"{"items":[{"label":"fb","prob":50,"value":50},{"label":"custom","prob":50,"value":1}]}"#,
        )
        .unwrap();

        let items = JsonFileStore::new(&path, "").load().await.unwrap();
        assert_eq!(items[0].image.as_deref(), Some("/assets/fb.png"));
        assert_eq!(items[1].image, None);
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_is_store_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prizes.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = JsonFileStore::new(&path, "").load().await.unwrap_err();
        assert!(matches!(err, AppError::Store(_)), "Got: {:?}", err);
    }

    #[tokio::test]
    async fn test_file_store_rejects_invalid_save() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("prizes.json"), "");
        assert!(store.save(vec![PrizeItem::new("A", 101.0, 0)]).await.is_err());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_target_identity_roundtrip() {
        let store = JsonFileStore::new("unused.json", "first");
        assert_eq!(store.target_identity(), "first");
        store.set_target_identity("second".into());
        assert_eq!(store.target_identity(), "second");
    }

    #[tokio::test]
    async fn test_memory_store_save_and_load() {
        let store = MemoryStore::new(vec![]);
        assert!(store.load().await.unwrap().is_empty());
        store.save(vec![PrizeItem::new("A", 100.0, 1)]).await.unwrap();
        assert_eq!(store.load().await.unwrap().len(), 1);
    }
}
