//! Durable storage backends for the persisted cache blob.
//!
//! The whole cache map is stored as a single JSON blob named
//! [`STORAGE_KEY`]. Backends only move that blob around; they know nothing
//! about its structure.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::StorageError;

/// Name of the persisted blob.
pub const STORAGE_KEY: &str = "app_cache";

pub type Result<T> = std::result::Result<T, StorageError>;

pub trait DurableStorage: Send + Sync {
    /// Read the blob. `Ok(None)` when nothing has been stored yet.
    fn read(&self) -> Result<Option<String>>;

    /// Replace the blob wholesale.
    fn write(&self, blob: &str) -> Result<()>;

    /// Delete the blob. Deleting a missing blob is not an error.
    fn remove(&self) -> Result<()>;

    /// Short identifier for logs.
    fn backend_type(&self) -> &str;
}

fn check_quota(quota: Option<usize>, blob: &str) -> Result<()> {
    match quota {
        Some(quota) if blob.len() > quota => Err(StorageError::QuotaExceeded {
            needed: blob.len(),
            quota,
        }),
        _ => Ok(()),
    }
}

// ============================================================================
// Filesystem
// ============================================================================

/// Stores the blob as `<dir>/app_cache.json`.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves the previous blob intact.
pub struct FileStorage {
    path: PathBuf,
    quota: Option<usize>,
}

impl FileStorage {
    pub fn new(cache_dir: impl AsRef<Path>) -> Result<Self> {
        let cache_dir = cache_dir.as_ref();
        std::fs::create_dir_all(cache_dir)?;
        Ok(Self {
            path: cache_dir.join(format!("{}.json", STORAGE_KEY)),
            quota: None,
        })
    }

    /// Refuse writes larger than `bytes`.
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

impl DurableStorage for FileStorage {
    fn read(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(&self.path)?))
    }

    fn write(&self, blob: &str) -> Result<()> {
        check_quota(self.quota, blob)?;
        let temp = self.temp_path();
        std::fs::write(&temp, blob)?;
        std::fs::rename(&temp, &self.path)?;
        debug!(path = %self.path.display(), bytes = blob.len(), "Cache blob written");
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn backend_type(&self) -> &str {
        "file"
    }
}

// ============================================================================
// Memory
// ============================================================================

/// In-process storage. Clones share the same blob, which lets a test build a
/// second `CacheStore` over "the same disk".
#[derive(Clone, Default)]
pub struct MemoryStorage {
    blob: Arc<Mutex<Option<String>>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a pre-existing blob (which may be garbage).
    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            blob: Arc::new(Mutex::new(Some(blob.into()))),
            quota: None,
        }
    }

    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }

    pub fn contents(&self) -> Option<String> {
        self.blob.lock().clone()
    }
}

impl DurableStorage for MemoryStorage {
    fn read(&self) -> Result<Option<String>> {
        Ok(self.blob.lock().clone())
    }

    fn write(&self, blob: &str) -> Result<()> {
        check_quota(self.quota, blob)?;
        *self.blob.lock() = Some(blob.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        *self.blob.lock() = None;
        Ok(())
    }

    fn backend_type(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested")).unwrap();

        assert!(storage.read().unwrap().is_none());
        storage.write("{\"a\":1}").unwrap();
        assert_eq!(storage.read().unwrap().as_deref(), Some("{\"a\":1}"));
        assert!(storage.path().ends_with("app_cache.json"));
        assert!(!storage.temp_path().exists());

        storage.remove().unwrap();
        assert!(storage.read().unwrap().is_none());
        // Removing twice is fine
        storage.remove().unwrap();
    }

    #[test]
    fn test_file_storage_quota_keeps_previous_blob() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap().with_quota(8);

        storage.write("{}").unwrap();
        let err = storage.write("{\"too\":\"large\"}").unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { quota: 8, .. }));
        assert_eq!(storage.read().unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_memory_storage_clones_share_blob() {
        let storage = MemoryStorage::new();
        let other = storage.clone();
        storage.write("x").unwrap();
        assert_eq!(other.read().unwrap().as_deref(), Some("x"));
        other.remove().unwrap();
        assert!(storage.contents().is_none());
    }
}
