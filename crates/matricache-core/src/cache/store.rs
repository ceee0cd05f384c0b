use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::entry::{CacheEntry, CacheMap};
use super::storage::DurableStorage;
use crate::clock::{Clock, SystemClock};
use crate::error::StorageError;

/// Entries older than 5 minutes are considered stale by default.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_millis(300_000);

/// Process-wide, last-writer-wins cache of JSON values keyed by resource name.
///
/// The full map is loaded once at construction and rewritten to durable
/// storage on every change. Persistence failures are logged and never
/// reach the caller; memory stays authoritative for the session.
pub struct CacheStore {
    entries: RwLock<CacheMap>,
    storage: Box<dyn DurableStorage>,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    /// Build a store from whatever `storage` holds. A missing, unreadable or
    /// corrupt blob yields an empty cache.
    pub fn init(storage: impl DurableStorage + 'static, clock: Arc<dyn Clock>) -> Self {
        let entries = Self::load(&storage);
        Self {
            entries: RwLock::new(entries),
            storage: Box::new(storage),
            clock,
        }
    }

    pub fn with_system_clock(storage: impl DurableStorage + 'static) -> Self {
        Self::init(storage, Arc::new(SystemClock))
    }

    fn load(storage: &dyn DurableStorage) -> CacheMap {
        let blob = match storage.read() {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                debug!(backend = storage.backend_type(), "No persisted cache, starting empty");
                return CacheMap::new();
            }
            Err(e) => {
                warn!(backend = storage.backend_type(), error = %e, "Failed to read persisted cache, starting empty");
                return CacheMap::new();
            }
        };

        match serde_json::from_str::<CacheMap>(&blob) {
            Ok(entries) => {
                debug!(backend = storage.backend_type(), entries = entries.len(), "Persisted cache loaded");
                entries
            }
            Err(e) => {
                warn!(backend = storage.backend_type(), error = %e, "Persisted cache is corrupt, starting empty");
                CacheMap::new()
            }
        }
    }

    fn persist(&self, entries: &CacheMap) {
        let result = serde_json::to_string(entries)
            .map_err(StorageError::from)
            .and_then(|blob| self.storage.write(&blob));

        if let Err(e) = result {
            warn!(backend = self.storage.backend_type(), error = %e, "Failed to persist cache, keeping in-memory copy");
        }
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    // ===== Reads =====

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).map(|entry| entry.data.clone())
    }

    /// Typed read. A cached value that does not deserialize into `T` is
    /// logged and treated as absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let data = self.get(key)?;
        match serde_json::from_value(data) {
            Ok(typed) => Some(typed),
            Err(e) => {
                debug!(key = key, error = %e, "Cached value has unexpected shape");
                None
            }
        }
    }

    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.entries.read().get(key).cloned()
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// `true` iff the entry exists and is strictly younger than `max_age`.
    pub fn is_valid(&self, key: &str, max_age: Duration) -> bool {
        let entries = self.entries.read();
        let Some(entry) = entries.get(key) else {
            return false;
        };
        let age = i128::from(entry.age_millis(self.clock.now_millis()));
        age < max_age.as_millis() as i128
    }

    /// [`is_valid`](Self::is_valid) with [`DEFAULT_MAX_AGE`].
    pub fn is_fresh(&self, key: &str) -> bool {
        self.is_valid(key, DEFAULT_MAX_AGE)
    }

    /// How long ago `key` was written. Zero if the clock is behind the entry.
    pub fn age(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now_millis();
        self.entries
            .read()
            .get(key)
            .map(|entry| Duration::from_millis(entry.age_millis(now).max(0) as u64))
    }

    pub fn age_display(&self, key: &str) -> Option<String> {
        let now = self.clock.now_millis();
        self.entries.read().get(key).map(|entry| entry.age_display(now))
    }

    // ===== Writes =====

    /// Create or overwrite `key`, then persist the full map.
    ///
    /// Persisting is synchronous storage I/O done while holding the write
    /// lock, so its cost grows with the size of the whole cache.
    pub fn set(&self, key: &str, data: Value) {
        let mut entries = self.entries.write();
        let now = self.clock.now_millis();
        // Never move a key's timestamp backwards, even if the wall clock does
        let timestamp = entries
            .get(key)
            .map_or(now, |previous| now.max(previous.timestamp));

        entries.insert(key.to_string(), CacheEntry::new(data, timestamp));
        debug!(key = key, timestamp, "Cache entry written");
        self.persist(&entries);
    }

    /// Remove one entry and persist.
    pub fn clear(&self, key: &str) {
        let mut entries = self.entries.write();
        if entries.remove(key).is_some() {
            debug!(key = key, "Cache entry cleared");
        }
        self.persist(&entries);
    }

    /// Empty the map and delete the durable blob.
    pub fn clear_all(&self) {
        let mut entries = self.entries.write();
        entries.clear();
        if let Err(e) = self.storage.remove() {
            warn!(backend = self.storage.backend_type(), error = %e, "Failed to delete persisted cache");
        }
        debug!("Cache cleared");
    }
}
