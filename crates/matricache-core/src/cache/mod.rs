//! Persistent read cache.
//!
//! `CacheStore` keeps every fetched collection in memory and mirrors the
//! whole map to a single durable blob (`app_cache`) on every write. Entries
//! carry the time of their last write; staleness is advisory and checked on
//! read with `is_valid`, nothing is ever evicted automatically.

pub mod entry;
pub mod storage;
pub mod store;

pub use entry::{CacheEntry, CacheMap};
pub use storage::{DurableStorage, FileStorage, MemoryStorage, STORAGE_KEY};
pub use store::{CacheStore, DEFAULT_MAX_AGE};
