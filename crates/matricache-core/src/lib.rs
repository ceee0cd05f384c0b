//! Core library for matricache.
//!
//! Read cache and synchronization layer for the school records client:
//!
//! - [`cache`]: `CacheStore`, a process-wide JSON cache persisted as one blob
//! - [`binder`]: `DataBinder`, cache-first reads with background
//!   revalidation and optimistic mutation
//! - [`api`]: `ApiClient`, the REST client fetchers are built from
//! - [`resources`]: the backend's collections and their polling intervals
//! - [`config`]: on-disk configuration

pub mod api;
pub mod binder;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod resources;

pub use api::{ApiClient, ApiError};
pub use binder::{DataBinder, Fetcher, Snapshot, SyncContext};
pub use cache::{CacheEntry, CacheStore, DurableStorage, FileStorage, MemoryStorage};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{FetchError, StorageError};
pub use resources::Resource;
