//! Data binders: cache-first reads with background revalidation.
//!
//! A `DataBinder` connects one resource key to one asynchronous fetcher:
//!
//! - seeds its state synchronously from the `CacheStore` (no empty flash on
//!   repeat visits)
//! - revalidates in the background and keeps showing stale data if that fails
//! - applies optimistic `mutate` / `remove` / `update` edits locally and
//!   mirrors them into the cache
//!
//! Binders share a `SyncContext`, which coalesces concurrent fetches of the
//! same key into a single request.

pub mod collection;
pub mod context;
pub mod data_binder;
pub mod fetcher;
pub mod flight;
pub mod normalize;
pub mod state;

pub use context::SyncContext;
pub use data_binder::{DataBinder, DEFAULT_ID_FIELD, MIN_POLL_INTERVAL};
pub use fetcher::Fetcher;
pub use flight::InFlight;
pub use normalize::normalize;
pub use state::{Failure, Snapshot};
