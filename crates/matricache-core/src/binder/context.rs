use std::sync::Arc;

use super::data_binder::DataBinder;
use super::fetcher::Fetcher;
use super::flight::InFlight;
use crate::cache::CacheStore;

/// Everything binders share: the cache and the in-flight fetch registry.
///
/// Construct one per process and hand clones to whoever needs to bind data.
/// Cloning is cheap.
#[derive(Clone)]
pub struct SyncContext {
    store: Arc<CacheStore>,
    flights: Arc<InFlight>,
}

impl SyncContext {
    pub fn new(store: CacheStore) -> Self {
        Self::from_shared(Arc::new(store))
    }

    pub fn from_shared(store: Arc<CacheStore>) -> Self {
        Self {
            store,
            flights: Arc::new(InFlight::new()),
        }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn flights(&self) -> &Arc<InFlight> {
        &self.flights
    }

    /// Create a binder for `key`. With `auto_fetch` a background revalidation
    /// starts immediately, so this must then be called inside a tokio runtime.
    pub fn bind(&self, key: impl Into<String>, fetcher: impl Fetcher, auto_fetch: bool) -> DataBinder {
        DataBinder::new(self.clone(), key, fetcher, auto_fetch)
    }
}
