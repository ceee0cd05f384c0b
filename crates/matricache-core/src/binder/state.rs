use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::FetchError;

/// The most recent fetch failure, kept even while stale data is shown.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub error: FetchError,
    /// Milliseconds since the Unix epoch.
    pub at: i64,
}

/// What a consumer renders from a binder.
///
/// `error` is only set when there is no data to fall back on. When stale data
/// is being shown after a failed revalidation, `error` stays empty and the
/// failure is reported through `last_failure` instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub data: Option<Arc<Value>>,
    pub loading: bool,
    pub error: Option<FetchError>,
    pub last_failure: Option<Failure>,
}

impl Snapshot {
    pub fn seeded(data: Option<Value>, will_fetch: bool) -> Self {
        Self {
            loading: data.is_none() && will_fetch,
            data: data.map(Arc::new),
            error: None,
            last_failure: None,
        }
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Showing data that the last revalidation failed to refresh.
    pub fn is_degraded(&self) -> bool {
        self.data.is_some() && self.last_failure.is_some()
    }

    /// Number of items when the data is a list.
    pub fn item_count(&self) -> Option<usize> {
        self.data.as_deref().and_then(Value::as_array).map(Vec::len)
    }

    pub fn data_as<T: DeserializeOwned>(&self) -> Option<T> {
        let data = self.data.as_deref()?;
        serde_json::from_value(data.clone()).ok()
    }
}
