use thiserror::Error;

/// Errors raised by a durable storage backend.
///
/// These never escape `CacheStore`: the store logs them and keeps serving
/// from memory.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },
}

/// Outcome of a failed fetch, as seen by data binders.
///
/// Cloneable because a single in-flight fetch is shared by every binder
/// waiting on the same key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Fetch failed: {0}")]
    Failed(String),

    #[error("Malformed payload - response normalized to null")]
    Malformed,

    #[error("Fetch task aborted: {0}")]
    Aborted(String),
}

impl FetchError {
    /// Flatten an `anyhow` error chain into a shareable message.
    pub fn from_error(error: &anyhow::Error) -> Self {
        FetchError::Failed(format!("{:#}", error))
    }
}
