use std::future::Future;

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

/// A zero-argument asynchronous data source for one resource.
///
/// The resolved JSON is normalized by the binder (see
/// [`normalize`](super::normalize::normalize)), so a fetcher may return a raw
/// collection or a `{ data }` / `{ data: { results } }` envelope.
///
/// Any `Fn() -> impl Future<Output = anyhow::Result<Value>>` closure is a
/// fetcher.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(&self) -> BoxFuture<'static, anyhow::Result<Value>>;
}

impl<F, Fut> Fetcher for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    fn fetch(&self) -> BoxFuture<'static, anyhow::Result<Value>> {
        (self)().boxed()
    }
}
