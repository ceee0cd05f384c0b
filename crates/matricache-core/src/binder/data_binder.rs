use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::collection::{patch_matching, remove_matching};
use super::context::SyncContext;
use super::fetcher::Fetcher;
use super::flight::FlightOutcome;
use super::state::{Failure, Snapshot};
use crate::error::FetchError;

/// Field used to identify items when none is given.
pub const DEFAULT_ID_FIELD: &str = "id";

/// Shortest period accepted by [`DataBinder::spawn_polling`].
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Binds one resource key to one fetcher.
///
/// On creation the binder seeds itself from the cache, so cached content is
/// available before any fetch resolves. It then revalidates in the background
/// (when `auto_fetch` is set) and mirrors every committed value, fetched or
/// optimistically mutated, back into the `CacheStore`.
///
/// Data and cache always change together: fetched results and optimistic
/// edits are both written to the `CacheStore` under the binder's commit lock.
///
/// Dropping the binder (or calling [`teardown`](Self::teardown)) cancels it:
/// fetches that resolve afterwards are neither committed to its state nor
/// written to the cache.
pub struct DataBinder {
    inner: Arc<BinderInner>,
}

struct BinderInner {
    key: String,
    ctx: SyncContext,
    fetcher: Arc<dyn Fetcher>,
    state: watch::Sender<Snapshot>,
    /// Sequence number of the newest flight committed. The lock also
    /// serializes commits with optimistic mutations.
    applied_seq: Mutex<u64>,
    cancel: CancellationToken,
}

impl BinderInner {
    async fn revalidate(&self, silent: bool) {
        if self.cancel.is_cancelled() {
            debug!(key = %self.key, "Binder torn down, skipping fetch");
            return;
        }

        if !silent {
            self.state.send_if_modified(|snap| {
                let start = snap.data.is_none() && !snap.loading;
                if start {
                    snap.loading = true;
                }
                start
            });
        }

        let flight = self.ctx.flights().join_or_start(&self.key, &self.fetcher);

        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => {
                debug!(key = %self.key, seq = flight.seq(), "Binder torn down, dropping fetch result");
                return;
            }
            outcome = flight.outcome() => outcome,
        };

        self.commit(flight.seq(), outcome);
    }

    fn commit(&self, seq: u64, outcome: FlightOutcome) {
        let mut applied = self.applied_seq.lock();
        if self.cancel.is_cancelled() {
            return;
        }
        if seq <= *applied {
            debug!(
                key = %self.key,
                seq,
                applied = *applied,
                "Ignoring result older than current state"
            );
            return;
        }
        *applied = seq;

        match outcome {
            Ok(data) => {
                let data = Arc::new(data);
                self.ctx.store().set(&self.key, Value::clone(&data));
                self.state.send_modify(|snap| {
                    snap.data = Some(data);
                    snap.loading = false;
                    snap.error = None;
                    snap.last_failure = None;
                });
                debug!(key = %self.key, seq, "Fetched data committed");
            }
            Err(error) => {
                let at = self.ctx.store().now_millis();
                self.state.send_modify(|snap| {
                    if snap.data.is_none() {
                        snap.error = Some(error.clone());
                    } else {
                        debug!(key = %self.key, "Revalidation failed, keeping stale data");
                    }
                    snap.loading = false;
                    snap.last_failure = Some(Failure { error, at });
                });
            }
        }
    }

    /// Apply `edit` to the current data. `None` from `edit` means "no change"
    /// and skips the cache write. Returns whether anything was written.
    fn apply<F>(&self, edit: F) -> bool
    where
        F: FnOnce(Option<&Value>) -> Option<Value>,
    {
        let _commit = self.applied_seq.lock();
        let mut written = None;

        self.state.send_if_modified(|snap| match edit(snap.data.as_deref()) {
            Some(next) => {
                let next = Arc::new(next);
                written = Some(Arc::clone(&next));
                snap.data = Some(next);
                snap.loading = false;
                snap.error = None;
                true
            }
            None => false,
        });

        match written {
            Some(data) => {
                self.ctx.store().set(&self.key, Value::clone(&data));
                true
            }
            None => false,
        }
    }
}

impl DataBinder {
    pub fn new(
        ctx: SyncContext,
        key: impl Into<String>,
        fetcher: impl Fetcher,
        auto_fetch: bool,
    ) -> Self {
        let key = key.into();
        let cached = ctx.store().get(&key);
        debug!(key = %key, hit = cached.is_some(), auto_fetch, "Binding resource");

        let (state, _) = watch::channel(Snapshot::seeded(cached, auto_fetch));
        let binder = Self {
            inner: Arc::new(BinderInner {
                key,
                ctx,
                fetcher: Arc::new(fetcher),
                state,
                applied_seq: Mutex::new(0),
                cancel: CancellationToken::new(),
            }),
        };

        if auto_fetch {
            let inner = Arc::clone(&binder.inner);
            tokio::spawn(async move { inner.revalidate(false).await });
        }

        binder
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    // ===== Read state =====

    pub fn snapshot(&self) -> Snapshot {
        self.inner.state.borrow().clone()
    }

    pub fn data(&self) -> Option<Arc<Value>> {
        self.inner.state.borrow().data.clone()
    }

    pub fn data_as<T: DeserializeOwned>(&self) -> Option<T> {
        self.inner.state.borrow().data_as()
    }

    pub fn loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    pub fn error(&self) -> Option<FetchError> {
        self.inner.state.borrow().error.clone()
    }

    pub fn last_failure(&self) -> Option<Failure> {
        self.inner.state.borrow().last_failure.clone()
    }

    /// Receiver that observes every state change of this binder.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.state.subscribe()
    }

    /// Wait for the next state change.
    pub async fn changed(&self) -> Snapshot {
        let mut rx = self.inner.state.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = rx.changed().await;
        let snap = rx.borrow().clone();
        snap
    }

    // ===== Fetching =====

    /// Fetch, normalize and commit. A `silent` refresh never raises
    /// `loading`, for background polling.
    ///
    /// Joins the fetch already running for this key, if any.
    pub async fn refresh(&self, silent: bool) {
        self.inner.revalidate(silent).await;
    }

    /// Run `refresh(true)` every `every` until the binder is torn down.
    ///
    /// Periods shorter than [`MIN_POLL_INTERVAL`] (including zero) are
    /// raised to it.
    pub fn spawn_polling(&self, every: Duration) -> JoinHandle<()> {
        let every = every.max(MIN_POLL_INTERVAL);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = inner.cancel.cancelled() => break,
                    _ = ticker.tick() => inner.revalidate(true).await,
                }
            }
            debug!(key = %inner.key, "Polling stopped");
        })
    }

    // ===== Optimistic mutation =====

    /// Replace the data with `update_fn(previous)` and write it to the cache.
    ///
    /// `update_fn` runs under the binder's commit lock and must not call back
    /// into this binder.
    pub fn mutate<F>(&self, update_fn: F)
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        self.inner.apply(|previous| Some(update_fn(previous)));
    }

    /// Remove every item whose `"id"` equals `id`.
    pub fn remove(&self, id: impl Into<Value>) -> bool {
        self.remove_by(DEFAULT_ID_FIELD, id)
    }

    /// Remove every item whose `id_field` equals `id`. Returns `false` (and
    /// writes nothing) when no item matched.
    pub fn remove_by(&self, id_field: &str, id: impl Into<Value>) -> bool {
        let id = id.into();
        self.inner
            .apply(|previous| previous.and_then(|data| remove_matching(data, id_field, &id)))
    }

    /// Shallow-merge `patch` into every item whose `"id"` equals `id`.
    ///
    /// The whole list is rebuilt: non-matching items keep their contents but
    /// are copies, not shared with the previous value.
    pub fn update(&self, id: impl Into<Value>, patch: Value) -> bool {
        self.update_by(DEFAULT_ID_FIELD, id, patch)
    }

    pub fn update_by(&self, id_field: &str, id: impl Into<Value>, patch: Value) -> bool {
        let id = id.into();
        self.inner.apply(|previous| {
            previous.and_then(|data| patch_matching(data, id_field, &id, &patch))
        })
    }

    // ===== Lifecycle =====

    /// Stop this binder: no further commits, polling ends, refresh is a no-op.
    pub fn teardown(&self) {
        if !self.inner.cancel.is_cancelled() {
            debug!(key = %self.inner.key, "Tearing down binder");
            self.inner.cancel.cancel();
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }
}

impl Drop for DataBinder {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}
