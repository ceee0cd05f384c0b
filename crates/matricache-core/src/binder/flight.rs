//! Per-key registry of in-flight fetches.
//!
//! At most one fetch per resource key runs at a time. A binder that asks for
//! a key already being fetched joins the running flight and receives the same
//! outcome instead of issuing a duplicate request. Flights only fetch and
//! normalize; each binder writes the result to the `CacheStore` when it
//! commits, under the same lock as its optimistic edits.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::fetcher::Fetcher;
use super::normalize::normalize;
use crate::error::FetchError;

pub type FlightOutcome = Result<Value, FetchError>;

/// Handle to one running (or finished) fetch.
#[derive(Clone)]
pub struct Flight {
    seq: u64,
    outcome: Shared<BoxFuture<'static, FlightOutcome>>,
}

impl Flight {
    /// Monotonic across the whole registry; a later flight always has a
    /// larger number.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub async fn outcome(&self) -> FlightOutcome {
        self.outcome.clone().await
    }
}

#[derive(Default)]
struct Registry {
    flights: HashMap<String, Flight>,
    next_seq: u64,
}

#[derive(Default)]
pub struct InFlight {
    registry: Mutex<Registry>,
}

/// Unregisters a flight when its task ends, including on panic.
struct FlightGuard {
    flights: Arc<InFlight>,
    key: String,
    seq: u64,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        let mut registry = self.flights.registry.lock();
        if registry
            .flights
            .get(&self.key)
            .is_some_and(|flight| flight.seq == self.seq)
        {
            registry.flights.remove(&self.key);
        }
    }
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.registry.lock().flights.contains_key(key)
    }

    /// Join the running fetch for `key`, or start one with `fetcher`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn join_or_start(self: &Arc<Self>, key: &str, fetcher: &Arc<dyn Fetcher>) -> Flight {
        let (flight, tx) = {
            let mut registry = self.registry.lock();
            if let Some(flight) = registry.flights.get(key) {
                debug!(key = key, seq = flight.seq, "Joining in-flight fetch");
                return flight.clone();
            }

            registry.next_seq += 1;
            let (tx, rx) = oneshot::channel::<FlightOutcome>();
            let outcome = rx
                .map(|received| {
                    received.unwrap_or_else(|_| {
                        Err(FetchError::Aborted("fetch task ended without a result".to_string()))
                    })
                })
                .boxed()
                .shared();
            let flight = Flight {
                seq: registry.next_seq,
                outcome,
            };
            registry.flights.insert(key.to_string(), flight.clone());
            (flight, tx)
        };

        debug!(key = key, seq = flight.seq, "Starting fetch");
        let guard = FlightGuard {
            flights: Arc::clone(self),
            key: key.to_string(),
            seq: flight.seq,
        };
        let fetch = fetcher.fetch();

        tokio::spawn(async move {
            let outcome = match fetch.await {
                Ok(response) => normalize(response).ok_or(FetchError::Malformed),
                Err(e) => Err(FetchError::from_error(&e)),
            };

            if let Err(ref e) = outcome {
                warn!(key = %guard.key, error = %e, "Fetch failed");
            }

            // Unregister before publishing so that anyone woken by the result
            // and refreshing again starts a new flight.
            drop(guard);
            let _ = tx.send(outcome);
        });

        flight
    }
}
