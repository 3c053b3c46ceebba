//! Single-Flight Module
//!
//! Coalesces concurrent fetches of the same key into one underlying
//! operation whose outcome is shared with every caller.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::error::Result;

type Flight = Arc<OnceCell<Result<Bytes>>>;

// == Single Flight ==
/// Map of in-progress operations keyed by flight key.
///
/// If the caller running an operation is cancelled, the cell stays empty and
/// one of the waiting callers runs its own operation instead.
#[derive(Debug, Default)]
pub struct SingleFlight {
    flights: Mutex<HashMap<String, Flight>>,
}

/// Removes the map entry when the caller that ran the operation leaves,
/// whether it finished or was dropped.
struct FlightGuard<'a> {
    flights: &'a Mutex<HashMap<String, Flight>>,
    key: &'a str,
    flight: Flight,
    ran: AtomicBool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !*self.ran.get_mut() {
            return;
        }

        let mut flights = self.flights.lock();
        let finished = self.flight.initialized();
        // Map and guard hold one reference each; more means waiters
        let waiting = Arc::strong_count(&self.flight) > 2;
        if (finished || !waiting)
            && flights
                .get(self.key)
                .is_some_and(|f| Arc::ptr_eq(f, &self.flight))
        {
            flights.remove(self.key);
        }
    }
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `op` unless an operation for `key` is already in flight, in which
    /// case its outcome is awaited and returned instead.
    pub async fn run<F, Fut>(&self, key: &str, op: F) -> Result<Bytes>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes>>,
    {
        let flight = self
            .flights
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone();
        let guard = FlightGuard {
            flights: &self.flights,
            key,
            flight,
            ran: AtomicBool::new(false),
        };

        let outcome = guard
            .flight
            .get_or_init(|| {
                guard.ran.store(true, Ordering::Relaxed);
                op()
            })
            .await
            .clone();
        outcome
    }

    /// Number of keys currently in flight.
    #[cfg(test)]
    pub fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }
}
