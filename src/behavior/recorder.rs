//! Behavior Recorder
//!
//! Bounded ring buffer of navigation events, persisted on a debounce for
//! cross-session pattern mining.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{CacheError, Result};
use crate::storage::{PersistentStore, NS_BEHAVIOR};

/// Default ring buffer capacity.
pub const DEFAULT_CAPACITY: usize = 2000;

const HISTORY_KEY: &str = "history";

// == Behavior Event ==
/// One observed navigation to a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorEvent {
    pub resource_key: String,
    /// Unix milliseconds
    pub timestamp: u64,
    pub session_id: String,
    /// Time until the next event of the same session, once known
    pub dwell_millis: Option<u64>,
}

// == History ==
/// Immutable view of recorded events. Iterating is lazy, yields newest
/// first, stops after `limit` events and can be restarted any number of
/// times.
#[derive(Debug, Clone)]
pub struct History {
    /// Oldest first
    events: Arc<[BehaviorEvent]>,
    limit: usize,
}

impl History {
    /// Iterates newest first.
    pub fn iter(&self) -> impl Iterator<Item = &BehaviorEvent> + '_ {
        self.events.iter().rev().take(self.limit)
    }

    /// Iterates oldest first over the same window.
    pub fn chronological(&self) -> impl Iterator<Item = &BehaviorEvent> + '_ {
        let skip = self.events.len().saturating_sub(self.limit);
        self.events.iter().skip(skip)
    }

    pub fn len(&self) -> usize {
        self.events.len().min(self.limit)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a BehaviorEvent;
    type IntoIter = std::iter::Take<std::iter::Rev<std::slice::Iter<'a, BehaviorEvent>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter().rev().take(self.limit)
    }
}

// == Behavior Recorder ==
/// Appends navigation events and backfills dwell times.
pub struct BehaviorRecorder {
    events: RwLock<VecDeque<BehaviorEvent>>,
    capacity: usize,
    clock: Arc<dyn Clock>,
    store: PersistentStore,
    dirty: AtomicBool,
}

impl std::fmt::Debug for BehaviorRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorRecorder")
            .field("capacity", &self.capacity)
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

impl BehaviorRecorder {
    // == Constructor ==
    /// Creates an empty recorder holding at most `capacity` events.
    pub fn new(capacity: usize, clock: Arc<dyn Clock>, store: PersistentStore) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
            clock,
            store,
            dirty: AtomicBool::new(false),
        }
    }

    // == Record ==
    /// Appends an event stamped with the current time and sets the dwell time
    /// of the same session's previous event.
    pub async fn record(&self, resource_key: &str, session_id: &str) -> Result<()> {
        if resource_key.is_empty() || session_id.is_empty() {
            return Err(CacheError::InvalidRequest(
                "resource key and session id must not be empty".to_string(),
            ));
        }

        let now = self.clock.now_ms();
        let mut events = self.events.write().await;

        if let Some(previous) = events
            .iter_mut()
            .rev()
            .find(|e| e.session_id == session_id)
        {
            if previous.dwell_millis.is_none() {
                previous.dwell_millis = Some(now.saturating_sub(previous.timestamp));
            }
        }

        events.push_back(BehaviorEvent {
            resource_key: resource_key.to_string(),
            timestamp: now,
            session_id: session_id.to_string(),
            dwell_millis: None,
        });
        while events.len() > self.capacity {
            events.pop_front();
        }

        self.dirty.store(true, Ordering::Release);
        Ok(())
    }

    // == History ==
    /// Returns at most `limit` events, newest first.
    pub async fn history(&self, limit: usize) -> History {
        let events = self.events.read().await;
        History {
            events: events.iter().cloned().collect(),
            limit,
        }
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True if events arrived since the last flush.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    // == Persistence ==
    /// Writes the buffer to the persistent store if it changed since the
    /// last flush. Returns true if a write happened.
    pub async fn flush(&self) -> bool {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return false;
        }

        let snapshot: Vec<BehaviorEvent> = self.events.read().await.iter().cloned().collect();
        let written = self
            .store
            .save_record(NS_BEHAVIOR, HISTORY_KEY, &snapshot, true)
            .await;
        debug!("Flushed {} behavior events (written: {})", snapshot.len(), written);
        written
    }

    /// Loads persisted history, keeping the newest `capacity` events.
    pub async fn restore(&self) -> usize {
        let Some(persisted) = self
            .store
            .load_record::<Vec<BehaviorEvent>>(NS_BEHAVIOR, HISTORY_KEY, true)
            .await
        else {
            return 0;
        };

        let mut events = self.events.write().await;
        let skip = persisted.len().saturating_sub(self.capacity);
        *events = persisted.into_iter().skip(skip).collect();
        info!("Restored {} behavior events", events.len());
        events.len()
    }
}
