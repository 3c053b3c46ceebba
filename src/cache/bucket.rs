//! Bucket Module
//!
//! The eviction population of one strategy: entries plus their LRU order,
//! bounded by the strategy's `max_items`.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use crate::cache::{CacheEntry, CacheStrategy, LruTracker};

// == Bucket State ==
#[derive(Debug, Default)]
struct BucketState {
    entries: HashMap<String, CacheEntry>,
    lru: LruTracker,
    bytes: u64,
}

impl BucketState {
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.lru.remove(key);
        self.bytes = self.bytes.saturating_sub(entry.size_bytes);
        Some(entry)
    }
}

// == Bucket ==
/// Entries governed by one strategy.
///
/// `state` is only ever locked for short synchronous sections, so reads never
/// suspend. `writer` serializes store/evict/invalidate on this bucket,
/// including their persistent mirror writes, and is held across awaits.
#[derive(Debug)]
pub struct Bucket {
    strategy: CacheStrategy,
    state: Mutex<BucketState>,
    writer: AsyncMutex<()>,
}

impl Bucket {
    // == Constructor ==
    /// Creates an empty bucket for `strategy`.
    pub fn new(strategy: CacheStrategy) -> Self {
        Self {
            strategy,
            state: Mutex::new(BucketState::default()),
            writer: AsyncMutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.strategy.name
    }

    pub fn strategy(&self) -> &CacheStrategy {
        &self.strategy
    }

    /// Acquires the bucket's exclusive writer lock.
    pub async fn lock_writer(&self) -> AsyncMutexGuard<'_, ()> {
        self.writer.lock().await
    }

    // == Reads ==
    /// Returns the payload if present and not expired, marking it used.
    pub fn read_live(&self, key: &str, now_ms: u64) -> Option<Bytes> {
        let max_age = self.strategy.max_age_ms();
        let mut state = self.state.lock();
        let entry = state.entries.get_mut(key)?;
        if entry.is_expired(now_ms, max_age) {
            return None;
        }
        entry.touch(now_ms);
        let payload = entry.payload.clone();
        state.lru.touch(key);
        Some(payload)
    }

    /// Returns the payload regardless of expiry, marking it used. The flag
    /// tells whether the entry had expired.
    pub fn read_any(&self, key: &str, now_ms: u64) -> Option<(Bytes, bool)> {
        let max_age = self.strategy.max_age_ms();
        let mut state = self.state.lock();
        let entry = state.entries.get_mut(key)?;
        let expired = entry.is_expired(now_ms, max_age);
        entry.touch(now_ms);
        let payload = entry.payload.clone();
        state.lru.touch(key);
        Some((payload, expired))
    }

    /// Returns true if a live entry exists, without touching it.
    pub fn contains_live(&self, key: &str, now_ms: u64) -> bool {
        let max_age = self.strategy.max_age_ms();
        self.state
            .lock()
            .entries
            .get(key)
            .is_some_and(|e| !e.is_expired(now_ms, max_age))
    }

    /// Copy of an entry, without touching it.
    pub fn peek(&self, key: &str) -> Option<CacheEntry> {
        self.state.lock().entries.get(key).cloned()
    }

    // == Writes ==
    /// Inserts or replaces an entry, then evicts least recently used entries
    /// until the bucket is within `max_items`. Returns the evicted keys.
    ///
    /// Callers hold the writer lock.
    pub fn insert(&self, entry: CacheEntry) -> Vec<String> {
        let mut state = self.state.lock();
        let key = entry.key.clone();

        state.remove(&key);
        state.bytes += entry.size_bytes;
        state.entries.insert(key.clone(), entry);
        state.lru.touch(&key);

        let mut evicted = Vec::new();
        while state.entries.len() > self.strategy.max_items {
            let Some(oldest) = state.lru.evict_oldest() else {
                break;
            };
            if let Some(entry) = state.entries.remove(&oldest) {
                state.bytes = state.bytes.saturating_sub(entry.size_bytes);
            }
            evicted.push(oldest);
        }
        evicted
    }

    /// Removes an entry. Callers hold the writer lock.
    pub fn remove(&self, key: &str) -> Option<CacheEntry> {
        self.state.lock().remove(key)
    }

    /// Removes every entry, returning how many were held. Callers hold the
    /// writer lock.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let count = state.entries.len();
        state.entries.clear();
        state.lru.clear();
        state.bytes = 0;
        count
    }

    // == Introspection ==
    /// Item count and payload bytes.
    pub fn size(&self) -> (usize, u64) {
        let state = self.state.lock();
        (state.entries.len(), state.bytes)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys from most to least recently used.
    pub fn keys_most_recent_first(&self) -> Vec<String> {
        self.state.lock().lru.most_recent_first().cloned().collect()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Matcher, Priority, StrategyMode};
    use std::time::Duration;

    fn bucket(max_items: usize) -> Bucket {
        Bucket::new(CacheStrategy::new(
            "images",
            Matcher::Any,
            StrategyMode::CacheFirst,
            Duration::from_millis(1_000),
            max_items,
            Priority::Medium,
        ))
    }

    fn entry(key: &str, body: &'static [u8], now: u64) -> CacheEntry {
        CacheEntry::new(
            key.to_string(),
            Bytes::from_static(body),
            "images".to_string(),
            now,
        )
    }

    #[test]
    fn test_insert_and_read_live() {
        let bucket = bucket(3);
        bucket.insert(entry("a", b"aaa", 0));

        assert_eq!(bucket.read_live("a", 10), Some(Bytes::from_static(b"aaa")));
        assert_eq!(bucket.size(), (1, 3));
    }

    #[test]
    fn test_read_live_respects_max_age() {
        let bucket = bucket(3);
        bucket.insert(entry("a", b"aaa", 0));

        assert!(bucket.read_live("a", 1_000).is_none());
        assert_eq!(
            bucket.read_any("a", 1_000),
            Some((Bytes::from_static(b"aaa"), true))
        );
        assert!(!bucket.contains_live("a", 1_000));
    }

    #[test]
    fn test_eviction_keeps_most_recent() {
        let bucket = bucket(2);
        bucket.insert(entry("a", b"1", 0));
        bucket.insert(entry("b", b"2", 0));
        bucket.read_live("a", 1);

        let evicted = bucket.insert(entry("c", b"3", 2));

        assert_eq!(evicted, vec!["b".to_string()]);
        assert_eq!(bucket.keys_most_recent_first(), vec!["c", "a"]);
        assert_eq!(bucket.size(), (2, 2));
    }

    #[test]
    fn test_replace_does_not_double_count() {
        let bucket = bucket(2);
        bucket.insert(entry("a", b"1", 0));
        let evicted = bucket.insert(entry("a", b"22", 5));

        assert!(evicted.is_empty());
        assert_eq!(bucket.size(), (1, 2));
        assert_eq!(bucket.peek("a").unwrap().stored_at, 5);
    }

    #[test]
    fn test_remove_and_clear() {
        let bucket = bucket(5);
        bucket.insert(entry("a", b"1", 0));
        bucket.insert(entry("b", b"2", 0));

        assert!(bucket.remove("a").is_some());
        assert!(bucket.remove("a").is_none());
        assert_eq!(bucket.clear(), 1);
        assert_eq!(bucket.clear(), 0);
        assert!(bucket.is_empty());
    }
}
