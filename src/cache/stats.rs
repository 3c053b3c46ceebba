//! Cache Statistics Module
//!
//! Per-strategy hit/miss/size counters. Counters are atomics so readers
//! never block the engine; [`StatsAggregator::snapshot`] hands out an owned
//! copy, never a live view.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Bucket name under which requests with no matching strategy are counted.
pub const UNMATCHED_BUCKET: &str = "unmatched";

// == Strategy Stats ==
/// Counters of one strategy bucket at snapshot time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyStats {
    /// Resolves served from cache
    pub hits: u64,
    /// Resolves served from network or failed
    pub misses: u64,
    /// Entries evicted by the bucket's LRU bound
    pub evictions: u64,
    /// Entries written into the bucket
    pub stores: u64,
    /// Background warms issued for the bucket
    pub prefetches: u64,
    /// Payload bytes currently held
    pub bytes_stored: u64,
    /// Entries currently held
    pub item_count: u64,
}

impl StrategyStats {
    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    fn merge(&mut self, other: &StrategyStats) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.evictions += other.evictions;
        self.stores += other.stores;
        self.prefetches += other.prefetches;
        self.bytes_stored += other.bytes_stored;
        self.item_count += other.item_count;
    }
}

// == Cache Stats ==
/// Immutable snapshot of every bucket's counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Counters keyed by strategy name
    pub strategies: BTreeMap<String, StrategyStats>,
    /// True once persistence has degraded to memory-only
    #[serde(default)]
    pub degraded: bool,
}

impl CacheStats {
    /// Counters of one strategy, if known.
    pub fn strategy(&self, name: &str) -> Option<&StrategyStats> {
        self.strategies.get(name)
    }

    /// Sum over all buckets.
    pub fn totals(&self) -> StrategyStats {
        let mut totals = StrategyStats::default();
        for stats in self.strategies.values() {
            totals.merge(stats);
        }
        totals
    }

    /// Overall hit rate.
    pub fn hit_rate(&self) -> f64 {
        self.totals().hit_rate()
    }
}

// == Bucket Counters ==
#[derive(Debug, Default)]
struct BucketCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    stores: AtomicU64,
    prefetches: AtomicU64,
    bytes_stored: AtomicU64,
    item_count: AtomicU64,
}

impl BucketCounters {
    fn load(&self) -> StrategyStats {
        StrategyStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            prefetches: self.prefetches.load(Ordering::Relaxed),
            bytes_stored: self.bytes_stored.load(Ordering::Relaxed),
            item_count: self.item_count.load(Ordering::Relaxed),
        }
    }
}

// == Stats Aggregator ==
/// Lock-free counters for a fixed set of buckets.
#[derive(Debug)]
pub struct StatsAggregator {
    buckets: HashMap<String, BucketCounters>,
}

impl StatsAggregator {
    // == Constructor ==
    /// Creates counters for the given bucket names plus [`UNMATCHED_BUCKET`].
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut buckets: HashMap<String, BucketCounters> = names
            .into_iter()
            .map(|name| (name.to_string(), BucketCounters::default()))
            .collect();
        buckets
            .entry(UNMATCHED_BUCKET.to_string())
            .or_default();
        Self { buckets }
    }

    fn counters(&self, bucket: &str) -> Option<&BucketCounters> {
        self.buckets
            .get(bucket)
            .or_else(|| self.buckets.get(UNMATCHED_BUCKET))
    }

    // == Record Hit ==
    pub fn record_hit(&self, bucket: &str) {
        if let Some(c) = self.counters(bucket) {
            c.hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    // == Record Miss ==
    pub fn record_miss(&self, bucket: &str) {
        if let Some(c) = self.counters(bucket) {
            c.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    // == Record Eviction ==
    pub fn record_evictions(&self, bucket: &str, count: u64) {
        if let Some(c) = self.counters(bucket) {
            c.evictions.fetch_add(count, Ordering::Relaxed);
        }
    }

    // == Record Store ==
    pub fn record_store(&self, bucket: &str) {
        if let Some(c) = self.counters(bucket) {
            c.stores.fetch_add(1, Ordering::Relaxed);
        }
    }

    // == Record Prefetch ==
    pub fn record_prefetch(&self, bucket: &str) {
        if let Some(c) = self.counters(bucket) {
            c.prefetches.fetch_add(1, Ordering::Relaxed);
        }
    }

    // == Update Gauges ==
    /// Publishes a bucket's current size.
    pub fn set_bucket_size(&self, bucket: &str, item_count: usize, bytes_stored: u64) {
        if let Some(c) = self.counters(bucket) {
            c.item_count.store(item_count as u64, Ordering::Relaxed);
            c.bytes_stored.store(bytes_stored, Ordering::Relaxed);
        }
    }

    // == Snapshot ==
    /// Returns an owned copy of every bucket's counters.
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            strategies: self
                .buckets
                .iter()
                .map(|(name, counters)| (name.clone(), counters.load()))
                .collect(),
            degraded: false,
        }
    }

    // == Reset ==
    /// Zeroes the cumulative counters. Size gauges keep describing the
    /// current bucket contents.
    pub fn reset(&self) {
        for c in self.buckets.values() {
            c.hits.store(0, Ordering::Relaxed);
            c.misses.store(0, Ordering::Relaxed);
            c.evictions.store(0, Ordering::Relaxed);
            c.stores.store(0, Ordering::Relaxed);
            c.prefetches.store(0, Ordering::Relaxed);
        }
    }

    // == Restore ==
    /// Adds the cumulative counters of a persisted snapshot. Buckets that no
    /// longer exist are ignored.
    pub fn restore(&self, persisted: &CacheStats) {
        for (name, stats) in &persisted.strategies {
            let Some(c) = self.buckets.get(name) else {
                continue;
            };
            c.hits.fetch_add(stats.hits, Ordering::Relaxed);
            c.misses.fetch_add(stats.misses, Ordering::Relaxed);
            c.evictions.fetch_add(stats.evictions, Ordering::Relaxed);
            c.stores.fetch_add(stats.stores, Ordering::Relaxed);
            c.prefetches.fetch_add(stats.prefetches, Ordering::Relaxed);
        }
    }
}
