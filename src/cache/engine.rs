//! Cache Engine Module
//!
//! Strategy dispatch, per-bucket LRU eviction and the persistent mirror,
//! behind a cheaply cloneable handle.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cache::stats::UNMATCHED_BUCKET;
use crate::cache::{
    Bucket, CacheEntry, CacheStats, CacheStrategy, SingleFlight, StatsAggregator, StrategyMode,
    StrategyTable,
};
use crate::clock::Clock;
use crate::error::{CacheError, Result};
use crate::fetch::Fetcher;
use crate::storage::{PersistentStore, NS_STATS};

const STATS_SNAPSHOT_KEY: &str = "snapshot";

// == Resolution Types ==
/// Where a resolved payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cache,
    Network,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Cache => "cache",
            Source::Network => "network",
        }
    }
}

/// Outcome of a successful [`CacheEngine::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub payload: Bytes,
    pub source: Source,
}

impl Resolved {
    fn cache(payload: Bytes) -> Self {
        Self {
            payload,
            source: Source::Cache,
        }
    }

    fn network(payload: Bytes) -> Self {
        Self {
            payload,
            source: Source::Network,
        }
    }
}

/// Outcome of a background warm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmOutcome {
    /// Fetched and stored
    Warmed,
    /// A live entry already existed
    AlreadyCached,
    /// The key's strategy never writes the cache, or no strategy matches
    Skipped,
    /// Abandoned before anything was stored
    Cancelled,
}

// == Options ==
/// What `resolve` does when no strategy matches a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnmatchedPolicy {
    /// Log and fetch from the network without caching
    #[default]
    NetworkOnly,
    /// Fail with `StrategyNotFound`
    Fail,
}

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Timeout for NetworkFirst fetches and background revalidation
    pub network_timeout: Duration,
    /// Behavior for keys no strategy matches
    pub unmatched: UnmatchedPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            network_timeout: Duration::from_secs(3),
            unmatched: UnmatchedPolicy::NetworkOnly,
        }
    }
}

// == Cache Engine ==
struct EngineInner {
    strategies: StrategyTable,
    buckets: HashMap<String, Bucket>,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    store: PersistentStore,
    stats: StatsAggregator,
    flights: SingleFlight,
    options: EngineOptions,
    foreground: watch::Sender<Option<String>>,
}

/// Handle to the cache engine. Clones share the same index.
#[derive(Clone)]
pub struct CacheEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for CacheEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEngine")
            .field("strategies", &self.inner.strategies.len())
            .field("store", &self.inner.store)
            .finish()
    }
}

impl CacheEngine {
    // == Constructor ==
    /// Creates an engine with one empty bucket per strategy.
    ///
    /// # Arguments
    /// * `strategies` - Ordered strategy table
    /// * `fetcher` - Network capability
    /// * `clock` - Time source for entry timestamps
    /// * `store` - Persistent mirror
    /// * `options` - Timeouts and unmatched-key policy
    pub fn new(
        strategies: StrategyTable,
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
        store: PersistentStore,
        options: EngineOptions,
    ) -> Self {
        let buckets = strategies
            .iter()
            .map(|s| (s.name.clone(), Bucket::new(s.clone())))
            .collect();
        let stats = StatsAggregator::new(strategies.iter().map(|s| s.name.as_str()));
        let (foreground, _) = watch::channel(None);

        Self {
            inner: Arc::new(EngineInner {
                strategies,
                buckets,
                fetcher,
                clock,
                store,
                stats,
                flights: SingleFlight::new(),
                options,
                foreground,
            }),
        }
    }

    fn now(&self) -> u64 {
        self.inner.clock.now_ms()
    }

    fn bucket(&self, name: &str) -> Result<&Bucket> {
        self.inner
            .buckets
            .get(name)
            .ok_or_else(|| CacheError::StrategyNotFound(name.to_string()))
    }

    // == Resolve ==
    /// Resolves a resource through its strategy.
    ///
    /// # Arguments
    /// * `key` - Non-empty resource identifier
    /// * `strategy_override` - Name of a strategy to use instead of the
    ///   matched one
    ///
    /// Counts exactly one hit (served from cache) or miss (anything else).
    pub async fn resolve(&self, key: &str, strategy_override: Option<&str>) -> Result<Resolved> {
        validate_key(key)?;
        self.inner.foreground.send_replace(Some(key.to_string()));

        let strategy = match strategy_override {
            Some(name) => match self.inner.strategies.get(name) {
                Some(strategy) => strategy,
                None => {
                    self.inner.stats.record_miss(UNMATCHED_BUCKET);
                    return Err(CacheError::StrategyNotFound(name.to_string()));
                }
            },
            None => match self.inner.strategies.match_key(key) {
                Some(strategy) => strategy,
                None => return self.resolve_unmatched(key).await,
            },
        };

        let outcome = self.dispatch(strategy, key).await;
        match &outcome {
            Ok(resolved) if resolved.source == Source::Cache => {
                debug!("Cache HIT [{}]: {}", strategy.name, key);
                self.inner.stats.record_hit(&strategy.name);
            }
            _ => {
                debug!("Cache MISS [{}]: {}", strategy.name, key);
                self.inner.stats.record_miss(&strategy.name);
            }
        }
        outcome
    }

    async fn resolve_unmatched(&self, key: &str) -> Result<Resolved> {
        self.inner.stats.record_miss(UNMATCHED_BUCKET);
        match self.inner.options.unmatched {
            UnmatchedPolicy::Fail => Err(CacheError::StrategyNotFound(key.to_string())),
            UnmatchedPolicy::NetworkOnly => {
                warn!("No strategy matches {}, fetching network-only", key);
                self.fetch(key, None).await.map(Resolved::network)
            }
        }
    }

    async fn dispatch(&self, strategy: &CacheStrategy, key: &str) -> Result<Resolved> {
        let bucket = self.bucket(&strategy.name)?;
        let timeout = self.inner.options.network_timeout;

        match strategy.mode {
            StrategyMode::CacheFirst => {
                if let Some(payload) = bucket.read_live(key, self.now()) {
                    return Ok(Resolved::cache(payload));
                }
                match self.fetch_and_store(bucket, key, None, true, None).await {
                    Ok(payload) => Ok(Resolved::network(payload)),
                    Err(e) if e.is_network() => match bucket.read_any(key, self.now()) {
                        Some((payload, _)) => {
                            warn!("Serving expired {} after fetch failure: {}", key, e);
                            Ok(Resolved::cache(payload))
                        }
                        None => Err(e),
                    },
                    Err(e) => Err(e),
                }
            }
            StrategyMode::NetworkFirst => self.network_first(bucket, key, timeout).await,
            StrategyMode::StaleWhileRevalidate => match bucket.read_any(key, self.now()) {
                Some((payload, _)) => {
                    self.spawn_revalidation(bucket.name(), key);
                    Ok(Resolved::cache(payload))
                }
                None => self.network_first(bucket, key, timeout).await,
            },
            StrategyMode::NetworkOnly => self.fetch(key, None).await.map(Resolved::network),
            StrategyMode::CacheOnly => bucket
                .read_any(key, self.now())
                .map(|(payload, _)| Resolved::cache(payload))
                .ok_or_else(|| CacheError::ResourceUnavailable(key.to_string())),
        }
    }

    async fn network_first(&self, bucket: &Bucket, key: &str, timeout: Duration) -> Result<Resolved> {
        match self.fetch_and_store(bucket, key, Some(timeout), false, None)
            .await {
            Ok(payload) => Ok(Resolved::network(payload)),
            Err(e) if e.is_network() => {
                debug!("Network failed for {} ({}), falling back to cache", key, e);
                bucket
                    .read_any(key, self.now())
                    .map(|(payload, _)| Resolved::cache(payload))
                    .ok_or_else(|| CacheError::ResourceUnavailable(key.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    fn spawn_revalidation(&self, bucket_name: &str, key: &str) {
        let engine = self.clone();
        let bucket_name = bucket_name.to_string();
        let key = key.to_string();
        let timeout = self.inner.options.network_timeout;

        tokio::spawn(async move {
            let Ok(bucket) = engine.bucket(&bucket_name) else {
                return;
            };
            match engine
                .fetch_and_store(bucket, &key, Some(timeout), false, None)
                .await
            {
                Ok(_) => debug!("Revalidated {}", key),
                Err(e) => debug!("Revalidation of {} failed: {}", key, e),
            }
        });
    }

    // == Network ==
    async fn fetch(&self, key: &str, timeout: Option<Duration>) -> Result<Bytes> {
        let fetched = match timeout {
            Some(limit) => tokio::time::timeout(limit, self.inner.fetcher.fetch(key))
                .await
                .map_err(|_| CacheError::NetworkTimeout(format!("{} after {:?}", key, limit)))?,
            None => self.inner.fetcher.fetch(key).await,
        };
        fetched.map_err(|e| {
            if e.is_network() {
                e
            } else {
                CacheError::NetworkError(e.to_string())
            }
        })
    }

    /// Fetches `key` and stores it in `bucket`, coalescing concurrent calls
    /// for the same bucket and key. With `reuse_live`, a live entry stored
    /// while the caller was queued is returned instead of fetching again.
    /// `committed` is set once this caller's fetch succeeded and its store
    /// began.
    async fn fetch_and_store(
        &self,
        bucket: &Bucket,
        key: &str,
        timeout: Option<Duration>,
        reuse_live: bool,
        committed: Option<&AtomicBool>,
    ) -> Result<Bytes> {
        let flight_key = format!("{}\u{0}{}", bucket.name(), key);
        self.inner
            .flights
            .run(&flight_key, || async move {
                if reuse_live {
                    if let Some(payload) = bucket.read_live(key, self.now()) {
                        return Ok(payload);
                    }
                }
                match self.fetch(key, timeout).await {
                    Ok(payload) => {
                        if let Some(committed) = committed {
                            committed.store(true, Ordering::Release);
                        }
                        self.store_entry(bucket, key, payload.clone()).await;
                        Ok(payload)
                    }
                    Err(e) => Err(e),
                }
            })
            .await
    }

    // == Store ==
    /// Stores an entry on a separate task, so a caller dropped mid-store
    /// cannot leave the bucket, the mirror and the other buckets out of step.
    async fn store_entry(&self, bucket: &Bucket, key: &str, payload: Bytes) {
        let engine = self.clone();
        let bucket_name = bucket.name().to_string();
        let key = key.to_string();

        let task = tokio::spawn(async move {
            if let Ok(bucket) = engine.bucket(&bucket_name) {
                engine.commit_entry(bucket, &key, payload).await;
            }
        });
        if let Err(e) = task.await {
            warn!("Store task failed: {}", e);
        }
    }

    async fn commit_entry(&self, bucket: &Bucket, key: &str, payload: Bytes) {
        {
            let _writer = bucket.lock_writer().await;
            let entry = CacheEntry::new(
                key.to_string(),
                payload.clone(),
                bucket.name().to_string(),
                self.now(),
            );
            let record = entry.to_record();
            let evicted = bucket.insert(entry);

            self.inner.stats.record_store(bucket.name());
            if !evicted.is_empty() {
                debug!(
                    "Evicted {} entries from bucket {}",
                    evicted.len(),
                    bucket.name()
                );
                self.inner
                    .stats
                    .record_evictions(bucket.name(), evicted.len() as u64);
            }
            self.publish_size(bucket);

            self.inner.store.save_entry(&record, payload).await;
            for key in &evicted {
                self.inner.store.remove_entry(key).await;
            }
        }

        // A key lives in exactly one bucket
        for other in self.inner.buckets.values() {
            if other.name() == bucket.name() || other.peek(key).is_none() {
                continue;
            }
            let _writer = other.lock_writer().await;
            if other.remove(key).is_some() {
                self.publish_size(other);
            }
        }
    }

    fn publish_size(&self, bucket: &Bucket) {
        let (items, bytes) = bucket.size();
        self.inner.stats.set_bucket_size(bucket.name(), items, bytes);
    }

    // == Manual Operations ==
    /// Stores a payload in the named strategy's bucket, bypassing dispatch.
    pub async fn put(&self, key: &str, payload: Bytes, strategy_name: &str) -> Result<()> {
        validate_key(key)?;
        let bucket = self.bucket(strategy_name)?;
        if !bucket.strategy().mode.uses_cache() {
            return Err(CacheError::InvalidRequest(format!(
                "strategy {} never stores entries",
                strategy_name
            )));
        }
        self.store_entry(bucket, key, payload).await;
        Ok(())
    }

    /// Reads a payload from whichever bucket holds it, ignoring expiry and
    /// strategy dispatch. Never suspends and never touches stats.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let now = self.now();
        self.inner
            .buckets
            .values()
            .find_map(|bucket| bucket.read_any(key, now).map(|(payload, _)| payload))
    }

    /// Removes a key from the index and the mirror. Returns true if it was
    /// cached.
    pub async fn invalidate(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let mut removed = false;
        for bucket in self.inner.buckets.values() {
            let _writer = bucket.lock_writer().await;
            if bucket.remove(key).is_some() {
                removed = true;
                self.publish_size(bucket);
            }
        }
        if removed {
            self.inner.store.remove_entry(key).await;
            debug!("Invalidated {}", key);
        }
        Ok(removed)
    }

    /// Empties every bucket and the persistent mirror. Returns the number of
    /// entries dropped; returns only once both are cleared.
    pub async fn clear_all(&self) -> usize {
        // Fixed lock order: every other path holds at most one writer lock
        let mut names: Vec<&String> = self.inner.buckets.keys().collect();
        names.sort();

        let mut guards = Vec::with_capacity(names.len());
        for name in &names {
            guards.push(self.inner.buckets[*name].lock_writer().await);
        }

        let mut cleared = 0;
        for bucket in self.inner.buckets.values() {
            cleared += bucket.clear();
            self.publish_size(bucket);
        }
        self.inner.store.clear_entries().await;
        drop(guards);

        info!("Cleared {} cached entries", cleared);
        cleared
    }

    // == Prefetch Support ==
    /// Warms the cache for `key` as a CacheFirst resolve whose result is
    /// discarded. Not counted as a hit or miss.
    pub async fn warm(&self, key: &str, timeout: Duration) -> Result<WarmOutcome> {
        self.warm_until(key, timeout, std::future::pending()).await
    }

    /// [`warm`](Self::warm) that gives up once `cancel` completes, unless
    /// the fetch already succeeded. A cancelled warm stores nothing; a warm
    /// past its fetch always finishes its store.
    pub async fn warm_until<C>(&self, key: &str, timeout: Duration, cancel: C) -> Result<WarmOutcome>
    where
        C: Future<Output = ()>,
    {
        validate_key(key)?;
        let Some(strategy) = self.inner.strategies.match_key(key) else {
            return Ok(WarmOutcome::Skipped);
        };
        if matches!(
            strategy.mode,
            StrategyMode::NetworkOnly | StrategyMode::CacheOnly
        ) {
            return Ok(WarmOutcome::Skipped);
        }

        let bucket = self.bucket(&strategy.name)?;
        if bucket.contains_live(key, self.now()) {
            return Ok(WarmOutcome::AlreadyCached);
        }

        self.inner.stats.record_prefetch(bucket.name());
        let committed = AtomicBool::new(false);
        let flight = self.fetch_and_store(bucket, key, Some(timeout), true, Some(&committed));
        tokio::pin!(flight);
        tokio::pin!(cancel);

        tokio::select! {
            result = &mut flight => {
                result?;
                return Ok(WarmOutcome::Warmed);
            }
            _ = &mut cancel => {}
        }

        if committed.load(Ordering::Acquire) {
            flight.await?;
            return Ok(WarmOutcome::Warmed);
        }
        debug!("Warm of {} cancelled before its fetch completed", key);
        Ok(WarmOutcome::Cancelled)
    }

    /// Receives the key of every foreground `resolve` as it starts.
    pub fn foreground_events(&self) -> watch::Receiver<Option<String>> {
        self.inner.foreground.subscribe()
    }

    // == Stats ==
    /// Owned snapshot of every bucket's counters.
    pub fn snapshot(&self) -> CacheStats {
        let mut stats = self.inner.stats.snapshot();
        stats.degraded = self.inner.store.is_degraded();
        stats
    }

    /// Zeroes hit/miss/eviction counters.
    pub fn reset_stats(&self) {
        self.inner.stats.reset();
    }

    /// Persists the current stats snapshot.
    pub async fn persist_stats(&self) -> bool {
        let snapshot = self.inner.stats.snapshot();
        self.inner
            .store
            .save_record(NS_STATS, STATS_SNAPSHOT_KEY, &snapshot, false)
            .await
    }

    // == Restore ==
    /// Rebuilds the index and stats from the persistent mirror. Entries whose
    /// strategy no longer exists are dropped; bucket bounds are re-applied
    /// oldest-access first. Returns the number of entries restored.
    pub async fn restore(&self) -> usize {
        if let Some(snapshot) = self
            .inner
            .store
            .load_record::<CacheStats>(NS_STATS, STATS_SNAPSHOT_KEY, false)
            .await
        {
            self.inner.stats.restore(&snapshot);
        }

        let mut loaded = self.inner.store.load_entries().await;
        loaded.sort_by_key(|(record, _)| record.last_access);

        for (record, payload) in loaded {
            let Ok(bucket) = self.bucket(&record.strategy_name) else {
                debug!(
                    "Dropping {} from unknown strategy {}",
                    record.key, record.strategy_name
                );
                self.inner.store.remove_entry(&record.key).await;
                continue;
            };
            if !bucket.strategy().mode.uses_cache() {
                self.inner.store.remove_entry(&record.key).await;
                continue;
            }

            let _writer = bucket.lock_writer().await;
            let evicted = bucket.insert(CacheEntry::from_record(record, payload));
            for key in &evicted {
                self.inner.store.remove_entry(key).await;
            }
        }

        let mut restored = 0;
        for bucket in self.inner.buckets.values() {
            self.publish_size(bucket);
            restored += bucket.len();
        }
        info!("Restored {} cached entries from persistent store", restored);
        restored
    }

    // == Introspection ==
    pub fn strategies(&self) -> &StrategyTable {
        &self.inner.strategies
    }

    /// Item count of a bucket.
    pub fn bucket_len(&self, name: &str) -> Option<usize> {
        self.inner.buckets.get(name).map(Bucket::len)
    }

    /// Keys of a bucket, most recently used first.
    pub fn bucket_keys(&self, name: &str) -> Option<Vec<String>> {
        self.inner
            .buckets
            .get(name)
            .map(Bucket::keys_most_recent_first)
    }

    /// Copy of a cached entry with its metadata.
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.inner.buckets.values().find_map(|b| b.peek(key))
    }

    /// True once persistence has degraded to memory-only.
    pub fn is_degraded(&self) -> bool {
        self.inner.store.is_degraded()
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidRequest(
            "resource key must not be empty".to_string(),
        ));
    }
    Ok(())
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Matcher, Priority};
    use crate::clock::ManualClock;
    use crate::storage::MemoryBackend;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Fetcher for CountingFetcher {
        async fn fetch(&self, key: &str) -> Result<Bytes> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from(format!("{}#{}", key, n)))
        }
    }

    fn engine(mode: StrategyMode, max_items: usize) -> (CacheEngine, Arc<CountingFetcher>) {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
        });
        let table = StrategyTable::new()
            .with(CacheStrategy::new(
                "bucket",
                Matcher::Prefix("/".into()),
                mode,
                Duration::from_secs(60),
                max_items,
                Priority::Medium,
            ))
            .unwrap();
        let engine = CacheEngine::new(
            table,
            fetcher.clone(),
            Arc::new(ManualClock::new(1_000)),
            PersistentStore::new(Arc::new(MemoryBackend::new())),
            EngineOptions::default(),
        );
        (engine, fetcher)
    }

    #[tokio::test]
    async fn test_cache_first_miss_then_hit() {
        let (engine, fetcher) = engine(StrategyMode::CacheFirst, 10);

        let first = engine.resolve("/a", None).await.unwrap();
        let second = engine.resolve("/a", None).await.unwrap();

        assert_eq!(first.source, Source::Network);
        assert_eq!(second.source, Source::Cache);
        assert_eq!(first.payload, second.payload);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        let stats = engine.snapshot();
        let bucket = stats.strategy("bucket").unwrap();
        assert_eq!((bucket.hits, bucket.misses, bucket.item_count), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let (engine, _) = engine(StrategyMode::CacheFirst, 10);
        assert!(matches!(
            engine.resolve("", None).await,
            Err(CacheError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_unmatched_key_falls_back_to_network_only() {
        let (engine, fetcher) = engine(StrategyMode::CacheFirst, 10);

        let resolved = engine.resolve("no-slash", None).await.unwrap();

        assert_eq!(resolved.source, Source::Network);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(engine.get("no-slash").is_none());
        assert_eq!(engine.snapshot().strategy(UNMATCHED_BUCKET).unwrap().misses, 1);
    }

    #[tokio::test]
    async fn test_unknown_override_is_strategy_not_found() {
        let (engine, _) = engine(StrategyMode::CacheFirst, 10);
        assert!(matches!(
            engine.resolve("/a", Some("missing")).await,
            Err(CacheError::StrategyNotFound(_))
        ));

        // Still counted once
        let stats = engine.snapshot();
        assert_eq!(stats.strategy(UNMATCHED_BUCKET).unwrap().misses, 1);
        assert_eq!(stats.strategy("bucket").unwrap().misses, 0);
    }

    #[tokio::test]
    async fn test_network_only_never_stores() {
        let (engine, fetcher) = engine(StrategyMode::NetworkOnly, 10);

        engine.resolve("/a", None).await.unwrap();
        engine.resolve("/a", None).await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(engine.bucket_len("bucket"), Some(0));
        assert!(engine.put("/a", Bytes::new(), "bucket").await.is_err());
    }

    #[tokio::test]
    async fn test_cache_only_miss_is_unavailable() {
        let (engine, fetcher) = engine(StrategyMode::CacheOnly, 10);

        assert!(matches!(
            engine.resolve("/a", None).await,
            Err(CacheError::ResourceUnavailable(_))
        ));

        engine.put("/a", Bytes::from_static(b"manual"), "bucket").await.unwrap();
        let resolved = engine.resolve("/a", None).await.unwrap();
        assert_eq!(resolved.payload, Bytes::from_static(b"manual"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_put_get_invalidate() {
        let (engine, _) = engine(StrategyMode::CacheFirst, 10);

        engine.put("/a", Bytes::from_static(b"x"), "bucket").await.unwrap();
        assert_eq!(engine.get("/a"), Some(Bytes::from_static(b"x")));

        assert!(engine.invalidate("/a").await.unwrap());
        assert!(!engine.invalidate("/a").await.unwrap());
        assert!(engine.get("/a").is_none());
    }

    #[tokio::test]
    async fn test_eviction_per_bucket() {
        let (engine, _) = engine(StrategyMode::CacheFirst, 2);

        for key in ["/a", "/b", "/c"] {
            engine.resolve(key, None).await.unwrap();
        }

        assert_eq!(engine.bucket_len("bucket"), Some(2));
        assert!(engine.get("/a").is_none());
        assert_eq!(engine.snapshot().strategy("bucket").unwrap().evictions, 1);
    }

    #[tokio::test]
    async fn test_clear_all_twice() {
        let (engine, _) = engine(StrategyMode::CacheFirst, 10);
        engine.resolve("/a", None).await.unwrap();

        assert_eq!(engine.clear_all().await, 1);
        assert_eq!(engine.clear_all().await, 0);
        assert_eq!(engine.snapshot().strategy("bucket").unwrap().item_count, 0);
    }

    #[tokio::test]
    async fn test_warm_does_not_count_hits_or_misses() {
        let (engine, fetcher) = engine(StrategyMode::CacheFirst, 10);

        let outcome = engine.warm("/a", Duration::from_secs(1)).await.unwrap();
        assert_eq!(outcome, WarmOutcome::Warmed);
        let again = engine.warm("/a", Duration::from_secs(1)).await.unwrap();
        assert_eq!(again, WarmOutcome::AlreadyCached);

        let bucket = *engine.snapshot().strategy("bucket").unwrap();
        assert_eq!((bucket.hits, bucket.misses, bucket.prefetches), (0, 0, 1));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_foreground_events() {
        let (engine, _) = engine(StrategyMode::CacheFirst, 10);
        let mut events = engine.foreground_events();

        engine.resolve("/a", None).await.unwrap();

        assert!(events.has_changed().unwrap());
        assert_eq!(events.borrow_and_update().as_deref(), Some("/a"));
    }
}
