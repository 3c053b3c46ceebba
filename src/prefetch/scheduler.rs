//! Prefetch Scheduler
//!
//! Turns predictions into background cache warms. Confident predictions are
//! warmed at high priority, plausible ones at low priority; low-priority
//! warms yield to any foreground resolve of a different resource.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Notify};
use tracing::debug;

use crate::behavior::{Prediction, Predictor};
use crate::cache::{CacheEngine, WarmOutcome};

// == Priority ==
/// Scheduling priority of a warm. Affects ordering only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefetchPriority {
    Low,
    High,
}

// == Options ==
#[derive(Debug, Clone)]
pub struct PrefetchOptions {
    /// Predictions requested per navigation
    pub top_n: usize,
    /// Timeout of each warm's fetch
    pub timeout: Duration,
    /// Confidence strictly above which a warm is high priority
    pub high_threshold: f64,
    /// Confidence strictly above which a warm is issued at all
    pub low_threshold: f64,
}

impl Default for PrefetchOptions {
    fn default() -> Self {
        Self {
            top_n: 5,
            timeout: Duration::from_secs(3),
            high_threshold: 0.7,
            low_threshold: 0.4,
        }
    }
}

impl PrefetchOptions {
    /// Maps a confidence to a priority, or `None` if it is too low to warm.
    pub fn classify(&self, confidence: f64) -> Option<PrefetchPriority> {
        if confidence > self.high_threshold {
            Some(PrefetchPriority::High)
        } else if confidence > self.low_threshold {
            Some(PrefetchPriority::Low)
        } else {
            None
        }
    }
}

// == Jobs ==
/// A pending warm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchJob {
    pub key: String,
    pub priority: PrefetchPriority,
    seq: u64,
}

impl Ord for PrefetchJob {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Higher priority first, then FIFO
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for PrefetchJob {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

/// A warm queued by [`PrefetchScheduler::on_navigate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledPrefetch {
    pub resource_key: String,
    pub confidence: f64,
    pub priority: PrefetchPriority,
}

/// How a warm ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchStatus {
    Warmed,
    AlreadyCached,
    Skipped,
    Cancelled,
    Failed,
}

/// Counters of finished warms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefetchStats {
    pub warmed: u64,
    pub already_cached: u64,
    pub skipped: u64,
    pub cancelled: u64,
    pub failed: u64,
    pub pending: u64,
}

#[derive(Debug, Default)]
struct Counters {
    warmed: AtomicU64,
    already_cached: AtomicU64,
    skipped: AtomicU64,
    cancelled: AtomicU64,
    failed: AtomicU64,
}

// == Prefetch Scheduler ==
/// Priority queue of warms fed by predictions and drained by workers.
#[derive(Debug)]
pub struct PrefetchScheduler {
    engine: CacheEngine,
    predictor: Predictor,
    options: PrefetchOptions,
    queue: Mutex<BinaryHeap<PrefetchJob>>,
    notify: Notify,
    next_seq: AtomicU64,
    counters: Counters,
}

impl PrefetchScheduler {
    // == Constructor ==
    pub fn new(engine: CacheEngine, predictor: Predictor, options: PrefetchOptions) -> Self {
        Self {
            engine,
            predictor,
            options,
            queue: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            next_seq: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    pub fn options(&self) -> &PrefetchOptions {
        &self.options
    }

    // == On Navigate ==
    /// Queues warms for the resources predicted to follow `current_key`.
    /// Returns what was queued.
    pub async fn on_navigate(&self, current_key: &str) -> Vec<ScheduledPrefetch> {
        let predictions = self
            .predictor
            .predict_next(current_key, self.options.top_n)
            .await;
        self.schedule(current_key, predictions)
    }

    /// Queues warms for already computed predictions.
    pub fn schedule(&self, current_key: &str, predictions: Vec<Prediction>) -> Vec<ScheduledPrefetch> {
        let mut scheduled = Vec::new();
        {
            let mut queue = self.queue.lock();
            for prediction in predictions {
                let Some(priority) = self.options.classify(prediction.confidence) else {
                    continue;
                };
                if prediction.resource_key == current_key
                    || queue.iter().any(|job| job.key == prediction.resource_key)
                {
                    continue;
                }

                queue.push(PrefetchJob {
                    key: prediction.resource_key.clone(),
                    priority,
                    seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                });
                scheduled.push(ScheduledPrefetch {
                    resource_key: prediction.resource_key,
                    confidence: prediction.confidence,
                    priority,
                });
            }
        }

        for _ in &scheduled {
            self.notify.notify_one();
        }
        if !scheduled.is_empty() {
            debug!(
                "Scheduled {} prefetches after {}",
                scheduled.len(),
                current_key
            );
        }
        scheduled
    }

    // == Queue ==
    /// Pops the highest-priority pending job.
    pub fn try_next(&self) -> Option<PrefetchJob> {
        self.queue.lock().pop()
    }

    /// Waits for the next job.
    pub async fn next_job(&self) -> PrefetchJob {
        loop {
            if let Some(job) = self.try_next() {
                return job;
            }
            self.notify.notified().await;
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    // == Execute ==
    /// Runs one warm. Low-priority warms are abandoned when a foreground
    /// resolve starts for a different resource while their fetch is still
    /// pending; once the fetch succeeded the store always completes.
    pub async fn execute(&self, job: PrefetchJob) -> PrefetchStatus {
        let result = match job.priority {
            PrefetchPriority::High => self.engine.warm(&job.key, self.options.timeout).await,
            PrefetchPriority::Low => {
                let foreground = self.engine.foreground_events();
                self.engine
                    .warm_until(&job.key, self.options.timeout, preempted(foreground, &job.key))
                    .await
            }
        };

        let status = match result {
            Ok(WarmOutcome::Warmed) => PrefetchStatus::Warmed,
            Ok(WarmOutcome::AlreadyCached) => PrefetchStatus::AlreadyCached,
            Ok(WarmOutcome::Skipped) => PrefetchStatus::Skipped,
            Ok(WarmOutcome::Cancelled) => PrefetchStatus::Cancelled,
            Err(e) => {
                debug!("Prefetch of {} failed: {}", job.key, e);
                PrefetchStatus::Failed
            }
        };
        self.count(status);
        debug!("Prefetch {} ({:?}): {:?}", job.key, job.priority, status);
        status
    }

    fn count(&self, status: PrefetchStatus) {
        let counter = match status {
            PrefetchStatus::Warmed => &self.counters.warmed,
            PrefetchStatus::AlreadyCached => &self.counters.already_cached,
            PrefetchStatus::Skipped => &self.counters.skipped,
            PrefetchStatus::Cancelled => &self.counters.cancelled,
            PrefetchStatus::Failed => &self.counters.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of finished and pending warms.
    pub fn stats(&self) -> PrefetchStats {
        PrefetchStats {
            warmed: self.counters.warmed.load(Ordering::Relaxed),
            already_cached: self.counters.already_cached.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
            cancelled: self.counters.cancelled.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            pending: self.pending() as u64,
        }
    }
}

/// Resolves once a foreground resolve starts for a key other than `own_key`.
async fn preempted(mut foreground: watch::Receiver<Option<String>>, own_key: &str) {
    loop {
        if foreground.changed().await.is_err() {
            // Engine gone: nothing will ever preempt
            std::future::pending::<()>().await;
        }
        if foreground.borrow_and_update().as_deref() != Some(own_key) {
            return;
        }
    }
}
