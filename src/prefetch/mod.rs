//! Prefetch Module
//!
//! Schedules speculative cache warms from navigation predictions.

mod scheduler;

pub use scheduler::{
    PrefetchJob, PrefetchOptions, PrefetchPriority, PrefetchScheduler, PrefetchStats,
    PrefetchStatus, ScheduledPrefetch,
};
