//! Background Tasks Module
//!
//! Contains background tasks that run during server operation.
//!
//! # Tasks
//! - Behavior flush: persists navigation history on a debounce
//! - Stats snapshot: persists counters periodically
//! - Prefetch workers: drain the prefetch queue

mod flush;
mod prefetch;
mod snapshot;

pub use flush::spawn_flush_task;
pub use prefetch::spawn_prefetch_workers;
pub use snapshot::spawn_stats_snapshot_task;
