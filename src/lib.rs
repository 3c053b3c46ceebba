//! Resource Cache - a client-resident resource cache engine
//!
//! Serves resources through per-strategy caching policies with LRU-bounded
//! buckets, mirrors them to a durable store, and warms the cache from
//! learned navigation patterns.

pub mod api;
pub mod behavior;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod fetch;
pub mod models;
pub mod prefetch;
pub mod storage;
pub mod tasks;

pub use api::AppState;
pub use cache::CacheEngine;
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::{spawn_flush_task, spawn_prefetch_workers, spawn_stats_snapshot_task};
