//! Cache Module
//!
//! Strategy-driven resource caching with per-bucket LRU eviction.

mod bucket;
mod engine;
mod entry;
mod lru;
mod single_flight;
mod stats;
mod strategy;


// Re-export public types
pub use bucket::Bucket;
pub use engine::{CacheEngine, EngineOptions, Resolved, Source, UnmatchedPolicy, WarmOutcome};
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use single_flight::SingleFlight;
pub use stats::{CacheStats, StatsAggregator, StrategyStats, UNMATCHED_BUCKET};
pub use strategy::{
    CacheStrategy, Matcher, MatcherSpec, Priority, StrategyMode, StrategySpec, StrategyTable,
};
