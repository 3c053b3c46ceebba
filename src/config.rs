//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::{EngineOptions, StrategyTable, UnmatchedPolicy};
use crate::error::{CacheError, Result};
use crate::prefetch::PrefetchOptions;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Base URL resources are fetched from
    pub upstream_origin: String,
    /// Root directory of the file backend
    pub data_dir: PathBuf,
    /// Timeout of NetworkFirst fetches and revalidation, in milliseconds
    pub network_timeout_ms: u64,
    /// Timeout of prefetch warms, in milliseconds
    pub prefetch_timeout_ms: u64,
    /// Number of concurrent prefetch workers
    pub prefetch_workers: usize,
    /// Behavior ring buffer capacity
    pub behavior_capacity: usize,
    /// Debounce window of behavior flushes, in milliseconds
    pub flush_interval_ms: u64,
    /// Stats snapshot period in seconds
    pub stats_snapshot_interval: u64,
    /// Optional JSON strategy table
    pub strategy_file: Option<PathBuf>,
    /// What to do with keys no strategy matches
    pub unmatched_policy: UnmatchedPolicy,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `UPSTREAM_ORIGIN` - Fetch origin (default: http://127.0.0.1:8080)
    /// - `DATA_DIR` - Persistent store root (default: ./cache-data)
    /// - `NETWORK_TIMEOUT_MS` - Network timeout (default: 3000)
    /// - `PREFETCH_TIMEOUT_MS` - Prefetch timeout (default: 3000)
    /// - `PREFETCH_WORKERS` - Prefetch workers (default: 2)
    /// - `BEHAVIOR_CAPACITY` - Behavior ring buffer size (default: 2000)
    /// - `FLUSH_INTERVAL_MS` - Behavior flush debounce (default: 2000)
    /// - `STATS_SNAPSHOT_INTERVAL` - Stats snapshot period in seconds (default: 30)
    /// - `STRATEGY_FILE` - JSON strategy table (default: built-in table)
    /// - `UNMATCHED_POLICY` - `network-only` or `fail` (default: network-only)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            upstream_origin: env::var("UPSTREAM_ORIGIN").unwrap_or(defaults.upstream_origin),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            network_timeout_ms: parse_var("NETWORK_TIMEOUT_MS")
                .unwrap_or(defaults.network_timeout_ms),
            prefetch_timeout_ms: parse_var("PREFETCH_TIMEOUT_MS")
                .unwrap_or(defaults.prefetch_timeout_ms),
            prefetch_workers: parse_var("PREFETCH_WORKERS").unwrap_or(defaults.prefetch_workers),
            behavior_capacity: parse_var("BEHAVIOR_CAPACITY")
                .unwrap_or(defaults.behavior_capacity),
            flush_interval_ms: parse_var("FLUSH_INTERVAL_MS")
                .unwrap_or(defaults.flush_interval_ms),
            stats_snapshot_interval: parse_var("STATS_SNAPSHOT_INTERVAL")
                .unwrap_or(defaults.stats_snapshot_interval),
            strategy_file: env::var("STRATEGY_FILE").ok().map(PathBuf::from),
            unmatched_policy: env::var("UNMATCHED_POLICY")
                .ok()
                .and_then(|v| parse_policy(&v))
                .unwrap_or(defaults.unmatched_policy),
        }
    }

    /// Loads the strategy table from `strategy_file`, or the built-in
    /// web table when none is configured.
    pub fn strategy_table(&self) -> Result<StrategyTable> {
        match &self.strategy_file {
            Some(path) => {
                let json = std::fs::read_to_string(path).map_err(|e| {
                    CacheError::InvalidConfig(format!("{}: {}", path.display(), e))
                })?;
                StrategyTable::from_json(&json)
            }
            None => Ok(StrategyTable::default_web()),
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            network_timeout: Duration::from_millis(self.network_timeout_ms),
            unmatched: self.unmatched_policy,
        }
    }

    pub fn prefetch_options(&self) -> PrefetchOptions {
        PrefetchOptions {
            timeout: Duration::from_millis(self.prefetch_timeout_ms),
            ..PrefetchOptions::default()
        }
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn stats_snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.stats_snapshot_interval)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            upstream_origin: "http://127.0.0.1:8080".to_string(),
            data_dir: PathBuf::from("./cache-data"),
            network_timeout_ms: 3000,
            prefetch_timeout_ms: 3000,
            prefetch_workers: 2,
            behavior_capacity: 2000,
            flush_interval_ms: 2000,
            stats_snapshot_interval: 30,
            strategy_file: None,
            unmatched_policy: UnmatchedPolicy::NetworkOnly,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

fn parse_policy(value: &str) -> Option<UnmatchedPolicy> {
    match value.trim().to_ascii_lowercase().as_str() {
        "network-only" => Some(UnmatchedPolicy::NetworkOnly),
        "fail" => Some(UnmatchedPolicy::Fail),
        _ => None,
    }
}
