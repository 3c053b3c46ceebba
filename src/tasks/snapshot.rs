//! Stats Snapshot Task
//!
//! Background task that periodically persists the stats snapshot.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheEngine;

/// Spawns a background task that persists the engine's stats every
/// `interval`, so hit/miss history survives restarts.
///
/// # Arguments
/// * `engine` - Cache engine handle
/// * `interval` - Period between snapshots
pub fn spawn_stats_snapshot_task(engine: CacheEngine, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting stats snapshot task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            if engine.persist_stats().await {
                debug!("Stats snapshot persisted");
            } else if !engine.is_degraded() {
                warn!("Stats snapshot was not persisted");
            }
        }
    })
}
