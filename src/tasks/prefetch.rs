//! Prefetch Workers
//!
//! Background tasks draining the prefetch queue.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::prefetch::PrefetchScheduler;

/// Spawns `count` workers (at least one) that each pop the
/// highest-priority pending warm and run it to completion.
///
/// # Arguments
/// * `scheduler` - Shared prefetch scheduler
/// * `count` - Number of concurrent warms
pub fn spawn_prefetch_workers(scheduler: Arc<PrefetchScheduler>, count: usize) -> Vec<JoinHandle<()>> {
    let count = count.max(1);
    info!("Starting {} prefetch workers", count);

    (0..count)
        .map(|_| {
            let scheduler = scheduler.clone();
            tokio::spawn(async move {
                loop {
                    let job = scheduler.next_job().await;
                    scheduler.execute(job).await;
                }
            })
        })
        .collect()
}
