//! Behavior Flush Task
//!
//! Background task that persists the behavior ring buffer on a debounce.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::behavior::BehaviorRecorder;

/// Spawns a background task that flushes the recorder to the persistent
/// store.
///
/// The task wakes once per `interval` and writes only when events arrived
/// since the previous flush, so bursts of navigation collapse into a
/// single write.
///
/// # Arguments
/// * `recorder` - Shared behavior recorder
/// * `interval` - Debounce window between flushes
///
/// # Returns
/// A JoinHandle for the spawned task, aborted during graceful shutdown
/// after a final explicit [`BehaviorRecorder::flush`].
pub fn spawn_flush_task(recorder: Arc<BehaviorRecorder>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting behavior flush task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            if recorder.flush().await {
                debug!("Behavior flush: history written");
            }
        }
    })
}
