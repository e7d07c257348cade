//! TTL Cleanup Task
//!
//! Background task that periodically sweeps expired entries out of the
//! in-process backend, so purged-by-time entries stop occupying capacity
//! before they are next read.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::storage::MemoryStorage;

/// Spawns a task that sweeps expired entries every `cleanup_interval_secs`.
///
/// # Returns
/// A JoinHandle for the spawned task, which the host aborts on shutdown.
///
/// # Example
/// ```ignore
/// let storage = Arc::new(MemoryStorage::new(1000));
/// let cleanup_handle = spawn_cleanup_task(storage.clone(), 1);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(storage: Arc<MemoryStorage>, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting TTL cleanup task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = storage.cleanup_expired().await;

            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}
