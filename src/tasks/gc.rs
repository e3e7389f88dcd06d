//! GC Task
//!
//! Background task that periodically sweeps expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheEngine;

/// Spawns a background task that periodically sweeps expired entries.
///
/// Each sweep removes at most `max_gc_count` entries per shard; whatever is
/// left is picked up by the next sweep or by lazy expiration on read.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_gc_task(engine: Arc<CacheEngine>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs);

    tokio::spawn(async move {
        info!("Starting GC task with interval of {} seconds", interval_secs);

        loop {
            tokio::time::sleep(interval).await;

            let removed = engine.sweep_all().await;
            if removed > 0 {
                info!("GC: removed {} expired entries", removed);
            } else {
                debug!("GC: no expired entries found");
            }
        }
    })
}
