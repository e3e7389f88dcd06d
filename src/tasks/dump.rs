//! Dump Task
//!
//! Background task that periodically writes a snapshot of the cache.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::cache::CacheEngine;

/// Spawns a background task that periodically dumps the engine to its
/// configured snapshot file.
///
/// A failed dump is logged and retried at the next interval.
pub fn spawn_dump_task(engine: Arc<CacheEngine>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting dump task with interval of {} seconds to {}",
            interval_secs,
            engine.options().dump_file.display()
        );

        loop {
            tokio::time::sleep(interval).await;

            match engine.dump().await {
                Ok(()) => debug!("Snapshot dump completed"),
                Err(e) => error!(error = %e, "Snapshot dump failed"),
            }
        }
    })
}
