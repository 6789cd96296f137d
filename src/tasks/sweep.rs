//! TTL Sweep Task
//!
//! Background task that periodically drops cache entries left idle past the ttl.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::ByteCache;

/// Spawns a background task that sweeps idle entries out of `cache`.
///
/// The task loops forever, sleeping `interval_secs` between sweeps. Each sweep
/// takes the cache lock once.
///
/// # Returns
/// A JoinHandle for the spawned task, aborted during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = ByteCache::new(CacheConfig::default());
/// let sweep_handle = spawn_sweep_task(cache.clone(), 1);
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task(cache: ByteCache, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting TTL sweep task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.sweep_expired().await;
            if removed > 0 {
                info!("TTL sweep: removed {} idle entries", removed);
            } else {
                debug!("TTL sweep: nothing to remove");
            }
        }
    })
}
