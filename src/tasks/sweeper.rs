//! Expiry Sweeper Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{duration_to_ms, CacheStore};

/// Spawns a background task that periodically sweeps expired cache entries.
///
/// The task only holds a weak reference to the store and exits on its own
/// once the store is dropped. Each pass takes the write lock for the
/// duration of one [`CacheStore::sweep_expired`] call.
///
/// # Arguments
/// * `cache` - shared reference to the store
/// * `interval` - time between sweep passes
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort it.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(RwLock::new(CacheStore::<String>::new(CacheConfig::default())));
/// let sweeper = spawn_sweeper_task(&cache, Duration::from_secs(60));
/// // Later, during shutdown:
/// sweeper.abort();
/// ```
pub fn spawn_sweeper_task<T>(cache: &Arc<RwLock<CacheStore<T>>>, interval: Duration) -> JoinHandle<()>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    let cache: Weak<RwLock<CacheStore<T>>> = Arc::downgrade(cache);

    tokio::spawn(async move {
        info!(interval_ms = duration_to_ms(interval), "Starting expiry sweeper");

        loop {
            tokio::time::sleep(interval).await;

            let Some(cache) = cache.upgrade() else {
                debug!("Cache dropped, expiry sweeper exiting");
                break;
            };

            let removed = cache.write().await.sweep_expired();

            if removed > 0 {
                info!("Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
        }
    })
}
