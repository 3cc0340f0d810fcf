//! Shared Cache Handle
//!
//! Async, lock-protected front end over [`CacheStore`] that owns the expiry
//! sweeper and provides the cache-aside helper.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::persistence::SlotStorage;
use crate::cache::{endpoint_pattern, CacheStats, CacheStore};
use crate::config::CacheConfig;
use crate::tasks::spawn_sweeper_task;

// == Cache ==
/// A cache of `T` values shared between tasks.
///
/// Every operation holds a single write lock for its whole duration, so
/// evict-then-insert inside `set` is one critical section. Dropping the
/// handle stops its sweeper.
#[derive(Debug)]
pub struct Cache<T> {
    store: Arc<RwLock<CacheStore<T>>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    sweep_interval: Duration,
}

impl<T> Cache<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Creates a cache from configuration. The sweeper is not started.
    pub fn new(config: CacheConfig) -> Self {
        Self::from_store(CacheStore::new(config))
    }

    /// Creates a cache persisting into the given slot storage.
    pub fn with_storage(config: CacheConfig, storage: Arc<dyn SlotStorage>) -> Self {
        Self::from_store(CacheStore::with_storage(config, storage))
    }

    /// Wraps an existing store, taking its sweep interval from the store's config.
    pub fn from_store(store: CacheStore<T>) -> Self {
        let sweep_interval = store.config().sweep_interval;
        Self {
            store: Arc::new(RwLock::new(store)),
            sweeper: Mutex::new(None),
            sweep_interval,
        }
    }

    // == Sweeper Lifecycle ==
    /// Starts the periodic expiry sweeper. Must be called within a Tokio
    /// runtime. Returns false if a sweeper is already running.
    pub fn start_sweeper(&self) -> bool {
        let mut sweeper = self.sweeper();
        if sweeper.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }
        *sweeper = Some(spawn_sweeper_task(&self.store, self.sweep_interval));
        true
    }

    /// Stops the sweeper if it is running.
    pub fn stop_sweeper(&self) {
        if let Some(handle) = self.sweeper().take() {
            handle.abort();
            debug!("Expiry sweeper stopped");
        }
    }

    /// Returns true while a started sweeper has not been stopped or finished.
    pub fn is_sweeper_running(&self) -> bool {
        self.sweeper()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn sweeper(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.sweeper.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // == Store Operations ==
    /// Retrieves a live value, recording the access. See [`CacheStore::get`].
    pub async fn get(&self, key: &str) -> Option<T> {
        self.store.write().await.get(key)
    }

    /// Stores a value with the configured default TTL.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    pub async fn set(&self, key: impl Into<String>, value: T) {
        self.store.write().await.set(key, value);
    }

    /// Stores a value with an explicit TTL.
    pub async fn set_with_ttl(&self, key: impl Into<String>, value: T, ttl: Duration) {
        self.store.write().await.set_with_ttl(key, value, ttl);
    }

    /// Checks for a live entry without recording an access.
    pub async fn has(&self, key: &str) -> bool {
        self.store.write().await.has(key)
    }

    /// Removes an entry, returning whether it existed.
    pub async fn delete(&self, key: &str) -> bool {
        self.store.write().await.delete(key)
    }

    /// Removes every entry and purges the durable slot.
    pub async fn clear(&self) {
        self.store.write().await.clear();
    }

    /// Removes every key matched by `pattern`, returning the count removed.
    pub async fn invalidate_pattern(&self, pattern: &Regex) -> usize {
        self.store.write().await.invalidate_pattern(pattern)
    }

    /// Removes every key for which `predicate` returns true.
    pub async fn invalidate_matching<F>(&self, predicate: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        self.store.write().await.invalidate_matching(predicate)
    }

    /// Invalidates every key matching an endpoint template such as
    /// `/research/{id}/forms`. A template that cannot be compiled removes nothing.
    pub async fn invalidate_endpoint(&self, template: &str) -> usize {
        match endpoint_pattern(template) {
            Ok(pattern) => self.invalidate_pattern(&pattern).await,
            Err(e) => {
                warn!(template, error = %e, "Invalid endpoint template");
                0
            }
        }
    }

    /// Runs one expiry sweep immediately, returning the count removed.
    pub async fn sweep_expired(&self) -> usize {
        self.store.write().await.sweep_expired()
    }

    /// Returns a point-in-time snapshot of the cache.
    pub async fn stats(&self) -> CacheStats {
        self.store.read().await.stats()
    }

    /// Returns the number of entries, including unswept expired ones.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    /// Returns true if the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    // == Get Or Set ==
    /// Returns the cached value for `key`, or runs `fetcher` and caches its
    /// result with the default TTL.
    ///
    /// The lock is not held while `fetcher` runs. A failed fetch is returned
    /// unchanged and nothing is cached. Concurrent misses on the same key each
    /// run their own fetch.
    pub async fn get_or_set<F, Fut, E>(&self, key: &str, fetcher: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.fetch_through(key, None, fetcher).await
    }

    /// Same as [`Cache::get_or_set`] with an explicit TTL for the stored value.
    pub async fn get_or_set_with_ttl<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        fetcher: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.fetch_through(key, Some(ttl), fetcher).await
    }

    async fn fetch_through<F, Fut, E>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        fetcher: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        debug!(key, "Cache miss, fetching");
        let value = fetcher().await?;

        let mut store = self.store.write().await;
        match ttl {
            Some(ttl) => store.set_with_ttl(key, value.clone(), ttl),
            None => store.set(key, value.clone()),
        }
        Ok(value)
    }
}

impl<T> Drop for Cache<T> {
    fn drop(&mut self) {
        let sweeper = self
            .sweeper
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = sweeper.take() {
            handle.abort();
        }
    }
}
