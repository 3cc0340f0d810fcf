//! Cache Store Module
//!
//! Main cache engine combining insertion-ordered storage with pluggable
//! eviction, TTL expiration and optional persistence.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::entry::{current_timestamp_ms, duration_to_ms};
use crate::cache::persistence::{FileSlotStorage, PersistenceAdapter, SlotStorage};
use crate::cache::{CacheCounters, CacheEntry, CacheStats};
use crate::config::CacheConfig;

// == Cache Store ==
/// Synchronous cache storage. Every operation runs to completion without
/// yielding; wrap it in a lock (see [`Cache`](crate::cache::Cache)) to share it.
#[derive(Debug)]
pub struct CacheStore<T> {
    /// Key-value storage, iterated in insertion order
    entries: IndexMap<String, CacheEntry<T>>,
    /// Immutable configuration
    config: CacheConfig,
    /// Present only for persistent stores
    persistence: Option<PersistenceAdapter>,
    /// Cumulative counters
    counters: CacheCounters,
}

impl<T> CacheStore<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    // == Constructor ==
    /// Creates a store. Persistent stores use file-backed slots under
    /// `config.storage_dir` and hydrate immediately.
    pub fn new(config: CacheConfig) -> Self {
        let storage: Option<Arc<dyn SlotStorage>> = if config.persistent {
            Some(Arc::new(FileSlotStorage::new(config.storage_dir.clone())))
        } else {
            None
        };
        Self::build(config, storage)
    }

    /// Creates a store over the given slot storage. The storage is ignored
    /// unless `config.persistent` is set.
    pub fn with_storage(config: CacheConfig, storage: Arc<dyn SlotStorage>) -> Self {
        let storage = config.persistent.then_some(storage);
        Self::build(config, storage)
    }

    fn build(mut config: CacheConfig, storage: Option<Arc<dyn SlotStorage>>) -> Self {
        config.max_size = config.max_size.max(1);
        let persistence = storage.map(|storage| PersistenceAdapter::new(storage, config.slot.clone()));

        let mut store = Self {
            entries: IndexMap::new(),
            config,
            persistence,
            counters: CacheCounters::default(),
        };
        store.hydrate();
        store
    }

    // == Hydrate ==
    /// Loads persisted entries, then drops whatever expired while the process
    /// was down.
    fn hydrate(&mut self) {
        let Some(adapter) = &self.persistence else {
            return;
        };

        match adapter.load::<T>() {
            Ok(loaded) => {
                let count = loaded.len();
                self.entries.extend(loaded);
                info!(slot = %adapter.slot(), entries = count, "Hydrated cache from storage");
            }
            Err(e) => {
                warn!(error = %e, "Failed to load persisted cache, starting cold");
            }
        }

        self.sweep_expired();
        // A smaller max_size than the previous run still has to hold
        if self.entries.len() > self.config.max_size {
            while self.entries.len() > self.config.max_size {
                self.evict_one();
            }
            self.persist();
        }
    }

    // == Set ==
    /// Stores a value under `key` with the configured default TTL.
    ///
    /// An existing entry is replaced entirely, including its access stats and
    /// its insertion position. A new key at capacity evicts one entry first.
    pub fn set(&mut self, key: impl Into<String>, value: T) {
        let ttl = self.config.ttl;
        self.insert(key.into(), value, ttl);
    }

    /// Stores a value with an explicit TTL.
    pub fn set_with_ttl(&mut self, key: impl Into<String>, value: T, ttl: Duration) {
        self.insert(key.into(), value, duration_to_ms(ttl));
    }

    fn insert(&mut self, key: String, value: T, ttl_ms: u64) {
        let replaced = self.entries.shift_remove(&key).is_some();

        if !replaced && self.entries.len() >= self.config.max_size {
            self.evict_one();
        }

        self.entries.insert(key, CacheEntry::new(value, ttl_ms));
        self.persist();
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Returns `None` if the key is absent or expired; an expired entry is
    /// removed. A hit bumps the entry's access count and timestamp.
    pub fn get(&mut self, key: &str) -> Option<T> {
        let now = current_timestamp_ms();

        if !self.check_live(key, now) {
            self.counters.record_miss();
            return None;
        }

        let entry = self.entries.get_mut(key)?;
        entry.record_access(now);
        self.counters.record_hit();
        Some(entry.data.clone())
    }

    // == Has ==
    /// Checks for a live entry without touching access stats.
    pub fn has(&mut self, key: &str) -> bool {
        self.check_live(key, current_timestamp_ms())
    }

    /// Returns whether `key` holds a live entry, discarding it if expired.
    fn check_live(&mut self, key: &str, now: u64) -> bool {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired_at(now),
            None => return false,
        };

        if expired {
            self.entries.shift_remove(key);
            self.counters.record_expirations(1);
            debug!(key, "Discarded expired entry on access");
            self.persist();
        }
        !expired
    }

    // == Peek ==
    /// Returns the raw entry, expired or not, without recording an access.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry<T>> {
        self.entries.get(key)
    }

    // == Delete ==
    /// Removes an entry by key, returning whether anything was removed.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.entries.shift_remove(key).is_some();
        if removed {
            self.persist();
        }
        removed
    }

    // == Clear ==
    /// Removes every entry and purges the durable slot.
    pub fn clear(&mut self) {
        self.entries.clear();
        if let Some(adapter) = &self.persistence {
            if let Err(e) = adapter.purge() {
                warn!(error = %e, "Failed to purge persisted cache");
            }
        }
    }

    // == Invalidate ==
    /// Removes every key matched by `pattern`, returning the count removed.
    pub fn invalidate_pattern(&mut self, pattern: &Regex) -> usize {
        self.invalidate_matching(|key| pattern.is_match(key))
    }

    /// Removes every key for which `predicate` returns true.
    pub fn invalidate_matching<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|key, _| !predicate(key));
        let removed = before - self.entries.len();

        if removed > 0 {
            debug!(removed, "Invalidated matching keys");
            self.persist();
        }
        removed
    }

    // == Sweep Expired ==
    /// Removes all expired entries in one batch.
    ///
    /// Returns the number of entries removed. Persists once if that is non-zero.
    pub fn sweep_expired(&mut self) -> usize {
        let now = current_timestamp_ms();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - self.entries.len();

        if removed > 0 {
            self.counters.record_expirations(removed);
            self.persist();
        }
        removed
    }

    // == Eviction ==
    /// Drops one entry chosen by the configured strategy. Does not persist.
    fn evict_one(&mut self) {
        if let Some(victim) = self.config.strategy.select_victim(&self.entries) {
            self.entries.shift_remove(&victim);
            self.counters.record_eviction();
            debug!(key = %victim, strategy = %self.config.strategy, "Evicted entry");
        }
    }

    // == Stats ==
    /// Returns a point-in-time snapshot of the store.
    pub fn stats(&self) -> CacheStats {
        let now = current_timestamp_ms();
        let total_entries = self.entries.len();

        let mut expired_entries = 0;
        let mut approx_size_bytes = 0;
        let mut total_accesses: u64 = 0;

        for (key, entry) in &self.entries {
            if entry.is_expired_at(now) {
                expired_entries += 1;
            }
            total_accesses += entry.access_count;
            approx_size_bytes += key.len()
                + serde_json::to_vec(&entry.data)
                    .map(|bytes| bytes.len())
                    .unwrap_or(0);
        }

        let average_access_count = if total_entries == 0 {
            0.0
        } else {
            total_accesses as f64 / total_entries as f64
        };

        CacheStats {
            total_entries,
            valid_entries: total_entries - expired_entries,
            expired_entries,
            max_size: self.config.max_size,
            approx_size_bytes,
            average_access_count,
            counters: self.counters,
        }
    }

    // == Persist ==
    /// Mirrors the current entries to storage. Failures are logged only.
    fn persist(&self) {
        if let Some(adapter) = &self.persistence {
            if let Err(e) = adapter.save(&self.entries) {
                warn!(error = %e, "Failed to persist cache");
            }
        }
    }
}

impl<T> CacheStore<T> {
    /// Returns the current number of entries, including unswept expired ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the configuration this store was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns whether state is mirrored to durable storage.
    pub fn is_persistent(&self) -> bool {
        self.persistence.is_some()
    }

    /// Iterates keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::persistence::MemorySlotStorage;
    use crate::cache::EvictionStrategy;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread::sleep;

    fn store(max_size: usize) -> CacheStore<String> {
        CacheStore::new(CacheConfig::new("test").with_max_size(max_size))
    }

    fn persistent_config(slot: &str) -> CacheConfig {
        CacheConfig::new(slot).with_persistent(true)
    }

    fn keys(store: &CacheStore<String>) -> Vec<&str> {
        store.keys().collect()
    }

    #[derive(Debug)]
    struct BrokenStorage;

    impl SlotStorage for BrokenStorage {
        fn read(&self, _slot: &str) -> io::Result<Option<String>> {
            Err(io::Error::new(io::ErrorKind::Other, "unavailable"))
        }

        fn write(&self, _slot: &str, _payload: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "quota exceeded"))
        }

        fn remove(&self, _slot: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "unavailable"))
        }
    }

    /// Slot storage that counts writes.
    #[derive(Debug, Clone, Default)]
    struct CountingStorage {
        inner: MemorySlotStorage,
        writes: Arc<AtomicUsize>,
    }

    impl CountingStorage {
        fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }
    }

    impl SlotStorage for CountingStorage {
        fn read(&self, slot: &str) -> io::Result<Option<String>> {
            self.inner.read(slot)
        }

        fn write(&self, slot: &str, payload: &str) -> io::Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.write(slot, payload)
        }

        fn remove(&self, slot: &str) -> io::Result<()> {
            self.inner.remove(slot)
        }
    }

    fn counted_store(slot: &str, max_size: usize) -> (CacheStore<String>, CountingStorage) {
        let storage = CountingStorage::default();
        let store = CacheStore::with_storage(
            persistent_config(slot).with_max_size(max_size),
            Arc::new(storage.clone()),
        );
        (store, storage)
    }

    #[test]
    fn test_store_new() {
        let store = store(100);
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert!(!store.is_persistent());
    }

    #[test]
    fn test_store_set_and_get() {
        let mut store = store(100);

        store.set("key1", "value1".to_string());

        assert_eq!(store.get("key1").as_deref(), Some("value1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut store = store(100);
        assert_eq!(store.get("nonexistent"), None);
    }

    #[test]
    fn test_get_records_access() {
        let mut store = store(100);
        store.set("key1", "value1".to_string());

        store.get("key1");
        store.get("key1");

        let entry = store.peek("key1").unwrap();
        assert_eq!(entry.access_count, 2);
        assert!(entry.last_accessed_at >= entry.created_at);
    }

    #[test]
    fn test_has_does_not_record_access() {
        let mut store = store(100);
        store.set("key1", "value1".to_string());

        assert!(store.has("key1"));
        assert!(!store.has("missing"));

        assert_eq!(store.peek("key1").unwrap().access_count, 0);
        assert_eq!(store.stats().counters.hits, 0);
    }

    #[test]
    fn test_store_delete() {
        let mut store = store(100);
        store.set("key1", "value1".to_string());
        store.set("key2", "value2".to_string());

        assert!(store.delete("key1"));
        assert!(!store.delete("key1"));
        assert!(!store.delete("nonexistent"));

        assert_eq!(store.get("key1"), None);
        assert_eq!(store.get("key2").as_deref(), Some("value2"));
    }

    #[test]
    fn test_store_overwrite_resets_entry() {
        let mut store = store(100);

        store.set("key1", "value1".to_string());
        store.get("key1");
        store.set("key1", "value2".to_string());

        assert_eq!(store.peek("key1").unwrap().access_count, 0);
        assert_eq!(store.get("key1").as_deref(), Some("value2"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_ttl_expiration() {
        let mut store = store(100);

        store.set_with_ttl("key1", "value1".to_string(), Duration::from_millis(50));
        assert!(store.has("key1"));

        sleep(Duration::from_millis(80));

        assert!(!store.has("key1"));
        // Lazily removed by `has`
        assert!(store.peek("key1").is_none());
        assert_eq!(store.get("key1"), None);
    }

    #[test]
    fn test_expired_entry_counted_until_swept() {
        let mut store = store(100);
        store.set_with_ttl("short", "a".to_string(), Duration::from_millis(30));
        store.set("long", "b".to_string());

        sleep(Duration::from_millis(60));

        let stats = store.stats();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.expired_entries, 1);
        assert_eq!(stats.valid_entries, 1);

        assert_eq!(store.sweep_expired(), 1);
        let stats = store.stats();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.expired_entries, 0);
        assert_eq!(stats.counters.expirations, 1);
    }

    #[test]
    fn test_lru_eviction() {
        let mut store = store(3);

        store.set("a", "1".to_string());
        store.set("b", "2".to_string());
        store.set("c", "3".to_string());
        sleep(Duration::from_millis(5));
        store.get("a");

        store.set("d", "4".to_string());

        assert_eq!(store.len(), 3);
        assert!(store.peek("b").is_none());
        assert_eq!(keys(&store), vec!["a", "c", "d"]);
        assert_eq!(store.stats().counters.evictions, 1);
    }

    #[test]
    fn test_fifo_eviction_ignores_access() {
        let mut store = CacheStore::new(
            CacheConfig::new("fifo")
                .with_max_size(3)
                .with_strategy(EvictionStrategy::Fifo),
        );

        store.set("a", "1".to_string());
        store.set("b", "2".to_string());
        store.set("c", "3".to_string());
        sleep(Duration::from_millis(5));
        store.get("a");

        store.set("d", "4".to_string());

        assert!(store.peek("a").is_none());
        assert_eq!(keys(&store), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_overwrite_at_capacity_does_not_evict() {
        let mut store = store(2);
        store.set("a", "1".to_string());
        store.set("b", "2".to_string());

        store.set("a", "3".to_string());

        assert_eq!(store.len(), 2);
        assert_eq!(store.stats().counters.evictions, 0);
        // Overwrite moves the key to the back of insertion order
        assert_eq!(keys(&store), vec!["b", "a"]);
    }

    #[test]
    fn test_clear() {
        let mut store = store(100);
        store.set("a", "1".to_string());
        store.set("b", "2".to_string());

        store.clear();

        let stats = store.stats();
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.valid_entries, 0);
    }

    #[test]
    fn test_invalidate_pattern() {
        let mut store = store(100);
        store.set("research:1:forms", "a".to_string());
        store.set("research:2:forms", "b".to_string());
        store.set("companies:list", "c".to_string());

        let removed = store.invalidate_pattern(&Regex::new("^research:").unwrap());

        assert_eq!(removed, 2);
        assert_eq!(keys(&store), vec!["companies:list"]);
        assert_eq!(store.invalidate_pattern(&Regex::new("^research:").unwrap()), 0);
    }

    #[test]
    fn test_invalidate_matching_predicate() {
        let mut store = store(100);
        store.set("a1", "x".to_string());
        store.set("b1", "y".to_string());
        store.set("a2", "z".to_string());

        assert_eq!(store.invalidate_matching(|key| key.starts_with('a')), 2);
        assert_eq!(keys(&store), vec!["b1"]);
    }

    #[test]
    fn test_stats_snapshot() {
        let mut store = store(10);
        store.set("k1", "abc".to_string());
        store.set("k2", "de".to_string());
        store.get("k1");
        store.get("k1");
        store.get("missing");

        let stats = store.stats();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.valid_entries, 2);
        assert_eq!(stats.max_size, 10);
        assert_eq!(stats.average_access_count, 1.0);
        // keys (2 + 2) plus JSON strings ("abc" = 5, "de" = 4)
        assert_eq!(stats.approx_size_bytes, 13);
        assert_eq!(stats.counters.hits, 2);
        assert_eq!(stats.counters.misses, 1);
    }

    #[test]
    fn test_persistent_restart() {
        let storage = MemorySlotStorage::new();

        let mut first = CacheStore::with_storage(persistent_config("restart"), Arc::new(storage.clone()));
        first.set("k", "v".to_string());
        drop(first);

        let mut second: CacheStore<String> =
            CacheStore::with_storage(persistent_config("restart"), Arc::new(storage));
        assert!(second.is_persistent());
        assert_eq!(second.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn test_persistent_restart_drops_expired() {
        let storage = MemorySlotStorage::new();

        let mut first = CacheStore::with_storage(persistent_config("downtime"), Arc::new(storage.clone()));
        first.set_with_ttl("short", "v".to_string(), Duration::from_millis(30));
        first.set("long", "w".to_string());
        drop(first);

        sleep(Duration::from_millis(60));

        let second: CacheStore<String> =
            CacheStore::with_storage(persistent_config("downtime"), Arc::new(storage));
        assert_eq!(second.len(), 1);
        assert!(second.peek("short").is_none());
    }

    #[test]
    fn test_hydrate_respects_smaller_capacity() {
        let storage = MemorySlotStorage::new();

        let mut first = CacheStore::with_storage(persistent_config("shrink"), Arc::new(storage.clone()));
        for i in 0..5 {
            first.set(format!("k{i}"), i.to_string());
        }

        let second: CacheStore<String> = CacheStore::with_storage(
            persistent_config("shrink")
                .with_max_size(2)
                .with_strategy(EvictionStrategy::Fifo),
            Arc::new(storage),
        );
        assert_eq!(keys(&second), vec!["k3", "k4"]);
    }

    #[test]
    fn test_corrupt_slot_starts_cold() {
        let storage = MemorySlotStorage::new();
        storage.write("corrupt", "][").unwrap();

        let mut store: CacheStore<String> =
            CacheStore::with_storage(persistent_config("corrupt"), Arc::new(storage.clone()));
        assert!(store.is_empty());

        store.set("k", "v".to_string());
        assert!(storage.read("corrupt").unwrap().unwrap().contains("\"k\""));
    }

    #[test]
    fn test_broken_storage_never_fails_operations() {
        let mut store: CacheStore<String> =
            CacheStore::with_storage(persistent_config("broken"), Arc::new(BrokenStorage));

        store.set("k", "v".to_string());
        assert_eq!(store.get("k").as_deref(), Some("v"));
        assert!(store.delete("k"));
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_non_persistent_ignores_storage() {
        let storage = MemorySlotStorage::new();
        let mut store = CacheStore::with_storage(CacheConfig::new("volatile"), Arc::new(storage.clone()));

        store.set("k", "v".to_string());

        assert!(!store.is_persistent());
        assert_eq!(storage.read("volatile").unwrap(), None);
    }

    #[test]
    fn test_clear_purges_slot() {
        let storage = MemorySlotStorage::new();
        let mut store = CacheStore::with_storage(persistent_config("purge"), Arc::new(storage.clone()));

        store.set("k", "v".to_string());
        assert!(storage.read("purge").unwrap().is_some());

        store.clear();
        assert_eq!(storage.read("purge").unwrap(), None);
    }

    #[test]
    fn test_eviction_does_not_add_writes() {
        let (mut store, storage) = counted_store("writes-evict", 3);
        assert_eq!(storage.writes(), 0);

        for i in 0..5 {
            store.set(format!("k{i}"), i.to_string());
        }

        assert_eq!(store.stats().counters.evictions, 2);
        assert_eq!(storage.writes(), 5);
    }

    #[test]
    fn test_sweep_writes_once_per_batch() {
        let (mut store, storage) = counted_store("writes-sweep", 100);
        for i in 0..5 {
            store.set_with_ttl(format!("k{i}"), i.to_string(), Duration::from_millis(20));
        }
        store.set("keep", "v".to_string());
        assert_eq!(storage.writes(), 6);

        sleep(Duration::from_millis(50));

        assert_eq!(store.sweep_expired(), 5);
        assert_eq!(storage.writes(), 7);

        assert_eq!(store.sweep_expired(), 0);
        assert_eq!(storage.writes(), 7);
    }

    #[test]
    fn test_noop_mutations_do_not_write() {
        let (mut store, storage) = counted_store("writes-noop", 100);
        store.set("k", "v".to_string());

        assert!(!store.delete("missing"));
        assert_eq!(store.invalidate_matching(|key| key == "missing"), 0);
        assert_eq!(store.get("k").as_deref(), Some("v"));
        assert!(store.has("k"));

        assert_eq!(storage.writes(), 1);
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let mut store = store(100);

        store.set_with_ttl("forever", "v".to_string(), Duration::from_secs(1 << 61));
        assert_eq!(store.peek("forever").unwrap().ttl, u64::MAX);

        sleep(Duration::from_millis(5));
        assert_eq!(store.get("forever").as_deref(), Some("v"));
    }
}
