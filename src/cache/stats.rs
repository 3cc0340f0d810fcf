//! Cache Statistics Module
//!
//! Cumulative operation counters plus the point-in-time snapshot returned by
//! [`CacheStore::stats`](crate::cache::CacheStore::stats).

use serde::Serialize;

// == Cache Counters ==
/// Cumulative counters kept by a store since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheCounters {
    /// Number of successful reads
    pub hits: u64,
    /// Number of reads that found nothing or an expired entry
    pub misses: u64,
    /// Number of live entries removed to make room
    pub evictions: u64,
    /// Number of expired entries discarded, lazily or by a sweep
    pub expirations: u64,
}

impl CacheCounters {
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }
}

// == Cache Stats ==
/// Snapshot of a store's contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Entries physically present, expired or not
    pub total_entries: usize,
    /// Entries still within their TTL
    pub valid_entries: usize,
    /// Entries past their TTL but not yet removed
    pub expired_entries: usize,
    /// Configured capacity
    pub max_size: usize,
    /// Rough memory footprint: key bytes plus serialized value bytes
    pub approx_size_bytes: usize,
    /// Mean `access_count` across all present entries
    pub average_access_count: f64,
    /// Cumulative counters
    #[serde(flatten)]
    pub counters: CacheCounters,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.counters.hits + self.counters.misses;
        if total == 0 {
            0.0
        } else {
            self.counters.hits as f64 / total as f64
        }
    }
}
