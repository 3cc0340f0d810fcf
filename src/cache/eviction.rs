//! Eviction Policy Module
//!
//! Chooses which entry to drop when the store must shrink by one slot.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

use crate::cache::CacheEntry;

// == Eviction Strategy ==
/// Strategy used to pick a victim when the store is at capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvictionStrategy {
    /// Least Recently Used - evicts the entry read longest ago.
    #[default]
    Lru,
    /// First In, First Out - evicts the entry inserted earliest.
    Fifo,
}

impl EvictionStrategy {
    /// Parses a strategy name, falling back to [`EvictionStrategy::Lru`] for
    /// anything unrecognised.
    pub fn parse_lossy(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }

    // == Select Victim ==
    /// Returns the key that should be evicted next, or `None` for an empty map.
    ///
    /// The map must iterate in insertion order. LRU ties on `last_accessed_at`
    /// resolve to the entry inserted first.
    pub fn select_victim<T>(&self, entries: &IndexMap<String, CacheEntry<T>>) -> Option<String> {
        match self {
            EvictionStrategy::Lru => entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_accessed_at)
                .map(|(key, _)| key.clone()),
            EvictionStrategy::Fifo => entries.first().map(|(key, _)| key.clone()),
        }
    }
}

impl FromStr for EvictionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LRU" => Ok(EvictionStrategy::Lru),
            "FIFO" => Ok(EvictionStrategy::Fifo),
            other => Err(format!("unknown eviction strategy: {other}")),
        }
    }
}

impl fmt::Display for EvictionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionStrategy::Lru => f.write_str("LRU"),
            EvictionStrategy::Fifo => f.write_str("FIFO"),
        }
    }
}
