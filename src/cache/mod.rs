//! Cache Module
//!
//! Provides in-memory caching with TTL expiration, LRU/FIFO eviction and
//! optional persistence.

mod entry;
mod eviction;
mod handle;
mod pattern;
pub mod persistence;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, duration_to_ms, CacheEntry};
pub use eviction::EvictionStrategy;
pub use handle::Cache;
pub use pattern::endpoint_pattern;
pub use persistence::{FileSlotStorage, MemorySlotStorage, PersistenceAdapter, SlotStorage};
pub use stats::{CacheCounters, CacheStats};
pub use store::CacheStore;
