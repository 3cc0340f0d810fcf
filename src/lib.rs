//! Research Cache - an in-process accelerator cache
//!
//! Caches API responses, company lists and research metadata with TTL
//! expiration, LRU or FIFO eviction, optional persistence across restarts
//! and a cache-aside helper.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{Cache, CacheStats, CacheStore, EvictionStrategy};
pub use config::CacheConfig;
pub use error::PersistenceError;
pub use tasks::spawn_sweeper_task;
