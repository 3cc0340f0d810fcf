//! Configuration Module
//!
//! Handles building cache configurations, either explicitly, from environment
//! variables, or from the per-domain presets.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::{duration_to_ms, EvictionStrategy};

/// Default entry lifetime (5 minutes).
pub const DEFAULT_TTL_MS: u64 = 300_000;

/// Default maximum number of entries.
pub const DEFAULT_MAX_SIZE: usize = 100;

/// Default interval between expiry sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Cache configuration parameters.
///
/// Immutable once a store has been built from it.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Default entry lifetime in milliseconds
    pub ttl: u64,
    /// Maximum number of live entries (at least 1)
    pub max_size: usize,
    /// Mirror state into durable storage
    pub persistent: bool,
    /// Victim selection when at capacity
    pub strategy: EvictionStrategy,
    /// Durable slot identifier, unique per store instance
    pub slot: String,
    /// Interval between background expiry sweeps
    pub sweep_interval: Duration,
    /// Directory used by file-backed slot storage
    pub storage_dir: PathBuf,
}

impl CacheConfig {
    /// Creates a configuration with defaults and the given slot identifier.
    pub fn new(slot: impl Into<String>) -> Self {
        Self {
            slot: slot.into(),
            ..Self::default()
        }
    }

    /// Sets the default entry lifetime. Lifetimes beyond `u64::MAX`
    /// milliseconds saturate.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = duration_to_ms(ttl);
        self
    }

    /// Sets the capacity, clamped to at least one entry.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size.max(1);
        self
    }

    /// Enables or disables mirroring into durable storage.
    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Sets the eviction strategy.
    pub fn with_strategy(mut self, strategy: EvictionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the interval between background expiry sweeps.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets the directory for file-backed slots.
    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }

    /// Creates a new CacheConfig from environment variables sharing a prefix.
    ///
    /// # Environment Variables
    /// - `{PREFIX}_TTL_MS` - Default TTL in milliseconds (default: 300000)
    /// - `{PREFIX}_MAX_SIZE` - Maximum entries (default: 100)
    /// - `{PREFIX}_PERSISTENT` - `true`/`false` (default: false)
    /// - `{PREFIX}_STRATEGY` - `LRU` or `FIFO` (default: LRU)
    /// - `{PREFIX}_SWEEP_INTERVAL_MS` - Sweep frequency (default: 60000)
    /// - `{PREFIX}_STORAGE_DIR` - Slot directory (default: `.cache`)
    ///
    /// Unparseable values fall back to their defaults. The lowercased prefix
    /// doubles as the slot identifier.
    pub fn from_env(prefix: &str) -> Self {
        let var = |name: &str| env::var(format!("{prefix}_{name}")).ok();
        let defaults = Self::new(prefix.to_ascii_lowercase());

        Self {
            ttl: var("TTL_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.ttl),
            max_size: var("MAX_SIZE")
                .and_then(|v| v.parse::<usize>().ok())
                .map(|v| v.max(1))
                .unwrap_or(defaults.max_size),
            persistent: var("PERSISTENT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.persistent),
            strategy: var("STRATEGY")
                .map(|v| EvictionStrategy::parse_lossy(&v))
                .unwrap_or(defaults.strategy),
            sweep_interval: var("SWEEP_INTERVAL_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.sweep_interval),
            storage_dir: var("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            slot: defaults.slot,
        }
    }

    // == Domain Presets ==
    /// Cache for raw API responses, five minute lifetime.
    pub fn api_responses() -> Self {
        Self::new("api-responses").with_max_size(200)
    }

    /// Company lists change rarely and are reused across sessions.
    pub fn companies() -> Self {
        Self::new("companies")
            .with_ttl(Duration::from_secs(30 * 60))
            .with_max_size(50)
            .with_persistent(true)
    }

    /// Research metadata, persisted and evicted by insertion age.
    pub fn research_metadata() -> Self {
        Self::new("research-metadata")
            .with_ttl(Duration::from_secs(10 * 60))
            .with_persistent(true)
            .with_strategy(EvictionStrategy::Fifo)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL_MS,
            max_size: DEFAULT_MAX_SIZE,
            persistent: false,
            strategy: EvictionStrategy::Lru,
            slot: "cache".to_string(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            storage_dir: PathBuf::from(".cache"),
        }
    }
}
