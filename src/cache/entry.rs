//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL and access tracking.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// A single cached value together with its lifetime and access metadata.
///
/// The serialized form uses camelCase field names so persisted slots stay
/// readable by anything that shares the durable storage format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    /// The stored value
    pub data: T,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Lifetime in milliseconds, counted from `created_at`
    pub ttl: u64,
    /// Number of successful reads since insertion
    pub access_count: u64,
    /// Timestamp of the most recent successful read (Unix milliseconds)
    pub last_accessed_at: u64,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates a fresh entry stamped with the current time.
    ///
    /// # Arguments
    /// * `data` - The value to store
    /// * `ttl_ms` - Lifetime in milliseconds
    pub fn new(data: T, ttl_ms: u64) -> Self {
        Self::with_timestamp(data, ttl_ms, current_timestamp_ms())
    }

    /// Creates an entry with an explicit creation timestamp.
    pub fn with_timestamp(data: T, ttl_ms: u64, now: u64) -> Self {
        Self {
            data,
            created_at: now,
            ttl: ttl_ms,
            access_count: 0,
            last_accessed_at: now,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at the given instant.
    ///
    /// An entry is expired once strictly more than `ttl` milliseconds have
    /// passed since creation. A clock that moved backwards never expires it.
    pub fn is_expired_at(&self, now: u64) -> bool {
        now.saturating_sub(self.created_at) > self.ttl
    }

    /// Checks if the entry has expired right now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    // == Record Access ==
    /// Marks a successful read.
    pub fn record_access(&mut self, now: u64) {
        self.access_count += 1;
        self.last_accessed_at = now;
    }

    // == Time To Live ==
    /// Returns the remaining lifetime in milliseconds, `0` once expired.
    pub fn ttl_remaining_ms(&self) -> u64 {
        let deadline = self.created_at.saturating_add(self.ttl);
        deadline.saturating_sub(current_timestamp_ms())
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Converts a duration to whole milliseconds, saturating at `u64::MAX`.
pub fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
