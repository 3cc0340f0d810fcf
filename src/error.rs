//! Error types for the cache
//!
//! Cache lookups never fail; the only error surface is durable persistence,
//! which the store logs and swallows.

use thiserror::Error;

// == Persistence Error Enum ==
/// Failure reading or writing a durable slot.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// The backing storage could not be read or written
    #[error("Storage I/O failed for slot {slot}: {source}")]
    Io {
        slot: String,
        #[source]
        source: std::io::Error,
    },

    /// Entries could not be encoded
    #[error("Failed to serialize slot {slot}: {source}")]
    Serialize {
        slot: String,
        #[source]
        source: serde_json::Error,
    },

    /// Stored payload is not a valid entry list
    #[error("Corrupt payload in slot {slot}: {source}")]
    Corrupt {
        slot: String,
        #[source]
        source: serde_json::Error,
    },
}

// == Result Type Alias ==
/// Convenience Result type for persistence operations.
pub type Result<T> = std::result::Result<T, PersistenceError>;
