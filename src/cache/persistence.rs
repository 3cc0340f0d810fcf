//! Persistence Module
//!
//! Best-effort durability for a store: the whole entry list is written as one
//! JSON blob into a named slot of some [`SlotStorage`].

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::CacheEntry;
use crate::error::{PersistenceError, Result};

// == Slot Storage ==
/// A string-keyed blob store holding one payload per slot.
pub trait SlotStorage: Send + Sync + fmt::Debug {
    /// Reads a slot, `None` if it was never written.
    fn read(&self, slot: &str) -> io::Result<Option<String>>;

    /// Replaces the slot content.
    fn write(&self, slot: &str, payload: &str) -> io::Result<()>;

    /// Deletes the slot. Removing a missing slot is not an error.
    fn remove(&self, slot: &str) -> io::Result<()>;
}

// == File Slot Storage ==
/// Stores each slot as `<dir>/<slot>.json`.
#[derive(Debug, Clone)]
pub struct FileSlotStorage {
    dir: PathBuf,
}

impl FileSlotStorage {
    /// Creates storage rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the directory holding the slot files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Maps a slot to its file. ASCII letters, digits and `-` pass through;
    /// every other byte, `_` included, becomes `_XX` in hex, so distinct
    /// slots never share a file.
    fn path_for(&self, slot: &str) -> PathBuf {
        let mut name = String::with_capacity(slot.len() + 5);
        for byte in slot.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                name.push(byte as char);
            } else {
                name.push_str(&format!("_{byte:02X}"));
            }
        }
        self.dir.join(format!("{name}.json"))
    }
}

impl SlotStorage for FileSlotStorage {
    fn read(&self, slot: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(slot)) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, slot: &str, payload: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(slot);
        // Write then rename so a crash never leaves a half-written slot
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, payload)?;
        fs::rename(&tmp, &path)
    }

    fn remove(&self, slot: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(slot)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

// == Memory Slot Storage ==
/// Process-local slot storage. Clones share the same slots, which lets tests
/// simulate a restart by building a second store over the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemorySlotStorage {
    slots: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySlotStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SlotStorage for MemorySlotStorage {
    fn read(&self, slot: &str) -> io::Result<Option<String>> {
        Ok(self.slots().get(slot).cloned())
    }

    fn write(&self, slot: &str, payload: &str) -> io::Result<()> {
        self.slots().insert(slot.to_string(), payload.to_string());
        Ok(())
    }

    fn remove(&self, slot: &str) -> io::Result<()> {
        self.slots().remove(slot);
        Ok(())
    }
}

// == Persistence Adapter ==
/// Serializes a store's entries into its own slot.
#[derive(Debug, Clone)]
pub struct PersistenceAdapter {
    storage: Arc<dyn SlotStorage>,
    slot: String,
}

impl PersistenceAdapter {
    /// Creates an adapter that owns `slot` within `storage`.
    pub fn new(storage: Arc<dyn SlotStorage>, slot: impl Into<String>) -> Self {
        Self {
            storage,
            slot: slot.into(),
        }
    }

    /// Returns the slot identifier this adapter writes to.
    pub fn slot(&self) -> &str {
        &self.slot
    }

    // == Save ==
    /// Writes every entry as a JSON array of `[key, entry]` pairs.
    pub fn save<T: Serialize>(&self, entries: &IndexMap<String, CacheEntry<T>>) -> Result<()> {
        let pairs: Vec<(&String, &CacheEntry<T>)> = entries.iter().collect();
        let payload = serde_json::to_string(&pairs).map_err(|source| PersistenceError::Serialize {
            slot: self.slot.clone(),
            source,
        })?;

        self.storage
            .write(&self.slot, &payload)
            .map_err(|source| self.io_error(source))?;

        debug!(slot = %self.slot, entries = pairs.len(), "Persisted cache slot");
        Ok(())
    }

    // == Load ==
    /// Reads the slot back. A missing slot yields no entries; individual
    /// entries that fail to decode are skipped.
    pub fn load<T: DeserializeOwned>(&self) -> Result<Vec<(String, CacheEntry<T>)>> {
        let payload = match self
            .storage
            .read(&self.slot)
            .map_err(|source| self.io_error(source))?
        {
            Some(payload) => payload,
            None => return Ok(Vec::new()),
        };

        let raw: Vec<serde_json::Value> =
            serde_json::from_str(&payload).map_err(|source| PersistenceError::Corrupt {
                slot: self.slot.clone(),
                source,
            })?;

        let mut entries = Vec::with_capacity(raw.len());
        for item in raw {
            match serde_json::from_value::<(String, CacheEntry<T>)>(item) {
                Ok(pair) => entries.push(pair),
                Err(e) => warn!(slot = %self.slot, error = %e, "Skipping malformed persisted entry"),
            }
        }
        Ok(entries)
    }

    // == Purge ==
    /// Removes the slot entirely.
    pub fn purge(&self) -> Result<()> {
        self.storage
            .remove(&self.slot)
            .map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: io::Error) -> PersistenceError {
        PersistenceError::Io {
            slot: self.slot.clone(),
            source,
        }
    }
}
