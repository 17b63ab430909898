//! Persistence slots: whole-cart read/write keyed by identity.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::LineItem;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("slot {key}: {source}")]
    Io { key: String, source: io::Error },

    #[error("slot {key}: corrupt data: {source}")]
    Corrupt {
        key: String,
        source: serde_json::Error,
    },
}

/// Key-value storage holding one serialized cart per key.
///
/// `load` returns an empty list for a key that was never written.
pub trait PersistenceSlot {
    fn load(&self, key: &str) -> Result<Vec<LineItem>, StorageError>;

    /// Overwrite the whole value stored under `key`.
    fn save(&mut self, key: &str, items: &[LineItem]) -> Result<(), StorageError>;

    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// Slot kept in process memory, as raw JSON so corrupt values can be injected.
#[derive(Debug, Default, Clone)]
pub struct MemorySlot {
    values: HashMap<String, String>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw value under `key`, bypassing serialization.
    pub fn insert_raw(&mut self, key: impl Into<String>, raw: impl Into<String>) {
        self.values.insert(key.into(), raw.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

impl PersistenceSlot for MemorySlot {
    fn load(&self, key: &str) -> Result<Vec<LineItem>, StorageError> {
        match self.values.get(key) {
            Some(raw) => serde_json::from_str(raw).map_err(|source| StorageError::Corrupt {
                key: key.to_string(),
                source,
            }),
            None => Ok(Vec::new()),
        }
    }

    fn save(&mut self, key: &str, items: &[LineItem]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(items).map_err(|source| StorageError::Corrupt {
            key: key.to_string(),
            source,
        })?;
        self.values.insert(key.to_string(), raw);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.values.remove(key);
        Ok(())
    }
}

/// Slot backed by one JSON file per key in a directory.
#[derive(Debug, Clone)]
pub struct FileSlot {
    dir: PathBuf,
}

impl FileSlot {
    /// Create the slot, creating `dir` if needed.
    pub fn new(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// File holding the cart for `key`, named by the hex of the key bytes so
    /// distinct keys never share a file.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hex::encode(key)))
    }
}

impl PersistenceSlot for FileSlot {
    fn load(&self, key: &str) -> Result<Vec<LineItem>, StorageError> {
        let path = self.path_for(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StorageError::Io {
                    key: key.to_string(),
                    source,
                });
            }
        };
        serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt {
            key: key.to_string(),
            source,
        })
    }

    fn save(&mut self, key: &str, items: &[LineItem]) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(items).map_err(|source| StorageError::Corrupt {
            key: key.to_string(),
            source,
        })?;
        fs::write(self.path_for(key), json).map_err(|source| StorageError::Io {
            key: key.to_string(),
            source,
        })
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}
