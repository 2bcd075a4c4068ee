//! State store persisted to a single Parquet file.

use super::{StateStore, StateValue, StoredEntry};
use crate::io::state_file::{read_state_file, write_state_file};
use std::collections::BTreeMap;
use std::io::{ErrorKind, Result};
use std::path::{Path, PathBuf};

/// Store backed by a Parquet file that is rewritten atomically on every commit.
pub struct ParquetStateStore {
    path: PathBuf,
    entries: BTreeMap<String, StoredEntry>,
    dirty: bool,
}

impl ParquetStateStore {
    /// Open the store at `path`, loading any entries already on disk.
    ///
    /// A missing file starts an empty store. A file that cannot be decoded is treated as
    /// corrupt: it is removed and the store starts empty, which forces a fresh baseline for
    /// every watched file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = match read_state_file(&path) {
            Ok(entries) => {
                log::debug!("Loaded {} state entries from {}", entries.len(), path.display());
                entries
            }
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                log::warn!(
                    "State file {} is corrupt ({e}); starting with an empty store",
                    path.display()
                );
                remove_if_exists(&path)?;
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            path,
            entries,
            dirty: false,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Timestamp of the last write to `key`, if present.
    #[must_use]
    pub fn updated_at(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|e| e.updated_at.as_str())
    }
}

impl StateStore for ParquetStateStore {
    fn get(&self, key: &str) -> Option<StateValue> {
        self.entries.get(key).map(|e| e.value.clone())
    }

    fn put(&mut self, key: &str, value: StateValue) {
        self.entries
            .insert(key.to_string(), StoredEntry::now(value));
        self.dirty = true;
    }

    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.dirty = true;
        }
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn commit(&mut self) -> Result<()> {
        if !self.dirty && self.path.exists() {
            return Ok(());
        }
        write_state_file(&self.path, &self.entries)?;
        self.dirty = false;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        log::warn!("Resetting state store {}", self.path.display());
        self.entries.clear();
        self.dirty = false;
        remove_if_exists(&self.path)
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
