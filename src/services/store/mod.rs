//! Key/value state stores shared by every watcher of a process.
//!
//! Keys are namespaced by the watched file path (`<kind>-<filePath>`), so watchers never
//! touch each other's entries. Writes are staged with [`StateStore::put`] and made durable
//! by [`StateStore::commit`]; a backend that cannot commit is recovered with
//! [`StateStore::reset`].

use serde::{Deserialize, Serialize};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

/// A single persisted value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateValue {
    Int(u64),
    List(Vec<u64>),
    Text(String),
}

impl StateValue {
    #[must_use]
    pub fn as_int(&self) -> Option<u64> {
        match self {
            StateValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[u64]> {
        match self {
            StateValue::List(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StateValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// A value together with the time it was last written (RFC3339)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub value: StateValue,
    pub updated_at: String,
}

impl StoredEntry {
    #[must_use]
    pub fn now(value: StateValue) -> Self {
        Self {
            value,
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Kinds of per-file keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    LineNum,
    ByteOffset,
    Streak,
    ScanCount,
    Anomalies,
}

impl StateKind {
    pub const ALL: [StateKind; 5] = [
        StateKind::LineNum,
        StateKind::ByteOffset,
        StateKind::Streak,
        StateKind::ScanCount,
        StateKind::Anomalies,
    ];

    #[must_use]
    pub fn prefix(&self) -> &'static str {
        match self {
            StateKind::LineNum => "lln",
            StateKind::ByteOffset => "lfs",
            StateKind::Streak => "streak",
            StateKind::ScanCount => "scans",
            StateKind::Anomalies => "anomalies",
        }
    }
}

/// Build the store key for `kind` of `file_path`.
#[must_use]
pub fn state_key(kind: StateKind, file_path: &str) -> String {
    format!("{}-{file_path}", kind.prefix())
}

/// Trait implemented by state store backends.
pub trait StateStore: Send {
    fn get(&self, key: &str) -> Option<StateValue>;

    /// Stage a value; it becomes durable on the next [`StateStore::commit`].
    fn put(&mut self, key: &str, value: StateValue);

    fn remove(&mut self, key: &str);

    fn keys(&self) -> Vec<String>;

    /// Persist all staged changes.
    fn commit(&mut self) -> io::Result<()>;

    /// Discard the backing storage and all values, leaving an empty usable store.
    fn reset(&mut self) -> io::Result<()>;

    /// Remove every key belonging to `file_path`.
    fn forget_file(&mut self, file_path: &str) {
        for kind in StateKind::ALL {
            self.remove(&state_key(kind, file_path));
        }
    }
}

/// Store handle shared across watchers.
pub type SharedStore = Arc<Mutex<dyn StateStore>>;

/// Wrap a backend into a [`SharedStore`].
pub fn shared<S: StateStore + 'static>(store: S) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// Lock a shared store, mapping a poisoned lock to a crate error.
pub fn lock(store: &SharedStore) -> crate::Result<MutexGuard<'_, dyn StateStore + 'static>> {
    store
        .lock()
        .map_err(|_| crate::Error::System("state store lock poisoned".to_string()))
}

pub mod memory;
pub mod parquet;

pub use memory::MemoryStateStore;
pub use parquet::ParquetStateStore;
