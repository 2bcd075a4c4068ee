//! In-memory store for tests and runs that should not survive a restart.

use super::{StateStore, StateValue};
use std::collections::BTreeMap;
use std::io;

#[derive(Debug, Default)]
pub struct MemoryStateStore {
    values: BTreeMap<String, StateValue>,
    commits: u64,
}

impl MemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful commits, handy for asserting persistence happened.
    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.commits
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Option<StateValue> {
        self.values.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: StateValue) {
        self.values.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    fn commit(&mut self) -> io::Result<()> {
        self.commits = self.commits.saturating_add(1);
        Ok(())
    }

    fn reset(&mut self) -> io::Result<()> {
        self.values.clear();
        Ok(())
    }
}
