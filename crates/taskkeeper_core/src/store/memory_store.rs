//! In-process key-value store with failure injection.
//!
//! Used by tests and the CLI scenario to simulate an unavailable store or a crash
//! between two key writes.

use super::{KvStore, StoreError, StoreResult};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    entries: BTreeMap<String, Vec<u8>>,
    fail_next_set: BTreeSet<String>,
    unavailable: bool,
    set_counts: BTreeMap<String, usize>,
}

/// Volatile store. Cloning is not supported; share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    state: Mutex<MemoryState>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `set` on `key` fail once with `Unavailable`.
    pub fn fail_next_set(&self, key: &str) {
        self.state().fail_next_set.insert(key.to_string());
    }

    /// Makes every call fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// Number of successful `set` calls for `key`.
    pub fn set_count(&self, key: &str) -> usize {
        self.state().set_counts.get(key).copied().unwrap_or(0)
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A panicking test thread must not wedge the remaining assertions.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let state = self.state();
        if state.unavailable {
            return Err(StoreError::Unavailable(key.to_string()));
        }
        Ok(state.entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut state = self.state();
        if state.unavailable || state.fail_next_set.remove(key) {
            return Err(StoreError::Unavailable(key.to_string()));
        }
        state.entries.insert(key.to_string(), value.to_vec());
        *state.set_counts.entry(key.to_string()).or_insert(0) += 1;
        Ok(())
    }
}
