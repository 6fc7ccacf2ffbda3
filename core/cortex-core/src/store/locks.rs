//! Per-key mutual exclusion for entity mutations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Lazily created lock per key.
///
/// Mutations on one key are serialized; different keys never contend beyond the brief
/// map lookup. Entries are dropped with [`KeyedLocks::evict`] once a key is deleted.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, key: &str) -> Arc<Mutex<()>> {
        let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(key.to_string()).or_default().clone()
    }

    /// Runs `f` while holding the lock for `key`.
    pub fn with<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.handle(key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Registers `key` so later acquisitions reuse the same lock.
    pub fn register(&self, key: &str) {
        let _ = self.handle(key);
    }

    /// Forgets the lock for `key`. Threads already holding or waiting on it are unaffected.
    pub fn evict(&self, key: &str) {
        let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        map.remove(key);
    }

    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
