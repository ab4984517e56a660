//! Backend that persists nothing

use super::StorageBackend;
use crate::config::CacheConfig;
use crate::errors::{Result, StoreType};
use crate::lock::OpLock;
use crate::namespace::Namespace;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Test double and cheap way to switch caching off
///
/// With `keep_in_memory` entries live in a process-local map owned by this
/// backend; otherwise writes are dropped and every read misses.
#[derive(Debug)]
pub struct NullBackend {
    entries: Option<Mutex<HashMap<String, Vec<u8>>>>,
    lock: OpLock,
}

impl NullBackend {
    pub fn keeps_memory(&self) -> bool {
        self.entries.is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |entries| entries.lock().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageBackend for NullBackend {
    const KIND: StoreType = StoreType::Null;

    fn open(_namespace: &Namespace, config: &CacheConfig) -> Result<Self> {
        Ok(Self {
            entries: config.keep_in_memory.then(|| Mutex::new(HashMap::new())),
            lock: OpLock::new(config.thread_safe),
        })
    }

    fn location(&self) -> String {
        String::new()
    }

    fn op_lock(&self) -> &OpLock {
        &self.lock
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self
            .entries
            .as_ref()
            .is_some_and(|entries| entries.lock().contains_key(key)))
    }

    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .entries
            .as_ref()
            .and_then(|entries| entries.lock().get(key).cloned()))
    }

    fn store(&self, key: &str, bytes: &[u8]) -> Result<()> {
        if let Some(entries) = &self.entries {
            entries.lock().insert(key.to_string(), bytes.to_vec());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self
            .entries
            .as_ref()
            .is_some_and(|entries| entries.lock().remove(key).is_some()))
    }

    fn verifies_writes(&self) -> bool {
        false
    }
}
