//! Storage backends
//!
//! A backend only moves opaque bytes in and out of its storage. Envelopes,
//! TTL expiry, migration, statistics and write confirmation live in
//! [`CacheHandle`](crate::CacheHandle), which drives any [`StorageBackend`].

mod engine;
mod flat_file;
mod null;
mod single_file;

pub use engine::EngineBackend;
pub use flat_file::FlatFileBackend;
pub use null::NullBackend;
pub use single_file::SingleFileBackend;

use crate::config::CacheConfig;
use crate::errors::{Result, StoreType};
use crate::lock::OpLock;
use crate::namespace::Namespace;

/// The primitive operations a cache handle needs from its storage
pub trait StorageBackend: Send + Sync + Sized {
    const KIND: StoreType;

    /// Open the backend for `namespace`, creating storage as needed
    ///
    /// Fails with [`CacheError::EngineInitializationFailed`](crate::CacheError::EngineInitializationFailed)
    /// when the storage location is unusable.
    fn open(namespace: &Namespace, config: &CacheConfig) -> Result<Self>;

    fn kind(&self) -> StoreType {
        Self::KIND
    }

    /// Resolved storage path, empty for backends without one
    fn location(&self) -> String;

    /// Lock the handle holds for the duration of each operation
    fn op_lock(&self) -> &OpLock;

    fn contains(&self, key: &str) -> Result<bool>;

    fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn store(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Delete `key`, returning whether it was present
    fn remove(&self, key: &str) -> Result<bool>;

    /// Flush and release held-open resources; later operations reopen them
    fn persist(&self) -> Result<()> {
        Ok(())
    }

    /// Independent backend for a sub-cache; never shares mutable state with `self`
    fn open_child(&self, namespace: &Namespace, config: &CacheConfig) -> Result<Self> {
        Self::open(namespace, config)
    }

    /// Whether a successful write can be confirmed by a follow-up existence check
    fn verifies_writes(&self) -> bool {
        true
    }
}

/// Create the namespace directory for a disk-backed store
pub(crate) fn ensure_dir(dir: &std::path::Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        crate::errors::CacheError::init_failed(dir, format!("cannot create directory: {e}"))
    })
}
