//! Embedded transactional engine, optionally fanned out over shards

use super::{ensure_dir, StorageBackend};
use crate::config::CacheConfig;
use crate::errors::{CacheError, Result, StoreType};
use crate::keys::hash;
use crate::lock::OpLock;
use crate::namespace::Namespace;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use xxhash_rust::xxh3::xxh3_64;

/// Open environments by canonical path
///
/// An environment may only be opened once per process, so handles on the
/// same namespace share it. It closes when the last handle releases it.
static OPEN_ENVIRONMENTS: Lazy<Mutex<HashMap<PathBuf, Weak<EngineShard>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Longest key the engine stores verbatim
const MAX_ENGINE_KEY: usize = 511;

/// Leading byte of hashed keys; never starts a UTF-8 string
const HASHED_KEY_TAG: u8 = 0xff;

/// Engine key for `key`: its bytes, or a tagged hash when they are too long
fn engine_key(key: &str) -> Cow<'_, [u8]> {
    if key.len() <= MAX_ENGINE_KEY {
        return Cow::Borrowed(key.as_bytes());
    }
    let mut tagged = Vec::with_capacity(1 + 32);
    tagged.push(HASHED_KEY_TAG);
    tagged.extend_from_slice(hash(key).as_bytes());
    Cow::Owned(tagged)
}

struct EngineShard {
    path: PathBuf,
    env: Env,
    db: Database<Bytes, Bytes>,
}

impl EngineShard {
    fn acquire(dir: &Path, map_size: usize) -> Result<Arc<Self>> {
        ensure_dir(dir)?;
        let path = dir
            .canonicalize()
            .map_err(|e| CacheError::init_failed(dir, format!("cannot resolve path: {e}")))?;

        let mut open = OPEN_ENVIRONMENTS.lock();
        if let Some(shard) = open.get(&path).and_then(Weak::upgrade) {
            return Ok(shard);
        }
        open.retain(|_, shard| shard.strong_count() > 0);

        let shard = Arc::new(Self::open(path.clone(), map_size)?);
        open.insert(path, Arc::downgrade(&shard));
        Ok(shard)
    }

    fn open(path: PathBuf, map_size: usize) -> Result<Self> {
        let env = unsafe { EnvOpenOptions::new().map_size(map_size).max_dbs(1).open(&path) }
            .map_err(|e| CacheError::init_failed(&path, format!("cannot open environment: {e}")))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| CacheError::init_failed(&path, e.to_string()))?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| CacheError::init_failed(&path, e.to_string()))?;
        wtxn.commit()
            .map_err(|e| CacheError::init_failed(&path, e.to_string()))?;

        tracing::debug!(path = %path.display(), map_size, "opened engine environment");
        Ok(Self { path, env, db })
    }

    fn get(&self, key: &[u8]) -> heed::Result<Option<Vec<u8>>> {
        let rtxn = self.env.read_txn()?;
        let value = self.db.get(&rtxn, key)?.map(<[u8]>::to_vec);
        Ok(value)
    }

    fn contains(&self, key: &[u8]) -> heed::Result<bool> {
        let rtxn = self.env.read_txn()?;
        let found = self.db.get(&rtxn, key)?.is_some();
        Ok(found)
    }

    fn put(&self, key: &[u8], bytes: &[u8]) -> heed::Result<()> {
        let mut wtxn = self.env.write_txn()?;
        self.db.put(&mut wtxn, key, bytes)?;
        wtxn.commit()
    }

    fn delete(&self, key: &[u8]) -> heed::Result<bool> {
        let mut wtxn = self.env.write_txn()?;
        let deleted = self.db.delete(&mut wtxn, key)?;
        wtxn.commit()?;
        Ok(deleted)
    }
}

/// Directory of shard `index`, e.g. `<namespace dir>/003`
fn shard_dir(root: &Path, shards: u32, index: u32) -> PathBuf {
    if shards == 1 {
        root.to_path_buf()
    } else {
        root.join(format!("{index:03}"))
    }
}

/// Shard owning `key`
pub fn shard_index(key: &str, shards: u32) -> usize {
    (xxh3_64(key.as_bytes()) % u64::from(shards.max(1))) as usize
}

/// Keys partitioned over `shards` independent engine environments
///
/// A single shard lives directly in the namespace directory; a fan-out puts
/// shard `i` in `<namespace dir>/<i:03>`. Errors raised by the engine while
/// checking or reading are reported as
/// [`CacheError::EntryMalformed`]; errors while writing as
/// [`CacheError::EntryWriteFailed`]. With `thread_safe` each operation
/// additionally holds the handle's reentrant lock.
///
/// Keys longer than the engine's key limit are stored under a hash of the key.
pub struct EngineBackend {
    dir: PathBuf,
    namespace: String,
    shard_count: u32,
    map_size: usize,
    shards: RwLock<Vec<Arc<EngineShard>>>,
    lock: OpLock,
}

impl EngineBackend {
    pub fn shard_count(&self) -> u32 {
        self.shard_count
    }

    fn open_shards(&self) -> Result<Vec<Arc<EngineShard>>> {
        (0..self.shard_count)
            .map(|index| EngineShard::acquire(&shard_dir(&self.dir, self.shard_count, index), self.map_size))
            .collect()
    }

    fn shard_for(&self, key: &str) -> Result<Arc<EngineShard>> {
        let index = shard_index(key, self.shard_count);

        if let Some(shard) = self.shards.read().get(index) {
            return Ok(Arc::clone(shard));
        }

        let mut shards = self.shards.write();
        if shards.is_empty() {
            tracing::debug!(namespace = %self.namespace, "reacquiring engine shards");
            *shards = self.open_shards()?;
        }
        shards.get(index).cloned().ok_or_else(|| {
            CacheError::storage(StoreType::Engine, "select shard", format!("no shard {index}"))
        })
    }
}

impl StorageBackend for EngineBackend {
    const KIND: StoreType = StoreType::Engine;

    fn open(namespace: &Namespace, config: &CacheConfig) -> Result<Self> {
        let backend = Self {
            dir: namespace.path(),
            namespace: namespace.name().to_string(),
            shard_count: config.shards,
            map_size: config.engine_map_size,
            shards: RwLock::new(Vec::new()),
            lock: OpLock::new(config.thread_safe),
        };

        let shards = backend.open_shards()?;
        *backend.shards.write() = shards;
        Ok(backend)
    }

    fn location(&self) -> String {
        self.dir.to_string_lossy().into_owned()
    }

    fn op_lock(&self) -> &OpLock {
        &self.lock
    }

    fn contains(&self, key: &str) -> Result<bool> {
        self.shard_for(key)?
            .contains(&engine_key(key))
            .map_err(|e| CacheError::malformed(key, e.to_string()))
    }

    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.shard_for(key)?
            .get(&engine_key(key))
            .map_err(|e| CacheError::malformed(key, e.to_string()))
    }

    fn store(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.shard_for(key)?
            .put(&engine_key(key), bytes)
            .map_err(|e| CacheError::write_failed(&self.namespace, key, e.to_string()))
    }

    fn remove(&self, key: &str) -> Result<bool> {
        self.shard_for(key)?
            .delete(&engine_key(key))
            .map_err(|e| CacheError::storage(StoreType::Engine, "delete entry", e.to_string()))
    }

    /// Sync every shard to disk and release this handle's references
    fn persist(&self) -> Result<()> {
        let shards = std::mem::take(&mut *self.shards.write());
        for shard in &shards {
            shard.env.force_sync().map_err(|e| {
                CacheError::storage(
                    StoreType::Engine,
                    "sync environment",
                    format!("{}: {e}", shard.path.display()),
                )
            })?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for EngineBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBackend")
            .field("dir", &self.dir)
            .field("shard_count", &self.shard_count)
            .field("thread_safe", &!self.lock.is_noop())
            .finish()
    }
}
