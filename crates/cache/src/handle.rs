//! Cache handles and the cache contract
//!
//! [`CacheHandle`] implements everything that is common to all backends:
//! key validation, the TTL envelope, lazy expiry, migration of entries
//! written without an envelope, write confirmation, hit/miss statistics and
//! registration with the exit statistics collector. Backends only implement
//! [`StorageBackend`].

use crate::backend::StorageBackend;
use crate::config::CacheConfig;
use crate::entry::format::{self, RawEntry};
use crate::entry::CacheEntry;
use crate::errors::{CacheError, Result, StoreType};
use crate::keys::validate_key;
use crate::namespace::{caller_name, derive_child_name, Namespace};
use crate::stats::{CacheStats, CacheStatsSnapshot, StatsReporter};
use memoria_utils::Registration;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::panic::Location;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};


/// Operations every cache offers its consumers
pub trait CacheEngine {
    /// Whether a live entry exists; counts a hit or a miss
    fn exists(&self, key: &str) -> Result<bool>;

    /// Fails with [`CacheError::EntryNotFound`] when absent or expired
    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T>;

    /// Store `value`, expiring after `ttl_s` seconds when given
    fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_s: Option<u64>) -> Result<()>;

    /// Remove an entry; removing an absent key is a logged no-op
    fn unset(&self, key: &str) -> Result<()>;

    /// Handle on `<namespace>/<caller>[__<suffix>]` with the same backend and settings
    #[track_caller]
    fn sub_cacher(&self, suffix: Option<&str>) -> Result<Self>
    where
        Self: Sized;

    /// Flush and release held-open storage resources
    fn persist(&self) -> Result<()>;

    /// Resolved storage path
    fn cache_location(&self) -> String;
}

/// A cache on one namespace, stored by backend `B`
pub struct CacheHandle<B: StorageBackend> {
    /// `None` when caching is disabled
    backend: Option<B>,
    namespace: Namespace,
    config: CacheConfig,
    stats: Arc<CacheStats>,
    _registration: Option<Registration>,
}

impl<B: StorageBackend> CacheHandle<B> {
    /// Handle configured from the environment, named after the calling file
    #[track_caller]
    pub fn new() -> Result<Self> {
        Self::with_config(CacheConfig::from_env())
    }

    /// Handle rooted at `<base_dir>/.cache`, named after the calling file
    #[track_caller]
    pub fn at(base_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_config(CacheConfig {
            base_dir: base_dir.into(),
            ..CacheConfig::from_env()
        })
    }

    #[track_caller]
    pub fn with_config(config: CacheConfig) -> Result<Self> {
        let name = match &config.name {
            Some(name) => name.clone(),
            None => caller_name(Location::caller()),
        };
        let namespace = Namespace::new(&config.base_dir, &name)?;
        Self::open(namespace, config, None)
    }

    fn open(namespace: Namespace, config: CacheConfig, parent: Option<&B>) -> Result<Self> {
        config.validate()?;

        let backend = if config.disabled {
            None
        } else {
            Some(match parent {
                Some(parent) => parent.open_child(&namespace, &config)?,
                None => B::open(&namespace, &config)?,
            })
        };

        let stats = Arc::new(CacheStats::new());
        let label = format!("{}({namespace})", B::KIND.name());
        let registration = config
            .stats_collector()
            .register(Arc::new(StatsReporter::new(label, Arc::clone(&stats))));

        debug!(
            store = B::KIND.name(),
            namespace = %namespace,
            disabled = config.disabled,
            thread_safe = config.thread_safe,
            "cache initialized"
        );

        Ok(Self {
            backend,
            namespace,
            config,
            stats,
            _registration: registration,
        })
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn kind(&self) -> StoreType {
        B::KIND
    }

    pub fn is_disabled(&self) -> bool {
        self.backend.is_none()
    }

    /// The storage backend; `None` while disabled
    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    fn now(&self) -> u64 {
        self.config.clock.now()
    }

    /// Remove an entry found expired; the caller holds the operation lock
    fn expire(&self, backend: &B, key: &str) -> Result<()> {
        debug!(namespace = %self.namespace, key, "cache entry expired");
        backend.remove(key)?;
        self.stats.record_expired();
        Ok(())
    }

    /// Rewrite an entry stored without an envelope; failures are only logged
    fn migrate(&self, backend: &B, key: &str, payload: &[u8]) {
        info!(namespace = %self.namespace, key, "migrating cache entry to TTL envelope");

        let rewritten = format::encode_raw(payload, self.now(), None)
            .and_then(|bytes| backend.store(key, &bytes));
        match rewritten {
            Ok(()) => self.stats.record_migrated(),
            Err(e) => warn!(namespace = %self.namespace, key, error = %e, "cache entry migration failed"),
        }
    }

    fn is_live(&self, backend: &B, key: &str) -> Result<bool> {
        let _guard = backend.op_lock().lock();

        let Some(bytes) = backend.load(key)? else {
            return Ok(false);
        };

        let raw = format::decode_raw(&bytes).map_err(|e| e.for_key(key))?;
        let live = match raw {
            // Without a self-describing codec a legacy payload can only be
            // checked by a typed read, which then migrates it
            RawEntry::Legacy(payload) => match self.config.codec.is_well_formed(payload) {
                Some(true) => {
                    self.migrate(backend, key, payload);
                    true
                }
                Some(false) => {
                    warn!(namespace = %self.namespace, key, "cache entry is not decodable, ignoring");
                    false
                }
                None => true,
            },
            RawEntry::Enveloped { header, .. } => {
                let valid = header.is_valid_at(self.now());
                if !valid {
                    self.expire(backend, key)?;
                }
                valid
            }
        };
        Ok(live)
    }
}

impl<B: StorageBackend> CacheEngine for CacheHandle<B> {
    fn exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;

        let found = match &self.backend {
            Some(backend) => self.is_live(backend, key)?,
            None => {
                debug!(namespace = %self.namespace, "cache disabled");
                false
            }
        };

        self.stats.record_lookup(found);
        if !found {
            debug!(namespace = %self.namespace, key, "cache entry does not exist");
        }
        Ok(found)
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        validate_key(key)?;
        let Some(backend) = &self.backend else {
            return Err(CacheError::not_found(self.namespace.name(), key));
        };

        debug!(namespace = %self.namespace, key, "cache get");
        let _guard = backend.op_lock().lock();

        let Some(bytes) = backend.load(key)? else {
            return Err(CacheError::not_found(self.namespace.name(), key));
        };

        let value = match format::decode_raw(&bytes).map_err(|e| e.for_key(key))? {
            RawEntry::Legacy(payload) => {
                let value = self.config.codec.decode(payload).map_err(|e| e.for_key(key))?;
                self.migrate(backend, key, payload);
                value
            }
            RawEntry::Enveloped { header, payload } => {
                if !header.is_valid_at(self.now()) {
                    self.expire(backend, key)?;
                    return Err(CacheError::not_found(self.namespace.name(), key));
                }
                self.config.codec.decode(payload).map_err(|e| e.for_key(key))?
            }
        };

        Ok(value)
    }

    fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_s: Option<u64>) -> Result<()> {
        validate_key(key)?;
        let Some(backend) = &self.backend else {
            return Ok(());
        };

        let bytes = CacheEntry::new(value, self.now(), ttl_s)
            .encode(self.config.codec)
            .map_err(|e| e.for_key(key))?;

        {
            let _guard = backend.op_lock().lock();
            backend.store(key, &bytes)?;

            if backend.verifies_writes() && !backend.contains(key)? {
                error!(
                    namespace = %self.namespace,
                    key,
                    location = %backend.location(),
                    size = bytes.len(),
                    "cache entry not set"
                );
                return Err(CacheError::write_failed(
                    self.namespace.name(),
                    key,
                    "entry not observed after write",
                ));
            }
        }

        self.stats.record_write();
        debug!(namespace = %self.namespace, key, ttl_s = ?ttl_s, "cache set");
        Ok(())
    }

    fn unset(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let Some(backend) = &self.backend else {
            return Ok(());
        };

        let removed = {
            let _guard = backend.op_lock().lock();
            backend.remove(key)?
        };

        if removed {
            self.stats.record_removal();
            debug!(namespace = %self.namespace, key, "cache entry removed");
        } else {
            warn!(namespace = %self.namespace, key, "cache entry does not exist, nothing to remove");
        }
        Ok(())
    }

    #[track_caller]
    fn sub_cacher(&self, suffix: Option<&str>) -> Result<Self> {
        let name = derive_child_name(Location::caller(), suffix);
        let namespace = self.namespace.child(&name)?;

        debug!(parent = %self.namespace, namespace = %namespace, "creating sub cacher");
        Self::open(namespace, self.config.clone(), self.backend.as_ref())
    }

    fn persist(&self) -> Result<()> {
        match &self.backend {
            Some(backend) => {
                let _guard = backend.op_lock().lock();
                backend.persist()
            }
            None => Ok(()),
        }
    }

    fn cache_location(&self) -> String {
        match &self.backend {
            Some(backend) => backend.location(),
            None => self.namespace.path().to_string_lossy().into_owned(),
        }
    }
}

impl<B: StorageBackend + fmt::Debug> fmt::Debug for CacheHandle<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheHandle")
            .field("namespace", &self.namespace)
            .field("backend", &self.backend)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}
