//! Persistent key-value cache for memoria
//!
//! One contract, [`CacheEngine`], over interchangeable storage strategies:
//! - one file per key ([`FlatFileCache`])
//! - one embedded database file per namespace ([`SingleFileCache`])
//! - an embedded transactional engine with optional shard fan-out ([`EngineCache`], the default [`Cache`])
//! - a no-op or in-memory test double ([`NullCache`])
//!
//! Every entry carries a TTL envelope, handles nest into sub-namespaces with
//! [`CacheEngine::sub_cacher`], and hit/miss counters are reported to the
//! process-wide [`StatsCollector`] when it is enabled.
//!
//! ```no_run
//! use memoria_cache::{create_cache_key, Cache, CacheEngine, KeyParts};
//!
//! # fn main() -> memoria_cache::Result<()> {
//! let cache = Cache::at("/tmp/x")?;
//! let key = create_cache_key(["gpt-4o", "summary"], "prompt text", false)?;
//!
//! if !cache.exists(&key)? {
//!     cache.set(&key, "completion", Some(3600))?;
//! }
//! let value: String = cache.get(&key)?;
//! # let _ = (value, KeyParts::new());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod clock;
pub mod codec;
pub mod config;
pub mod entry;
pub mod errors;
pub mod handle;
pub mod keys;
pub mod lock;
pub mod namespace;
pub mod stats;

pub use backend::{EngineBackend, FlatFileBackend, NullBackend, SingleFileBackend, StorageBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::Codec;
pub use config::{CacheConfig, CacheConfigBuilder, ConfigSource};
pub use entry::{CacheEntry, Entry};
pub use errors::{CacheError, Error, RecoveryHint, Result, StoreType};
pub use handle::{CacheEngine, CacheHandle};
pub use keys::{compose_cache_key, create_cache_key, hash, validate_key, KeyParts};
pub use namespace::Namespace;
pub use stats::{CacheStats, CacheStatsSnapshot};

pub use memoria_utils::{Collectable, StatsCollector, StatsSummary};

/// One file per key under the namespace directory
pub type FlatFileCache = CacheHandle<FlatFileBackend>;

/// One embedded database file per namespace
pub type SingleFileCache = CacheHandle<SingleFileBackend>;

/// Embedded transactional engine, optionally sharded
pub type EngineCache = CacheHandle<EngineBackend>;

/// Persists nothing; optionally keeps entries in memory
pub type NullCache = CacheHandle<NullBackend>;

/// The production cache handed to consumers
pub type Cache = EngineCache;
