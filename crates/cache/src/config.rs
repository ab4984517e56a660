//! Cache handle configuration with environment overrides
use crate::clock::{Clock, SystemClock};
use crate::codec::Codec;
use crate::errors::{CacheError, Result};
use memoria_utils::StatsCollector;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Base directory override
pub const ENV_CACHE_DIR: &str = "MEMORIA_CACHE_DIR";

/// Disable every cache handle (`1`, `true`, `yes` or `on`)
pub const ENV_CACHE_DISABLED: &str = "MEMORIA_CACHE_DISABLED";

/// Default per-shard engine map size (1 GiB)
pub const DEFAULT_ENGINE_MAP_SIZE: usize = 1024 * 1024 * 1024;

/// Where a configuration's values came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    #[default]
    Default,
    Environment,
    Explicit,
}

/// Settings shared by a handle and every sub-cache created from it
#[derive(Clone)]
pub struct CacheConfig {
    /// Directory below which `.cache/` is created
    pub base_dir: PathBuf,
    /// Root namespace; derived from the constructing caller when absent
    pub name: Option<String>,
    /// Report every key as absent and ignore writes
    pub disabled: bool,
    /// Serialize operations through a reentrant lock
    pub thread_safe: bool,
    /// Engine backend fan-out, at least 1
    pub shards: u32,
    pub codec: Codec,
    /// Engine map size per shard in bytes
    pub engine_map_size: usize,
    /// Null backend only: keep entries in memory
    pub keep_in_memory: bool,
    /// Collector for exit statistics; `None` uses [`StatsCollector::global`]
    pub collector: Option<Arc<StatsCollector>>,
    pub clock: Arc<dyn Clock>,
    pub source: ConfigSource,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            base_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            name: None,
            disabled: false,
            thread_safe: false,
            shards: 1,
            codec: Codec::default(),
            engine_map_size: DEFAULT_ENGINE_MAP_SIZE,
            keep_in_memory: false,
            collector: None,
            clock: Arc::new(SystemClock),
            source: ConfigSource::Default,
        }
    }
}

impl CacheConfig {
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::new()
    }

    /// Defaults with `MEMORIA_CACHE_DIR` and `MEMORIA_CACHE_DISABLED` applied
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(dir) = std::env::var_os(ENV_CACHE_DIR).filter(|d| !d.is_empty()) {
            config.base_dir = PathBuf::from(dir);
            config.source = ConfigSource::Environment;
        }

        if let Some(disabled) = env_flag(ENV_CACHE_DISABLED) {
            config.disabled = disabled;
            config.source = ConfigSource::Environment;
        }

        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.shards == 0 {
            return Err(CacheError::configuration("shards must be at least 1"));
        }
        if self.engine_map_size == 0 {
            return Err(CacheError::configuration(
                "engine_map_size must be greater than zero",
            ));
        }
        Ok(())
    }

    /// The collector handles register with
    pub fn stats_collector(&self) -> Arc<StatsCollector> {
        self.collector.clone().unwrap_or_else(StatsCollector::global)
    }
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("base_dir", &self.base_dir)
            .field("name", &self.name)
            .field("disabled", &self.disabled)
            .field("thread_safe", &self.thread_safe)
            .field("shards", &self.shards)
            .field("codec", &self.codec)
            .field("engine_map_size", &self.engine_map_size)
            .field("keep_in_memory", &self.keep_in_memory)
            .field("collector", &self.collector.is_some())
            .field("clock", &self.clock)
            .field("source", &self.source)
            .finish()
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        other => {
            tracing::warn!(variable = name, value = other, "ignoring unrecognised flag value");
            None
        }
    }
}

/// Builder for [`CacheConfig`]; unset fields fall back to [`CacheConfig::from_env`]
#[derive(Default)]
pub struct CacheConfigBuilder {
    base_dir: Option<PathBuf>,
    name: Option<String>,
    disabled: Option<bool>,
    thread_safe: Option<bool>,
    shards: Option<u32>,
    codec: Option<Codec>,
    engine_map_size: Option<usize>,
    keep_in_memory: Option<bool>,
    collector: Option<Arc<StatsCollector>>,
    clock: Option<Arc<dyn Clock>>,
}

impl CacheConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }

    pub fn with_thread_safe(mut self, thread_safe: bool) -> Self {
        self.thread_safe = Some(thread_safe);
        self
    }

    pub fn with_shards(mut self, shards: u32) -> Self {
        self.shards = Some(shards);
        self
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn with_engine_map_size(mut self, bytes: usize) -> Self {
        self.engine_map_size = Some(bytes);
        self
    }

    pub fn with_keep_in_memory(mut self, keep: bool) -> Self {
        self.keep_in_memory = Some(keep);
        self
    }

    pub fn with_collector(mut self, collector: Arc<StatsCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn build(self) -> Result<CacheConfig> {
        let defaults = CacheConfig::from_env();
        let explicit = self.base_dir.is_some()
            || self.name.is_some()
            || self.disabled.is_some()
            || self.thread_safe.is_some()
            || self.shards.is_some()
            || self.codec.is_some()
            || self.engine_map_size.is_some()
            || self.keep_in_memory.is_some()
            || self.collector.is_some()
            || self.clock.is_some();

        let config = CacheConfig {
            base_dir: self.base_dir.unwrap_or(defaults.base_dir),
            name: self.name.or(defaults.name),
            disabled: self.disabled.unwrap_or(defaults.disabled),
            thread_safe: self.thread_safe.unwrap_or(defaults.thread_safe),
            shards: self.shards.unwrap_or(defaults.shards),
            codec: self.codec.unwrap_or(defaults.codec),
            engine_map_size: self.engine_map_size.unwrap_or(defaults.engine_map_size),
            keep_in_memory: self.keep_in_memory.unwrap_or(defaults.keep_in_memory),
            collector: self.collector.or(defaults.collector),
            clock: self.clock.unwrap_or(defaults.clock),
            source: if explicit {
                ConfigSource::Explicit
            } else {
                defaults.source
            },
        };

        config.validate()?;
        Ok(config)
    }
}
