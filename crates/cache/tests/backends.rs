//! Behaviour shared by every persistent backend, exercised through the public API

use memoria_cache::{
    create_cache_key, CacheConfig, CacheEngine, CacheError, CacheHandle, Codec, EngineBackend,
    FlatFileBackend, ManualClock, NullBackend, SingleFileBackend, StatsCollector, StorageBackend,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use tempfile::TempDir;

const TEST_MAP_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Summary {
    title: String,
    sentences: Vec<String>,
}

fn summary() -> Summary {
    Summary {
        title: "release notes".to_string(),
        sentences: vec!["faster startup".to_string(), "fewer allocations".to_string()],
    }
}

fn config(temp_dir: &TempDir, name: &str) -> CacheConfig {
    CacheConfig {
        base_dir: temp_dir.path().to_path_buf(),
        name: Some(name.to_string()),
        engine_map_size: TEST_MAP_SIZE,
        collector: Some(Arc::new(StatsCollector::new())),
        ..CacheConfig::default()
    }
}

fn open<B: StorageBackend>(config: &CacheConfig) -> CacheHandle<B> {
    CacheHandle::with_config(config.clone()).unwrap()
}

fn assert_survives_reopen<B: StorageBackend>(config: CacheConfig) {
    let first: CacheHandle<B> = open(&config);
    first.set("summary_abc", &summary(), None).unwrap();
    first.set("count", &42u64, Some(3600)).unwrap();
    first.persist().unwrap();

    let second: CacheHandle<B> = open(&config);
    assert!(second.exists("summary_abc").unwrap());
    assert_eq!(second.get::<Summary>("summary_abc").unwrap(), summary());
    assert_eq!(second.get::<u64>("count").unwrap(), 42);
    assert_eq!(first.cache_location(), second.cache_location());
}

#[test]
fn test_flat_file_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    assert_survives_reopen::<FlatFileBackend>(config(&temp_dir, "flat"));
}

#[test]
fn test_single_file_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    assert_survives_reopen::<SingleFileBackend>(config(&temp_dir, "single"));
}

#[test]
fn test_single_file_per_operation_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    assert_survives_reopen::<SingleFileBackend>(CacheConfig {
        thread_safe: true,
        ..config(&temp_dir, "single_safe")
    });
}

#[test]
fn test_engine_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    assert_survives_reopen::<EngineBackend>(config(&temp_dir, "engine"));
}

#[test]
fn test_sharded_engine_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    assert_survives_reopen::<EngineBackend>(CacheConfig {
        shards: 4,
        ..config(&temp_dir, "sharded")
    });
}

#[test]
fn test_json_values_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let config = CacheConfig {
        codec: Codec::Json,
        ..config(&temp_dir, "documents")
    };

    let cache: CacheHandle<EngineBackend> = open(&config);
    cache.set("k1", &json!({"a": 1}), None).unwrap();
    assert!(cache.exists("k1").unwrap());
    cache.persist().unwrap();

    let reopened: CacheHandle<EngineBackend> = open(&config);
    assert_eq!(reopened.get::<Value>("k1").unwrap(), json!({"a": 1}));

    reopened.unset("k1").unwrap();
    assert!(!reopened.exists("k1").unwrap());
    assert!(matches!(
        reopened.get::<Value>("k1"),
        Err(CacheError::EntryNotFound { .. })
    ));
}

fn assert_ttl_boundary<B: StorageBackend>(config: CacheConfig) {
    let clock = ManualClock::new(1_000);
    let cache: CacheHandle<B> = open(&CacheConfig {
        clock: Arc::new(clock.clone()),
        ..config
    });

    cache.set("short", "lived", Some(2)).unwrap();
    cache.set("forever", "lived", None).unwrap();

    clock.set(1_001);
    assert!(cache.exists("short").unwrap());

    clock.set(1_002);
    assert!(!cache.exists("short").unwrap());
    assert!(cache.backend().is_some_and(|b| !b.contains("short").unwrap()));

    clock.advance(1_000_000);
    assert_eq!(cache.get::<String>("forever").unwrap(), "lived");

    let stats = cache.stats();
    assert_eq!(stats.expired, 1);
    assert_eq!(stats.writes, 2);
}

#[test]
fn test_engine_ttl_boundary() {
    let temp_dir = TempDir::new().unwrap();
    assert_ttl_boundary::<EngineBackend>(config(&temp_dir, "ttl"));
}

#[test]
fn test_single_file_ttl_boundary() {
    let temp_dir = TempDir::new().unwrap();
    assert_ttl_boundary::<SingleFileBackend>(config(&temp_dir, "ttl"));
}

fn assert_namespaces_isolated<B: StorageBackend>(config: CacheConfig) {
    let parent: CacheHandle<B> = open(&config);
    let child = parent.sub_cacher(None).unwrap();
    let sibling = parent.sub_cacher(Some("other")).unwrap();

    assert_eq!(child.namespace().name(), format!("{}/backends", parent.namespace().name()));
    assert_eq!(
        sibling.namespace().name(),
        format!("{}/backends__other", parent.namespace().name())
    );

    parent.set("k", "parent", None).unwrap();
    child.set("k", "child", None).unwrap();

    assert_eq!(parent.get::<String>("k").unwrap(), "parent");
    assert_eq!(child.get::<String>("k").unwrap(), "child");
    assert!(!sibling.exists("k").unwrap());

    child.unset("k").unwrap();
    assert!(parent.exists("k").unwrap());
}

#[test]
fn test_flat_file_namespaces_isolated() {
    let temp_dir = TempDir::new().unwrap();
    assert_namespaces_isolated::<FlatFileBackend>(config(&temp_dir, "ns"));
}

#[test]
fn test_single_file_namespaces_isolated() {
    let temp_dir = TempDir::new().unwrap();
    assert_namespaces_isolated::<SingleFileBackend>(config(&temp_dir, "ns"));
}

#[test]
fn test_engine_namespaces_isolated() {
    let temp_dir = TempDir::new().unwrap();
    assert_namespaces_isolated::<EngineBackend>(CacheConfig {
        shards: 2,
        ..config(&temp_dir, "ns")
    });
}

fn assert_concurrent_writers<B: StorageBackend>(config: CacheConfig) {
    const THREADS: usize = 6;
    const WRITES: usize = 15;
    const KEY: &str = "shared";

    let cache: CacheHandle<B> = open(&CacheConfig {
        thread_safe: true,
        ..config
    });
    let barrier = Barrier::new(THREADS);
    let written = Mutex::new(HashSet::new());

    thread::scope(|scope| {
        for t in 0..THREADS {
            let cache = &cache;
            let barrier = &barrier;
            let written = &written;
            scope.spawn(move || {
                barrier.wait();
                for i in 0..WRITES {
                    let value = t * WRITES + i;
                    written.lock().unwrap().insert(value);
                    cache.set(KEY, &value, None).unwrap();

                    assert!(cache.exists(KEY).unwrap());
                    let seen: usize = cache.get(KEY).unwrap();
                    assert!(written.lock().unwrap().contains(&seen), "read unwritten value {seen}");
                }
            });
        }
    });

    let last: usize = cache.get(KEY).unwrap();
    assert!(written.lock().unwrap().contains(&last));

    let stats = cache.stats();
    assert_eq!(stats.writes, (THREADS * WRITES) as u64);
    assert_eq!(stats.hit, (THREADS * WRITES) as u64);
}

#[test]
fn test_flat_file_concurrent_writers() {
    let temp_dir = TempDir::new().unwrap();
    assert_concurrent_writers::<FlatFileBackend>(config(&temp_dir, "concurrent"));
}

#[test]
fn test_single_file_concurrent_writers() {
    let temp_dir = TempDir::new().unwrap();
    assert_concurrent_writers::<SingleFileBackend>(config(&temp_dir, "concurrent"));
}

#[test]
fn test_engine_concurrent_writers() {
    let temp_dir = TempDir::new().unwrap();
    assert_concurrent_writers::<EngineBackend>(CacheConfig {
        shards: 3,
        ..config(&temp_dir, "concurrent")
    });
}

fn assert_legacy_migrated<B: StorageBackend>(config: CacheConfig) {
    let clock = ManualClock::new(500);
    let cache: CacheHandle<B> = open(&CacheConfig {
        clock: Arc::new(clock.clone()),
        ..config
    });
    let backend = cache.backend().unwrap();

    backend
        .store("old", &Codec::Bincode.encode(&summary()).unwrap())
        .unwrap();

    assert_eq!(cache.get::<Summary>("old").unwrap(), summary());
    assert_eq!(&backend.load("old").unwrap().unwrap()[..4], b"MEMO");
    assert_eq!(cache.stats().migrated, 1);

    clock.advance(1_000_000);
    assert_eq!(cache.get::<Summary>("old").unwrap(), summary());
    assert_eq!(cache.stats().migrated, 1);
}

#[test]
fn test_single_file_legacy_entry_migrated() {
    let temp_dir = TempDir::new().unwrap();
    assert_legacy_migrated::<SingleFileBackend>(config(&temp_dir, "legacy"));
}

#[test]
fn test_engine_legacy_entry_migrated() {
    let temp_dir = TempDir::new().unwrap();
    assert_legacy_migrated::<EngineBackend>(CacheConfig {
        shards: 2,
        ..config(&temp_dir, "legacy")
    });
}

fn assert_path_like_keys<B: StorageBackend>(config: CacheConfig) {
    let cache: CacheHandle<B> = open(&config);
    let model_key = create_cache_key(["openai/gpt-4o", "summary"], "prompt text", false).unwrap();
    let long_key = format!("{model_key}_{}", "x".repeat(600));

    for key in [model_key.as_str(), long_key.as_str()] {
        cache.set(key, &summary(), Some(3600)).unwrap();
        assert!(cache.exists(key).unwrap());
        assert_eq!(cache.get::<Summary>(key).unwrap(), summary());
    }

    cache.unset(&model_key).unwrap();
    assert!(!cache.exists(&model_key).unwrap());
    assert!(cache.exists(&long_key).unwrap());
    assert_eq!(cache.stats().removals, 1);
}

#[test]
fn test_flat_file_path_like_keys() {
    let temp_dir = TempDir::new().unwrap();
    assert_path_like_keys::<FlatFileBackend>(config(&temp_dir, "keys"));
}

#[test]
fn test_single_file_path_like_keys() {
    let temp_dir = TempDir::new().unwrap();
    assert_path_like_keys::<SingleFileBackend>(config(&temp_dir, "keys"));
}

#[test]
fn test_engine_path_like_keys() {
    let temp_dir = TempDir::new().unwrap();
    assert_path_like_keys::<EngineBackend>(config(&temp_dir, "keys"));
}

#[test]
fn test_null_backend_path_like_keys() {
    let temp_dir = TempDir::new().unwrap();
    assert_path_like_keys::<NullBackend>(CacheConfig {
        keep_in_memory: true,
        ..config(&temp_dir, "keys")
    });
}
