//! Throughput of the cache contract across storage backends
//!
//! Measures set, get and exists for each backend, with and without the
//! operation lock, and the engine backend over several shard counts.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use memoria_cache::{
    CacheConfig, CacheEngine, CacheHandle, EngineBackend, FlatFileBackend, SingleFileBackend,
    StatsCollector, StorageBackend,
};
use std::sync::Arc;
use tempfile::TempDir;

const KEYS: usize = 256;
const MAP_SIZE: usize = 64 * 1024 * 1024;

fn payload() -> String {
    "The quick brown fox jumps over the lazy dog. ".repeat(20)
}

fn keys() -> Vec<String> {
    (0..KEYS).map(|i| format!("bench_{i:04}")).collect()
}

fn config(temp_dir: &TempDir, thread_safe: bool, shards: u32) -> CacheConfig {
    CacheConfig {
        base_dir: temp_dir.path().to_path_buf(),
        name: Some("bench".to_string()),
        thread_safe,
        shards,
        engine_map_size: MAP_SIZE,
        collector: Some(Arc::new(StatsCollector::new())),
        ..CacheConfig::default()
    }
}

fn open<B: StorageBackend>(config: CacheConfig) -> CacheHandle<B> {
    CacheHandle::with_config(config).unwrap()
}

fn bench_backend<B: StorageBackend>(c: &mut Criterion, name: &str, thread_safe: bool, shards: u32) {
    let temp_dir = TempDir::new().unwrap();
    let cache: CacheHandle<B> = open(config(&temp_dir, thread_safe, shards));
    let keys = keys();
    let value = payload();
    let id = format!("{name}/safe={thread_safe}/shards={shards}");

    let mut group = c.benchmark_group("cache_operations");
    group.throughput(Throughput::Elements(KEYS as u64));

    group.bench_function(BenchmarkId::new("set", &id), |b| {
        b.iter(|| {
            for key in &keys {
                cache.set(key, &value, Some(3600)).unwrap();
            }
        });
    });

    group.bench_function(BenchmarkId::new("get", &id), |b| {
        b.iter(|| {
            for key in &keys {
                let value: String = cache.get(key).unwrap();
                black_box(value);
            }
        });
    });

    group.bench_function(BenchmarkId::new("exists", &id), |b| {
        b.iter(|| {
            for key in &keys {
                black_box(cache.exists(key).unwrap());
            }
        });
    });

    group.finish();
}

fn bench_flat_file(c: &mut Criterion) {
    bench_backend::<FlatFileBackend>(c, "flat_file", false, 1);
    bench_backend::<FlatFileBackend>(c, "flat_file", true, 1);
}

fn bench_single_file(c: &mut Criterion) {
    bench_backend::<SingleFileBackend>(c, "single_file", false, 1);
    bench_backend::<SingleFileBackend>(c, "single_file", true, 1);
}

fn bench_engine(c: &mut Criterion) {
    for shards in [1, 4, 16] {
        bench_backend::<EngineBackend>(c, "engine", false, shards);
    }
    bench_backend::<EngineBackend>(c, "engine", true, 4);
}

criterion_group!(benches, bench_flat_file, bench_single_file, bench_engine);
criterion_main!(benches);
