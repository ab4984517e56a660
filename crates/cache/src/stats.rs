//! Per-handle hit/miss statistics

use memoria_utils::Collectable;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Atomic counters owned by one cache handle
///
/// `hit` and `miss` move only on existence checks; the remaining counters
/// track writes, removals, expirations and legacy migrations.
#[derive(Debug, Default)]
pub struct CacheStats {
    hit: AtomicU64,
    miss: AtomicU64,
    writes: AtomicU64,
    removals: AtomicU64,
    expired: AtomicU64,
    migrated: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_lookup(&self, hit: bool) {
        let counter = if hit { &self.hit } else { &self.miss };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_removal(&self) {
        self.removals.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expired(&self) {
        self.expired.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_migrated(&self) {
        self.migrated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hit: self.hit.load(Ordering::Relaxed),
            miss: self.miss.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            migrated: self.migrated.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CacheStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStatsSnapshot {
    pub hit: u64,
    pub miss: u64,
    pub writes: u64,
    pub removals: u64,
    pub expired: u64,
    pub migrated: u64,
}

impl CacheStatsSnapshot {
    pub fn lookups(&self) -> u64 {
        self.hit + self.miss
    }

    /// Fraction of existence checks that found a live entry
    pub fn hit_rate(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            total => self.hit as f64 / total as f64,
        }
    }

    fn to_map(self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("hit".to_string(), self.hit.into());
        map.insert("miss".to_string(), self.miss.into());
        map.insert("writes".to_string(), self.writes.into());
        map.insert("removals".to_string(), self.removals.into());
        map.insert("expired".to_string(), self.expired.into());
        map.insert("migrated".to_string(), self.migrated.into());
        map
    }
}

/// Adapter registering a handle's counters with the exit statistics collector
pub(crate) struct StatsReporter {
    label: String,
    stats: Arc<CacheStats>,
}

impl StatsReporter {
    pub(crate) fn new(label: String, stats: Arc<CacheStats>) -> Self {
        Self { label, stats }
    }
}

impl Collectable for StatsReporter {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn collect(&self) -> Map<String, Value> {
        self.stats.snapshot().to_map()
    }
}
