//! Process-wide statistics collected at shutdown
//!
//! Long-lived components (cache handles, clients) register themselves as
//! [`Collectable`]s. When the process winds down, [`StatsCollector::emit_summary`]
//! logs every instance's counters and an aggregated report keyed by label,
//! with per-label sums and `avg_<field>` averages of the numeric fields.
//!
//! The collector is disabled by default; registration is skipped until
//! [`StatsCollector::enable`] is called.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// The single process-wide collector
static GLOBAL_COLLECTOR: Lazy<Arc<StatsCollector>> = Lazy::new(|| Arc::new(StatsCollector::new()));

/// A component that reports summary statistics at shutdown
pub trait Collectable: Send + Sync {
    /// Label used to group instances in the aggregated report
    fn label(&self) -> String;

    /// Current statistics; only numeric values are aggregated
    fn collect(&self) -> Map<String, Value>;
}

struct LiveEntry {
    id: u64,
    collectable: Weak<dyn Collectable>,
}

struct RetiredEntry {
    id: u64,
    label: String,
    data: Map<String, Value>,
}

#[derive(Default)]
struct Registry {
    live: Vec<LiveEntry>,
    retired: Vec<RetiredEntry>,
    next_id: u64,
}

/// Registry of collectables with an enable/disable/reset lifecycle
pub struct StatsCollector {
    enabled: AtomicBool,
    emitted: AtomicBool,
    registry: Mutex<Registry>,
}

impl StatsCollector {
    /// Create a standalone, disabled collector
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            emitted: AtomicBool::new(false),
            registry: Mutex::new(Registry::default()),
        }
    }

    /// The process-wide collector
    pub fn global() -> Arc<StatsCollector> {
        Arc::clone(&GLOBAL_COLLECTOR)
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Forget every registered collectable and allow the summary to be emitted again
    pub fn reset(&self) {
        let mut registry = self.registry.lock();
        registry.live.clear();
        registry.retired.clear();
        self.emitted.store(false, Ordering::SeqCst);
    }

    /// Register a collectable.
    ///
    /// Returns `None` while the collector is disabled. The returned
    /// [`Registration`] keeps the entry alive; dropping it retires a final
    /// snapshot so the component still shows up in the summary.
    pub fn register(self: &Arc<Self>, collectable: Arc<dyn Collectable>) -> Option<Registration> {
        if !self.is_enabled() {
            return None;
        }

        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.live.push(LiveEntry {
            id,
            collectable: Arc::downgrade(&collectable),
        });
        ::tracing::debug!(
            label = %collectable.label(),
            registered = registry.live.len() + registry.retired.len(),
            "registered collectable"
        );
        drop(registry);

        Some(Registration {
            id,
            collectable,
            collector: Arc::clone(self),
        })
    }

    /// Number of registered collectables, live or retired
    pub fn registered(&self) -> usize {
        let registry = self.registry.lock();
        registry.live.len() + registry.retired.len()
    }

    fn retire(&self, id: u64, collectable: &dyn Collectable) {
        let mut registry = self.registry.lock();
        let Some(pos) = registry.live.iter().position(|e| e.id == id) else {
            return;
        };
        registry.live.remove(pos);
        registry.retired.push(RetiredEntry {
            id,
            label: collectable.label(),
            data: collectable.collect(),
        });
    }

    /// Build the report without logging it.
    ///
    /// `None` when the collector is disabled or nothing was registered.
    pub fn summary(&self) -> Option<StatsSummary> {
        if !self.is_enabled() {
            return None;
        }

        let mut entries: Vec<(u64, InstanceReport)> = {
            let registry = self.registry.lock();
            let live = registry.live.iter().filter_map(|e| {
                e.collectable.upgrade().map(|c| {
                    (
                        e.id,
                        InstanceReport {
                            label: c.label(),
                            data: c.collect(),
                        },
                    )
                })
            });
            let retired = registry.retired.iter().map(|e| {
                (
                    e.id,
                    InstanceReport {
                        label: e.label.clone(),
                        data: e.data.clone(),
                    },
                )
            });
            live.chain(retired).collect()
        };

        if entries.is_empty() {
            return None;
        }
        entries.sort_by_key(|(id, _)| *id);

        let instances: Vec<InstanceReport> = entries.into_iter().map(|(_, r)| r).collect();
        let aggregated = aggregate(&instances);
        Some(StatsSummary {
            instances,
            aggregated,
        })
    }

    /// Log the summary once.
    ///
    /// Subsequent calls return `None` until [`reset`](Self::reset). Nothing is
    /// logged, and the summary is not marked as emitted, when no collectable
    /// has been registered.
    pub fn emit_summary(&self) -> Option<StatsSummary> {
        if !self.is_enabled() {
            return None;
        }

        let Some(summary) = self.summary() else {
            ::tracing::info!("no collectable registered, skipping exit statistics summary");
            return None;
        };

        if self.emitted.swap(true, Ordering::SeqCst) {
            return None;
        }

        ::tracing::info!("exit statistics: generating summary");
        for instance in &summary.instances {
            let data = pretty(&Value::Object(instance.data.clone()));
            ::tracing::info!("exit statistics for {}:\n{data}", instance.label);
        }
        ::tracing::info!("exit statistics aggregated summary:\n{summary}");
        ::tracing::info!("exit statistics: summary done");

        Some(summary)
    }

    /// Guard that emits the summary when dropped, typically held for the
    /// lifetime of `main`.
    pub fn summary_on_drop(self: &Arc<Self>) -> SummaryGuard {
        SummaryGuard {
            collector: Arc::clone(self),
        }
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StatsCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsCollector")
            .field("enabled", &self.is_enabled())
            .field("registered", &self.registered())
            .finish()
    }
}

/// Keeps a collectable registered; retires it on drop
pub struct Registration {
    id: u64,
    collectable: Arc<dyn Collectable>,
    collector: Arc<StatsCollector>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.collector.retire(self.id, self.collectable.as_ref());
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("label", &self.collectable.label())
            .finish()
    }
}

/// Emits the collector summary when dropped
#[must_use = "the summary is emitted when the guard is dropped"]
pub struct SummaryGuard {
    collector: Arc<StatsCollector>,
}

impl Drop for SummaryGuard {
    fn drop(&mut self) {
        self.collector.emit_summary();
    }
}

/// Statistics of one registered instance
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceReport {
    pub label: String,
    pub data: Map<String, Value>,
}

/// Aggregated report over every registered instance
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSummary {
    /// Per-instance data in registration order
    pub instances: Vec<InstanceReport>,
    /// Per-label `instances` count, numeric sums and `avg_<field>` averages
    pub aggregated: BTreeMap<String, Map<String, Value>>,
}

impl StatsSummary {
    /// Aggregated value of `field` for `label`
    pub fn field(&self, label: &str, field: &str) -> Option<&Value> {
        self.aggregated.get(label).and_then(|m| m.get(field))
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let as_value = Value::Object(
            self.aggregated
                .iter()
                .map(|(k, v)| (k.clone(), Value::Object(v.clone())))
                .collect(),
        );
        f.write_str(&pretty(&as_value))
    }
}

#[derive(Default)]
struct FieldTotal {
    sum: f64,
    integral: bool,
}

fn aggregate(instances: &[InstanceReport]) -> BTreeMap<String, Map<String, Value>> {
    let mut grouped: BTreeMap<String, (u64, Vec<(String, FieldTotal)>)> = BTreeMap::new();

    for instance in instances {
        let (count, totals) = grouped.entry(instance.label.clone()).or_default();
        *count += 1;
        for (field, value) in &instance.data {
            let Value::Number(number) = value else {
                continue;
            };
            let Some(amount) = number.as_f64() else {
                continue;
            };
            let integral = number.is_i64() || number.is_u64();
            match totals.iter_mut().find(|(name, _)| name == field) {
                Some((_, total)) => {
                    total.sum += amount;
                    total.integral &= integral;
                }
                None => totals.push((
                    field.clone(),
                    FieldTotal {
                        sum: amount,
                        integral,
                    },
                )),
            }
        }
    }

    grouped
        .into_iter()
        .map(|(label, (count, totals))| {
            let mut report = Map::new();
            report.insert("instances".to_string(), Value::from(count));
            for (field, total) in &totals {
                let sum = if total.integral {
                    Value::from(total.sum as i64)
                } else {
                    Value::from(total.sum)
                };
                report.insert(field.clone(), sum);
            }
            for (field, total) in &totals {
                report.insert(format!("avg_{field}"), Value::from(total.sum / count as f64));
            }
            (label, report)
        })
        .collect()
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed {
        label: &'static str,
        data: Value,
    }

    impl Collectable for Fixed {
        fn label(&self) -> String {
            self.label.to_string()
        }

        fn collect(&self) -> Map<String, Value> {
            self.data.as_object().cloned().unwrap_or_default()
        }
    }

    fn fixed(label: &'static str, data: Value) -> Arc<dyn Collectable> {
        Arc::new(Fixed { label, data })
    }

    fn enabled_collector() -> Arc<StatsCollector> {
        let collector = Arc::new(StatsCollector::new());
        collector.enable();
        collector
    }

    #[test]
    fn test_register_skipped_when_disabled() {
        let collector = Arc::new(StatsCollector::new());

        let registration = collector.register(fixed("test", json!({"count": 5})));

        assert!(registration.is_none());
        assert_eq!(collector.registered(), 0);
        assert!(collector.summary().is_none());
    }

    #[test]
    fn test_register_multiple_collectables() {
        let collector = enabled_collector();

        let _a = collector.register(fixed("test1", json!({"count": 5})));
        let _b = collector.register(fixed("test2", json!({"count": 10})));

        assert_eq!(collector.registered(), 2);
    }

    #[test]
    fn test_reset_clears_registrations() {
        let collector = enabled_collector();
        let registration = collector.register(fixed("test1", json!({"count": 5})));

        collector.reset();
        drop(registration);

        assert_eq!(collector.registered(), 0);
        assert!(collector.summary().is_none());
    }

    #[test]
    fn test_summary_aggregates_same_label() {
        let collector = enabled_collector();
        let _a = collector.register(fixed("api_client", json!({"requests": 10, "errors": 2})));
        let _b = collector.register(fixed("api_client", json!({"requests": 15, "errors": 1})));

        let summary = collector.summary().unwrap();

        assert_eq!(summary.instances.len(), 2);
        assert_eq!(summary.field("api_client", "instances"), Some(&json!(2)));
        assert_eq!(summary.field("api_client", "requests"), Some(&json!(25)));
        assert_eq!(summary.field("api_client", "avg_requests"), Some(&json!(12.5)));
        assert_eq!(summary.field("api_client", "avg_errors"), Some(&json!(1.5)));
    }

    #[test]
    fn test_summary_ignores_non_numeric_values() {
        let collector = enabled_collector();
        let _a = collector.register(fixed(
            "service",
            json!({"count": 10, "message": "test message", "status": "active"}),
        ));

        let summary = collector.summary().unwrap();
        let report = &summary.aggregated["service"];

        assert_eq!(report.get("count"), Some(&json!(10)));
        assert!(report.get("message").is_none());
        assert!(report.get("avg_status").is_none());
        assert_eq!(summary.instances[0].data["status"], json!("active"));
    }

    #[test]
    fn test_summary_float_averages() {
        let collector = enabled_collector();
        let _a = collector.register(fixed("timer", json!({"duration": 1.5, "count": 3})));
        let _b = collector.register(fixed("timer", json!({"duration": 2.5, "count": 2})));

        let summary = collector.summary().unwrap();

        assert_eq!(summary.field("timer", "duration"), Some(&json!(4.0)));
        assert_eq!(summary.field("timer", "avg_duration"), Some(&json!(2.0)));
        assert_eq!(summary.field("timer", "avg_count"), Some(&json!(2.5)));
    }

    #[test]
    fn test_summary_keeps_labels_apart() {
        let collector = enabled_collector();
        let _a = collector.register(fixed("service_a", json!({"metric1": 100})));
        let _b = collector.register(fixed("service_b", json!({"metric2": 200})));
        let _c = collector.register(fixed("service_a", json!({"metric1": 50})));

        let summary = collector.summary().unwrap();

        assert_eq!(summary.aggregated.len(), 2);
        assert_eq!(summary.field("service_a", "instances"), Some(&json!(2)));
        assert_eq!(summary.field("service_a", "avg_metric1"), Some(&json!(75.0)));
        assert_eq!(summary.field("service_b", "metric2"), Some(&json!(200)));
    }

    #[test]
    fn test_dropped_registration_is_retired_not_lost() {
        let collector = enabled_collector();
        let registration = collector.register(fixed("calc", json!({"value": 10})));
        let _other = collector.register(fixed("calc", json!({"value": 30})));

        drop(registration);

        let summary = collector.summary().unwrap();
        assert_eq!(summary.field("calc", "instances"), Some(&json!(2)));
        assert_eq!(summary.field("calc", "avg_value"), Some(&json!(20.0)));
    }

    #[test]
    fn test_emit_summary_only_once() {
        let collector = enabled_collector();
        let _a = collector.register(fixed("calc", json!({"value": 10})));

        assert!(collector.emit_summary().is_some());
        assert!(collector.emit_summary().is_none());

        collector.reset();
        let _b = collector.register(fixed("calc", json!({"value": 20})));
        assert!(collector.emit_summary().is_some());
    }

    #[test]
    fn test_emit_summary_without_registrations() {
        let collector = enabled_collector();

        assert!(collector.emit_summary().is_none());

        let _a = collector.register(fixed("late", json!({"value": 1})));
        assert!(collector.emit_summary().is_some());
    }

    #[test]
    fn test_summary_guard_emits_on_drop() {
        let collector = enabled_collector();
        let _a = collector.register(fixed("guarded", json!({"value": 1})));

        {
            let _guard = collector.summary_on_drop();
        }

        assert!(collector.emit_summary().is_none());
    }

    #[test]
    fn test_summary_display_is_json() {
        let collector = enabled_collector();
        let _a = collector.register(fixed("calc", json!({"value": 10})));

        let rendered = collector.summary().unwrap().to_string();
        let parsed: Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(parsed["calc"]["instances"], json!(1));
        assert_eq!(parsed["calc"]["avg_value"], json!(10.0));
    }
}
