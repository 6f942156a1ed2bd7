//! Metric Registry
//!
//! Mapping from dotted name to metric instance. The registry serializes its
//! own mutations; metric updates go straight to the (atomic) metric and never
//! touch the registry lock.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::counter::Counter;
use super::gauge::{Gauge, GaugeValue};
use super::histogram::Histogram;
use super::meter::Meter;
use super::set::{self, MetricSet};
use super::timer::Timer;
use crate::error::{Error, Result};

// =============================================================================
// Metric
// =============================================================================

/// A registered metric of any variant
#[derive(Debug, Clone)]
pub enum Metric {
    Gauge(Arc<Gauge>),
    Counter(Arc<Counter>),
    Meter(Arc<Meter>),
    Histogram(Arc<Histogram>),
    Timer(Arc<Timer>),
}

impl Metric {
    /// Lowercase variant name
    pub fn kind(&self) -> &'static str {
        match self {
            Metric::Gauge(_) => "gauge",
            Metric::Counter(_) => "counter",
            Metric::Meter(_) => "meter",
            Metric::Histogram(_) => "histogram",
            Metric::Timer(_) => "timer",
        }
    }
}

macro_rules! metric_from {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Metric {
                fn from(metric: $variant) -> Self {
                    Metric::$variant(Arc::new(metric))
                }
            }

            impl From<Arc<$variant>> for Metric {
                fn from(metric: Arc<$variant>) -> Self {
                    Metric::$variant(metric)
                }
            }
        )*
    };
}

metric_from!(Gauge, Counter, Meter, Histogram, Timer);

// =============================================================================
// Names
// =============================================================================

/// Join `base` and `parts` with dots, skipping empty segments
pub fn name(base: &str, parts: &[&str]) -> String {
    let mut out = String::from(base);
    for part in parts.iter().filter(|p| !p.is_empty()) {
        if !out.is_empty() {
            out.push('.');
        }
        out.push_str(part);
    }
    out
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.starts_with('.') || name.ends_with('.') || name.contains("..") {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}

// =============================================================================
// Registry
// =============================================================================

/// Named metrics, unique per name
#[derive(Default)]
pub struct MetricRegistry {
    metrics: RwLock<BTreeMap<String, Metric>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `metric` under `name`
    ///
    /// Fails with [`Error::DuplicateName`] if the name is taken; the existing
    /// registration is left untouched.
    pub fn register(&self, name: impl Into<String>, metric: impl Into<Metric>) -> Result<()> {
        let name = name.into();
        validate_name(&name)?;
        let metric = metric.into();

        let mut metrics = self.metrics.write();
        if metrics.contains_key(&name) {
            return Err(Error::DuplicateName { name });
        }
        debug!(name = %name, kind = metric.kind(), "Registered metric");
        metrics.insert(name, metric);
        Ok(())
    }

    /// Register every leaf of `set` as `prefix.<path>`
    ///
    /// All-or-nothing: on a cycle or any name collision nothing is registered.
    pub fn register_all(&self, prefix: &str, set: &dyn MetricSet) -> Result<()> {
        let leaves = set::flatten(prefix, set)?;
        for (name, _) in &leaves {
            validate_name(name)?;
        }

        let mut metrics = self.metrics.write();
        let mut seen = std::collections::HashSet::with_capacity(leaves.len());
        for (name, _) in &leaves {
            if metrics.contains_key(name) || !seen.insert(name.as_str()) {
                return Err(Error::DuplicateName { name: name.clone() });
            }
        }

        debug!(prefix = %prefix, count = leaves.len(), "Registered metric set");
        for (name, metric) in leaves {
            metrics.insert(name, metric);
        }
        Ok(())
    }

    /// Look up a metric
    pub fn get(&self, name: &str) -> Result<Metric> {
        self.metrics
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                name: name.to_string(),
            })
    }

    /// Remove a metric, returning whether it existed
    pub fn remove(&self, name: &str) -> bool {
        self.metrics.write().remove(name).is_some()
    }

    /// Point-in-time copy of all entries, sorted by name
    ///
    /// Only clones handles under a short read lock; reading values happens
    /// outside the lock.
    pub fn snapshot(&self) -> Vec<(String, Metric)> {
        self.metrics
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.metrics.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.read().is_empty()
    }

    // =========================================================================
    // Get-or-create
    // =========================================================================

    /// Get or create a counter
    pub fn counter(&self, name: &str) -> Result<Arc<Counter>> {
        self.get_or_add(name, "counter", Counter::new, |m| match m {
            Metric::Counter(c) => Some(Arc::clone(c)),
            _ => None,
        })
    }

    /// Get or create a meter
    pub fn meter(&self, name: &str) -> Result<Arc<Meter>> {
        self.get_or_add(name, "meter", Meter::new, |m| match m {
            Metric::Meter(c) => Some(Arc::clone(c)),
            _ => None,
        })
    }

    /// Get or create a histogram
    pub fn histogram(&self, name: &str) -> Result<Arc<Histogram>> {
        self.get_or_add(name, "histogram", Histogram::new, |m| match m {
            Metric::Histogram(c) => Some(Arc::clone(c)),
            _ => None,
        })
    }

    /// Get or create a timer
    pub fn timer(&self, name: &str) -> Result<Arc<Timer>> {
        self.get_or_add(name, "timer", Timer::new, |m| match m {
            Metric::Timer(c) => Some(Arc::clone(c)),
            _ => None,
        })
    }

    /// Register a gauge backed by `read`
    pub fn gauge<F, V>(&self, name: &str, read: F) -> Result<Arc<Gauge>>
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<GaugeValue>,
    {
        let gauge = Arc::new(Gauge::from_fn(read));
        self.register(name, Arc::clone(&gauge))?;
        Ok(gauge)
    }

    fn get_or_add<T, B, E>(
        &self,
        name: &str,
        expected: &'static str,
        build: B,
        extract: E,
    ) -> Result<Arc<T>>
    where
        T: Into<Metric>,
        B: FnOnce() -> T,
        E: Fn(&Metric) -> Option<Arc<T>>,
    {
        let metrics = self.metrics.read();
        if let Some(existing) = metrics.get(name) {
            return extract(existing).ok_or_else(|| Error::TypeMismatch {
                name: name.to_string(),
                expected,
                actual: existing.kind(),
            });
        }
        drop(metrics);

        validate_name(name)?;
        let mut metrics = self.metrics.write();
        let entry = metrics
            .entry(name.to_string())
            .or_insert_with(|| build().into());
        extract(entry).ok_or_else(|| Error::TypeMismatch {
            name: name.to_string(),
            expected,
            actual: entry.kind(),
        })
    }
}

impl fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("metrics", &self.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricGroup;
    use assert_matches::assert_matches;

    #[test]
    fn test_name_helper() {
        assert_eq!(name("jobs", &["completed", "acme"]), "jobs.completed.acme");
        assert_eq!(name("", &["requests"]), "requests");
        assert_eq!(name("a", &["", "b"]), "a.b");
    }

    #[test]
    fn test_register_and_get() {
        let registry = MetricRegistry::new();
        registry.register("requests", Counter::new()).unwrap();

        let metric = registry.get("requests").unwrap();
        assert_eq!(metric.kind(), "counter");
        assert_matches!(registry.get("missing"), Err(Error::NotFound { .. }));
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let registry = MetricRegistry::new();
        let first = Arc::new(Counter::new());
        first.inc_by(7);
        registry.register("jobs", Arc::clone(&first)).unwrap();

        let err = registry.register("jobs", Meter::new()).unwrap_err();
        assert_matches!(err, Error::DuplicateName { name } if name == "jobs");

        assert_eq!(registry.len(), 1);
        match registry.get("jobs").unwrap() {
            Metric::Counter(c) => assert_eq!(c.count(), 7),
            other => panic!("unexpected {}", other.kind()),
        }
    }

    #[test]
    fn test_invalid_names() {
        let registry = MetricRegistry::new();
        for bad in ["", ".a", "a.", "a..b"] {
            assert_matches!(
                registry.register(bad, Counter::new()),
                Err(Error::InvalidName(_))
            );
        }
    }

    #[test]
    fn test_register_all_nested() {
        let registry = MetricRegistry::new();
        let inner = MetricGroup::new();
        inner.insert_metric("b", Counter::new());
        let outer = MetricGroup::new();
        outer.insert_set("a", inner);

        registry.register_all("prefix", &*outer).unwrap();
        assert_eq!(registry.names(), vec!["prefix.a.b".to_string()]);
    }

    #[test]
    fn test_register_all_is_atomic() {
        let registry = MetricRegistry::new();
        registry.register("p.b", Counter::new()).unwrap();

        let group = MetricGroup::new();
        group.insert_metric("a", Counter::new());
        group.insert_metric("b", Counter::new());

        assert_matches!(
            registry.register_all("p", &*group),
            Err(Error::DuplicateName { name }) if name == "p.b"
        );
        assert_eq!(registry.names(), vec!["p.b".to_string()]);
    }

    #[test]
    fn test_register_all_rejects_cycles() {
        let registry = MetricRegistry::new();
        let group = MetricGroup::new();
        group.insert_metric("ok", Counter::new());
        group.insert_set("again", group.clone());

        assert_matches!(
            registry.register_all("c", &*group),
            Err(Error::CyclicMetricSet { .. })
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_get_or_create() {
        let registry = MetricRegistry::new();
        let c1 = registry.counter("test").unwrap();
        let c2 = registry.counter("test").unwrap();
        c1.inc();
        assert_eq!(c2.count(), 1);

        assert_matches!(
            registry.meter("test"),
            Err(Error::TypeMismatch { expected: "meter", actual: "counter", .. })
        );
    }

    #[test]
    fn test_snapshot_is_sorted_and_detached() {
        let registry = MetricRegistry::new();
        registry.counter("b").unwrap();
        registry.counter("a").unwrap();

        let snapshot = registry.snapshot();
        registry.counter("c").unwrap();

        let names: Vec<_> = snapshot.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_remove() {
        let registry = MetricRegistry::new();
        registry.gauge("answer", || 42).unwrap();
        assert!(registry.remove("answer"));
        assert!(!registry.remove("answer"));
    }
}
