//! Metric Sets
//!
//! Named, nestable groups of metrics that are flattened into the registry
//! under a prefix.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::registry::{self, Metric};
use crate::error::{Error, Result};

/// Entry of a metric set: a leaf metric or a nested set
#[derive(Clone)]
pub enum MetricSetEntry {
    Metric(Metric),
    Set(Arc<dyn MetricSet>),
}

impl From<Metric> for MetricSetEntry {
    fn from(metric: Metric) -> Self {
        MetricSetEntry::Metric(metric)
    }
}

impl std::fmt::Debug for MetricSetEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricSetEntry::Metric(m) => write!(f, "Metric({})", m.kind()),
            MetricSetEntry::Set(_) => write!(f, "Set(..)"),
        }
    }
}

/// A group of metrics keyed by relative name
pub trait MetricSet: Send + Sync {
    /// Current entries of the set
    fn metrics(&self) -> Vec<(String, MetricSetEntry)>;
}

/// General-purpose mutable metric set
#[derive(Default)]
pub struct MetricGroup {
    entries: RwLock<BTreeMap<String, MetricSetEntry>>,
}

impl MetricGroup {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a leaf metric, replacing any entry with the same key
    pub fn insert_metric(&self, key: impl Into<String>, metric: impl Into<Metric>) -> &Self {
        self.entries
            .write()
            .insert(key.into(), MetricSetEntry::Metric(metric.into()));
        self
    }

    /// Add a nested set, replacing any entry with the same key
    pub fn insert_set(&self, key: impl Into<String>, set: Arc<dyn MetricSet>) -> &Self {
        self.entries
            .write()
            .insert(key.into(), MetricSetEntry::Set(set));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl MetricSet for MetricGroup {
    fn metrics(&self) -> Vec<(String, MetricSetEntry)> {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Flatten `set` into `(prefix.path, metric)` leaves
///
/// Fails if the set reaches itself through its own entries.
pub fn flatten(prefix: &str, set: &dyn MetricSet) -> Result<Vec<(String, Metric)>> {
    let mut leaves = Vec::new();
    let mut path = Vec::new();
    walk(prefix, set, &mut path, &mut leaves)?;
    Ok(leaves)
}

fn walk(
    prefix: &str,
    set: &dyn MetricSet,
    path: &mut Vec<usize>,
    leaves: &mut Vec<(String, Metric)>,
) -> Result<()> {
    let id = set as *const dyn MetricSet as *const () as usize;
    if path.contains(&id) {
        return Err(Error::CyclicMetricSet {
            path: prefix.to_string(),
        });
    }

    path.push(id);
    for (key, entry) in set.metrics() {
        let name = registry::name(prefix, &[key.as_str()]);
        match entry {
            MetricSetEntry::Metric(metric) => leaves.push((name, metric)),
            MetricSetEntry::Set(nested) => walk(&name, &*nested, path, leaves)?,
        }
    }
    path.pop();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Counter;
    use assert_matches::assert_matches;

    #[test]
    fn test_flatten_nested() {
        let inner = MetricGroup::new();
        inner.insert_metric("b", Counter::new());
        let outer = MetricGroup::new();
        outer.insert_set("a", inner);

        let leaves = flatten("prefix", &*outer).unwrap();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].0, "prefix.a.b");
    }

    #[test]
    fn test_shared_set_is_not_a_cycle() {
        let shared = MetricGroup::new();
        shared.insert_metric("count", Counter::new());
        let outer = MetricGroup::new();
        outer.insert_set("left", shared.clone());
        outer.insert_set("right", shared);

        let names: Vec<_> = flatten("p", &*outer)
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["p.left.count", "p.right.count"]);
    }

    #[test]
    fn test_direct_cycle() {
        let group = MetricGroup::new();
        group.insert_set("me", group.clone());

        let err = flatten("loop", &*group).unwrap_err();
        assert_matches!(err, Error::CyclicMetricSet { path } if path == "loop.me");
    }

    #[test]
    fn test_transitive_cycle() {
        let a = MetricGroup::new();
        let b = MetricGroup::new();
        b.insert_metric("ok", Counter::new());
        a.insert_set("b", b.clone());
        b.insert_set("a", a.clone());

        assert_matches!(
            flatten("root", &*a),
            Err(Error::CyclicMetricSet { .. })
        );
    }
}
