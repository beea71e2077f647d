//! Hierarchical execution metrics shared with the native engine
//!
//! A [`MetricNode`] is built once per plan node before native execution
//! starts. Its children mirror the plan's children in order, and the shape
//! never changes afterwards. Only counter values move, through atomic adds,
//! so the native side can report progress while the host thread pulls rows.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{KilnError, KilnResult};
use crate::metrics::{NATIVE_OPERATOR_METRICS, UNKNOWN_METRIC_UPDATES};

/// How a counter value is interpreted by the metrics sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Plain event count (rows, batches).
    Count,
    /// Elapsed time in nanoseconds.
    Timing,
}

impl MetricKind {
    /// Value of the `kind` label on exported metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Timing => "timing_ns",
        }
    }
}

/// Counters attached to the root of every native subtree.
///
/// The names must match what the native engine reports.
pub const DEFAULT_NATIVE_METRICS: [(&str, MetricKind); 6] = [
    ("output_rows", MetricKind::Count),
    ("output_batches", MetricKind::Count),
    ("input_rows", MetricKind::Count),
    ("input_batches", MetricKind::Count),
    ("elapsed_compute", MetricKind::Timing),
    ("join_time", MetricKind::Timing),
];

#[derive(Debug)]
struct MetricValue {
    kind: MetricKind,
    value: AtomicU64,
}

/// One node of the metric tree.
#[derive(Debug)]
pub struct MetricNode {
    values: HashMap<String, MetricValue>,
    children: Vec<Arc<MetricNode>>,
    exported: AtomicBool,
}

impl MetricNode {
    /// Create a node with the given counters, all starting at zero.
    pub fn new<I, S>(metrics: I, children: Vec<Arc<MetricNode>>) -> Self
    where
        I: IntoIterator<Item = (S, MetricKind)>,
        S: Into<String>,
    {
        let values = metrics
            .into_iter()
            .map(|(name, kind)| {
                (
                    name.into(),
                    MetricValue {
                        kind,
                        value: AtomicU64::new(0),
                    },
                )
            })
            .collect();

        Self {
            values,
            children,
            exported: AtomicBool::new(false),
        }
    }

    /// Create a native subtree root carrying [`DEFAULT_NATIVE_METRICS`].
    pub fn native_root(children: Vec<Arc<MetricNode>>) -> Self {
        Self::new(DEFAULT_NATIVE_METRICS, children)
    }

    /// Node with no counters and no children.
    pub fn empty() -> Self {
        Self {
            values: HashMap::new(),
            children: Vec::new(),
            exported: AtomicBool::new(false),
        }
    }

    /// Add `delta` to the named counter.
    ///
    /// Unknown names are dropped with a warning; metrics never fail a task.
    /// Returns whether the update was applied.
    pub fn add(&self, name: &str, delta: u64) -> bool {
        match self.values.get(name) {
            Some(metric) => {
                metric.value.fetch_add(delta, Ordering::Relaxed);
                true
            }
            None => {
                warn!(metric = name, delta, "Dropping update for unknown metric");
                UNKNOWN_METRIC_UPDATES.inc();
                false
            }
        }
    }

    /// Current value of the named counter.
    pub fn value(&self, name: &str) -> Option<u64> {
        self.values
            .get(name)
            .map(|metric| metric.value.load(Ordering::Relaxed))
    }

    /// Kind of the named counter.
    pub fn kind(&self, name: &str) -> Option<MetricKind> {
        self.values.get(name).map(|metric| metric.kind)
    }

    pub fn num_children(&self) -> usize {
        self.children.len()
    }

    /// Child at `index`, in plan child order.
    pub fn try_child(&self, index: usize) -> KilnResult<&Arc<MetricNode>> {
        self.children
            .get(index)
            .ok_or(KilnError::MetricTreeShapeMismatch {
                index,
                len: self.children.len(),
            })
    }

    /// Child at `index`, in plan child order.
    ///
    /// # Panics
    ///
    /// Panics when `index` is out of range. The tree is built to mirror the
    /// plan, so a miss means the two shapes diverged.
    pub fn child(&self, index: usize) -> &Arc<MetricNode> {
        match self.try_child(index) {
            Ok(child) => child,
            Err(err) => panic!("{err}"),
        }
    }

    /// Apply an update addressed by a child index path from this node.
    ///
    /// An empty path targets this node. Returns whether the counter existed.
    pub fn apply(&self, path: &[usize], name: &str, delta: u64) -> KilnResult<bool> {
        let mut node = self;
        for &index in path {
            node = node.try_child(index)?.as_ref();
        }
        Ok(node.add(name, delta))
    }

    /// Point-in-time copy of every value in the subtree.
    pub fn snapshot(&self) -> MetricSnapshot {
        MetricSnapshot {
            values: self
                .values
                .iter()
                .map(|(name, metric)| (name.clone(), metric.value.load(Ordering::Relaxed)))
                .collect(),
            children: self.children.iter().map(|child| child.snapshot()).collect(),
        }
    }

    /// Record every value in the subtree into the process metrics registry.
    ///
    /// Values are added to process-wide counters, so each node is exported
    /// at most once; later calls skip nodes already exported and return
    /// false for them. Run it when the owning task has finished. Children are
    /// labelled `<node_name>/<index>` recursively.
    pub fn export(&self, node_name: &str) -> bool {
        let first = self
            .exported
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            for (name, metric) in &self.values {
                let value = metric.value.load(Ordering::Relaxed);
                if value > 0 {
                    NATIVE_OPERATOR_METRICS
                        .with_label_values(&[node_name, name.as_str(), metric.kind.as_str()])
                        .inc_by(value);
                }
            }
        } else {
            debug!(node = node_name, "Metric node already exported");
        }
        for (index, child) in self.children.iter().enumerate() {
            child.export(&format!("{node_name}/{index}"));
        }
        first
    }
}

/// Serializable copy of a metric subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub values: BTreeMap<String, u64>,
    pub children: Vec<MetricSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn two_level_tree() -> MetricNode {
        let scan = Arc::new(MetricNode::new([("output_rows", MetricKind::Count)], vec![]));
        let filter = Arc::new(MetricNode::new(
            [("output_rows", MetricKind::Count)],
            vec![Arc::clone(&scan)],
        ));
        MetricNode::native_root(vec![filter])
    }

    #[test]
    fn test_native_root_has_default_counters() {
        let root = MetricNode::native_root(vec![]);
        for (name, kind) in DEFAULT_NATIVE_METRICS {
            assert_eq!(root.value(name), Some(0));
            assert_eq!(root.kind(name), Some(kind));
        }
        assert_eq!(root.kind("elapsed_compute"), Some(MetricKind::Timing));
        assert_eq!(root.num_children(), 0);
    }

    #[test]
    fn test_add_known_metric() {
        let root = MetricNode::native_root(vec![]);
        assert!(root.add("output_rows", 5));

        assert_eq!(root.value("output_rows"), Some(5));
        for (name, _) in DEFAULT_NATIVE_METRICS {
            if name != "output_rows" {
                assert_eq!(root.value(name), Some(0), "{name} should be untouched");
            }
        }
    }

    #[test]
    fn test_add_unknown_metric_is_dropped() {
        let root = MetricNode::native_root(vec![]);
        assert!(!root.add("nonexistent", 5));

        assert_eq!(root.value("nonexistent"), None);
        for (name, _) in DEFAULT_NATIVE_METRICS {
            assert_eq!(root.value(name), Some(0));
        }
    }

    #[test]
    fn test_child_identity_is_stable() {
        let root = two_level_tree();
        let first = Arc::clone(root.child(0));
        let second = Arc::clone(root.child(0));
        assert!(Arc::ptr_eq(&first, &second));

        first.add("output_rows", 7);
        assert_eq!(root.child(0).value("output_rows"), Some(7));
    }

    #[test]
    fn test_try_child_out_of_range() {
        let root = two_level_tree();
        let err = root.try_child(1).unwrap_err();
        assert!(matches!(
            err,
            KilnError::MetricTreeShapeMismatch { index: 1, len: 1 }
        ));
    }

    #[test]
    #[should_panic(expected = "requested child 4")]
    fn test_child_out_of_range_panics() {
        let root = MetricNode::native_root(vec![]);
        root.child(4);
    }

    #[test]
    fn test_apply_by_path() {
        let root = two_level_tree();

        assert!(root.apply(&[], "input_rows", 10).unwrap());
        assert!(root.apply(&[0, 0], "output_rows", 3).unwrap());
        assert!(!root.apply(&[0], "join_time", 3).unwrap());
        assert!(root.apply(&[0, 1], "output_rows", 3).is_err());

        assert_eq!(root.value("input_rows"), Some(10));
        assert_eq!(root.child(0).child(0).value("output_rows"), Some(3));
        assert_eq!(root.child(0).value("output_rows"), Some(0));
    }

    #[test]
    fn test_concurrent_adds() {
        let root = Arc::new(MetricNode::native_root(vec![]));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let root = Arc::clone(&root);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        root.add("output_batches", 1);
                        root.add("elapsed_compute", 2);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(root.value("output_batches"), Some(8000));
        assert_eq!(root.value("elapsed_compute"), Some(16000));
    }

    #[test]
    fn test_snapshot_mirrors_tree() {
        let root = two_level_tree();
        root.add("output_rows", 4);
        root.child(0).child(0).add("output_rows", 9);

        let snapshot = root.snapshot();
        assert_eq!(snapshot.values["output_rows"], 4);
        assert_eq!(snapshot.values.len(), 6);
        assert_eq!(snapshot.children.len(), 1);
        assert_eq!(snapshot.children[0].children[0].values["output_rows"], 9);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["children"][0]["children"][0]["values"]["output_rows"], 9);
    }

    #[test]
    fn test_export_records_values() {
        let root = two_level_tree();
        root.add("output_rows", 11);
        root.add("elapsed_compute", 250);
        root.child(0).add("output_rows", 6);
        assert!(root.export("test_export_plan"));

        let exported = NATIVE_OPERATOR_METRICS
            .with_label_values(&["test_export_plan", "output_rows", "count"])
            .get();
        assert_eq!(exported, 11);

        let timing = NATIVE_OPERATOR_METRICS
            .with_label_values(&["test_export_plan", "elapsed_compute", "timing_ns"])
            .get();
        assert_eq!(timing, 250);

        let exported_child = NATIVE_OPERATOR_METRICS
            .with_label_values(&["test_export_plan/0", "output_rows", "count"])
            .get();
        assert_eq!(exported_child, 6);
    }

    #[test]
    fn test_export_runs_once_per_node() {
        let root = two_level_tree();
        root.child(0).add("output_rows", 4);
        root.add("output_rows", 3);

        assert!(root.child(0).export("test_export_once/0"));
        assert!(root.export("test_export_once"));
        assert!(!root.export("test_export_once"));

        let exported = NATIVE_OPERATOR_METRICS
            .with_label_values(&["test_export_once", "output_rows", "count"])
            .get();
        assert_eq!(exported, 3);

        let exported_child = NATIVE_OPERATOR_METRICS
            .with_label_values(&["test_export_once/0", "output_rows", "count"])
            .get();
        assert_eq!(exported_child, 4);
    }

    #[test]
    fn test_unknown_metric_counter_is_unlabelled() {
        let root = MetricNode::native_root(vec![]);
        let before = UNKNOWN_METRIC_UPDATES.get();
        root.add("made_up_metric_name", 1);
        assert!(UNKNOWN_METRIC_UPDATES.get() > before);

        let families = prometheus::gather();
        let family = families
            .iter()
            .find(|m| m.get_name() == "kiln_unknown_metric_updates_total")
            .unwrap();
        assert!(family.get_metric().iter().all(|m| m.get_label().is_empty()));
    }
}
