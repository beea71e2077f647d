//! Warning behavior of metric tree updates
//!
//! Captures tracing events with a registry layer and checks that dropped
//! updates produce exactly one warning each.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use kiln_core::{MetricNode, DEFAULT_NATIVE_METRICS};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

struct WarnCounter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn count_warnings<F: FnOnce()>(f: F) -> usize {
    let warnings = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(WarnCounter(Arc::clone(&warnings)));
    tracing::subscriber::with_default(subscriber, f);
    warnings.load(Ordering::SeqCst)
}

#[test]
fn test_unknown_metric_warns_once() {
    let root = MetricNode::native_root(vec![]);

    let warnings = count_warnings(|| {
        assert!(!root.add("nonexistent", 5));
    });

    assert_eq!(warnings, 1);
    for (name, _) in DEFAULT_NATIVE_METRICS {
        assert_eq!(root.value(name), Some(0));
    }
}

#[test]
fn test_known_metric_is_silent() {
    let root = MetricNode::native_root(vec![]);

    let warnings = count_warnings(|| {
        assert!(root.add("output_rows", 5));
        assert!(root.add("join_time", 1_500));
    });

    assert_eq!(warnings, 0);
    assert_eq!(root.value("output_rows"), Some(5));
    assert_eq!(root.value("join_time"), Some(1_500));
}

#[test]
fn test_path_update_to_unknown_metric_warns_once() {
    let leaf = Arc::new(MetricNode::empty());
    let root = MetricNode::native_root(vec![leaf]);

    let warnings = count_warnings(|| {
        assert!(!root.apply(&[0], "output_rows", 1).unwrap());
    });

    assert_eq!(warnings, 1);
    assert_eq!(root.value("output_rows"), Some(0));
}
