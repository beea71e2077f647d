//! Process-wide Prometheus metrics for the native bridge
//!
//! Metrics are registered lazily on first access using once_cell::Lazy.

use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

// ===== Native Invocation Metrics =====

/// Native engine invocations by outcome (ok, failed, panicked)
pub static NATIVE_INVOCATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "kiln_native_invocations_total",
        "Total number of native engine invocations",
        &["status"]
    )
    .expect("Failed to register native invocations counter")
});

/// Native stream handles handed back to the engine for teardown
pub static NATIVE_HANDLES_RELEASED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "kiln_native_handles_released_total",
        "Total number of native stream handles released"
    )
    .expect("Failed to register native handles released counter")
});

/// Plan subtrees that dispatch could not resolve to a native node
pub static PLAN_DISPATCH_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "kiln_plan_dispatch_failures_total",
        "Total number of plans rejected by native dispatch"
    )
    .expect("Failed to register plan dispatch failures counter")
});

// ===== Metric Tree Metrics =====

/// Updates dropped because the metric name was not registered on the node.
///
/// Unlabelled: the names come from the native side and are not bounded.
pub static UNKNOWN_METRIC_UPDATES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "kiln_unknown_metric_updates_total",
        "Total number of updates addressed to unknown metrics"
    )
    .expect("Failed to register unknown metric updates counter")
});

/// Values exported from native metric trees, keyed by node path, metric name
/// and kind (`count` or `timing_ns`)
pub static NATIVE_OPERATOR_METRICS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "kiln_native_operator_metric_total",
        "Native operator metric values exported at task completion",
        &["node", "metric", "kind"]
    )
    .expect("Failed to register native operator metric counter")
});
