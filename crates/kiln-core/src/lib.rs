//! Core types shared by the Kiln native execution bridge.

pub mod config;
pub mod error;
pub mod metric_tree;
pub mod metrics;

pub use crate::config::{InvocationFailurePolicy, KilnConfig, NativeConfig};
pub use crate::error::{KilnError, KilnResult};
pub use crate::metric_tree::{MetricKind, MetricNode, MetricSnapshot, DEFAULT_NATIVE_METRICS};
