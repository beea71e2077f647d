//! Dispatch and invocation bridge between host plans and the native engine.

pub mod config;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod plan;
pub mod rdd;
pub mod runtime;
pub mod stream;
pub mod task;

pub use config::ExecutionConfig;
pub use context::{Partition, TaskContext};
pub use dispatch::{is_native_capable, resolve_native_execution};
pub use engine::{NativeEngine, NativeStreamHandle};
pub use plan::{NativeExec, PlanNode};
pub use rdd::{MetricsBuilder, NativeRdd, PlanBuilder};
pub use runtime::NativeRuntime;
pub use stream::{empty_rows, ResultStreamAdapter, RowSequence};
pub use task::{PartitionIdentity, TaskDescription};
