//! Native invocation protocol
//!
//! Turns a serialized plan for one partition into a row sequence:
//! 1. Build the partition identity and task description
//! 2. Resolve execution settings from process configuration
//! 3. Call the native engine and check the returned handle
//! 4. Hand the handle to the result-stream adapter

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};

use kiln_core::metrics::NATIVE_INVOCATIONS;
use kiln_core::{InvocationFailurePolicy, KilnConfig, KilnError, KilnResult, MetricNode};

use crate::config::ExecutionConfig;
use crate::context::{Partition, TaskContext};
use crate::engine::{NativeEngine, NativeStreamHandle};
use crate::stream::{empty_rows, ResultStreamAdapter, RowSequence};
use crate::task::{PartitionIdentity, TaskDescription};

/// Entry point for running serialized plans on the native engine.
pub struct NativeRuntime<A> {
    engine: Arc<dyn NativeEngine>,
    adapter: A,
    config: Arc<KilnConfig>,
}

impl<A: ResultStreamAdapter> NativeRuntime<A> {
    pub fn new(engine: Arc<dyn NativeEngine>, adapter: A, config: Arc<KilnConfig>) -> Self {
        Self {
            engine,
            adapter,
            config,
        }
    }

    pub fn config(&self) -> &KilnConfig {
        &self.config
    }

    /// Execute `serialized_plan` for `partition` and return its rows.
    ///
    /// `partition` identifies the physical partition; the task context's own
    /// partition id is ignored. A negative handle from the engine is handled
    /// according to the configured [`InvocationFailurePolicy`].
    pub fn execute_native_plan(
        &self,
        serialized_plan: Bytes,
        metrics: Arc<MetricNode>,
        partition: Partition,
        task_ctx: Arc<TaskContext>,
    ) -> KilnResult<RowSequence<A::Row>> {
        let task_id = PartitionIdentity::for_partition(partition, &task_ctx);
        let task = TaskDescription::new(task_id, serialized_plan);
        let exec_config = ExecutionConfig::resolve(&self.config.native);

        if exec_config.dump_plan() {
            info!(
                stage_id = task_ctx.stage_id(),
                partition_id = partition.index,
                task = ?task,
                "Executing native task"
            );
        } else {
            info!(
                stage_id = task_ctx.stage_id(),
                partition_id = partition.index,
                "Start executing native plan"
            );
        }

        let task_definition = task.encode_bytes();
        let tmp_dirs = exec_config.temp_directories_arg();
        let call = panic::catch_unwind(AssertUnwindSafe(|| {
            self.engine.call_native(
                &task_definition,
                to_native_int(exec_config.worker_pool_size()),
                to_native_int(exec_config.batch_size()),
                exec_config.native_memory_limit_bytes(),
                exec_config.memory_fraction(),
                &tmp_dirs,
            )
        }));

        let raw = match call {
            Ok(raw) => raw,
            Err(payload) => return self.handle_panic(payload.as_ref(), &task_ctx),
        };

        let Some(handle) = NativeStreamHandle::acquire(raw, Arc::clone(&self.engine)) else {
            return self.handle_invocation_failure(raw, &exec_config, &task_ctx, partition);
        };

        NATIVE_INVOCATIONS.with_label_values(&["ok"]).inc();
        self.adapter.open(handle, task_ctx, metrics)
    }

    fn handle_invocation_failure(
        &self,
        raw: i64,
        exec_config: &ExecutionConfig,
        task_ctx: &TaskContext,
        partition: Partition,
    ) -> KilnResult<RowSequence<A::Row>> {
        NATIVE_INVOCATIONS.with_label_values(&["failed"]).inc();
        warn!(
            handle = raw,
            stage_id = task_ctx.stage_id(),
            partition_id = partition.index,
            "Native engine failed to start execution"
        );

        match exec_config.failure_policy() {
            InvocationFailurePolicy::EmptyResult => Ok(empty_rows()),
            InvocationFailurePolicy::Fail => Err(KilnError::NativeInvocation { handle: raw }),
        }
    }

    fn handle_panic(
        &self,
        payload: &(dyn Any + Send),
        task_ctx: &TaskContext,
    ) -> KilnResult<RowSequence<A::Row>> {
        NATIVE_INVOCATIONS.with_label_values(&["panicked"]).inc();
        let message = panic_message(payload);

        // Killed tasks unwind the engine on purpose.
        if !task_ctx.is_running() {
            info!(stage_id = task_ctx.stage_id(), %message, "Native execution interrupted");
            return Ok(empty_rows());
        }

        Err(KilnError::NativePanic { message })
    }
}

fn to_native_int(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
