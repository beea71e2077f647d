use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use kiln_core::{KilnError, KilnResult, MetricNode};

use crate::context::{Partition, TaskContext};
use crate::runtime::NativeRuntime;
use crate::stream::{ResultStreamAdapter, RowSequence};

/// Builds the serialized native plan for one partition.
pub type PlanBuilder = Arc<dyn Fn(Partition, &TaskContext) -> KilnResult<Bytes> + Send + Sync>;

/// Builds an empty metric tree shaped like the native subtree.
pub type MetricsBuilder = Arc<dyn Fn() -> MetricNode + Send + Sync>;

/// Partitioned native computation returned by a native node's entry point.
///
/// Nothing runs until [`NativeRdd::compute`] is called for a partition.
/// Each partition reports into its own metric tree from
/// [`NativeRdd::partition_metrics`].
#[derive(Clone)]
pub struct NativeRdd {
    name: String,
    num_partitions: usize,
    metrics_builder: MetricsBuilder,
    plan_builder: PlanBuilder,
}

impl NativeRdd {
    pub fn new<M, F>(
        name: impl Into<String>,
        num_partitions: usize,
        metrics_builder: M,
        plan_builder: F,
    ) -> Self
    where
        M: Fn() -> MetricNode + Send + Sync + 'static,
        F: Fn(Partition, &TaskContext) -> KilnResult<Bytes> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            num_partitions,
            metrics_builder: Arc::new(metrics_builder),
            plan_builder: Arc::new(plan_builder),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fresh metric root for one partition, all counters at zero.
    pub fn partition_metrics(&self) -> Arc<MetricNode> {
        Arc::new((self.metrics_builder)())
    }

    pub fn num_partitions(&self) -> usize {
        self.num_partitions
    }

    /// Run `partition` on the native engine and return its rows.
    ///
    /// `metrics` is the partition's own root, normally from
    /// [`NativeRdd::partition_metrics`].
    pub fn compute<A: ResultStreamAdapter>(
        &self,
        runtime: &NativeRuntime<A>,
        partition: Partition,
        task_ctx: Arc<TaskContext>,
        metrics: Arc<MetricNode>,
    ) -> KilnResult<RowSequence<A::Row>> {
        if partition.index as usize >= self.num_partitions {
            return Err(KilnError::InvalidPartition {
                index: partition.index,
                num_partitions: self.num_partitions,
            });
        }

        let plan = (self.plan_builder)(partition, &task_ctx)?;
        runtime.execute_native_plan(plan, metrics, partition, task_ctx)
    }
}

impl fmt::Debug for NativeRdd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeRdd")
            .field("name", &self.name)
            .field("num_partitions", &self.num_partitions)
            .finish_non_exhaustive()
    }
}
