//! Per-partition task description sent across the native boundary.
//!
//! Wire format is protobuf; the plan payload itself is opaque here.

use bytes::Bytes;
use prost::Message;

use kiln_core::KilnResult;

use crate::context::{Partition, TaskContext};

/// Identity of one partition execution, used for native task bookkeeping.
///
/// `job_tag` is the partition index rendered as text, not a job id. The
/// identity is only meaningful inside the execution that built it.
#[derive(Clone, PartialEq, Eq, Message)]
pub struct PartitionIdentity {
    #[prost(uint32, tag = "1")]
    partition_index: u32,
    #[prost(int64, tag = "2")]
    stage_id: i64,
    #[prost(string, tag = "3")]
    job_tag: String,
}

impl PartitionIdentity {
    /// Identity for `partition` inside the task described by `ctx`.
    ///
    /// The caller's partition wins over `ctx.partition_id()`, which does not
    /// match the computed partition for composite plans such as unions.
    pub fn for_partition(partition: Partition, ctx: &TaskContext) -> Self {
        Self {
            partition_index: partition.index,
            stage_id: ctx.stage_id(),
            job_tag: partition.index.to_string(),
        }
    }

    pub fn partition_index(&self) -> u32 {
        self.partition_index
    }

    pub fn stage_id(&self) -> i64 {
        self.stage_id
    }

    pub fn job_tag(&self) -> &str {
        &self.job_tag
    }
}

/// Serialized unit of work: partition identity plus the opaque plan.
#[derive(Clone, PartialEq, Eq, Message)]
pub struct TaskDescription {
    #[prost(message, optional, tag = "1")]
    task_id: Option<PartitionIdentity>,
    #[prost(bytes = "bytes", tag = "2")]
    plan: Bytes,
}

impl TaskDescription {
    pub fn new(task_id: PartitionIdentity, plan: Bytes) -> Self {
        Self {
            task_id: Some(task_id),
            plan,
        }
    }

    pub fn task_id(&self) -> Option<&PartitionIdentity> {
        self.task_id.as_ref()
    }

    pub fn plan(&self) -> &Bytes {
        &self.plan
    }

    /// Protobuf bytes handed to the native engine.
    pub fn encode_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    pub fn decode_bytes(buf: &[u8]) -> KilnResult<Self> {
        Ok(Self::decode(buf)?)
    }
}
