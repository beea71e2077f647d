//! Row sequence produced from a native result stream.

use std::sync::Arc;

use kiln_core::{KilnResult, MetricNode};

use crate::context::TaskContext;
use crate::engine::NativeStreamHandle;

/// Lazy, forward-only sequence of host rows.
///
/// Each `next` may block while the native engine computes the next batch.
pub type RowSequence<R> = Box<dyn Iterator<Item = KilnResult<R>> + Send>;

/// Converts native result buffers into host rows.
///
/// The adapter owns the handle from here on; dropping the returned sequence
/// drops the handle and finalizes the native stream. Cancellation is the
/// adapter's concern, through the task context it receives.
pub trait ResultStreamAdapter: Send + Sync {
    type Row: Send + 'static;

    fn open(
        &self,
        handle: NativeStreamHandle,
        task_ctx: Arc<TaskContext>,
        metrics: Arc<MetricNode>,
    ) -> KilnResult<RowSequence<Self::Row>>;
}

/// Sequence with no rows.
pub fn empty_rows<R: Send + 'static>() -> RowSequence<R> {
    Box::new(std::iter::empty())
}
