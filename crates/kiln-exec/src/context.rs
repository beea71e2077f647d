use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Physical partition a task executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Partition {
    pub index: u32,
}

impl Partition {
    pub fn new(index: u32) -> Self {
        Self { index }
    }
}

/// Host task state propagated across the native boundary.
///
/// `partition_id` is the scheduler's view of the task and is not always the
/// partition being computed (a union task may compute a child's partition).
#[derive(Debug, Clone)]
pub struct TaskContext {
    stage_id: i64,
    partition_id: u32,
    attempt_number: u32,
    cancelled: Arc<AtomicBool>,
}

impl TaskContext {
    pub fn new(stage_id: i64, partition_id: u32) -> Self {
        Self {
            stage_id,
            partition_id,
            attempt_number: 0,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn with_attempt(mut self, attempt_number: u32) -> Self {
        self.attempt_number = attempt_number;
        self
    }

    pub fn stage_id(&self) -> i64 {
        self.stage_id
    }

    pub fn partition_id(&self) -> u32 {
        self.partition_id
    }

    pub fn attempt_number(&self) -> u32 {
        self.attempt_number
    }

    /// Mark the task as killed. Clones share the flag.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Whether the task is still expected to produce output.
    pub fn is_running(&self) -> bool {
        !self.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let ctx = TaskContext::new(7, 1).with_attempt(2);
        let clone = ctx.clone();
        assert!(clone.is_running());

        ctx.cancel();
        assert!(clone.is_cancelled());
        assert!(!clone.is_running());
        assert_eq!(clone.attempt_number(), 2);
    }
}
