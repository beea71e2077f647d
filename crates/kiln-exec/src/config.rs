use std::path::PathBuf;

use kiln_core::{InvocationFailurePolicy, NativeConfig};

const MIB: u64 = 1024 * 1024;

/// Separator for the temp directory list passed to the engine.
pub const TMP_DIRS_SEPARATOR: &str = ",";

/// Execution settings for one native invocation.
///
/// Resolved once from process configuration and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    native_memory_limit_bytes: i64,
    memory_fraction: f64,
    batch_size: usize,
    worker_pool_size: usize,
    temp_directories: Vec<PathBuf>,
    dump_plan: bool,
    failure_policy: InvocationFailurePolicy,
}

impl ExecutionConfig {
    pub fn resolve(native: &NativeConfig) -> Self {
        // No overhead setting means the engine gets no memory cap.
        let native_memory_limit_bytes = native
            .executor_memory_overhead_mb
            .and_then(|mb| mb.checked_mul(MIB))
            .and_then(|bytes| i64::try_from(bytes).ok())
            .unwrap_or(i64::MAX);

        Self {
            native_memory_limit_bytes,
            memory_fraction: native.memory_fraction,
            batch_size: native.batch_size,
            worker_pool_size: native.worker_pool_size,
            temp_directories: native.local_dirs.clone(),
            dump_plan: native.dump_plan_before_execute,
            failure_policy: native.invocation_failure,
        }
    }

    pub fn native_memory_limit_bytes(&self) -> i64 {
        self.native_memory_limit_bytes
    }

    pub fn memory_fraction(&self) -> f64 {
        self.memory_fraction
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn worker_pool_size(&self) -> usize {
        self.worker_pool_size
    }

    pub fn temp_directories(&self) -> &[PathBuf] {
        &self.temp_directories
    }

    pub fn dump_plan(&self) -> bool {
        self.dump_plan
    }

    pub fn failure_policy(&self) -> InvocationFailurePolicy {
        self.failure_policy
    }

    /// Temp directories joined into the single string the engine expects.
    pub fn temp_directories_arg(&self) -> String {
        self.temp_directories
            .iter()
            .map(|dir| dir.to_string_lossy())
            .collect::<Vec<_>>()
            .join(TMP_DIRS_SEPARATOR)
    }
}
