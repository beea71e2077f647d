use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use kiln_core::metrics::NATIVE_HANDLES_RELEASED;

/// Opaque entry point of the native execution engine.
///
/// Mirrors the foreign call boundary: scalar arguments in, a raw handle out.
/// A negative handle means the engine could not start the task.
pub trait NativeEngine: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    fn call_native(
        &self,
        task_definition: &[u8],
        worker_pool_size: i64,
        batch_size: i64,
        native_memory: i64,
        memory_fraction: f64,
        tmp_dirs: &str,
    ) -> i64;

    /// Tear down the native stream behind `handle`.
    fn finalize_native(&self, handle: i64);
}

/// Owned native result stream.
///
/// Only constructed from a non-negative handle. The engine is told to
/// finalize it exactly once, on [`NativeStreamHandle::release`] or drop,
/// whichever happens first.
pub struct NativeStreamHandle {
    raw: i64,
    engine: Arc<dyn NativeEngine>,
    released: AtomicBool,
}

impl NativeStreamHandle {
    /// Take ownership of `raw`, or `None` for the failure sentinel.
    pub fn acquire(raw: i64, engine: Arc<dyn NativeEngine>) -> Option<Self> {
        if raw < 0 {
            return None;
        }
        Some(Self {
            raw,
            engine,
            released: AtomicBool::new(false),
        })
    }

    pub fn raw(&self) -> i64 {
        self.raw
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Finalize the native stream now. Later calls and the drop are no-ops.
    pub fn release(&self) {
        if self
            .released
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            debug!(handle = self.raw, "Releasing native stream handle");
            self.engine.finalize_native(self.raw);
            NATIVE_HANDLES_RELEASED.inc();
        }
    }
}

impl Drop for NativeStreamHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for NativeStreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeStreamHandle")
            .field("raw", &self.raw)
            .field("released", &self.is_released())
            .finish()
    }
}
