use thiserror::Error;

/// Canonical error type for the native execution bridge.
#[derive(Debug, Error)]
pub enum KilnError {
    /// Dispatch walked the wrapper chain and ended on a node with no native support.
    #[error("plan is not natively executable: {node}")]
    PlanNotNative {
        /// Rendered plan subtree that was handed to dispatch.
        node: String,
    },

    /// The native engine returned a negative stream handle.
    #[error("native engine failed to start execution (handle {handle})")]
    NativeInvocation {
        /// Raw handle returned by the engine.
        handle: i64,
    },

    /// The native call panicked while its task was still running.
    #[error("native execution panicked: {message}")]
    NativePanic {
        /// Panic payload rendered as text.
        message: String,
    },

    /// A child metric was requested that the tree does not have.
    ///
    /// This means the metric tree and the plan tree were built with different
    /// shapes, which is a bug in the caller rather than a runtime condition.
    #[error("metric tree has {len} children, requested child {index}")]
    MetricTreeShapeMismatch {
        /// Requested child index.
        index: usize,
        /// Number of children actually present.
        len: usize,
    },

    /// A partition outside the plan's partition range was requested.
    #[error("partition {index} out of range, plan has {num_partitions} partitions")]
    InvalidPartition {
        /// Requested partition index.
        index: u32,
        /// Number of partitions the plan produces.
        num_partitions: usize,
    },

    /// The result-stream adapter could not open or advance the native stream.
    #[error("result stream adapter error: {message}")]
    Adapter {
        /// Human-readable details from the adapter.
        message: String,
    },

    /// Task description could not be decoded.
    #[error("task description decoding error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl KilnError {
    /// Creates a `PlanNotNative` variant.
    #[must_use]
    pub fn plan_not_native(node: impl Into<String>) -> Self {
        Self::PlanNotNative { node: node.into() }
    }

    /// Creates an `Adapter` variant.
    #[must_use]
    pub fn adapter(message: impl Into<String>) -> Self {
        Self::Adapter {
            message: message.into(),
        }
    }
}

/// Convenient result alias for bridge operations.
pub type KilnResult<T> = Result<T, KilnError>;
