//! Native dispatch over host plan nodes
//!
//! Unwraps wrapper nodes one level at a time, in the order the plan nests
//! them, until a terminal node is reached. The walk is a loop, so stack use
//! does not grow with the depth of the wrapper chain.

use std::sync::Arc;

use tracing::{debug, warn};

use kiln_core::metrics::PLAN_DISPATCH_FAILURES;
use kiln_core::{KilnError, KilnResult};

use crate::plan::{NativeExec, PlanNode};
use crate::rdd::NativeRdd;

fn find_native(node: &PlanNode) -> Option<&Arc<dyn NativeExec>> {
    let mut current = node;
    while let Some(child) = current.wrapped_child() {
        current = child;
    }
    match current {
        PlanNode::Native(exec) => Some(exec),
        _ => None,
    }
}

/// Whether a native node is reachable by unwrapping wrappers.
pub fn is_native_capable(node: &PlanNode) -> bool {
    find_native(node).is_some()
}

/// Unwrap `node` and run the native entry point of the node underneath.
///
/// Fails with `PlanNotNative` when the chain ends on an opaque node. The
/// planner only sends native-eligible subtrees here, so the failure means a
/// planning invariant was broken and the task should fail.
pub fn resolve_native_execution(node: &PlanNode) -> KilnResult<NativeRdd> {
    match find_native(node) {
        Some(exec) => {
            debug!(plan = %node, native = exec.name(), "Resolved native execution");
            exec.execute_native()
        }
        None => {
            warn!(plan = %node, "Plan is not natively executable");
            PLAN_DISPATCH_FAILURES.inc();
            Err(KilnError::plan_not_native(node.to_string()))
        }
    }
}
