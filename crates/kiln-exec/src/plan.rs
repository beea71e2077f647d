use std::fmt;
use std::mem;
use std::sync::Arc;

use kiln_core::KilnResult;

use crate::rdd::NativeRdd;

/// Plan node that can hand its execution to the native engine.
pub trait NativeExec: Send + Sync {
    fn name(&self) -> &str;

    /// Native execution entry point.
    fn execute_native(&self) -> KilnResult<NativeRdd>;
}

/// Host plan node as seen by native dispatch.
///
/// Wrapper variants own exactly one child and add no native behavior. They
/// are built from an existing child during plan compilation, so a chain of
/// wrappers always ends. Dropping a chain takes it apart in a loop, so
/// neither dispatch nor teardown recurses on the chain depth.
pub enum PlanNode {
    Native(Arc<dyn NativeExec>),
    ShuffleReader(Box<PlanNode>),
    QueryStage(Box<PlanNode>),
    ReusedExchange(Box<PlanNode>),
    /// Any node without native support, identified by name.
    Opaque(String),
}

impl PlanNode {
    pub fn native(exec: impl NativeExec + 'static) -> Self {
        Self::Native(Arc::new(exec))
    }

    pub fn shuffle_reader(child: PlanNode) -> Self {
        Self::ShuffleReader(Box::new(child))
    }

    pub fn query_stage(child: PlanNode) -> Self {
        Self::QueryStage(Box::new(child))
    }

    pub fn reused_exchange(child: PlanNode) -> Self {
        Self::ReusedExchange(Box::new(child))
    }

    pub fn opaque(name: impl Into<String>) -> Self {
        Self::Opaque(name.into())
    }

    /// Child of a wrapper variant; `None` for terminal nodes.
    pub fn wrapped_child(&self) -> Option<&PlanNode> {
        match self {
            Self::ShuffleReader(child) | Self::QueryStage(child) | Self::ReusedExchange(child) => {
                Some(child)
            }
            Self::Native(_) | Self::Opaque(_) => None,
        }
    }

    /// Detach the child of a wrapper variant, leaving an empty opaque node.
    fn take_wrapped_child(&mut self) -> Option<PlanNode> {
        match self {
            Self::ShuffleReader(child) | Self::QueryStage(child) | Self::ReusedExchange(child) => {
                Some(mem::replace(&mut **child, Self::Opaque(String::new())))
            }
            Self::Native(_) | Self::Opaque(_) => None,
        }
    }

    fn label(&self) -> String {
        match self {
            Self::Native(exec) => format!("Native({})", exec.name()),
            Self::ShuffleReader(_) => "ShuffleReader".to_string(),
            Self::QueryStage(_) => "QueryStage".to_string(),
            Self::ReusedExchange(_) => "ReusedExchange".to_string(),
            Self::Opaque(name) => format!("Opaque({name})"),
        }
    }
}

impl Drop for PlanNode {
    fn drop(&mut self) {
        let mut next = self.take_wrapped_child();
        while let Some(mut node) = next {
            next = node.take_wrapped_child();
        }
    }
}

/// Renders the wrapper chain, e.g. `QueryStage -> Native(scan)`.
impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())?;
        let mut current = self;
        while let Some(child) = current.wrapped_child() {
            write!(f, " -> {}", child.label())?;
            current = child;
        }
        Ok(())
    }
}

impl fmt::Debug for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlanNode({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_deep_chain() {
        let mut node = PlanNode::opaque("Scan");
        for _ in 0..1_000_000 {
            node = PlanNode::query_stage(node);
        }
        assert_eq!(node.wrapped_child().map(PlanNode::label).as_deref(), Some("QueryStage"));
        drop(node);
    }

    #[test]
    fn test_take_wrapped_child_leaves_terminal() {
        let mut node = PlanNode::shuffle_reader(PlanNode::opaque("Sort"));
        let child = node.take_wrapped_child().unwrap();

        assert_eq!(child.to_string(), "Opaque(Sort)");
        assert_eq!(node.to_string(), "ShuffleReader -> Opaque()");
        assert!(PlanNode::opaque("Sort").take_wrapped_child().is_none());
    }
}
