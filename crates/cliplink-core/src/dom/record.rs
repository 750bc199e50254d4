//! Mutation records produced by tree operations.
//!
//! Records are journaled by [`Dom`](super::Dom) in the order operations are
//! applied and drained by the page once per mutation turn, which is what
//! observers see as a single batch.

use super::tree::NodeId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    /// Children of `target` changed. Text replacement is reported here too,
    /// on the parent of the replaced text nodes.
    ChildList {
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    /// Attribute `name` of `target` was set or removed.
    Attributes { target: NodeId, name: String },
}

impl MutationRecord {
    pub fn target(&self) -> NodeId {
        match self {
            MutationRecord::ChildList { target, .. } | MutationRecord::Attributes { target, .. } => {
                *target
            }
        }
    }
}
