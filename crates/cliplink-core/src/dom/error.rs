//! Error types for document tree operations.

use super::tree::NodeId;

/// Failure of a structural operation on the document tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    /// The node id does not belong to this document.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    /// Text nodes cannot have children.
    #[error("node {0} cannot have children")]
    NotAContainer(NodeId),
    /// The operation expects an element (attribute access, selector target).
    #[error("node {0} is not an element")]
    NotAnElement(NodeId),
    /// Inserting `child` under `parent` would make a node its own ancestor.
    #[error("inserting {child} under {parent} would create a cycle")]
    HierarchyCycle { parent: NodeId, child: NodeId },
    /// `insert_before` reference node is not a child of `parent`.
    #[error("{reference} is not a child of {parent}")]
    NotAChild { parent: NodeId, reference: NodeId },
    /// The document root and body cannot be detached.
    #[error("node {0} cannot be removed")]
    Unremovable(NodeId),
    /// The node was detached from the document before it could be updated.
    #[error("node {0} is no longer connected to the document")]
    Detached(NodeId),
}
