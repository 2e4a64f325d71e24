//! Node storage backends.
//!
//! Stores are append-only: nodes are written once and never updated or
//! deleted. The single exception is [`NodeStore::commit_canonical`], the
//! atomic conditional write that selects one canonical child per edit
//! group.

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;

use crate::types::{EditGroupId, NodeId, NodeShapeError, SpriteNode};

/// Error type shared by all store backends.
///
/// A concrete enum (rather than an associated type) so that callers can
/// match on the variants that drive the commit protocol.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Referenced node does not exist.
    #[error("node not found: {0}")]
    NotFound(NodeId),
    /// Referenced edit group does not exist.
    #[error("edit group not found: {0}")]
    GroupNotFound(EditGroupId),
    /// Write of a node whose id already exists. Indicates an id-generation
    /// bug upstream; fatal to the operation.
    #[error("node id already exists: {0}")]
    DuplicateId(NodeId),
    /// Write of a node whose parent does not resolve.
    #[error("node {child} references missing parent {parent}")]
    DanglingParent {
        /// The node being written.
        child: NodeId,
        /// The missing parent it references.
        parent: NodeId,
    },
    /// The node violates the root/candidate field invariants.
    #[error("invalid node shape: {0}")]
    InvalidNode(#[from] NodeShapeError),
    /// Commit named a node that is not a member of the edit group.
    #[error("node {node} is not a member of edit group {group}")]
    NotInGroup {
        /// The edit group named by the commit.
        group: EditGroupId,
        /// The node that is not a member.
        node: NodeId,
    },
    /// A different sibling of the edit group is already canonical.
    /// The first selection stands; this is never retried.
    #[error("edit group {group} already committed to {committed}, rejected {attempted}")]
    AlreadyCommitted {
        /// The edit group named by the commit.
        group: EditGroupId,
        /// The sibling that already holds the canonical slot.
        committed: NodeId,
        /// The losing candidate.
        attempted: NodeId,
    },
    /// Backend failure (connection, query, corruption).
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Trait for node storage backends.
///
/// Implementations must guarantee deterministic ordering of results and
/// durable writes visible to subsequent reads (no partial writes).
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Write a new node.
    ///
    /// Fails with [`StoreError::DuplicateId`] if the id already exists,
    /// [`StoreError::DanglingParent`] if the parent does not resolve, and
    /// [`StoreError::InvalidNode`] on a shape violation.
    async fn put(&self, node: SpriteNode) -> Result<(), StoreError>;

    /// Fetch a node by id.
    async fn get(&self, id: &NodeId) -> Result<Option<SpriteNode>, StoreError>;

    /// Fetch multiple nodes by id. Missing ids are skipped.
    async fn get_many(&self, ids: &[NodeId]) -> Result<Vec<SpriteNode>, StoreError>;

    /// All direct children of a node, canonical and non-canonical,
    /// ordered by `created_at` then id.
    async fn children_of(&self, id: &NodeId) -> Result<Vec<SpriteNode>, StoreError>;

    /// All members of an edit group, ordered by `created_at` then id.
    /// Empty groups do not exist; an unknown group yields `GroupNotFound`.
    async fn group_members(&self, group: &EditGroupId) -> Result<Vec<SpriteNode>, StoreError>;

    /// All nodes, ordered by `created_at` then id.
    async fn list_all(&self) -> Result<Vec<SpriteNode>, StoreError>;

    /// Compare-and-set the canonical slot of an edit group.
    ///
    /// Exactly one sibling per group ever becomes canonical. Repeating a
    /// commit with the same chosen node is idempotent success; a commit
    /// naming a different sibling after the slot is taken fails with
    /// [`StoreError::AlreadyCommitted`] and leaves the first selection
    /// unchanged. Returns the (now canonical) chosen node.
    async fn commit_canonical(
        &self,
        group: &EditGroupId,
        chosen: &NodeId,
    ) -> Result<SpriteNode, StoreError>;
}

pub use memory::InMemoryNodeStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresNodeStore;
