//! Node types for the lineage engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a version node.
///
/// Wraps a UUID and implements `Ord` for deterministic ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Create a NodeId from a UUID.
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Mint a fresh random NodeId.
    pub fn mint() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a NodeId from a UUID string.
    pub fn from_str(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for NodeId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Identifier shared by all sibling candidates produced by one edit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EditGroupId(Uuid);

impl EditGroupId {
    /// Create an EditGroupId from a UUID.
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Mint a fresh random EditGroupId.
    pub fn mint() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an EditGroupId from a UUID string.
    pub fn from_str(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for EditGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle to the visual content of a node.
///
/// The engine never inspects it; the generation/storage collaborator owns
/// its meaning (a provider image URL, a content-addressed blob key, etc.).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetRef(String);

impl AssetRef {
    /// Wrap a raw asset handle.
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// The raw handle string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AssetRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One immutable version record in a sprite lineage.
///
/// Nodes are created once and never updated or deleted; "editing" always
/// produces new nodes. The `canonical` flag is the single post-creation
/// mutation, set exactly once via the store's commit operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpriteNode {
    /// Unique node identifier, never reused.
    pub id: NodeId,
    /// Parent node; `None` marks a root (independently generated base asset).
    pub parent_id: Option<NodeId>,
    /// Opaque handle to the rendered asset.
    pub asset: AssetRef,
    /// Human text describing the node's content.
    pub description: String,
    /// Text describing the transformation from the parent; absent for roots.
    pub edit_description: Option<String>,
    /// Edit group this node belongs to; absent for roots.
    pub edit_group: Option<EditGroupId>,
    /// True once selected as the lineage continuation among its siblings.
    /// Roots are implicitly canonical.
    pub canonical: bool,
    /// Unix timestamp of creation.
    pub created_at: i64,
}

impl SpriteNode {
    /// Create a root node (no parent, implicitly canonical).
    pub fn root(id: NodeId, asset: AssetRef, description: impl Into<String>, created_at: i64) -> Self {
        Self {
            id,
            parent_id: None,
            asset,
            description: description.into(),
            edit_description: None,
            edit_group: None,
            canonical: true,
            created_at,
        }
    }

    /// Create an uncommitted edit candidate.
    ///
    /// The description is carried over from the parent; the instruction that
    /// produced this candidate goes into `edit_description`.
    pub fn candidate(
        id: NodeId,
        parent_id: NodeId,
        edit_group: EditGroupId,
        asset: AssetRef,
        description: impl Into<String>,
        edit_description: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id,
            parent_id: Some(parent_id),
            asset,
            description: description.into(),
            edit_description: Some(edit_description.into()),
            edit_group: Some(edit_group),
            canonical: false,
            created_at,
        }
    }

    /// Whether this node is a root.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Check the field invariants a store must reject on write.
    ///
    /// Roots carry no edit group or edit description and are canonical;
    /// non-roots carry an edit group and are written non-canonical (the
    /// flag is only ever set by the commit operation).
    pub fn check_shape(&self) -> Result<(), NodeShapeError> {
        match self.parent_id {
            None => {
                if self.edit_group.is_some() || self.edit_description.is_some() {
                    return Err(NodeShapeError::RootWithEditFields(self.id));
                }
                if !self.canonical {
                    return Err(NodeShapeError::NonCanonicalRoot(self.id));
                }
            }
            Some(_) => {
                if self.edit_group.is_none() {
                    return Err(NodeShapeError::CandidateWithoutGroup(self.id));
                }
                if self.canonical {
                    return Err(NodeShapeError::CandidateWrittenCanonical(self.id));
                }
            }
        }
        Ok(())
    }
}

/// Violation of the node field invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeShapeError {
    /// A root node carries an edit group or edit description.
    #[error("root node {0} carries edit group or edit description")]
    RootWithEditFields(NodeId),
    /// A root node is marked non-canonical.
    #[error("root node {0} is not canonical")]
    NonCanonicalRoot(NodeId),
    /// A non-root node lacks an edit group.
    #[error("candidate node {0} has no edit group")]
    CandidateWithoutGroup(NodeId),
    /// A non-root node is written with the canonical flag already set.
    #[error("candidate node {0} written with canonical flag set")]
    CandidateWrittenCanonical(NodeId),
}

// Ord by NodeId for deterministic collections.
impl PartialEq for SpriteNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SpriteNode {}

impl PartialOrd for SpriteNode {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SpriteNode {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}
