//! Lineage adjacency queries.
//!
//! The index is recomputed from the store on every read rather than
//! cached: nodes are immutable, and the one mutation that exists (the
//! canonical flag) would otherwise require invalidation keyed by the
//! affected edit group. Rebuilding keeps every query consistent with the
//! store by construction.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::store::{NodeStore, StoreError};
use crate::types::{NodeId, SpriteNode};

/// Error type for index queries.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The queried node does not exist.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),
    /// A parent walk revisited a node. Cannot happen through the engine's
    /// own writes (parents exist before children, nodes are immutable);
    /// reported instead of looping when storage is corrupt.
    #[error("lineage corrupt: cycle detected at {0}")]
    CorruptLineage(NodeId),
    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Parent/children adjacency over a node store.
pub struct LineageIndex<S: NodeStore> {
    store: Arc<S>,
}

impl<S: NodeStore> LineageIndex<S> {
    /// Create an index over a shared store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The ordered ancestor chain of a node, immediate parent first and
    /// root last. Empty for a root.
    pub async fn ancestors_of(&self, id: &NodeId) -> Result<Vec<SpriteNode>, IndexError> {
        let node = self
            .store
            .get(id)
            .await?
            .ok_or(IndexError::NodeNotFound(*id))?;

        let mut ancestors = Vec::new();
        let mut seen: BTreeSet<NodeId> = BTreeSet::new();
        seen.insert(node.id);

        let mut current = node;
        while let Some(parent_id) = current.parent_id {
            if !seen.insert(parent_id) {
                return Err(IndexError::CorruptLineage(parent_id));
            }
            let parent = self
                .store
                .get(&parent_id)
                .await?
                .ok_or(IndexError::NodeNotFound(parent_id))?;
            ancestors.push(parent.clone());
            current = parent;
        }
        Ok(ancestors)
    }

    /// All direct children of a node, canonical and non-canonical, for
    /// branch inspection. Ordered by creation then id.
    pub async fn children_of(&self, id: &NodeId) -> Result<Vec<SpriteNode>, IndexError> {
        Ok(self.store.children_of(id).await?)
    }

    /// The canonical child continuing the lineage from this node, if any.
    ///
    /// A parent can carry several committed edit groups (concurrent
    /// what-if edits, each committed); the canonical-branch rule picks the
    /// most recently created canonical child, tie-broken by id, so the
    /// walk stays deterministic.
    pub async fn canonical_child_of(&self, id: &NodeId) -> Result<Option<SpriteNode>, IndexError> {
        let children = self.store.children_of(id).await?;
        Ok(children
            .into_iter()
            .filter(|c| c.canonical)
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| b.id.cmp(&a.id))
            }))
    }

    /// The root of the lineage containing `id` (the node itself if root).
    pub async fn root_of(&self, id: &NodeId) -> Result<SpriteNode, IndexError> {
        let ancestors = self.ancestors_of(id).await?;
        match ancestors.into_iter().last() {
            Some(root) => Ok(root),
            None => Ok(self
                .store
                .get(id)
                .await?
                .ok_or(IndexError::NodeNotFound(*id))?),
        }
    }
}
