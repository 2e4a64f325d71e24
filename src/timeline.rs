//! Timeline reconstruction.
//!
//! A timeline is the single linear root-to-leaf sequence of canonical
//! nodes for a lineage, derived by walking `canonical_child_of` forward
//! from the root. Timelines are plain rebuildable values: every query
//! rebuilds from the store, so there is no cache to go stale when a
//! commit lands.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::index::{IndexError, LineageIndex};
use crate::store::NodeStore;
use crate::types::{NodeId, SpriteNode};

/// Error type for timeline construction.
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    /// The anchor node does not exist.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),
    /// The forward walk revisited a node (corrupt storage).
    #[error("lineage corrupt: cycle detected at {0}")]
    CorruptLineage(NodeId),
    /// The branch override named a child that does not belong to the
    /// named parent.
    #[error("node {child} is not a child of {parent}")]
    InvalidBranch {
        /// The parent named by the override.
        parent: NodeId,
        /// The node that is not its child.
        child: NodeId,
    },
    /// Index error.
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// The linear version sequence for a lineage.
///
/// `entries` runs root to leaf; a node's 1-based position is its version
/// number. When the anchor the timeline was built for is not on the
/// canonical path, `entries` stops at the anchor's deepest ancestor that
/// is, and the anchor is reported separately in `branch_tip` — callers
/// must handle that case explicitly rather than assume inclusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
    /// Canonical nodes, root first. Never empty.
    pub entries: Vec<SpriteNode>,
    /// The anchor, when it is an uncommitted branch tip outside `entries`.
    pub branch_tip: Option<SpriteNode>,
}

impl Timeline {
    /// Number of versions in the timeline.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Timelines always contain at least the root.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The node at a position, if in bounds.
    pub fn get(&self, index: usize) -> Option<&SpriteNode> {
        self.entries.get(index)
    }

    /// The root (version 1).
    pub fn root(&self) -> &SpriteNode {
        &self.entries[0]
    }

    /// The leaf (latest version).
    pub fn leaf(&self) -> &SpriteNode {
        &self.entries[self.entries.len() - 1]
    }

    /// Position of a node in the timeline.
    pub fn position(&self, id: &NodeId) -> Option<usize> {
        self.entries.iter().position(|n| n.id == *id)
    }

    /// 1-based version number of a node in the timeline.
    pub fn version_of(&self, id: &NodeId) -> Option<usize> {
        self.position(id).map(|p| p + 1)
    }

    /// Whether the anchor was reported as an uncommitted branch tip.
    pub fn is_orphan_branch(&self) -> bool {
        self.branch_tip.is_some()
    }

    /// Iterate entries root to leaf.
    pub fn iter(&self) -> std::slice::Iter<'_, SpriteNode> {
        self.entries.iter()
    }
}

/// Builds timelines from the store via the lineage index.
pub struct TimelineBuilder<S: NodeStore> {
    store: Arc<S>,
    index: LineageIndex<S>,
}

impl<S: NodeStore> TimelineBuilder<S> {
    /// Create a builder over a shared store.
    pub fn new(store: Arc<S>) -> Self {
        let index = LineageIndex::new(Arc::clone(&store));
        Self { store, index }
    }

    /// Build the timeline for the lineage containing `anchor`.
    pub async fn build(&self, anchor: NodeId) -> Result<Timeline, TimelineError> {
        self.walk(anchor, &BTreeMap::new()).await
    }

    /// Build a display-only timeline that takes `child` at `parent`
    /// instead of the canonical child, then continues through `child`'s
    /// own canonical descendants. Stored canonical flags are untouched.
    pub async fn build_with_override(
        &self,
        anchor: NodeId,
        parent: NodeId,
        child: NodeId,
    ) -> Result<Timeline, TimelineError> {
        let mut overrides = BTreeMap::new();
        overrides.insert(parent, child);
        self.build_with_overrides(anchor, &overrides).await
    }

    /// Build a display-only timeline applying several branch overrides at
    /// once, at most one per parent.
    ///
    /// Nested branch display needs this: once the walk leaves the
    /// canonical path at one override, it only reaches a deeper override
    /// if the overrides that led there are applied on the same rebuild.
    pub async fn build_with_overrides(
        &self,
        anchor: NodeId,
        overrides: &BTreeMap<NodeId, NodeId>,
    ) -> Result<Timeline, TimelineError> {
        let mut resolved = BTreeMap::new();
        for (parent, child) in overrides {
            let child_node = self
                .store
                .get(child)
                .await
                .map_err(IndexError::from)?
                .ok_or(TimelineError::NodeNotFound(*child))?;
            if child_node.parent_id != Some(*parent) {
                return Err(TimelineError::InvalidBranch {
                    parent: *parent,
                    child: *child,
                });
            }
            resolved.insert(*parent, child_node);
        }
        self.walk(anchor, &resolved).await
    }

    async fn walk(
        &self,
        anchor: NodeId,
        overrides: &BTreeMap<NodeId, SpriteNode>,
    ) -> Result<Timeline, TimelineError> {
        let anchor_node = self
            .store
            .get(&anchor)
            .await
            .map_err(IndexError::from)?
            .ok_or(TimelineError::NodeNotFound(anchor))?;

        // Upward to the root, then forward along canonical links.
        let ancestors = self.index.ancestors_of(&anchor).await?;
        let root = ancestors.last().cloned().unwrap_or_else(|| anchor_node.clone());

        let mut entries = vec![root.clone()];
        let mut visited: BTreeSet<NodeId> = BTreeSet::new();
        visited.insert(root.id);

        let mut current = root.id;
        loop {
            let next = match overrides.get(&current) {
                Some(child) => Some(child.clone()),
                None => self.index.canonical_child_of(&current).await?,
            };
            match next {
                Some(node) => {
                    if !visited.insert(node.id) {
                        return Err(TimelineError::CorruptLineage(node.id));
                    }
                    current = node.id;
                    entries.push(node);
                }
                None => break,
            }
        }

        if entries.iter().any(|n| n.id == anchor) {
            return Ok(Timeline {
                entries,
                branch_tip: None,
            });
        }

        // The anchor is off the canonical walk: truncate at its deepest
        // ancestor that is on the walk (the root always qualifies) and
        // report the anchor as an uncommitted branch tip.
        let on_walk: BTreeSet<NodeId> = entries.iter().map(|n| n.id).collect();
        let cut = ancestors
            .iter()
            .find(|a| on_walk.contains(&a.id))
            .map(|a| a.id)
            .unwrap_or(root.id);
        let cut_pos = entries
            .iter()
            .position(|n| n.id == cut)
            .unwrap_or(0);
        entries.truncate(cut_pos + 1);

        Ok(Timeline {
            entries,
            branch_tip: Some(anchor_node),
        })
    }
}
