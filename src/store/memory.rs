//! In-memory node store.
//!
//! Uses BTreeMap/BTreeSet for deterministic iteration order and a
//! `parking_lot::RwLock` so the coordinator can share one store across
//! concurrent edit requests. The commit compare-and-set runs entirely
//! under the write lock.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{NodeStore, StoreError};
use crate::types::{EditGroupId, NodeId, SpriteNode};

#[derive(Debug, Default)]
struct Inner {
    /// Nodes by id.
    nodes: BTreeMap<NodeId, SpriteNode>,
    /// Parent -> children adjacency.
    children: BTreeMap<NodeId, BTreeSet<NodeId>>,
    /// Edit group -> members.
    groups: BTreeMap<EditGroupId, BTreeSet<NodeId>>,
}

impl Inner {
    fn sorted_by_creation(&self, ids: impl IntoIterator<Item = NodeId>) -> Vec<SpriteNode> {
        let mut out: Vec<SpriteNode> = ids
            .into_iter()
            .filter_map(|id| self.nodes.get(&id).cloned())
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        out
    }
}

/// In-memory node store.
#[derive(Debug, Default)]
pub struct InMemoryNodeStore {
    inner: RwLock<Inner>,
}

impl InMemoryNodeStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored nodes.
    pub fn num_nodes(&self) -> usize {
        self.inner.read().nodes.len()
    }

    /// Number of edit groups with at least one member.
    pub fn num_groups(&self) -> usize {
        self.inner.read().groups.len()
    }
}

#[async_trait]
impl NodeStore for InMemoryNodeStore {
    async fn put(&self, node: SpriteNode) -> Result<(), StoreError> {
        node.check_shape()?;

        let mut inner = self.inner.write();

        if inner.nodes.contains_key(&node.id) {
            return Err(StoreError::DuplicateId(node.id));
        }
        if let Some(parent) = node.parent_id {
            if !inner.nodes.contains_key(&parent) {
                return Err(StoreError::DanglingParent {
                    child: node.id,
                    parent,
                });
            }
            inner.children.entry(parent).or_default().insert(node.id);
        }
        if let Some(group) = node.edit_group {
            inner.groups.entry(group).or_default().insert(node.id);
        }

        tracing::debug!(node_id = %node.id, root = node.is_root(), "node stored");
        inner.nodes.insert(node.id, node);
        Ok(())
    }

    async fn get(&self, id: &NodeId) -> Result<Option<SpriteNode>, StoreError> {
        Ok(self.inner.read().nodes.get(id).cloned())
    }

    async fn get_many(&self, ids: &[NodeId]) -> Result<Vec<SpriteNode>, StoreError> {
        let inner = self.inner.read();
        Ok(ids
            .iter()
            .filter_map(|id| inner.nodes.get(id).cloned())
            .collect())
    }

    async fn children_of(&self, id: &NodeId) -> Result<Vec<SpriteNode>, StoreError> {
        let inner = self.inner.read();
        if !inner.nodes.contains_key(id) {
            return Err(StoreError::NotFound(*id));
        }
        let ids = inner
            .children
            .get(id)
            .map(|set| set.iter().copied().collect::<Vec<_>>())
            .unwrap_or_default();
        Ok(inner.sorted_by_creation(ids))
    }

    async fn group_members(&self, group: &EditGroupId) -> Result<Vec<SpriteNode>, StoreError> {
        let inner = self.inner.read();
        let ids = inner
            .groups
            .get(group)
            .ok_or(StoreError::GroupNotFound(*group))?
            .iter()
            .copied()
            .collect::<Vec<_>>();
        Ok(inner.sorted_by_creation(ids))
    }

    async fn list_all(&self) -> Result<Vec<SpriteNode>, StoreError> {
        let inner = self.inner.read();
        let ids: Vec<NodeId> = inner.nodes.keys().copied().collect();
        Ok(inner.sorted_by_creation(ids))
    }

    async fn commit_canonical(
        &self,
        group: &EditGroupId,
        chosen: &NodeId,
    ) -> Result<SpriteNode, StoreError> {
        let mut inner = self.inner.write();

        let members = inner
            .groups
            .get(group)
            .ok_or(StoreError::GroupNotFound(*group))?
            .clone();

        if !members.contains(chosen) {
            return Err(StoreError::NotInGroup {
                group: *group,
                node: *chosen,
            });
        }

        // One pass over siblings decides the CAS outcome before any write.
        if let Some(committed) = members
            .iter()
            .find(|id| inner.nodes.get(id).map(|n| n.canonical).unwrap_or(false))
        {
            if committed == chosen {
                // Idempotent repeat of the same commit.
                return Ok(inner.nodes[chosen].clone());
            }
            return Err(StoreError::AlreadyCommitted {
                group: *group,
                committed: *committed,
                attempted: *chosen,
            });
        }

        let node = inner
            .nodes
            .get_mut(chosen)
            .ok_or(StoreError::NotFound(*chosen))?;
        node.canonical = true;
        let node = node.clone();
        tracing::info!(group = %group, chosen = %chosen, "edit group committed");
        Ok(node)
    }
}
