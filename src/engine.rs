//! The lineage engine facade.
//!
//! Composes the coordinator, index, and timeline builder into the
//! query-and-mutation surface consumed by presentation layers: create a
//! root, request an edit, commit a candidate, and read nodes and history.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::coordinator::{EditCoordinator, EditError, EditOutcome};
use crate::generate::SpriteGenerator;
use crate::index::LineageIndex;
use crate::store::{NodeStore, StoreError};
use crate::timeline::{Timeline, TimelineBuilder, TimelineError};
use crate::types::{EditGroupId, NodeId, SpriteNode};

/// Full history report for one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct History {
    /// The queried node.
    pub node: SpriteNode,
    /// Ancestor chain, immediate parent first, root last.
    pub ancestors: Vec<SpriteNode>,
    /// All direct children, canonical and non-canonical.
    pub children: Vec<SpriteNode>,
    /// The lineage timeline; `timeline.branch_tip` reports the queried
    /// node when it is an uncommitted branch outside the canonical path.
    pub timeline: Timeline,
}

/// The engine: one store, one generation capability, the full lineage
/// surface.
pub struct LineageEngine<S: NodeStore, G: SpriteGenerator> {
    store: Arc<S>,
    coordinator: EditCoordinator<S, G>,
}

impl<S: NodeStore, G: SpriteGenerator> LineageEngine<S, G> {
    /// Create an engine over a shared store and generator.
    pub fn new(store: Arc<S>, generator: Arc<G>) -> Self {
        let coordinator = EditCoordinator::new(Arc::clone(&store), generator);
        Self { store, coordinator }
    }

    /// Generate and store a new root node.
    pub async fn create_root(&self, description: &str) -> Result<SpriteNode, EditError> {
        self.coordinator.create_root(description).await
    }

    /// Request an edit producing candidate successors of `parent_id`.
    pub async fn request_edit(
        &self,
        parent_id: NodeId,
        instruction: &str,
        variation_count: u32,
    ) -> Result<EditOutcome, EditError> {
        self.coordinator
            .request_edit(parent_id, instruction, variation_count)
            .await
    }

    /// Commit one candidate of an edit group as canonical.
    pub async fn commit(
        &self,
        group: EditGroupId,
        chosen: NodeId,
    ) -> Result<SpriteNode, EditError> {
        self.coordinator.commit(group, chosen).await
    }

    /// Fetch a node by id.
    pub async fn get_node(&self, id: &NodeId) -> Result<Option<SpriteNode>, StoreError> {
        self.store.get(id).await
    }

    /// List every stored node, ordered by creation then id.
    pub async fn list_all(&self) -> Result<Vec<SpriteNode>, StoreError> {
        self.store.list_all().await
    }

    /// Ancestors, children, and timeline for one node.
    pub async fn get_history(&self, id: &NodeId) -> Result<History, TimelineError> {
        let index = LineageIndex::new(Arc::clone(&self.store));
        let node = self
            .store
            .get(id)
            .await
            .map_err(crate::index::IndexError::from)?
            .ok_or(TimelineError::NodeNotFound(*id))?;

        let ancestors = index.ancestors_of(id).await?;
        let children = index.children_of(id).await?;
        let timeline = self.timeline_builder().build(*id).await?;

        Ok(History {
            node,
            ancestors,
            children,
            timeline,
        })
    }

    /// A timeline builder over the engine's store.
    pub fn timeline_builder(&self) -> TimelineBuilder<S> {
        TimelineBuilder::new(Arc::clone(&self.store))
    }

    /// Shared store handle.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::ScriptedGenerator;
    use crate::store::InMemoryNodeStore;

    fn engine() -> LineageEngine<InMemoryNodeStore, ScriptedGenerator> {
        LineageEngine::new(
            Arc::new(InMemoryNodeStore::new()),
            Arc::new(ScriptedGenerator::new()),
        )
    }

    #[tokio::test]
    async fn test_history_of_committed_chain() {
        let engine = engine();
        let root = engine.create_root("a blue slime").await.unwrap();
        let edit = engine.request_edit(root.id, "make it red", 2).await.unwrap();
        let chosen = edit.candidates[1].id;
        engine.commit(edit.group, chosen).await.unwrap();

        let history = engine.get_history(&chosen).await.unwrap();
        assert_eq!(history.node.id, chosen);
        assert_eq!(
            history.ancestors.iter().map(|n| n.id).collect::<Vec<_>>(),
            vec![root.id]
        );
        assert!(history.children.is_empty());
        assert_eq!(
            history.timeline.iter().map(|n| n.id).collect::<Vec<_>>(),
            vec![root.id, chosen]
        );
        assert!(!history.timeline.is_orphan_branch());
    }

    #[tokio::test]
    async fn test_history_of_orphan_sibling() {
        let engine = engine();
        let root = engine.create_root("a blue slime").await.unwrap();
        let edit = engine.request_edit(root.id, "make it red", 3).await.unwrap();
        engine.commit(edit.group, edit.candidates[1].id).await.unwrap();

        let rejected = edit.candidates[0].id;
        let history = engine.get_history(&rejected).await.unwrap();

        assert!(history.children.is_empty());
        assert_eq!(
            history.ancestors.iter().map(|n| n.id).collect::<Vec<_>>(),
            vec![root.id]
        );
        // Timeline stops at the root; the rejected candidate is flagged,
        // not silently included.
        assert_eq!(
            history.timeline.iter().map(|n| n.id).collect::<Vec<_>>(),
            vec![root.id]
        );
        assert_eq!(
            history.timeline.branch_tip.as_ref().map(|n| n.id),
            Some(rejected)
        );
    }

    #[tokio::test]
    async fn test_history_unknown_node() {
        let engine = engine();
        let err = engine.get_history(&NodeId::mint()).await.unwrap_err();
        assert!(matches!(err, TimelineError::NodeNotFound(_)));
    }

    #[tokio::test]
    async fn test_list_all_ordered() {
        let engine = engine();
        let root = engine.create_root("slime").await.unwrap();
        let edit = engine.request_edit(root.id, "x", 2).await.unwrap();

        let all = engine.list_all().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, root.id);
        assert!(edit.candidates.iter().all(|c| all.contains(c)));
    }
}
