//! Edit orchestration.
//!
//! The coordinator turns one edit request into a group of candidate
//! children: one generation call, then one node write per produced
//! output, all sharing a freshly minted edit group id. No lock is held
//! across the generation call, and nothing is written until it returns;
//! dropping a pending request therefore writes no nodes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::generate::{GenerationError, SpriteGenerator};
use crate::store::{NodeStore, StoreError};
use crate::types::{EditGroupId, NodeId, SpriteNode};

/// Error type for coordinator operations.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    /// The edit's parent node does not exist.
    #[error("parent node not found: {0}")]
    ParentNotFound(NodeId),
    /// `variation_count` must be at least 1.
    #[error("invalid variation count: {0} (must be >= 1)")]
    InvalidVariationCount(u32),
    /// The generation capability produced zero outputs. Nothing was
    /// written; the caller decides whether to retry.
    #[error("generation failed: {0}")]
    GenerationFailed(String),
    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<GenerationError> for EditError {
    fn from(e: GenerationError) -> Self {
        Self::GenerationFailed(e.to_string())
    }
}

/// Shortfall report for an edit that produced fewer outputs than requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialGeneration {
    /// Number of variations the caller asked for.
    pub requested: u32,
    /// Number of candidates actually created.
    pub produced: u32,
}

/// Result of a successful (possibly partial) edit request.
///
/// Partial generation is not an `Err`: the successful candidates are
/// always usable, and [`EditOutcome::partial_failure`] carries the
/// shortfall for callers that must surface it.
#[derive(Debug, Clone)]
pub struct EditOutcome {
    /// The edit group shared by every candidate.
    pub group: EditGroupId,
    /// The parent all candidates branch from.
    pub parent: NodeId,
    /// The created candidates, none canonical yet.
    pub candidates: Vec<SpriteNode>,
    /// The variation count originally requested.
    pub requested: u32,
}

impl EditOutcome {
    /// Number of candidates actually created.
    pub fn produced(&self) -> u32 {
        self.candidates.len() as u32
    }

    /// Whether generation fell short of the requested count.
    pub fn is_partial(&self) -> bool {
        self.produced() < self.requested
    }

    /// The shortfall report, if generation fell short.
    pub fn partial_failure(&self) -> Option<PartialGeneration> {
        self.is_partial().then(|| PartialGeneration {
            requested: self.requested,
            produced: self.produced(),
        })
    }
}

/// Orchestrates edit requests against a node store and a generation
/// capability.
pub struct EditCoordinator<S: NodeStore, G: SpriteGenerator> {
    store: Arc<S>,
    generator: Arc<G>,
}

impl<S: NodeStore, G: SpriteGenerator> EditCoordinator<S, G> {
    /// Create a coordinator over a shared store and generator.
    pub fn new(store: Arc<S>, generator: Arc<G>) -> Self {
        Self { store, generator }
    }

    /// Generate and store a new root node (an independent base asset).
    pub async fn create_root(&self, description: &str) -> Result<SpriteNode, EditError> {
        let asset = self.generator.generate_base(description).await?;
        let node = SpriteNode::root(
            NodeId::mint(),
            asset,
            description,
            chrono::Utc::now().timestamp(),
        );
        self.store.put(node.clone()).await?;

        tracing::info!(node_id = %node.id, "root created");
        Ok(node)
    }

    /// Request an edit: generate `variation_count` candidate successors of
    /// `parent_id` and record them as one uncommitted edit group.
    ///
    /// Returns the created candidates; fewer than requested means partial
    /// generation failure (see [`EditOutcome::partial_failure`]). Zero
    /// outputs fails the whole request with nothing written.
    pub async fn request_edit(
        &self,
        parent_id: NodeId,
        instruction: &str,
        variation_count: u32,
    ) -> Result<EditOutcome, EditError> {
        if variation_count < 1 {
            return Err(EditError::InvalidVariationCount(variation_count));
        }

        let parent = self
            .store
            .get(&parent_id)
            .await?
            .ok_or(EditError::ParentNotFound(parent_id))?;

        // Generation happens before any write; a cancelled or failed call
        // leaves the store untouched.
        let assets = self
            .generator
            .generate_variations(&parent.asset, instruction, variation_count)
            .await?;

        if assets.is_empty() {
            tracing::warn!(parent = %parent_id, "generation produced zero outputs");
            return Err(EditError::GenerationFailed(
                "generation produced zero outputs".to_string(),
            ));
        }

        let group = EditGroupId::mint();
        let created_at = chrono::Utc::now().timestamp();
        let mut candidates = Vec::with_capacity(assets.len());

        for asset in assets {
            let node = SpriteNode::candidate(
                NodeId::mint(),
                parent_id,
                group,
                asset,
                parent.description.clone(),
                instruction,
                created_at,
            );
            // A write failure here surfaces immediately; the remaining
            // generated outputs are discarded, never retried silently.
            self.store.put(node.clone()).await?;
            candidates.push(node);
        }

        let outcome = EditOutcome {
            group,
            parent: parent_id,
            candidates,
            requested: variation_count,
        };
        tracing::info!(
            parent = %parent_id,
            group = %group,
            requested = variation_count,
            produced = outcome.produced(),
            partial = outcome.is_partial(),
            "edit group created"
        );
        Ok(outcome)
    }

    /// Commit one candidate of an edit group as the canonical continuation.
    ///
    /// Idempotent for the same `(group, chosen)` pair; a second commit
    /// naming a different sibling fails with
    /// [`StoreError::AlreadyCommitted`].
    pub async fn commit(
        &self,
        group: EditGroupId,
        chosen: NodeId,
    ) -> Result<SpriteNode, EditError> {
        let node = self.store.commit_canonical(&group, &chosen).await?;
        Ok(node)
    }

    /// Shared store handle.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}
