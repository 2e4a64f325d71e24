//! Sequential navigation over a built timeline.
//!
//! Navigation is pure: functions take a timeline and an index and return
//! a new index. Session state (the "current displayed version") lives in
//! a per-caller [`BrowseSession`], never in process-wide state; each
//! browsing session owns its own current-index value.

use std::collections::BTreeMap;

use crate::store::NodeStore;
use crate::timeline::{Timeline, TimelineBuilder, TimelineError};
use crate::types::{NodeId, SpriteNode};

/// Error type for navigation.
#[derive(Debug, thiserror::Error)]
pub enum NavigatorError {
    /// The node is not part of this timeline (e.g. it sits on a
    /// non-canonical branch).
    #[error("node not in timeline: {0}")]
    NotInTimeline(NodeId),
    /// Timeline rebuild failed during a branch jump.
    #[error(transparent)]
    Timeline(#[from] TimelineError),
}

/// Step to the previous version. Clamped: a no-op at the root.
pub fn previous(_timeline: &Timeline, index: usize) -> usize {
    index.saturating_sub(1)
}

/// Step to the next version. Clamped: a no-op at the leaf.
pub fn next(timeline: &Timeline, index: usize) -> usize {
    (index + 1).min(timeline.len().saturating_sub(1))
}

/// Find the position of a node in the timeline.
pub fn jump_to_node(timeline: &Timeline, id: &NodeId) -> Result<usize, NavigatorError> {
    timeline
        .position(id)
        .ok_or(NavigatorError::NotInTimeline(*id))
}

/// A browsing session over one lineage.
///
/// State machine: `Viewing(node)` transitions to `Viewing(other)` on any
/// navigation action; there is no terminal state. The initial position is
/// the timeline's leaf (the lineage's current canonical version).
#[derive(Debug, Clone)]
pub struct BrowseSession {
    timeline: Timeline,
    index: usize,
    /// Branch overrides accumulated by [`BrowseSession::jump_to_branch`],
    /// one per parent. Re-applied on every rebuild so a jump from an
    /// already-displayed branch still reaches its target.
    overrides: BTreeMap<NodeId, NodeId>,
}

impl BrowseSession {
    /// Open a session positioned at the latest version.
    pub fn new(timeline: Timeline) -> Self {
        let index = timeline.len().saturating_sub(1);
        Self {
            timeline,
            index,
            overrides: BTreeMap::new(),
        }
    }

    /// The node currently being viewed.
    pub fn current(&self) -> &SpriteNode {
        &self.timeline.entries[self.index]
    }

    /// Current position in the timeline (0-based).
    pub fn index(&self) -> usize {
        self.index
    }

    /// Current 1-based version number.
    pub fn version(&self) -> usize {
        self.index + 1
    }

    /// The timeline this session navigates.
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Step back one version.
    pub fn previous(&mut self) -> &SpriteNode {
        self.index = previous(&self.timeline, self.index);
        self.current()
    }

    /// Step forward one version.
    pub fn next(&mut self) -> &SpriteNode {
        self.index = next(&self.timeline, self.index);
        self.current()
    }

    /// Jump to a specific version by node id.
    pub fn jump_to_node(&mut self, id: &NodeId) -> Result<&SpriteNode, NavigatorError> {
        self.index = jump_to_node(&self.timeline, id)?;
        Ok(self.current())
    }

    /// Return to the latest version.
    pub fn return_to_latest(&mut self) -> &SpriteNode {
        self.index = self.timeline.len().saturating_sub(1);
        self.current()
    }

    /// Switch the session onto a branch outside the canonical path.
    ///
    /// Rebuilds the timeline treating `child` as the continuation of the
    /// current node, for display only; stored canonical flags are
    /// untouched. Earlier branch jumps of this session are re-applied, so
    /// jumping again from a displayed branch walks deeper into it. The
    /// session ends up positioned on `child`; on error it is unchanged.
    pub async fn jump_to_branch<S: NodeStore>(
        &mut self,
        builder: &TimelineBuilder<S>,
        child: NodeId,
    ) -> Result<&SpriteNode, NavigatorError> {
        let parent = self.current().id;
        let mut overrides = self.overrides.clone();
        overrides.insert(parent, child);

        let timeline = builder.build_with_overrides(child, &overrides).await?;
        let index = timeline
            .position(&child)
            .ok_or(NavigatorError::NotInTimeline(child))?;

        self.timeline = timeline;
        self.index = index;
        self.overrides = overrides;
        Ok(self.current())
    }
}
