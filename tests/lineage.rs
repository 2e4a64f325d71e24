//! End-to-end lineage tests.
//!
//! These tests drive the full engine surface over the in-memory store:
//! root creation, edit groups, commits, history queries, timelines, and
//! navigation.

use std::sync::Arc;

use sprite_lineage::store::InMemoryNodeStore;
use sprite_lineage::{
    BrowseSession, EditError, LineageEngine, LineageIndex, NodeId, NodeStore, ScriptedGenerator,
    ScriptedOutcome, StoreError,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

type Engine = LineageEngine<InMemoryNodeStore, ScriptedGenerator>;

fn engine() -> (Arc<InMemoryNodeStore>, Arc<ScriptedGenerator>, Engine) {
    let store = Arc::new(InMemoryNodeStore::new());
    let generator = Arc::new(ScriptedGenerator::new());
    let engine = LineageEngine::new(Arc::clone(&store), Arc::clone(&generator));
    (store, generator, engine)
}

fn ids(nodes: &[sprite_lineage::SpriteNode]) -> Vec<NodeId> {
    nodes.iter().map(|n| n.id).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// ROOT AND EDIT GROUP TESTS
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_root_then_edit_then_commit() {
    let (_store, _gen, engine) = engine();

    let root = engine.create_root("a blue slime").await.unwrap();
    assert!(root.is_root());
    assert!(root.canonical);

    let edit = engine.request_edit(root.id, "make it red", 3).await.unwrap();
    assert_eq!(edit.produced(), 3);
    for candidate in &edit.candidates {
        assert_eq!(candidate.parent_id, Some(root.id));
        assert_eq!(candidate.edit_group, Some(edit.group));
        assert!(!candidate.canonical);
        assert_eq!(candidate.description, "a blue slime");
        assert_eq!(candidate.edit_description.as_deref(), Some("make it red"));
    }

    let chosen = edit.candidates[1].id;
    let committed = engine.commit(edit.group, chosen).await.unwrap();
    assert!(committed.canonical);

    // Siblings remain stored and non-canonical.
    for candidate in &edit.candidates {
        let stored = engine.get_node(&candidate.id).await.unwrap().unwrap();
        assert_eq!(stored.canonical, stored.id == chosen);
    }

    let history = engine.get_history(&chosen).await.unwrap();
    assert_eq!(ids(&history.timeline.entries), vec![root.id, chosen]);
    assert!(!history.timeline.is_orphan_branch());
}

#[tokio::test]
async fn test_second_generation_edit_extends_timeline() {
    let (_store, _gen, engine) = engine();

    let root = engine.create_root("a blue slime").await.unwrap();
    let first = engine.request_edit(root.id, "make it red", 3).await.unwrap();
    let c2 = first.candidates[1].id;
    engine.commit(first.group, c2).await.unwrap();

    let second = engine.request_edit(c2, "add a hat", 2).await.unwrap();
    let d1 = second.candidates[0].id;
    engine.commit(second.group, d1).await.unwrap();

    let history = engine.get_history(&d1).await.unwrap();
    assert_eq!(ids(&history.timeline.entries), vec![root.id, c2, d1]);
    assert_eq!(ids(&history.ancestors), vec![c2, root.id]);
    assert_eq!(history.timeline.version_of(&d1), Some(3));
}

#[tokio::test]
async fn test_partial_generation_writes_only_produced() {
    let (store, generator, engine) = engine();

    let root = engine.create_root("a blue slime").await.unwrap();

    generator.push(ScriptedOutcome::Produce(2));
    let edit = engine.request_edit(root.id, "make it red", 3).await.unwrap();

    assert_eq!(edit.requested, 3);
    assert_eq!(edit.produced(), 2);
    assert!(edit.is_partial());

    // Exactly root + 2 candidates stored; no placeholder for the failure.
    assert_eq!(store.num_nodes(), 3);
    let group_members = store.group_members(&edit.group).await.unwrap();
    assert_eq!(group_members.len(), 2);
}

#[tokio::test]
async fn test_full_generation_failure_writes_nothing() {
    let (store, generator, engine) = engine();

    let root = engine.create_root("a blue slime").await.unwrap();

    generator.push(ScriptedOutcome::Fail("provider unavailable".to_string()));
    let err = engine.request_edit(root.id, "make it red", 3).await.unwrap_err();
    assert!(matches!(err, EditError::GenerationFailed(_)));
    assert_eq!(store.num_nodes(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// COMMIT ARBITRATION TESTS
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_commit_is_idempotent_for_same_candidate() {
    let (_store, _gen, engine) = engine();

    let root = engine.create_root("slime").await.unwrap();
    let edit = engine.request_edit(root.id, "x", 2).await.unwrap();
    let chosen = edit.candidates[0].id;

    let first = engine.commit(edit.group, chosen).await.unwrap();
    let second = engine.commit(edit.group, chosen).await.unwrap();
    assert_eq!(first.id, second.id);
    assert!(second.canonical);
}

#[tokio::test]
async fn test_conflicting_commit_rejected_with_winner_reported() {
    let (_store, _gen, engine) = engine();

    let root = engine.create_root("slime").await.unwrap();
    let edit = engine.request_edit(root.id, "x", 2).await.unwrap();
    let winner = edit.candidates[0].id;
    let loser = edit.candidates[1].id;

    engine.commit(edit.group, winner).await.unwrap();
    let err = engine.commit(edit.group, loser).await.unwrap_err();

    match err {
        EditError::Store(StoreError::AlreadyCommitted {
            committed,
            attempted,
            ..
        }) => {
            assert_eq!(committed, winner);
            assert_eq!(attempted, loser);
        }
        other => panic!("expected AlreadyCommitted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_racing_commits_exactly_one_winner() {
    let (_store, _gen, engine) = engine();
    let engine = Arc::new(engine);

    let root = engine.create_root("slime").await.unwrap();
    let edit = engine.request_edit(root.id, "x", 4).await.unwrap();
    let group = edit.group;

    let mut handles = Vec::new();
    for candidate in &edit.candidates {
        let engine = Arc::clone(&engine);
        let chosen = candidate.id;
        handles.push(tokio::spawn(
            async move { engine.commit(group, chosen).await },
        ));
    }

    let mut wins = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(node) => {
                assert!(node.canonical);
                wins += 1;
            }
            Err(EditError::Store(StoreError::AlreadyCommitted { .. })) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(wins, 1, "exactly one racing commit must win");
    assert_eq!(conflicts, 3);

    // Exactly one canonical member in the group afterwards.
    let members = engine.store().group_members(&group).await.unwrap();
    assert_eq!(members.iter().filter(|n| n.canonical).count(), 1);
}

#[tokio::test]
async fn test_commit_unknown_group_and_wrong_member() {
    let (_store, _gen, engine) = engine();

    let root = engine.create_root("slime").await.unwrap();
    let a = engine.request_edit(root.id, "x", 1).await.unwrap();
    let b = engine.request_edit(root.id, "y", 1).await.unwrap();

    let err = engine
        .commit(sprite_lineage::EditGroupId::mint(), a.candidates[0].id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EditError::Store(StoreError::GroupNotFound(_))
    ));

    // Committing group A with a node from group B is rejected.
    let err = engine.commit(a.group, b.candidates[0].id).await.unwrap_err();
    assert!(matches!(err, EditError::Store(StoreError::NotInGroup { .. })));
}

// ─────────────────────────────────────────────────────────────────────────────
// HISTORY AND ORPHAN BRANCH TESTS
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_orphan_candidate_history() {
    let (_store, _gen, engine) = engine();

    let root = engine.create_root("a blue slime").await.unwrap();
    let edit = engine.request_edit(root.id, "make it red", 2).await.unwrap();
    // Nothing committed yet: both candidates are off the canonical path.
    let c1 = edit.candidates[0].id;

    let history = engine.get_history(&c1).await.unwrap();
    assert!(history.children.is_empty());
    assert_eq!(ids(&history.ancestors), vec![root.id]);

    // Timeline stops at the root; the candidate is reported as branch tip,
    // never silently spliced in.
    assert_eq!(ids(&history.timeline.entries), vec![root.id]);
    assert_eq!(history.timeline.branch_tip.as_ref().map(|n| n.id), Some(c1));
    assert!(history.timeline.is_orphan_branch());
}

#[tokio::test]
async fn test_rejected_sibling_stays_queryable_after_commit() {
    let (_store, _gen, engine) = engine();

    let root = engine.create_root("slime").await.unwrap();
    let edit = engine.request_edit(root.id, "x", 3).await.unwrap();
    engine.commit(edit.group, edit.candidates[2].id).await.unwrap();

    let rejected = edit.candidates[0].id;
    let node = engine.get_node(&rejected).await.unwrap().unwrap();
    assert!(!node.canonical);

    let history = engine.get_history(&rejected).await.unwrap();
    assert_eq!(history.timeline.branch_tip.as_ref().map(|n| n.id), Some(rejected));
}

#[tokio::test]
async fn test_children_include_all_groups() {
    let (store, _gen, engine) = engine();

    let root = engine.create_root("slime").await.unwrap();
    let a = engine.request_edit(root.id, "hat", 2).await.unwrap();
    let b = engine.request_edit(root.id, "cape", 2).await.unwrap();

    let history = engine.get_history(&root.id).await.unwrap();
    assert_eq!(history.children.len(), 4);
    let child_ids: Vec<NodeId> = ids(&history.children);
    for candidate in a.candidates.iter().chain(&b.candidates) {
        assert!(child_ids.contains(&candidate.id));
    }

    // children_of through the index agrees.
    let index = LineageIndex::new(store);
    assert_eq!(index.children_of(&root.id).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_timeline_contiguous_parent_links() {
    let (_store, _gen, engine) = engine();

    let root = engine.create_root("slime").await.unwrap();
    let mut tip = root.id;
    for i in 0..5 {
        let edit = engine
            .request_edit(tip, &format!("edit {i}"), 2)
            .await
            .unwrap();
        tip = edit.candidates[0].id;
        engine.commit(edit.group, tip).await.unwrap();
    }

    let timeline = engine.timeline_builder().build(tip).await.unwrap();
    assert_eq!(timeline.len(), 6);
    for pair in timeline.entries.windows(2) {
        assert_eq!(pair[1].parent_id, Some(pair[0].id));
    }
    assert_eq!(timeline.leaf().id, tip);
}

// ─────────────────────────────────────────────────────────────────────────────
// NAVIGATION TESTS
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_browse_session_walks_versions() {
    let (_store, _gen, engine) = engine();

    let root = engine.create_root("slime").await.unwrap();
    let e1 = engine.request_edit(root.id, "red", 1).await.unwrap();
    let v2 = e1.candidates[0].id;
    engine.commit(e1.group, v2).await.unwrap();
    let e2 = engine.request_edit(v2, "hat", 1).await.unwrap();
    let v3 = e2.candidates[0].id;
    engine.commit(e2.group, v3).await.unwrap();

    let timeline = engine.timeline_builder().build(v3).await.unwrap();
    let mut session = BrowseSession::new(timeline);

    assert_eq!(session.current().id, v3);
    assert_eq!(session.previous().id, v2);
    assert_eq!(session.previous().id, root.id);
    // Clamped at the root.
    assert_eq!(session.previous().id, root.id);
    assert_eq!(session.next().id, v2);
    assert_eq!(session.return_to_latest().id, v3);
}

#[tokio::test]
async fn test_jump_to_branch_is_display_only() {
    let (store, _gen, engine) = engine();

    let root = engine.create_root("slime").await.unwrap();
    let edit = engine.request_edit(root.id, "x", 2).await.unwrap();
    let winner = edit.candidates[0].id;
    let rejected = edit.candidates[1].id;
    engine.commit(edit.group, winner).await.unwrap();

    let builder = engine.timeline_builder();
    let timeline = builder.build(winner).await.unwrap();
    let mut session = BrowseSession::new(timeline);

    session.jump_to_node(&root.id).unwrap();
    let node = session.jump_to_branch(&builder, rejected).await.unwrap();
    assert_eq!(node.id, rejected);
    assert_eq!(ids(&session.timeline().entries), vec![root.id, rejected]);

    // Stored flags untouched by the display-only switch.
    assert!(store.get(&winner).await.unwrap().unwrap().canonical);
    assert!(!store.get(&rejected).await.unwrap().unwrap().canonical);

    // A fresh build still follows the committed branch.
    let rebuilt = builder.build(root.id).await.unwrap();
    assert_eq!(ids(&rebuilt.entries), vec![root.id, winner]);
}

#[tokio::test]
async fn test_jump_to_branch_of_branch() {
    let (store, _gen, engine) = engine();

    let root = engine.create_root("slime").await.unwrap();
    let edit = engine.request_edit(root.id, "x", 2).await.unwrap();
    let winner = edit.candidates[0].id;
    let rejected = edit.candidates[1].id;
    engine.commit(edit.group, winner).await.unwrap();

    // Grow an uncommitted branch under the rejected candidate.
    let deeper = engine.request_edit(rejected, "y", 1).await.unwrap();
    let grandchild = deeper.candidates[0].id;

    let builder = engine.timeline_builder();
    let mut session = BrowseSession::new(builder.build(winner).await.unwrap());

    session.jump_to_node(&root.id).unwrap();
    session.jump_to_branch(&builder, rejected).await.unwrap();

    // A second jump from the displayed branch must land on the target,
    // not fall back to the truncation point.
    let node = session.jump_to_branch(&builder, grandchild).await.unwrap();
    assert_eq!(node.id, grandchild);
    assert_eq!(
        ids(&session.timeline().entries),
        vec![root.id, rejected, grandchild]
    );

    // Stored flags untouched throughout.
    assert!(store.get(&winner).await.unwrap().unwrap().canonical);
    assert!(!store.get(&rejected).await.unwrap().unwrap().canonical);
    assert!(!store.get(&grandchild).await.unwrap().unwrap().canonical);
}

// ─────────────────────────────────────────────────────────────────────────────
// MULTI-ROOT TESTS
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_independent_roots_have_independent_lineages() {
    let (_store, _gen, engine) = engine();

    let slime = engine.create_root("a blue slime").await.unwrap();
    let knight = engine.create_root("a pixel knight").await.unwrap();

    let edit = engine.request_edit(slime.id, "red", 1).await.unwrap();
    let v2 = edit.candidates[0].id;
    engine.commit(edit.group, v2).await.unwrap();

    let slime_timeline = engine.timeline_builder().build(v2).await.unwrap();
    assert_eq!(ids(&slime_timeline.entries), vec![slime.id, v2]);

    let knight_timeline = engine.timeline_builder().build(knight.id).await.unwrap();
    assert_eq!(ids(&knight_timeline.entries), vec![knight.id]);
}
