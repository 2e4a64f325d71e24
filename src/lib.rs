//! # sprite-lineage
//!
//! Version lineage engine for generated sprite assets.
//!
//! A base sprite can be edited repeatedly; each edit produces one or more
//! candidate successors, one of which is committed to continue the
//! lineage. The engine keeps that branching history correct and
//! queryable:
//!
//! 1. Nodes are immutable and append-only; "editing" creates new nodes.
//! 2. Each edit request records its candidates as one **edit group**;
//!    a store-level compare-and-set commits exactly one sibling per
//!    group as **canonical**.
//! 3. History queries reconstruct the ancestor chain, the direct
//!    children, and a single linear **timeline** (root to leaf along
//!    canonical links) for sequential previous/next navigation.
//!
//! ## Architecture
//!
//! ```text
//! requestEdit → SpriteGenerator → EditCoordinator → NodeStore
//!                                       ↓ commit (CAS)
//!               LineageIndex ← NodeStore → TimelineBuilder → Navigator
//! ```
//!
//! Uncommitted candidates persist as retrievable branches; timelines
//! report them explicitly as branch tips rather than splicing them in.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coordinator;
pub mod engine;
pub mod generate;
pub mod index;
pub mod navigator;
pub mod store;
pub mod timeline;
pub mod types;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use coordinator::{EditCoordinator, EditError, EditOutcome, PartialGeneration};
pub use engine::{History, LineageEngine};
pub use generate::{GenerationError, ScriptedGenerator, ScriptedOutcome, SpriteGenerator, StaticGenerator};
pub use index::{IndexError, LineageIndex};
pub use navigator::{BrowseSession, NavigatorError};
pub use store::{InMemoryNodeStore, NodeStore, StoreError};
#[cfg(feature = "postgres")]
pub use store::PostgresNodeStore;
pub use timeline::{Timeline, TimelineBuilder, TimelineError};
pub use types::{AssetRef, EditGroupId, NodeId, SpriteNode};

#[cfg(feature = "service")]
pub use service::{create_router, ServiceState};

/// Schema version for persisted node records.
/// Increment on breaking changes to the node layout.
pub const LINEAGE_SCHEMA_VERSION: &str = "1.0.0";
