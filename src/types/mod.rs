//! Core types for the lineage engine.

pub mod node;

pub use node::{AssetRef, EditGroupId, NodeId, NodeShapeError, SpriteNode};
