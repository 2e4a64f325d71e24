//! The external generation capability seam.
//!
//! Image generation is an opaque external capability: text instruction
//! plus an optional source asset in, one or more new assets out. The
//! engine only depends on the [`SpriteGenerator`] trait; the production
//! image backend implements it outside this crate.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::types::AssetRef;

/// Error type for generation calls.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    /// The capability produced zero outputs.
    #[error("generation failed: {0}")]
    Failed(String),
    /// The call was cancelled cooperatively.
    #[error("generation cancelled")]
    Cancelled,
}

/// Trait for the image generation capability.
///
/// `generate_variations` may return fewer outputs than requested on
/// partial failure; the coordinator reports the shortfall. Implementations
/// should support cooperative cancellation (dropping the future must not
/// leave engine state behind; the coordinator writes no nodes until the
/// call returns).
#[async_trait]
pub trait SpriteGenerator: Send + Sync {
    /// Generate a single base asset from a description.
    async fn generate_base(&self, description: &str) -> Result<AssetRef, GenerationError>;

    /// Generate up to `count` independent variations of a source asset.
    ///
    /// Returns zero or more outputs; zero means full failure, fewer than
    /// `count` means partial failure. Each output pairs 1:1 with one
    /// candidate node.
    async fn generate_variations(
        &self,
        source: &AssetRef,
        instruction: &str,
        count: u32,
    ) -> Result<Vec<AssetRef>, GenerationError>;
}

/// Deterministic placeholder generator.
///
/// Produces `asset://` refs derived from fresh UUIDs. Used by the service
/// binary in development and by benches; it never fails and never falls
/// short.
#[derive(Debug, Clone, Default)]
pub struct StaticGenerator;

impl StaticGenerator {
    /// Create a placeholder generator.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SpriteGenerator for StaticGenerator {
    async fn generate_base(&self, _description: &str) -> Result<AssetRef, GenerationError> {
        Ok(AssetRef::new(format!("asset://{}", uuid::Uuid::new_v4())))
    }

    async fn generate_variations(
        &self,
        _source: &AssetRef,
        _instruction: &str,
        count: u32,
    ) -> Result<Vec<AssetRef>, GenerationError> {
        Ok((0..count)
            .map(|_| AssetRef::new(format!("asset://{}", uuid::Uuid::new_v4())))
            .collect())
    }
}

/// One pre-programmed [`ScriptedGenerator`] response.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    /// Produce exactly this many outputs (possibly fewer than requested,
    /// to drive partial-failure paths; capped at the requested count).
    Produce(u32),
    /// Fail the call outright.
    Fail(String),
}

/// Queue-driven generator for tests.
///
/// Each generation call pops the next scripted outcome; an empty queue
/// behaves like [`StaticGenerator`]. Not intended for production use.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<ScriptedOutcome>>,
}

impl ScriptedGenerator {
    /// Create a generator with an empty script (always succeeds in full).
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an outcome for the next unscripted call.
    pub fn push(&self, outcome: ScriptedOutcome) {
        self.script.lock().push_back(outcome);
    }

    fn next_outcome(&self) -> Option<ScriptedOutcome> {
        self.script.lock().pop_front()
    }
}

#[async_trait]
impl SpriteGenerator for ScriptedGenerator {
    async fn generate_base(&self, description: &str) -> Result<AssetRef, GenerationError> {
        match self.next_outcome() {
            Some(ScriptedOutcome::Fail(reason)) => Err(GenerationError::Failed(reason)),
            Some(ScriptedOutcome::Produce(0)) => {
                Err(GenerationError::Failed("no outputs produced".to_string()))
            }
            _ => Ok(AssetRef::new(format!(
                "asset://base/{}",
                uuid::Uuid::new_v4()
            ))),
        }
        .map(|asset| {
            tracing::trace!(description, %asset, "scripted base generation");
            asset
        })
    }

    async fn generate_variations(
        &self,
        _source: &AssetRef,
        instruction: &str,
        count: u32,
    ) -> Result<Vec<AssetRef>, GenerationError> {
        let produced = match self.next_outcome() {
            Some(ScriptedOutcome::Fail(reason)) => return Err(GenerationError::Failed(reason)),
            Some(ScriptedOutcome::Produce(n)) => n.min(count),
            None => count,
        };
        tracing::trace!(instruction, requested = count, produced, "scripted variations");
        Ok((0..produced)
            .map(|_| AssetRef::new(format!("asset://var/{}", uuid::Uuid::new_v4())))
            .collect())
    }
}
