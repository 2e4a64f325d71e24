//! Shared service state.

use std::sync::Arc;

use crate::engine::LineageEngine;
use crate::generate::SpriteGenerator;
use crate::store::NodeStore;

/// Shared service state: the engine plus its store handle for health
/// checks.
pub struct ServiceState<S: NodeStore + 'static, G: SpriteGenerator + 'static> {
    /// The lineage engine serving all requests.
    pub engine: Arc<LineageEngine<S, G>>,
    /// The store, retained separately for backend health reporting.
    pub store: Arc<S>,
}

impl<S: NodeStore + 'static, G: SpriteGenerator + 'static> ServiceState<S, G> {
    /// Create service state over a store and generation backend.
    pub fn new(store: Arc<S>, generator: Arc<G>) -> Self {
        let engine = Arc::new(LineageEngine::new(Arc::clone(&store), generator));
        Self { engine, store }
    }
}

impl<S: NodeStore + 'static, G: SpriteGenerator + 'static> Clone for ServiceState<S, G> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            store: Arc::clone(&self.store),
        }
    }
}
