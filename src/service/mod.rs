//! HTTP service for the lineage engine (feature `service`).
//!
//! Exposes the engine surface as a REST API for the sprite frontend:
//! root creation, edit requests, group commits, and history queries.

pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::{create_router, AppState};
pub use state::ServiceState;
