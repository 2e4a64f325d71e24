//! Axum routes for the lineage service.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::coordinator::{EditError, PartialGeneration};
use crate::engine::History;
use crate::generate::StaticGenerator;
use crate::index::IndexError;
use crate::store::{PostgresNodeStore, StoreError};
use crate::timeline::{Timeline, TimelineError};
use crate::types::{EditGroupId, NodeId, SpriteNode};
use crate::LINEAGE_SCHEMA_VERSION;

use super::middleware::record_edit_metrics;
use super::state::ServiceState;

/// Type alias for the service state with the PostgreSQL store and the
/// development generation backend.
pub type AppState = ServiceState<PostgresNodeStore, StaticGenerator>;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to create a new root sprite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRootRequest {
    /// Description of the base asset to generate.
    pub description: String,
}

/// Request to edit an existing sprite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEditBody {
    /// The transformation instruction.
    pub instruction: String,
    /// How many candidate variations to generate (>= 1).
    pub variation_count: u32,
}

/// Request to commit one candidate of an edit group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    /// The chosen candidate's node id.
    pub chosen_id: String,
}

/// Serializable node record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDto {
    /// Node id.
    pub id: String,
    /// Parent node id, absent for roots.
    pub parent_id: Option<String>,
    /// Opaque asset handle.
    pub asset_ref: String,
    /// Content description.
    pub description: String,
    /// Edit instruction that produced this node, absent for roots.
    pub edit_description: Option<String>,
    /// Edit group id, absent for roots.
    pub edit_group_id: Option<String>,
    /// Whether this node is the committed lineage continuation.
    pub canonical: bool,
    /// Unix timestamp of creation.
    pub created_at: i64,
}

impl From<SpriteNode> for NodeDto {
    fn from(node: SpriteNode) -> Self {
        Self {
            id: node.id.to_string(),
            parent_id: node.parent_id.map(|p| p.to_string()),
            asset_ref: node.asset.to_string(),
            description: node.description,
            edit_description: node.edit_description,
            edit_group_id: node.edit_group.map(|g| g.to_string()),
            canonical: node.canonical,
            created_at: node.created_at,
        }
    }
}

/// One timeline position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionDto {
    /// 1-based version number.
    pub version: usize,
    /// The node at this version.
    pub node: NodeDto,
}

/// Serializable timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineDto {
    /// Canonical versions, root first.
    pub versions: Vec<VersionDto>,
    /// The queried node, when it is an uncommitted branch outside the
    /// canonical path. Clients must render this case explicitly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_tip: Option<NodeDto>,
}

impl From<Timeline> for TimelineDto {
    fn from(timeline: Timeline) -> Self {
        Self {
            versions: timeline
                .entries
                .into_iter()
                .enumerate()
                .map(|(i, node)| VersionDto {
                    version: i + 1,
                    node: node.into(),
                })
                .collect(),
            branch_tip: timeline.branch_tip.map(Into::into),
        }
    }
}

/// Response for edit requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditResponse {
    /// The edit group shared by every candidate.
    pub edit_group_id: String,
    /// Parent node id.
    pub parent_id: String,
    /// The created candidates, none canonical yet.
    pub candidates: Vec<NodeDto>,
    /// Variations originally requested.
    pub requested: u32,
    /// Candidates actually created.
    pub produced: u32,
    /// Machine-readable code, present when generation fell short.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Shortfall details, present when generation fell short.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_failure: Option<PartialGeneration>,
}

/// Response for history queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    /// The queried node.
    pub node: NodeDto,
    /// Ancestors, immediate parent first.
    pub ancestors: Vec<NodeDto>,
    /// All direct children, canonical and non-canonical.
    pub children: Vec<NodeDto>,
    /// The lineage timeline.
    pub timeline: TimelineDto,
    /// True when the queried node is outside the canonical path.
    pub orphan_branch: bool,
}

impl From<History> for HistoryResponse {
    fn from(history: History) -> Self {
        let orphan_branch = history.timeline.is_orphan_branch();
        Self {
            node: history.node.into(),
            ancestors: history.ancestors.into_iter().map(Into::into).collect(),
            children: history.children.into_iter().map(Into::into).collect(),
            timeline: history.timeline.into(),
            orphan_branch,
        }
    }
}

/// Response for bulk listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    /// All nodes, ordered by creation.
    pub nodes: Vec<NodeDto>,
    /// Total count.
    pub count: usize,
}

/// Service health response (detailed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall status string.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Node schema version.
    pub schema_version: String,
    /// Database connectivity status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseHealth>,
}

/// Database health information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseHealth {
    /// Whether the database answered a probe query.
    pub connected: bool,
    /// Current pool size.
    pub pool_size: u32,
    /// Idle connections.
    pub pool_idle: usize,
    /// Maximum pool size.
    pub pool_max: u32,
}

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    /// Always "alive" while the process runs.
    pub status: String,
}

/// Readiness response with dependency status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// Whether the service can take traffic.
    pub ready: bool,
    /// Database reachability.
    pub database: bool,
}

/// Structured error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
    /// Additional error details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response with code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> axum::response::Response {
        tracing::warn!(code = %self.code, error = %self.error, "Request error");
        (StatusCode::BAD_REQUEST, Json(self)).into_response()
    }
}

// ============================================================================
// Error Mapping
// ============================================================================

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_id(raw: &str, e: uuid::Error) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new("INVALID_ID", format!("Invalid id: {e}")).with_details(raw.to_string())),
    )
}

fn store_error(e: StoreError) -> ApiError {
    let (status, code) = match &e {
        StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        StoreError::GroupNotFound(_) => (StatusCode::NOT_FOUND, "GROUP_NOT_FOUND"),
        StoreError::AlreadyCommitted { .. } => (StatusCode::CONFLICT, "ALREADY_COMMITTED"),
        StoreError::NotInGroup { .. } => (StatusCode::BAD_REQUEST, "NOT_IN_GROUP"),
        StoreError::DuplicateId(_) | StoreError::DanglingParent { .. } | StoreError::InvalidNode(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "CONFLICT")
        }
        StoreError::Backend(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
    };
    (status, Json(ErrorResponse::new(code, e.to_string())))
}

fn edit_error(e: EditError) -> ApiError {
    match e {
        EditError::ParentNotFound(id) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("NOT_FOUND", format!("Parent node not found: {id}"))),
        ),
        EditError::InvalidVariationCount(n) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "INVALID_VARIATION_COUNT",
                format!("variation_count must be >= 1, got {n}"),
            )),
        ),
        EditError::GenerationFailed(reason) => (
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse::new("GENERATION_FAILED", reason)),
        ),
        EditError::Store(e) => store_error(e),
    }
}

fn timeline_error(e: TimelineError) -> ApiError {
    match e {
        TimelineError::NodeNotFound(id) | TimelineError::Index(IndexError::NodeNotFound(id)) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("NOT_FOUND", format!("Node not found: {id}"))),
        ),
        TimelineError::Index(IndexError::Store(e)) => store_error(e),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("HISTORY_FAILED", other.to_string())),
        ),
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Create a new root sprite from a description.
async fn create_root_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateRootRequest>,
) -> Result<(StatusCode, Json<NodeDto>), ApiError> {
    let node = state
        .engine
        .create_root(&request.description)
        .await
        .map_err(edit_error)?;
    Ok((StatusCode::CREATED, Json(node.into())))
}

/// List every stored node.
async fn list_handler(State(state): State<Arc<AppState>>) -> Result<Json<ListResponse>, ApiError> {
    let nodes = state.engine.list_all().await.map_err(store_error)?;
    Ok(Json(ListResponse {
        count: nodes.len(),
        nodes: nodes.into_iter().map(Into::into).collect(),
    }))
}

/// Fetch one node by id.
async fn get_node_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<NodeDto>, ApiError> {
    let node_id = NodeId::from_str(&id).map_err(|e| bad_id(&id, e))?;
    let node = state
        .engine
        .get_node(&node_id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("NOT_FOUND", format!("Node not found: {node_id}"))),
            )
        })?;
    Ok(Json(node.into()))
}

/// Request an edit: generate candidate successors of a node.
async fn request_edit_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<RequestEditBody>,
) -> Result<(StatusCode, Json<EditResponse>), ApiError> {
    let parent_id = NodeId::from_str(&id).map_err(|e| bad_id(&id, e))?;

    let start = Instant::now();
    let outcome = state
        .engine
        .request_edit(parent_id, &request.instruction, request.variation_count)
        .await
        .map_err(edit_error)?;
    record_edit_metrics(
        outcome.requested,
        outcome.produced(),
        start.elapsed().as_millis() as u64,
    );

    let partial = outcome.partial_failure();
    let response = EditResponse {
        edit_group_id: outcome.group.to_string(),
        parent_id: outcome.parent.to_string(),
        requested: outcome.requested,
        produced: outcome.produced(),
        code: partial.map(|_| "PARTIAL_GENERATION".to_string()),
        partial_failure: partial,
        candidates: outcome.candidates.into_iter().map(Into::into).collect(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// Commit one candidate of an edit group as canonical.
async fn commit_handler(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<String>,
    Json(request): Json<CommitRequest>,
) -> Result<Json<NodeDto>, ApiError> {
    let group = EditGroupId::from_str(&group_id).map_err(|e| bad_id(&group_id, e))?;
    let chosen = NodeId::from_str(&request.chosen_id).map_err(|e| bad_id(&request.chosen_id, e))?;

    let node = state.engine.commit(group, chosen).await.map_err(edit_error)?;
    Ok(Json(node.into()))
}

/// Fetch ancestors, children, and the timeline for one node.
async fn history_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let node_id = NodeId::from_str(&id).map_err(|e| bad_id(&id, e))?;
    let history = state
        .engine
        .get_history(&node_id)
        .await
        .map_err(timeline_error)?;
    Ok(Json(history.into()))
}

/// Health check endpoint (detailed).
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let db_healthy = state.store.is_healthy().await;
    let pool_stats = state.store.pool_stats();

    Json(HealthResponse {
        status: if db_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        schema_version: LINEAGE_SCHEMA_VERSION.to_string(),
        database: Some(DatabaseHealth {
            connected: db_healthy,
            pool_size: pool_stats.size,
            pool_idle: pool_stats.idle,
            pool_max: pool_stats.max,
        }),
    })
}

/// Liveness probe.
async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe with dependency status.
async fn readiness_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_ready = state.store.is_healthy().await;
    let status = if db_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadinessResponse {
            ready: db_ready,
            database: db_ready,
        }),
    )
}

/// Build the service router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/sprites", post(create_root_handler).get(list_handler))
        .route("/api/sprites/:id", get(get_node_handler))
        .route("/api/sprites/:id/edits", post(request_edit_handler))
        .route("/api/sprites/:id/history", get(history_handler))
        .route("/api/groups/:group_id/commit", post(commit_handler))
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .layer(axum::middleware::from_fn(super::middleware::metrics_middleware))
        .with_state(Arc::new(state))
}
