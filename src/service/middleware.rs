//! Service middleware for request metrics.
//!
//! ## Metrics Exposed
//!
//! - request count and latency by path pattern, method, and status
//! - edit generation counts (requested vs produced) per edit request

use axum::{extract::Request, middleware::Next, response::Response};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::info;

/// Metrics middleware that records request counts and latency.
///
/// Uses tracing for now - can be upgraded to prometheus metrics later.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    info!(
        target: "sprite_lineage::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request_metric"
    );

    response
}

/// Normalize path for metrics to avoid high cardinality.
///
/// Replaces UUID path segments with placeholders.
fn normalize_path(path: &str) -> String {
    static UUID_REGEX: OnceLock<regex_lite::Regex> = OnceLock::new();
    let uuid_regex = UUID_REGEX.get_or_init(|| {
        regex_lite::Regex::new(
            r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
        )
        .unwrap()
    });

    uuid_regex.replace_all(path, ":id").to_string()
}

/// Record edit generation metrics.
///
/// Call this after an edit request to track generation shortfalls.
pub fn record_edit_metrics(requested: u32, produced: u32, latency_ms: u64) {
    info!(
        target: "sprite_lineage::metrics",
        metric_type = "edit",
        requested = requested,
        produced = produced,
        partial = produced < requested,
        latency_ms = latency_ms,
        "edit_metric"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_replaces_uuid() {
        let path = "/api/sprites/550e8400-e29b-41d4-a716-446655440000/history";
        let normalized = normalize_path(path);
        assert_eq!(normalized, "/api/sprites/:id/history");
    }

    #[test]
    fn test_normalize_path_preserves_regular_path() {
        let path = "/health/ready";
        let normalized = normalize_path(path);
        assert_eq!(normalized, "/health/ready");
    }
}
