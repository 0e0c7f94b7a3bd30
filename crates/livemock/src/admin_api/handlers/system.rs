//! System handlers: health, metrics, pending interceptions.

use crate::admin_api::types::{build_response_with_headers, json_response};
use crate::live::InterceptionCoordinator;
use crate::metrics::collect_metrics;
use crate::registry::EndpointRegistry;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::sync::Arc;

/// GET /health - Health check
pub fn handle_health(
    registry: &EndpointRegistry,
    coordinator: &InterceptionCoordinator,
) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "status": "ok",
            "mocks": registry.len(),
            "pendingInterceptions": coordinator.pending_count(),
        }),
    )
}

/// GET /metrics - Prometheus metrics
pub fn handle_metrics() -> Response<Full<Bytes>> {
    build_response_with_headers(
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        collect_metrics(),
    )
}

/// GET /live/pending - Requests currently held for an operator
pub fn handle_pending(coordinator: Arc<InterceptionCoordinator>) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &coordinator.pending())
}
