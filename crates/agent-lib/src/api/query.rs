//! Snapshot queries and probes

use super::{AppState, ApiError, Scope, ScopeQuery};
use crate::health::ComponentStatus;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use tracing::warn;

/// Liveness probe; independent of the histories and the sampler
pub async fn ping() -> &'static str {
    "ok"
}

/// Full contents of the selected history, oldest first
pub async fn history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScopeQuery>,
) -> Result<Response, ApiError> {
    let response = match Scope::parse(params.scope.as_deref())? {
        Scope::Stats => Json(state.samples.snapshot().await).into_response(),
        Scope::Events => Json(state.events.snapshot().await).into_response(),
    };
    Ok(response)
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
pub async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
pub async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    state
        .metrics
        .set_history_items(crate::observability::buffers::EVENTS, state.events.len().await);

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        state.metrics.inc_encode_failures();
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}
