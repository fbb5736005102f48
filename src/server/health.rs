use std::sync::Arc;
use std::time::SystemTime;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::server::error::ServerResult;
use crate::server::state::AppState;

/// Global server start time for uptime calculation
static SERVER_START_TIME: once_cell::sync::Lazy<SystemTime> =
    once_cell::sync::Lazy::new(SystemTime::now);

fn uptime_seconds() -> u64 {
    SERVER_START_TIME
        .elapsed()
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Health check endpoint (liveness)
/// Returns 200 if server is running
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "facestream",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds(),
    }))
}

/// Readiness check endpoint
///
/// The classifier is always ready once the listener is up, because startup
/// binds only after training or artifact load completes.
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> ServerResult<impl IntoResponse> {
    Ok(Json(json!({
        "status": "ready",
        "service": "facestream",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds(),
        "components": {
            "api": "ready",
            "classifier": "ready",
        },
        "classifier": {
            "examples": state.classifier.example_count(),
            "labels": state.classifier.label_count(),
            "k": state.classifier.k(),
            "distance_threshold": state.config.distance_threshold,
        }
    })))
}

/// Basic metrics endpoint
pub async fn metrics(State(state): State<Arc<AppState>>) -> ServerResult<impl IntoResponse> {
    Ok(Json(json!({
        "uptime_seconds": uptime_seconds(),
        "classifier_examples": state.classifier.example_count(),
        "classifier_labels": state.classifier.label_count(),
    })))
}
