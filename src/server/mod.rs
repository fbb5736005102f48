//! Server initialization and routing
//!
//! This module handles the Axum server setup including:
//! - Router configuration (health endpoints + the `/recognize` websocket)
//! - Startup sequencing: the classifier is trained or loaded *before* the
//!   listener binds, so no connection is ever accepted against an untrained
//!   classifier
//! - Graceful shutdown handling

pub mod error;
pub mod health;
pub mod state;
pub mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::extract::FaceExtractor;
use crate::prepare_classifier;
use error::{ServerError, ServerResult};
use state::AppState;

/// API version and base info (GET /)
pub async fn api_info() -> ServerResult<impl IntoResponse> {
    Ok(Json(json!({
        "name": "Facestream Server",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/recognize",
            "/health",
            "/ready",
            "/metrics"
        ]
    })))
}

/// 404 Not Found handler
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}

/// Build the Axum router with all routes
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(api_info))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics))
        .route("/recognize", get(ws::ws_recognize))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the facestream server
///
/// Trains (or loads) the classifier, then listens for websocket connections
/// carrying image frames. This function blocks until the server is shut
/// down via SIGTERM or Ctrl+C.
///
/// # Initialization
///
/// 1. Sets up structured JSON logging with the configured log level
/// 2. Trains the classifier from the configured directory, or loads the
///    persisted artifact when retraining is disabled — fatal on failure
/// 3. Builds the router and binds the TCP listener (only now are
///    connections accepted)
/// 4. Serves with graceful shutdown support
pub async fn start_server(
    config: ServerConfig,
    extractor: Arc<dyn FaceExtractor>,
) -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(config.log_level.as_str())
        .with_target(false)
        .json()
        .init();

    config.validate()?;

    // Startup sequencing: classifier first, listener second.
    let classifier = Arc::new(prepare_classifier(&config, extractor.as_ref())?);
    let state = Arc::new(AppState::new(config.clone(), classifier, extractor));

    let app = build_router(state);
    let addr: SocketAddr = config.socket_addr()?;

    tracing::info!(
        "Starting facestream server on {} (threshold {}, retrain {})",
        addr,
        config.distance_threshold,
        config.retrain
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
