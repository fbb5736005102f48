//! Facestream - streaming face recognition over websockets
//!
//! A client holds a persistent websocket connection, sends one binary
//! message per encoded image frame, and receives one JSON reply per frame
//! listing the detected faces, their identity (or `"unknown"`), the
//! nearest-neighbor distance, and a small set of facial landmarks.
//!
//! The identity classifier is a k-nearest-neighbor model fit once at
//! process start from a directory of labeled images (one subdirectory per
//! person) and then served read-only to every connection. Face detection
//! and embedding extraction are external capabilities consumed through the
//! [`extract::FaceExtractor`] trait.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use facestream::{extract::StubExtractor, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     facestream::server::start_server(config, Arc::new(StubExtractor)).await?;
//!     Ok(())
//! }
//! ```

pub mod classifier;
pub mod config;
pub mod extract;
pub mod recognize;
pub mod server;
pub mod trainer;
pub mod types;

pub use classifier::{
    Decision, KnnClassifier, TrainingExample, DEFAULT_DISTANCE_THRESHOLD,
};
pub use config::ServerConfig;
pub use extract::{DetectionMode, ExtractionError, FaceExtractor, StubExtractor};
pub use recognize::{recognize_frame, FrameError};
pub use trainer::{train, TrainError};
pub use types::{
    BoundingBox, DetectedFace, Embedding, Landmarks, Point, Prediction, RawLandmarks,
    UNKNOWN_LABEL,
};

use thiserror::Error;

use crate::classifier::ArtifactError;

/// Fatal startup failures: the service must not begin accepting
/// connections when any of these occur.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Training failed (missing directory or zero usable examples).
    #[error(transparent)]
    Train(#[from] TrainError),

    /// Retraining is disabled but no artifact path is configured.
    #[error("retraining is disabled and no model_path is configured")]
    ModelUnavailable,

    /// The persisted classifier artifact could not be loaded.
    #[error("failed to load classifier artifact: {0}")]
    ModelLoad(#[from] ArtifactError),
}

/// Produce the process-wide classifier according to the configured
/// lifecycle: train from the labeled-image directory (persisting the
/// artifact best-effort), or load a previously persisted artifact when
/// retraining is disabled.
pub fn prepare_classifier(
    config: &ServerConfig,
    extractor: &dyn FaceExtractor,
) -> Result<KnnClassifier, StartupError> {
    if !config.retrain {
        let path = config
            .model_path
            .as_deref()
            .ok_or(StartupError::ModelUnavailable)?;
        let classifier = KnnClassifier::load(path)?;
        tracing::info!(
            path = %path.display(),
            examples = classifier.example_count(),
            k = classifier.k(),
            "classifier loaded from artifact"
        );
        return Ok(classifier);
    }

    tracing::info!(train_dir = %config.train_dir.display(), "training classifier");
    let classifier = train(&config.train_dir, extractor, config.n_neighbors)?;

    // Persistence is best-effort; a write failure never blocks serving.
    if let Some(path) = config.model_path.as_deref() {
        if let Err(err) = classifier.save(path) {
            tracing::warn!(error = %err, "failed to persist classifier artifact");
        } else {
            tracing::info!(path = %path.display(), "classifier artifact persisted");
        }
    }

    Ok(classifier)
}
