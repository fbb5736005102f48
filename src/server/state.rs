use std::sync::Arc;

use crate::classifier::KnnClassifier;
use crate::config::ServerConfig;
use crate::extract::FaceExtractor;

/// Shared application state
///
/// The classifier is trained before the listener binds and is read-only for
/// the lifetime of the process; sharing it here needs no locking. A future
/// retrain capability must replace the `Arc` atomically, never mutate the
/// instance in place.
pub struct AppState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Trained classifier (shared read-only across all connections)
    pub classifier: Arc<KnnClassifier>,

    /// Extraction backend (shared across all connections)
    pub extractor: Arc<dyn FaceExtractor>,
}

impl AppState {
    /// Create new server state
    pub fn new(
        config: ServerConfig,
        classifier: Arc<KnnClassifier>,
        extractor: Arc<dyn FaceExtractor>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            classifier,
            extractor,
        }
    }
}
