//! Per-frame recognition pipeline: decode → detect → classify → assemble.
//!
//! Every failure here is scoped to the single frame that caused it; the
//! caller replies with an error marker and keeps the connection alive.

use thiserror::Error;

use crate::classifier::KnnClassifier;
use crate::extract::{DetectionMode, ExtractionError, FaceExtractor};
use crate::types::{Landmarks, Prediction};

/// Recoverable, frame-scoped failures.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The payload is not a decodable image.
    #[error("failed to decode frame: {0}")]
    Decode(#[from] image::ImageError),

    /// The detector failed on the decoded pixels.
    #[error("face extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
}

impl FrameError {
    /// Stable error code carried in error-marker replies.
    pub fn code(&self) -> &'static str {
        match self {
            FrameError::Decode(_) => "DECODE_ERROR",
            FrameError::Extraction(_) => "EXTRACTION_ERROR",
        }
    }
}

/// Run one encoded frame through the recognition pipeline.
///
/// Returns one [`Prediction`] per detected face in detection order; an empty
/// list when no faces are found (the common case, not an error). The
/// classifier is only read; concurrent calls over the same instance are
/// safe.
pub fn recognize_frame(
    classifier: &KnnClassifier,
    extractor: &dyn FaceExtractor,
    threshold: f32,
    bytes: &[u8],
) -> Result<Vec<Prediction>, FrameError> {
    let pixels = image::load_from_memory(bytes)?.to_rgb8();

    let faces = extractor.detect(&pixels, DetectionMode::Fast)?;
    if faces.is_empty() {
        return Ok(Vec::new());
    }

    // One batched classification pass over all embeddings in the frame.
    let embeddings: Vec<_> = faces.iter().map(|face| face.embedding.clone()).collect();
    let decisions = classifier.classify(&embeddings, threshold);

    let mut predictions = Vec::with_capacity(faces.len());
    for (idx, (face, decision)) in faces.iter().zip(decisions).enumerate() {
        let landmarks = Landmarks::project(&face.landmarks)
            .ok_or(ExtractionError::IncompleteLandmarks { face: idx })?;
        predictions.push(Prediction {
            name: decision.label,
            top: face.bounding_box.top,
            right: face.bounding_box.right,
            bottom: face.bounding_box.bottom,
            left: face.bounding_box.left,
            distance: decision.distance,
            landmarks,
        });
    }

    Ok(predictions)
}
