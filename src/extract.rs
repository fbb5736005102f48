//! Face extraction seam.
//!
//! Detection and embedding extraction are external capabilities: the service
//! only consumes `detect(image, mode) -> faces`. [`FaceExtractor`] is the
//! trait production deployments implement over their detector of choice;
//! [`StubExtractor`] is a deterministic backend used when no model assets
//! are available, keeping the full train/serve pipeline runnable and
//! reproducible.

use image::RgbImage;
use thiserror::Error;

use crate::types::{BoundingBox, DetectedFace, Point, RawLandmarks};

/// Detector operating mode.
///
/// Training runs the exhaustive/high-accuracy pass once per image; live
/// frames use the cheaper fast pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMode {
    Exhaustive,
    Fast,
}

/// Errors surfaced by an extraction backend.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The underlying detector failed (corrupt pixel data, model failure).
    #[error("extraction backend failure: {0}")]
    Backend(String),

    /// A detected face came back without the landmark points the fast
    /// detector contract guarantees (two per eye, one nose tip).
    #[error("incomplete landmark set for face {face}")]
    IncompleteLandmarks { face: usize },
}

/// Capability turning a pixel array into detected faces with embeddings and
/// landmark point sets. Implementations must be safe to call concurrently.
pub trait FaceExtractor: Send + Sync {
    fn detect(
        &self,
        image: &RgbImage,
        mode: DetectionMode,
    ) -> Result<Vec<DetectedFace>, ExtractionError>;
}

/// Deterministic stub backend.
///
/// Reports one centered face per image with an embedding derived from a
/// coarse 2x2 grid of mean channel intensities, so identical pictures land
/// at distance zero and similar pictures land close. Images smaller than
/// [`StubExtractor::MIN_FACE_DIM`] on either side report no faces.
#[derive(Debug, Default, Clone)]
pub struct StubExtractor;

impl StubExtractor {
    /// Smallest image dimension that can still contain a detectable face.
    pub const MIN_FACE_DIM: u32 = 32;

    const GRID: u32 = 2;

    fn grid_embedding(image: &RgbImage) -> Vec<f32> {
        let (w, h) = image.dimensions();
        let cell_w = (w / Self::GRID).max(1);
        let cell_h = (h / Self::GRID).max(1);

        let mut embedding = Vec::with_capacity((Self::GRID * Self::GRID * 3) as usize);
        for gy in 0..Self::GRID {
            for gx in 0..Self::GRID {
                let mut sums = [0u64; 3];
                let mut count = 0u64;
                for y in (gy * cell_h)..((gy + 1) * cell_h).min(h) {
                    for x in (gx * cell_w)..((gx + 1) * cell_w).min(w) {
                        let px = image.get_pixel(x, y);
                        sums[0] += u64::from(px[0]);
                        sums[1] += u64::from(px[1]);
                        sums[2] += u64::from(px[2]);
                        count += 1;
                    }
                }
                let count = count.max(1) as f32;
                for sum in sums {
                    embedding.push(sum as f32 / count / 255.0);
                }
            }
        }
        embedding
    }
}

impl FaceExtractor for StubExtractor {
    fn detect(
        &self,
        image: &RgbImage,
        _mode: DetectionMode,
    ) -> Result<Vec<DetectedFace>, ExtractionError> {
        let (w, h) = image.dimensions();
        if w < Self::MIN_FACE_DIM || h < Self::MIN_FACE_DIM {
            return Ok(Vec::new());
        }

        // Centered box covering the middle half of the frame.
        let (w, h) = (w as i32, h as i32);
        let bounding_box = BoundingBox {
            top: h / 4,
            right: w * 3 / 4,
            bottom: h * 3 / 4,
            left: w / 4,
        };

        let eye_y = bounding_box.top + (bounding_box.bottom - bounding_box.top) / 3;
        let nose_y = bounding_box.top + (bounding_box.bottom - bounding_box.top) / 2;
        let third = (bounding_box.right - bounding_box.left) / 3;
        let landmarks = RawLandmarks {
            right_eye: vec![
                Point::new(bounding_box.left + third - 2, eye_y),
                Point::new(bounding_box.left + third + 2, eye_y),
            ],
            left_eye: vec![
                Point::new(bounding_box.right - third - 2, eye_y),
                Point::new(bounding_box.right - third + 2, eye_y),
            ],
            nose_tip: vec![Point::new(bounding_box.left + (bounding_box.right - bounding_box.left) / 2, nose_y)],
        };

        Ok(vec![DetectedFace {
            bounding_box,
            embedding: Self::grid_embedding(image),
            landmarks,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(w: u32, h: u32, rgb: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb(rgb))
    }

    #[test]
    fn stub_is_deterministic() {
        let stub = StubExtractor;
        let image = solid(64, 64, [200, 40, 40]);
        let a = stub.detect(&image, DetectionMode::Fast).unwrap();
        let b = stub.detect(&image, DetectionMode::Exhaustive).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].embedding.len(), 12);
    }

    #[test]
    fn tiny_images_contain_no_face() {
        let stub = StubExtractor;
        let image = solid(16, 64, [10, 10, 10]);
        assert!(stub.detect(&image, DetectionMode::Fast).unwrap().is_empty());
    }

    #[test]
    fn distinct_colors_are_far_apart() {
        let stub = StubExtractor;
        let red = stub.detect(&solid(64, 64, [255, 0, 0]), DetectionMode::Fast).unwrap();
        let blue = stub.detect(&solid(64, 64, [0, 0, 255]), DetectionMode::Fast).unwrap();
        let dist: f32 = red[0]
            .embedding
            .iter()
            .zip(&blue[0].embedding)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt();
        assert!(dist > 1.0, "expected distinct colors far apart, got {dist}");
    }

    #[test]
    fn landmarks_fulfil_fast_contract() {
        let stub = StubExtractor;
        let faces = stub.detect(&solid(64, 64, [5, 5, 5]), DetectionMode::Fast).unwrap();
        let lm = &faces[0].landmarks;
        assert!(lm.right_eye.len() >= 2);
        assert!(lm.left_eye.len() >= 2);
        assert!(!lm.nose_tip.is_empty());
    }
}
