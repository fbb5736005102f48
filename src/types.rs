//! Core data model shared between the trainer, classifier, and server.
//!
//! Two landmark representations exist on purpose: [`RawLandmarks`] is the
//! loose point-set contract the face extractor fulfils, while [`Landmarks`]
//! is the fixed wire shape clients receive (two points per eye, one nose
//! point). The per-frame pipeline performs the projection.

use serde::{Deserialize, Serialize};

/// Fixed-length appearance vector for one detected face.
///
/// Produced only by the extractor backend; opaque beyond its use as a
/// Euclidean-distance input.
pub type Embedding = Vec<f32>;

/// Label emitted for faces rejected by the distance threshold.
pub const UNKNOWN_LABEL: &str = "unknown";

/// 2D pixel coordinate within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Pixel bounds of one detected face within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

/// Landmark point sets as returned by the extractor backend.
///
/// Point counts are backend-defined; the fast detector contract is at least
/// two points per eye and one nose-tip point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLandmarks {
    pub right_eye: Vec<Point>,
    pub left_eye: Vec<Point>,
    pub nose_tip: Vec<Point>,
}

/// Endpoints of one eye on the wire: `(xa, ya)` and `(xb, yb)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EyeSpan {
    pub xa: i32,
    pub ya: i32,
    pub xb: i32,
    pub yb: i32,
}

/// Nose-tip point on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoseTip {
    pub x: i32,
    pub y: i32,
}

/// Fixed landmark set serialized per prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Landmarks {
    pub right_eye: EyeSpan,
    pub left_eye: EyeSpan,
    pub nose: NoseTip,
}

impl Landmarks {
    /// Project an extractor point set onto the wire shape: the first two
    /// points of each eye and the first nose-tip point. Returns `None` when
    /// the set is too sparse to fill the contract.
    pub fn project(raw: &RawLandmarks) -> Option<Self> {
        let eye = |points: &[Point]| -> Option<EyeSpan> {
            let a = points.first()?;
            let b = points.get(1)?;
            Some(EyeSpan {
                xa: a.x,
                ya: a.y,
                xb: b.x,
                yb: b.y,
            })
        };
        let nose = raw.nose_tip.first()?;
        Some(Self {
            right_eye: eye(&raw.right_eye)?,
            left_eye: eye(&raw.left_eye)?,
            nose: NoseTip {
                x: nose.x,
                y: nose.y,
            },
        })
    }
}

/// One face found by the extractor in a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFace {
    pub bounding_box: BoundingBox,
    pub embedding: Embedding,
    pub landmarks: RawLandmarks,
}

/// Per-face recognition result serialized back to the client.
///
/// Box coordinates are flattened alongside `name` and `distance` so the
/// reply stays a flat array of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Matched identity, or [`UNKNOWN_LABEL`] when the nearest stored
    /// example is beyond the distance threshold.
    pub name: String,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
    /// Distance to the single nearest stored example.
    pub distance: f32,
    pub landmarks: Landmarks,
}
