//! k-nearest-neighbor identity classifier.
//!
//! The classifier is fit once at startup and then only ever read: every
//! serving call goes through [`KnnClassifier::classify`], a pure function of
//! the stored examples, `k`, and the caller's threshold. No I/O, no interior
//! mutability, so a shared `Arc<KnnClassifier>` needs no locking.
//!
//! Decision semantics are deliberately asymmetric: the *label* comes from an
//! inverse-distance-weighted vote over the k nearest examples, while the
//! *distance* fed to the threshold test is the rank-1 neighbor's distance
//! alone. Callers depend on that exact behavior for interchangeability with
//! previously trained artifacts.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Embedding, UNKNOWN_LABEL};

/// Nearest-neighbor distance above which a match is rejected as unknown.
pub const DEFAULT_DISTANCE_THRESHOLD: f32 = 0.5;

/// One labeled embedding accepted during training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub label: String,
    pub embedding: Embedding,
}

/// Per-embedding classification outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Winning identity, or [`UNKNOWN_LABEL`] when the rank-1 distance
    /// exceeds the threshold.
    pub label: String,
    /// Distance to the single nearest stored example.
    pub distance: f32,
}

/// Fitting requires at least one accepted training example.
#[derive(Debug, Error)]
#[error("cannot fit a neighbor classifier on zero training examples")]
pub struct EmptyTrainingSet;

/// Errors reading or writing the serialized classifier artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read classifier artifact {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write classifier artifact {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed classifier artifact {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid classifier artifact {path}: {reason}")]
    Invalid {
        path: PathBuf,
        reason: &'static str,
    },
}

/// Trained k-NN model: the full example set plus the neighbor count.
///
/// Immutable after [`KnnClassifier::fit`]; the serving layer shares it by
/// reference across all connections. A future retrain capability must swap
/// in a fresh instance, never mutate this one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnClassifier {
    examples: Vec<TrainingExample>,
    k: usize,
}

impl KnnClassifier {
    /// Fit a classifier over `examples`.
    ///
    /// When `n_neighbors` is `None`, `k` defaults to the integer nearest to
    /// the square root of the example count (minimum 1), keeping the
    /// neighbor count sublinear in training-set size.
    pub fn fit(
        examples: Vec<TrainingExample>,
        n_neighbors: Option<usize>,
    ) -> Result<Self, EmptyTrainingSet> {
        if examples.is_empty() {
            return Err(EmptyTrainingSet);
        }
        let k = n_neighbors
            .unwrap_or_else(|| (examples.len() as f64).sqrt().round() as usize)
            .max(1);
        Ok(Self { examples, k })
    }

    /// Neighbor count used for the label vote.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of stored training examples.
    pub fn example_count(&self) -> usize {
        self.examples.len()
    }

    /// Distinct identity labels in the training set.
    pub fn label_count(&self) -> usize {
        let mut labels: Vec<&str> = self.examples.iter().map(|e| e.label.as_str()).collect();
        labels.sort_unstable();
        labels.dedup();
        labels.len()
    }

    /// Classify a batch of embeddings, one decision per input in order.
    pub fn classify(&self, embeddings: &[Embedding], threshold: f32) -> Vec<Decision> {
        embeddings
            .iter()
            .map(|embedding| self.classify_one(embedding, threshold))
            .collect()
    }

    fn classify_one(&self, embedding: &Embedding, threshold: f32) -> Decision {
        let mut neighbors: Vec<(f32, &str)> = self
            .examples
            .iter()
            .map(|ex| (euclidean(embedding, &ex.embedding), ex.label.as_str()))
            .collect();
        neighbors.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        neighbors.truncate(self.k);

        // Threshold test uses only the rank-1 neighbor.
        let nearest = neighbors[0].0;

        let candidate = vote(&neighbors);
        let label = if nearest <= threshold {
            candidate.to_string()
        } else {
            UNKNOWN_LABEL.to_string()
        };

        Decision {
            label,
            distance: nearest,
        }
    }

    /// Serialize the classifier to `path`. The artifact format is opaque to
    /// clients; only this crate reads it back.
    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        let json = serde_json::to_vec(self).map_err(|source| ArtifactError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| ArtifactError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a previously saved classifier from `path`.
    ///
    /// Enforces the same invariants as [`KnnClassifier::fit`]: an artifact
    /// with zero examples or a zero neighbor count is rejected here rather
    /// than panicking on the first classification.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let bytes = fs::read(path).map_err(|source| ArtifactError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let classifier: Self =
            serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;
        if classifier.examples.is_empty() {
            return Err(ArtifactError::Invalid {
                path: path.to_path_buf(),
                reason: "zero training examples",
            });
        }
        if classifier.k == 0 {
            return Err(ArtifactError::Invalid {
                path: path.to_path_buf(),
                reason: "neighbor count of zero",
            });
        }
        Ok(classifier)
    }
}

/// Inverse-distance-weighted majority vote over the k nearest neighbors.
///
/// Zero-distance neighbors carry infinite weight under inverse-distance
/// weighting, so when any are present the vote is restricted to them (each
/// counting equally), matching the training-time weighting scheme.
fn vote<'a>(neighbors: &[(f32, &'a str)]) -> &'a str {
    let mut weights: HashMap<&str, f32> = HashMap::new();

    let exact: Vec<&str> = neighbors
        .iter()
        .filter(|(d, _)| *d == 0.0)
        .map(|(_, label)| *label)
        .collect();

    if exact.is_empty() {
        for &(distance, label) in neighbors {
            *weights.entry(label).or_insert(0.0) += 1.0 / distance;
        }
    } else {
        for label in exact {
            *weights.entry(label).or_insert(0.0) += 1.0;
        }
    }

    // Deterministic tie-break: highest weight, then lexicographic label.
    let mut ranked: Vec<(&str, f32)> = weights.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked[0].0
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "embedding dimensions must agree");
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}
