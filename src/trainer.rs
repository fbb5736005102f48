//! One-shot classifier training from a directory of labeled images.
//!
//! The training root's immediate subdirectories are identity labels; any
//! `png`/`jpg`/`jpeg` file inside one is a training image for that identity.
//! Images that do not contain exactly one face are skipped, never fatal;
//! only a missing root or an empty accepted set aborts startup.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::classifier::{EmptyTrainingSet, KnnClassifier, TrainingExample};
use crate::extract::{DetectionMode, FaceExtractor};

/// Image file extensions accepted as training input (case-insensitive).
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Fatal training failures. Everything else is a skip.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("training directory {path} is unreadable: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    NoExamples(#[from] EmptyTrainingSet),
}

/// Enumerate the labeled training images under `root`.
///
/// Returns one `(label, image paths)` pair per immediate subdirectory, in
/// directory-iteration order. Non-directories at the top level and files
/// with other extensions are ignored.
pub fn list_labeled_images(root: &Path) -> Result<Vec<(String, Vec<PathBuf>)>, TrainError> {
    let read_dir = |path: &Path| {
        std::fs::read_dir(path).map_err(|source| TrainError::Io {
            path: path.to_path_buf(),
            source,
        })
    };

    let mut labeled = Vec::new();
    for entry in read_dir(root)? {
        let entry = entry.map_err(|source| TrainError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }
        let label = entry.file_name().to_string_lossy().into_owned();

        let mut images = Vec::new();
        for file in read_dir(&dir)? {
            let file = file.map_err(|source| TrainError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = file.path();
            let allowed = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| {
                    let ext = ext.to_ascii_lowercase();
                    ALLOWED_EXTENSIONS.contains(&ext.as_str())
                })
                .unwrap_or(false);
            if allowed {
                images.push(path);
            }
        }
        images.sort();
        labeled.push((label, images));
    }

    Ok(labeled)
}

/// Train a k-NN classifier from the labeled images under `root`.
///
/// Runs the extractor in [`DetectionMode::Exhaustive`] once per image and
/// accepts `(embedding, label)` only when exactly one face is found. With
/// `n_neighbors` unset, `k` defaults to the integer nearest the square root
/// of the accepted example count.
pub fn train(
    root: &Path,
    extractor: &dyn FaceExtractor,
    n_neighbors: Option<usize>,
) -> Result<KnnClassifier, TrainError> {
    let mut examples = Vec::new();

    for (label, images) in list_labeled_images(root)? {
        for path in images {
            // Sniff the container by content; extensions lie often enough.
            let decoded = image::ImageReader::open(&path)
                .and_then(|reader| reader.with_guessed_format())
                .map_err(image::ImageError::IoError)
                .and_then(|reader| reader.decode());
            let image = match decoded {
                Ok(img) => img.to_rgb8(),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable training image");
                    continue;
                }
            };

            let mut faces = match extractor.detect(&image, DetectionMode::Exhaustive) {
                Ok(faces) => faces,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping training image: extraction failed");
                    continue;
                }
            };

            match faces.len() {
                1 => {
                    if let Some(face) = faces.pop() {
                        examples.push(TrainingExample {
                            label: label.clone(),
                            embedding: face.embedding,
                        });
                    }
                }
                0 => {
                    tracing::debug!(path = %path.display(), "skipping training image: no face found");
                }
                n => {
                    tracing::debug!(path = %path.display(), faces = n, "skipping training image: more than one face");
                }
            }
        }
    }

    let classifier = KnnClassifier::fit(examples, n_neighbors)?;
    tracing::info!(
        examples = classifier.example_count(),
        labels = classifier.label_count(),
        k = classifier.k(),
        "classifier trained"
    );
    Ok(classifier)
}
