//! Integration tests for the classifier training lifecycle: labeled
//! directory enumeration, the skip policies, default neighbor counts, and
//! artifact persistence.

use std::path::Path;

use image::{Rgb, RgbImage};

use facestream::classifier::KnnClassifier;
use facestream::extract::{DetectionMode, ExtractionError, FaceExtractor, StubExtractor};
use facestream::trainer::{list_labeled_images, train, TrainError};
use facestream::types::{BoundingBox, DetectedFace, Point, RawLandmarks};
use facestream::{prepare_classifier, ServerConfig, StartupError};

fn write_png(path: &Path, w: u32, h: u32, rgb: [u8; 3]) {
    RgbImage::from_pixel(w, h, Rgb(rgb))
        .save_with_format(path, image::ImageFormat::Png)
        .unwrap();
}

/// Extractor whose face count is encoded in the image's red channel
/// (`red / 100` faces), letting tests stage zero-, one-, and two-face
/// training images deterministically.
struct ColorCodedExtractor;

impl FaceExtractor for ColorCodedExtractor {
    fn detect(
        &self,
        image: &RgbImage,
        _mode: DetectionMode,
    ) -> Result<Vec<DetectedFace>, ExtractionError> {
        let px = image.get_pixel(0, 0);
        let count = usize::from(px[0] / 100);
        let face = DetectedFace {
            bounding_box: BoundingBox {
                top: 0,
                right: 10,
                bottom: 10,
                left: 0,
            },
            embedding: vec![f32::from(px[1]) / 255.0, f32::from(px[2]) / 255.0],
            landmarks: RawLandmarks {
                right_eye: vec![Point::new(2, 3), Point::new(4, 3)],
                left_eye: vec![Point::new(6, 3), Point::new(8, 3)],
                nose_tip: vec![Point::new(5, 6)],
            },
        };
        Ok(vec![face; count])
    }
}

#[test]
fn labeled_directories_are_enumerated_with_extension_filter() {
    let root = tempfile::tempdir().unwrap();
    let alice = root.path().join("alice");
    std::fs::create_dir(&alice).unwrap();
    write_png(&alice.join("1.png"), 64, 64, [110, 0, 0]);
    write_png(&alice.join("2.JPG"), 64, 64, [110, 0, 0]);
    std::fs::write(alice.join("notes.txt"), b"not an image").unwrap();
    // Loose file at the top level is not a label.
    std::fs::write(root.path().join("stray.png"), b"ignored").unwrap();

    let labeled = list_labeled_images(root.path()).unwrap();
    assert_eq!(labeled.len(), 1);
    assert_eq!(labeled[0].0, "alice");
    assert_eq!(labeled[0].1.len(), 2);
}

#[test]
fn training_accepts_single_face_images_and_defaults_k() {
    let root = tempfile::tempdir().unwrap();
    let alice = root.path().join("alice");
    let bob = root.path().join("bob");
    std::fs::create_dir(&alice).unwrap();
    std::fs::create_dir(&bob).unwrap();
    // Red channel 110 => exactly one detected face per image.
    write_png(&alice.join("1.jpg"), 48, 48, [110, 10, 10]);
    write_png(&alice.join("2.jpg"), 48, 48, [110, 12, 10]);
    write_png(&bob.join("1.jpg"), 48, 48, [110, 240, 240]);

    let classifier = train(root.path(), &ColorCodedExtractor, None).unwrap();
    assert_eq!(classifier.example_count(), 3);
    assert_eq!(classifier.label_count(), 2);
    assert_eq!(classifier.k(), 2); // round(sqrt(3))
}

#[test]
fn zero_and_multi_face_images_are_skipped_silently() {
    let root = tempfile::tempdir().unwrap();
    let alice = root.path().join("alice");
    std::fs::create_dir(&alice).unwrap();
    write_png(&alice.join("good.png"), 48, 48, [110, 50, 50]); // one face
    write_png(&alice.join("empty.png"), 48, 48, [0, 50, 50]); // zero faces
    write_png(&alice.join("crowd.png"), 48, 48, [210, 50, 50]); // two faces

    let classifier = train(root.path(), &ColorCodedExtractor, None).unwrap();
    assert_eq!(classifier.example_count(), 1);
}

#[test]
fn unreadable_image_files_are_skipped_not_fatal() {
    let root = tempfile::tempdir().unwrap();
    let alice = root.path().join("alice");
    std::fs::create_dir(&alice).unwrap();
    write_png(&alice.join("good.png"), 48, 48, [110, 50, 50]);
    std::fs::write(alice.join("corrupt.png"), b"\x89PNG but truncated").unwrap();

    let classifier = train(root.path(), &ColorCodedExtractor, None).unwrap();
    assert_eq!(classifier.example_count(), 1);
}

#[test]
fn no_usable_examples_is_a_training_error() {
    let root = tempfile::tempdir().unwrap();
    let alice = root.path().join("alice");
    std::fs::create_dir(&alice).unwrap();
    write_png(&alice.join("empty.png"), 48, 48, [0, 0, 0]); // zero faces

    let err = train(root.path(), &ColorCodedExtractor, None).unwrap_err();
    assert!(matches!(err, TrainError::NoExamples(_)));
}

#[test]
fn missing_training_root_is_an_io_error() {
    let err = train(
        Path::new("/definitely/not/here"),
        &ColorCodedExtractor,
        None,
    )
    .unwrap_err();
    assert!(matches!(err, TrainError::Io { .. }));
}

#[test]
fn explicit_neighbor_count_overrides_the_default() {
    let root = tempfile::tempdir().unwrap();
    let alice = root.path().join("alice");
    std::fs::create_dir(&alice).unwrap();
    for i in 0u8..4 {
        write_png(&alice.join(format!("{i}.png")), 48, 48, [110, i * 10, 0]);
    }

    let classifier = train(root.path(), &ColorCodedExtractor, Some(1)).unwrap();
    assert_eq!(classifier.k(), 1);
}

#[test]
fn startup_persists_and_reloads_the_artifact() {
    let root = tempfile::tempdir().unwrap();
    let alice = root.path().join("alice");
    let bob = root.path().join("bob");
    std::fs::create_dir(&alice).unwrap();
    std::fs::create_dir(&bob).unwrap();
    write_png(&alice.join("1.png"), 64, 64, [200, 40, 40]);
    write_png(&bob.join("1.png"), 64, 64, [40, 40, 200]);

    let model_dir = tempfile::tempdir().unwrap();
    let model_path = model_dir.path().join("model.json");

    let train_config = ServerConfig {
        train_dir: root.path().to_path_buf(),
        model_path: Some(model_path.clone()),
        ..ServerConfig::default()
    };
    let trained = prepare_classifier(&train_config, &StubExtractor).unwrap();
    assert!(model_path.exists());

    // Second startup with retraining disabled serves the persisted model.
    let load_config = ServerConfig {
        retrain: false,
        ..train_config
    };
    let loaded = prepare_classifier(&load_config, &StubExtractor).unwrap();
    assert_eq!(loaded.example_count(), trained.example_count());
    assert_eq!(loaded.k(), trained.k());

    let probe = StubExtractor
        .detect(
            &RgbImage::from_pixel(64, 64, Rgb([200, 40, 40])),
            DetectionMode::Fast,
        )
        .unwrap();
    let query = vec![probe[0].embedding.clone()];
    assert_eq!(
        trained.classify(&query, 0.5),
        loaded.classify(&query, 0.5)
    );
}

#[test]
fn corrupt_artifact_fails_startup_when_retraining_is_disabled() {
    let model_dir = tempfile::tempdir().unwrap();
    let model_path = model_dir.path().join("model.json");
    std::fs::write(&model_path, b"{broken").unwrap();

    let config = ServerConfig {
        retrain: false,
        model_path: Some(model_path),
        ..ServerConfig::default()
    };
    let err = prepare_classifier(&config, &StubExtractor).unwrap_err();
    assert!(matches!(err, StartupError::ModelLoad(_)));
}

#[test]
fn semantically_empty_artifact_fails_startup() {
    // Parses fine but holds no examples; serving it would leave the first
    // frame with no neighbor to rank. Must be fatal at load, not later.
    let model_dir = tempfile::tempdir().unwrap();
    let model_path = model_dir.path().join("model.json");
    std::fs::write(&model_path, br#"{"examples":[],"k":1}"#).unwrap();

    let config = ServerConfig {
        retrain: false,
        model_path: Some(model_path),
        ..ServerConfig::default()
    };
    let err = prepare_classifier(&config, &StubExtractor).unwrap_err();
    assert!(matches!(err, StartupError::ModelLoad(_)));
}

#[test]
fn persistence_failure_is_best_effort_not_fatal() {
    let root = tempfile::tempdir().unwrap();
    let alice = root.path().join("alice");
    std::fs::create_dir(&alice).unwrap();
    write_png(&alice.join("1.png"), 64, 64, [200, 40, 40]);

    let config = ServerConfig {
        train_dir: root.path().to_path_buf(),
        model_path: Some(Path::new("/nonexistent/dir/model.json").to_path_buf()),
        ..ServerConfig::default()
    };
    let classifier = prepare_classifier(&config, &StubExtractor).unwrap();
    assert_eq!(classifier.example_count(), 1);
}

#[test]
fn loaded_artifact_matches_direct_classifier_load() {
    let root = tempfile::tempdir().unwrap();
    let alice = root.path().join("alice");
    std::fs::create_dir(&alice).unwrap();
    write_png(&alice.join("1.png"), 64, 64, [10, 200, 10]);

    let model_dir = tempfile::tempdir().unwrap();
    let model_path = model_dir.path().join("model.json");
    let config = ServerConfig {
        train_dir: root.path().to_path_buf(),
        model_path: Some(model_path.clone()),
        ..ServerConfig::default()
    };
    prepare_classifier(&config, &StubExtractor).unwrap();

    let direct = KnnClassifier::load(&model_path).unwrap();
    assert_eq!(direct.example_count(), 1);
}
