use ocr_core::error::InitializationError;
use ocr_core::preprocess::{Pipeline, Profile};
use ocr_core::{Image, RecognitionResult};
use ocr_engines::RecognitionEngine;
use std::collections::HashMap;
use std::io::Write;

/// Always returns the filename's stem uppercased, used to exercise the
/// evaluator without depending on a real model download.
struct StubEngine;

impl RecognitionEngine for StubEngine {
    fn initialize(&mut self) -> Result<(), InitializationError> {
        Ok(())
    }

    fn extract_text(&self, image: &Image) -> RecognitionResult {
        if image.is_empty() {
            return RecognitionResult::empty();
        }
        RecognitionResult::new("LOTE 2025", 0.9)
    }

    fn get_name(&self) -> &str {
        "stub"
    }

    fn get_version(&self) -> &str {
        "test"
    }

    fn get_info(&self) -> HashMap<String, serde_json::Value> {
        HashMap::new()
    }
}

#[test]
fn evaluate_dataset_scores_missing_image_as_full_miss() {
    let dir = tempfile::tempdir().unwrap();
    let mut gt_file = std::fs::File::create(dir.path().join("gt.json")).unwrap();
    write!(gt_file, r#"{{"annotations": {{"missing.png": "LOTE 2025"}}}}"#).unwrap();

    let gt = ocr_eval::GroundTruth::load(&dir.path().join("gt.json")).unwrap();
    let engine = StubEngine;
    let pipeline = Pipeline::new(Profile::default());

    let report = ocr_eval::evaluate_dataset(dir.path(), &gt, &engine, &pipeline);
    assert_eq!(report.records.len(), 1);
    assert!(!report.records[0].exact_match);
    assert_eq!(report.records[0].cer, 1.0);
}

#[test]
fn evaluate_dataset_scores_present_image_as_exact_match() {
    let dir = tempfile::tempdir().unwrap();
    let image = image::RgbImage::new(32, 32);
    image::DynamicImage::ImageRgb8(image).save(dir.path().join("present.png")).unwrap();

    let mut gt_file = std::fs::File::create(dir.path().join("gt.json")).unwrap();
    write!(gt_file, r#"{{"annotations": {{"present.png": "LOTE 2025"}}}}"#).unwrap();

    let gt = ocr_eval::GroundTruth::load(&dir.path().join("gt.json")).unwrap();
    let engine = StubEngine;
    let pipeline = Pipeline::new(Profile::default());

    let report = ocr_eval::evaluate_dataset(dir.path(), &gt, &engine, &pipeline);
    assert_eq!(report.records.len(), 1);
    assert!(report.records[0].exact_match);
    assert_eq!(report.records[0].cer, 0.0);
}
