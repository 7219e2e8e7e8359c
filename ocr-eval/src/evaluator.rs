use crate::metrics::{self, ConfusionPair, ItemMetrics, Percentiles};
use ocr_core::preprocess::Pipeline;
use ocr_core::types::{ErrorCategory, EvaluationRecord};
use ocr_core::Image;
use ocr_engines::RecognitionEngine;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// `{ "annotations": { "<image-filename>": "<expected text>", ... } }`,
/// matched case-sensitively against filenames under the images directory.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct GroundTruth {
    pub annotations: HashMap<String, String>,
}

impl GroundTruth {
    pub fn load(path: &Path) -> Result<Self, std::io::Error> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

/// Aggregate metrics over one dataset run for one engine/preprocessing
/// pair.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Report {
    pub engine_name: String,
    pub preprocessing_profile: String,
    pub records: Vec<EvaluationRecord>,
    pub exact_match_rate: f64,
    pub mean_cer: f64,
    pub mean_wer: f64,
    pub cer_percentiles: Percentiles,
    pub wer_percentiles: Percentiles,
    pub processing_time_percentiles: Percentiles,
    pub error_category_counts: HashMap<String, usize>,
    pub top_confusion_pairs: Vec<(String, usize)>,
    pub length_buckets: HashMap<String, f64>,
    pub confidence_buckets: HashMap<String, f64>,
}

/// Runs `engine` over every ground-truth annotation found under
/// `images_dir`, streaming one image at a time rather than loading the
/// whole dataset into memory. Missing image files are logged and scored
/// as a full miss (`exact_match=0, CER=1`), per the input-error policy.
pub fn evaluate_dataset(
    images_dir: &Path,
    ground_truth: &GroundTruth,
    engine: &dyn RecognitionEngine,
    preprocessing: &Pipeline,
) -> Report {
    let mut filenames: Vec<&String> = ground_truth.annotations.keys().collect();
    filenames.sort();

    let mut records = Vec::with_capacity(filenames.len());
    let mut confusion_counts: HashMap<ConfusionPair, usize> = HashMap::new();
    let mut length_groups: HashMap<&'static str, Vec<f64>> = HashMap::new();
    let mut confidence_groups: HashMap<&'static str, Vec<f64>> = HashMap::new();

    for filename in filenames {
        let expected = &ground_truth.annotations[filename];
        let image_path: PathBuf = images_dir.join(filename);
        let start = Instant::now();

        let record = match load_image(&image_path) {
            Ok(image) => {
                let processed = preprocessing.process(image).unwrap_or_else(|e| {
                    log::warn!("preprocessing failed for {filename}: {e}");
                    Image::Gray(image::GrayImage::new(0, 0))
                });
                let result = engine.extract_text(&processed);
                let predicted = engine.postprocess(&result.text);
                build_record(filename, expected, &predicted, result.confidence, start)
            }
            Err(e) => {
                log::warn!("missing or unreadable image '{filename}': {e}");
                build_record(filename, expected, "", 0.0, start)
            }
        };

        for pair in metrics::confusion_pairs(expected, &record.predicted_text) {
            *confusion_counts.entry(pair).or_insert(0) += 1;
        }
        length_groups.entry(length_bucket(expected.chars().count())).or_default().push(record.cer);
        confidence_groups.entry(confidence_bucket(record.confidence)).or_default().push(record.cer);

        records.push(record);
    }

    summarize(records, confusion_counts, length_groups, confidence_groups, engine.get_name(), "default")
}

fn load_image(path: &Path) -> Result<Image, image::ImageError> {
    image::open(path).map(Image::from_dynamic)
}

fn build_record(image_id: &str, ground_truth: &str, predicted: &str, confidence: f32, start: Instant) -> EvaluationRecord {
    let m = ItemMetrics::calculate(ground_truth, predicted);
    EvaluationRecord {
        image_id: image_id.to_string(),
        ground_truth: ground_truth.to_string(),
        predicted_text: predicted.to_string(),
        confidence,
        processing_time_ms: start.elapsed().as_secs_f64() * 1000.0,
        exact_match: m.exact_match,
        cer: m.cer,
        wer: m.wer,
        similarity: m.similarity,
        error_category: m.error_category,
    }
}

fn length_bucket(len: usize) -> &'static str {
    match len {
        0..=5 => "short",
        6..=15 => "medium",
        _ => "long",
    }
}

fn confidence_bucket(confidence: f32) -> &'static str {
    if confidence >= 0.8 {
        "high"
    } else if confidence >= 0.5 {
        "medium"
    } else {
        "low"
    }
}

fn summarize(
    records: Vec<EvaluationRecord>,
    confusion_counts: HashMap<ConfusionPair, usize>,
    length_groups: HashMap<&'static str, Vec<f64>>,
    confidence_groups: HashMap<&'static str, Vec<f64>>,
    engine_name: &str,
    preprocessing_profile: &str,
) -> Report {
    let cer_values: Vec<f64> = records.iter().map(|r| r.cer).collect();
    let wer_values: Vec<f64> = records.iter().map(|r| r.wer).collect();
    let time_values: Vec<f64> = records.iter().map(|r| r.processing_time_ms).collect();

    let exact_match_rate = if records.is_empty() {
        0.0
    } else {
        records.iter().filter(|r| r.exact_match).count() as f64 / records.len() as f64
    };

    let mut error_category_counts = HashMap::new();
    for category in [ErrorCategory::Perfect, ErrorCategory::Low, ErrorCategory::Medium, ErrorCategory::High] {
        let count = records.iter().filter(|r| r.error_category == category).count();
        error_category_counts.insert(format!("{category:?}").to_lowercase(), count);
    }

    let mut top_confusion_pairs: Vec<(String, usize)> = confusion_counts
        .into_iter()
        .map(|(pair, count)| (format!("{}->{}", pair.expected, pair.got), count))
        .collect();
    top_confusion_pairs.sort_by(|a, b| b.1.cmp(&a.1));
    top_confusion_pairs.truncate(10);

    let length_buckets = length_groups.into_iter().map(|(k, v)| (k.to_string(), metrics::mean(&v))).collect();
    let confidence_buckets = confidence_groups.into_iter().map(|(k, v)| (k.to_string(), metrics::mean(&v))).collect();

    Report {
        engine_name: engine_name.to_string(),
        preprocessing_profile: preprocessing_profile.to_string(),
        mean_cer: metrics::mean(&cer_values),
        mean_wer: metrics::mean(&wer_values),
        cer_percentiles: metrics::percentiles(&cer_values),
        wer_percentiles: metrics::percentiles(&wer_values),
        processing_time_percentiles: metrics::percentiles(&time_values),
        error_category_counts,
        top_confusion_pairs,
        length_buckets,
        confidence_buckets,
        exact_match_rate,
        records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_truth_parses_annotations_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gt.json");
        std::fs::write(&path, r#"{"annotations": {"a.png": "LOTE 2025"}}"#).unwrap();
        let gt = GroundTruth::load(&path).unwrap();
        assert_eq!(gt.annotations.get("a.png"), Some(&"LOTE 2025".to_string()));
    }

    #[test]
    fn length_bucket_boundaries() {
        assert_eq!(length_bucket(5), "short");
        assert_eq!(length_bucket(6), "medium");
        assert_eq!(length_bucket(16), "long");
    }
}
