use crate::detector::{Detection, Detector};
use chrono::NaiveDate;
use ocr_core::date_parser::{DateParser, DateParserConfig};
use ocr_core::preprocess::{FillColor, Pipeline};
use ocr_core::types::{Crop, Mask};
use ocr_core::{Image, RecognitionResult};
use ocr_engines::RecognitionEngine;
use serde::Serialize;
use std::time::Instant;

#[derive(Debug, Clone, Serialize)]
pub struct BBoxJson(pub [f32; 4]);

#[derive(Debug, Clone, Serialize)]
pub struct DetectionResult {
    pub bbox: BBoxJson,
    pub confidence: f32,
    pub class_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OcrResult {
    pub text: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DateResult {
    pub date_str: String,
    pub ocr_confidence: f32,
    pub parse_confidence: f32,
    pub combined_confidence: f32,
}

/// The engine-result JSON returned to full-pipeline consumers.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub success: bool,
    pub detections: Vec<DetectionResult>,
    pub ocr_results: Vec<OcrResult>,
    pub dates: Vec<DateResult>,
    pub best_date: Option<DateResult>,
    pub processing_time: f64,
}

/// Wires a detector, the preprocessing pipeline, a recognition engine and
/// the date parser into one call. Mask pixels outside the detected region
/// are filled with `fill_color` (default white) before preprocessing runs,
/// per the masked-crop handling rule.
pub struct FullPipelineAdapter {
    detector: Box<dyn Detector>,
    preprocessing: Pipeline,
    engine: Box<dyn RecognitionEngine>,
    date_parser: DateParser,
    fill_color: FillColor,
}

impl FullPipelineAdapter {
    pub fn new(detector: Box<dyn Detector>, preprocessing: Pipeline, engine: Box<dyn RecognitionEngine>) -> Self {
        Self::with_date_parser_config(detector, preprocessing, engine, DateParserConfig::default())
    }

    pub fn with_date_parser_config(
        detector: Box<dyn Detector>,
        preprocessing: Pipeline,
        engine: Box<dyn RecognitionEngine>,
        date_parser_config: DateParserConfig,
    ) -> Self {
        Self {
            detector,
            preprocessing,
            engine,
            date_parser: DateParser::new(date_parser_config),
            fill_color: FillColor::Scalar(255),
        }
    }

    pub fn with_fill_color(mut self, fill_color: FillColor) -> Self {
        self.fill_color = fill_color;
        self
    }

    pub fn process(&self, image: Image, today: NaiveDate) -> PipelineResult {
        let start = Instant::now();
        let detections = self.detector.detect(&image);

        let mut ocr_results = Vec::with_capacity(detections.len());
        let mut dates = Vec::new();

        for detection in &detections {
            let filled = fill_masked(&detection.crop, self.fill_color);
            let processed = match self.preprocessing.process(filled) {
                Ok(img) => img,
                Err(e) => {
                    log::warn!("preprocessing failed for a detected region: {e}");
                    continue;
                }
            };

            let result = self.engine.extract_text(&processed);
            let postprocessed_text = self.engine.postprocess(&result.text);
            let recognized = RecognitionResult::new(postprocessed_text, result.confidence);

            if let Some(parsed) = self.date_parser.parse(&recognized.text, today) {
                let combined = (recognized.confidence + parsed.parse_confidence) / 2.0;
                dates.push(DateResult {
                    date_str: parsed.date_str,
                    ocr_confidence: recognized.confidence,
                    parse_confidence: parsed.parse_confidence,
                    combined_confidence: combined,
                });
            }

            ocr_results.push(OcrResult { text: recognized.text, confidence: recognized.confidence });
        }

        let best_date = dates
            .iter()
            .max_by(|a, b| a.combined_confidence.total_cmp(&b.combined_confidence))
            .cloned();

        PipelineResult {
            success: true,
            detections: detections
                .iter()
                .map(|d: &Detection| DetectionResult {
                    bbox: BBoxJson([d.bbox.x1, d.bbox.y1, d.bbox.x2, d.bbox.y2]),
                    confidence: d.confidence,
                    class_name: d.class_name.clone(),
                })
                .collect(),
            ocr_results,
            dates,
            best_date,
            processing_time: start.elapsed().as_secs_f64(),
        }
    }
}

/// Replaces every pixel outside the mask's region of interest with
/// `fill_color`. A crop with no mask is returned unchanged.
fn fill_masked(crop: &Crop, fill_color: FillColor) -> Image {
    let Some(mask) = &crop.mask else {
        return crop.image.clone();
    };
    apply_mask(&crop.image, mask, fill_color)
}

fn apply_mask(image: &Image, mask: &Mask, fill_color: FillColor) -> Image {
    match image {
        Image::Gray(img) => {
            let mut out = img.clone();
            let fill = fill_color.as_gray();
            for (x, y, pixel) in out.enumerate_pixels_mut() {
                if !mask.at(x, y) {
                    pixel.0 = [fill];
                }
            }
            Image::Gray(out)
        }
        Image::Rgb(img) => {
            let mut out = img.clone();
            let fill = fill_color.as_rgb();
            for (x, y, pixel) in out.enumerate_pixels_mut() {
                if !mask.at(x, y) {
                    pixel.0 = fill;
                }
            }
            Image::Rgb(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::WholeImageDetector;
    use ocr_core::error::InitializationError;
    use ocr_core::preprocess::Profile;
    use std::collections::HashMap;

    struct AlwaysDate;

    impl RecognitionEngine for AlwaysDate {
        fn initialize(&mut self) -> Result<(), InitializationError> {
            Ok(())
        }
        fn extract_text(&self, _image: &Image) -> RecognitionResult {
            RecognitionResult::new("EXP 31/12/2026", 0.9)
        }
        fn get_name(&self) -> &str {
            "always_date"
        }
        fn get_version(&self) -> &str {
            "test"
        }
        fn get_info(&self) -> HashMap<String, serde_json::Value> {
            HashMap::new()
        }
    }

    #[test]
    fn fill_masked_leaves_unmasked_crop_unchanged() {
        let image = Image::Gray(image::GrayImage::new(4, 4));
        let crop = Crop { image: image.clone(), mask: None, bbox: ocr_core::types::BBox { x1: 0.0, y1: 0.0, x2: 4.0, y2: 4.0 } };
        let out = fill_masked(&crop, FillColor::Scalar(255));
        assert_eq!(out.width(), image.width());
    }

    #[test]
    fn process_extracts_a_date_from_the_whole_image() {
        let adapter = FullPipelineAdapter::new(
            Box::new(WholeImageDetector::new()),
            Pipeline::new(Profile::default()),
            Box::new(AlwaysDate),
        );
        let image = Image::Gray(image::GrayImage::new(8, 8));
        let today = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let result = adapter.process(image, today);
        assert!(result.success);
        assert_eq!(result.detections.len(), 1);
        assert!(result.best_date.is_some());
        assert_eq!(result.best_date.unwrap().date_str, "31/12/2026");
    }
}
