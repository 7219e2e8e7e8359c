use image::{DynamicImage, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

/// A 2-D array of pixels with 1 or 3 channels and 8-bit unsigned samples.
/// Dimensions are always tracked; no step may assume a fixed shape.
#[derive(Debug, Clone)]
pub enum Image {
    Gray(GrayImage),
    Rgb(RgbImage),
}

impl Image {
    pub fn width(&self) -> u32 {
        match self {
            Image::Gray(img) => img.width(),
            Image::Rgb(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Image::Gray(img) => img.height(),
            Image::Rgb(img) => img.height(),
        }
    }

    pub fn channels(&self) -> u8 {
        match self {
            Image::Gray(_) => 1,
            Image::Rgb(_) => 3,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn to_dynamic(&self) -> DynamicImage {
        match self {
            Image::Gray(img) => DynamicImage::ImageLuma8(img.clone()),
            Image::Rgb(img) => DynamicImage::ImageRgb8(img.clone()),
        }
    }

    pub fn from_dynamic(img: DynamicImage) -> Self {
        if img.color().has_color() {
            Image::Rgb(img.to_rgb8())
        } else {
            Image::Gray(img.to_luma8())
        }
    }
}

/// A binary mask aligned to an `Image`, used by the full-pipeline adapter
/// to blank out non-region pixels before the OCR core ever sees them.
#[derive(Debug, Clone)]
pub struct Mask {
    pub width: u32,
    pub height: u32,
    /// `true` marks a pixel as belonging to the region of interest.
    pub data: Vec<bool>,
}

impl Mask {
    pub fn at(&self, x: u32, y: u32) -> bool {
        self.data[(y * self.width + x) as usize]
    }
}

/// `(image, optional mask, bbox)` produced by the upstream detector. The
/// OCR core never re-detects; it receives a crop directly.
#[derive(Debug, Clone)]
pub struct Crop {
    pub image: Image,
    pub mask: Option<Mask>,
    pub bbox: BBox,
}

/// Axis-aligned box in `(x1, y1, x2, y2)` pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn y_center(&self) -> f32 {
        (self.y1 + self.y2) / 2.0
    }

    /// True when `self` lies fully within `[0, width] x [0, height]`.
    pub fn contained_within(&self, width: u32, height: u32) -> bool {
        self.x1 >= 0.0
            && self.y1 >= 0.0
            && self.x2 <= width as f32
            && self.y2 <= height as f32
    }
}

/// `{ text, confidence }`. Confidence is engine-reported; engines that
/// cannot report it return a fixed sentinel and declare so in `get_info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub text: String,
    pub confidence: f32,
}

impl RecognitionResult {
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
        }
    }

    /// Clamps confidence into `[0, 1]`, per the data model invariant.
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// A named photometric transformation of a normalized line image. The set
/// of variant names is enumerated at configuration time (see
/// `photometric::VARIANT_NAMES`).
#[derive(Debug, Clone)]
pub struct Variant {
    pub name: String,
    pub image: Image,
}

/// One candidate produced during ensemble recognition, before or after
/// reranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleCandidate {
    pub variant_name: String,
    pub text: String,
    pub confidence: f32,
    pub rerank_score: f32,
}

/// The full ordered list of candidates for one line, plus which one was
/// selected.
#[derive(Debug, Clone)]
pub struct LineOutcome {
    pub candidates: Vec<EnsembleCandidate>,
    pub selected_index: usize,
}

impl LineOutcome {
    pub fn selected(&self) -> &EnsembleCandidate {
        &self.candidates[self.selected_index]
    }
}

/// Bucket a CER value into the closed error-category set used by the
/// evaluator: `{0, <=0.2, <=0.5, >0.5}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Perfect,
    Low,
    Medium,
    High,
}

impl ErrorCategory {
    pub fn from_cer(cer: f64) -> Self {
        if cer <= 0.0 {
            ErrorCategory::Perfect
        } else if cer <= 0.2 {
            ErrorCategory::Low
        } else if cer <= 0.5 {
            ErrorCategory::Medium
        } else {
            ErrorCategory::High
        }
    }
}

/// One row of evaluator output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub image_id: String,
    pub ground_truth: String,
    pub predicted_text: String,
    pub confidence: f32,
    pub processing_time_ms: f64,
    pub exact_match: bool,
    pub cer: f64,
    pub wer: f64,
    pub similarity: f64,
    pub error_category: ErrorCategory,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognition_result_clamps_confidence() {
        let r = RecognitionResult::new("X", 1.8);
        assert_eq!(r.confidence, 1.0);
        let r = RecognitionResult::new("X", -0.3);
        assert_eq!(r.confidence, 0.0);
    }

    #[test]
    fn error_category_buckets_match_thresholds() {
        assert_eq!(ErrorCategory::from_cer(0.0), ErrorCategory::Perfect);
        assert_eq!(ErrorCategory::from_cer(0.2), ErrorCategory::Low);
        assert_eq!(ErrorCategory::from_cer(0.5), ErrorCategory::Medium);
        assert_eq!(ErrorCategory::from_cer(0.51), ErrorCategory::High);
    }

    #[test]
    fn bbox_containment() {
        let b = BBox { x1: 1.0, y1: 1.0, x2: 9.0, y2: 9.0 };
        assert!(b.contained_within(10, 10));
        let b = BBox { x1: -1.0, y1: 1.0, x2: 9.0, y2: 9.0 };
        assert!(!b.contained_within(10, 10));
    }
}
