use ocr_core::types::{BBox, Crop};

/// One localized text region plus its crop, exactly the shape a caller
/// needs to feed the OCR core. The detector itself (a learned object
/// detector) is out of scope for this system; this trait is the seam a
/// real implementation plugs into.
#[derive(Debug, Clone)]
pub struct Detection {
    pub bbox: BBox,
    pub confidence: f32,
    pub class_name: String,
    pub crop: Crop,
}

pub trait Detector {
    fn detect(&self, image: &ocr_core::Image) -> Vec<Detection>;
}

/// Deterministic stand-in for the upstream detector: treats the whole
/// input image as a single detected region. Used for testing the
/// full-pipeline adapter without a real detection model.
pub struct WholeImageDetector {
    pub class_name: String,
}

impl WholeImageDetector {
    pub fn new() -> Self {
        Self { class_name: "text_region".to_string() }
    }
}

impl Default for WholeImageDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for WholeImageDetector {
    fn detect(&self, image: &ocr_core::Image) -> Vec<Detection> {
        if image.is_empty() {
            return Vec::new();
        }
        let bbox = BBox { x1: 0.0, y1: 0.0, x2: image.width() as f32, y2: image.height() as f32 };
        vec![Detection {
            bbox,
            confidence: 1.0,
            class_name: self.class_name.clone(),
            crop: Crop { image: image.clone(), mask: None, bbox },
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;
    use ocr_core::Image;

    #[test]
    fn whole_image_detector_returns_one_region_matching_dimensions() {
        let image = Image::Gray(GrayImage::new(10, 20));
        let detections = WholeImageDetector::new().detect(&image);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].bbox.width(), 10.0);
        assert_eq!(detections[0].bbox.height(), 20.0);
    }

    #[test]
    fn whole_image_detector_returns_nothing_for_empty_image() {
        let image = Image::Gray(GrayImage::new(0, 0));
        assert!(WholeImageDetector::new().detect(&image).is_empty());
    }
}
