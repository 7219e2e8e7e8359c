use crate::engine::{engine_base_info, RecognitionEngine};
use hf_hub::api::sync::Api;
use ndarray::Array4;
use ocr_core::error::InitializationError;
use ocr_core::{Image, RecognitionResult};
use ort::session::Session;
use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;

struct Region {
    text: String,
    confidence: f32,
}

/// Detection+recognition CRNN (EasyOCR-equivalent). Returns a list of
/// `(bbox, text, confidence)`; kept items are those with
/// `confidence >= threshold`, concatenated space-joined, confidence is
/// the mean of kept items.
pub struct EasyOcrEngine {
    confidence_threshold: f32,
    session: Mutex<Option<Session>>,
    dictionary: Mutex<Vec<String>>,
}

impl EasyOcrEngine {
    pub fn new() -> Self {
        Self {
            confidence_threshold: 0.3,
            session: Mutex::new(None),
            dictionary: Mutex::new(Vec::new()),
        }
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    fn regions(&self, image: &Image) -> Vec<Region> {
        let session_guard = self.session.lock().unwrap();
        let Some(session) = session_guard.as_ref() else {
            return Vec::new();
        };
        let dictionary = self.dictionary.lock().unwrap();

        let rgb = image.to_dynamic().resize_exact(128, 32, image::imageops::FilterType::Lanczos3).to_rgb8();
        let mut tensor = Array4::<f32>::zeros((1, 3, 32, 128));
        for (x, y, p) in rgb.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = p[c] as f32 / 255.0;
            }
        }

        let Ok(inputs) = ort::inputs![tensor.view()] else {
            return Vec::new();
        };
        let Ok(outputs) = session.run(inputs) else {
            return Vec::new();
        };
        let Some(first) = outputs.values().next() else {
            return Vec::new();
        };
        let Ok(logits) = first.try_extract_tensor::<f32>() else {
            return Vec::new();
        };
        let view = logits.view();
        let Some(shape) = view.shape().get(1..3).map(|s| (s[0], s[1])) else {
            return Vec::new();
        };
        let (seq_len, dict_size) = shape;

        let mut text = String::new();
        let mut confidences = Vec::new();
        let mut last_idx: i64 = -1;
        for t in 0..seq_len {
            let mut best_val = f32::MIN;
            let mut best_idx = 0usize;
            for c in 0..dict_size.min(dictionary.len()) {
                let v = view[[0, t, c]];
                if v > best_val {
                    best_val = v;
                    best_idx = c;
                }
            }
            if best_idx != 0 && best_idx as i64 != last_idx {
                if let Some(tok) = dictionary.get(best_idx) {
                    text.push_str(tok);
                    confidences.push(best_val);
                }
            }
            last_idx = best_idx as i64;
        }
        let mean_conf = if confidences.is_empty() {
            0.0
        } else {
            confidences.iter().sum::<f32>() / confidences.len() as f32
        };
        vec![Region { text, confidence: mean_conf }]
    }
}

impl RecognitionEngine for EasyOcrEngine {
    fn initialize(&mut self) -> Result<(), InitializationError> {
        if self.session.lock().unwrap().is_some() {
            return Ok(());
        }
        let api = Api::new().map_err(|e| InitializationError::EngineInit {
            engine: "easyocr".to_string(),
            reason: e.to_string(),
        })?;
        let repo = api.model("Xenova/easyocr".to_string());
        let model_path = repo.get("model.onnx").map_err(|e| InitializationError::EngineInit {
            engine: "easyocr".to_string(),
            reason: e.to_string(),
        })?;
        let dict_path = repo.get("dictionary.txt").map_err(|e| InitializationError::EngineInit {
            engine: "easyocr".to_string(),
            reason: e.to_string(),
        })?;

        let threads = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(threads))
            .and_then(|b| b.commit_from_file(model_path))
            .map_err(|e| InitializationError::EngineInit {
                engine: "easyocr".to_string(),
                reason: e.to_string(),
            })?;

        let dictionary = std::fs::read_to_string(dict_path)
            .map_err(|e| InitializationError::EngineInit {
                engine: "easyocr".to_string(),
                reason: e.to_string(),
            })?
            .lines()
            .map(|s| s.to_string())
            .collect();

        *self.dictionary.lock().unwrap() = dictionary;
        *self.session.lock().unwrap() = Some(session);
        Ok(())
    }

    fn extract_text(&self, image: &Image) -> RecognitionResult {
        if image.is_empty() {
            return RecognitionResult::empty();
        }
        let kept: Vec<Region> = self
            .regions(image)
            .into_iter()
            .filter(|r| r.confidence >= self.confidence_threshold)
            .collect();
        if kept.is_empty() {
            return RecognitionResult::empty();
        }
        let joined = kept.iter().map(|r| r.text.as_str()).collect::<Vec<_>>().join(" ");
        let mean = kept.iter().map(|r| r.confidence).sum::<f32>() / kept.len() as f32;
        RecognitionResult::new(joined, mean)
    }

    fn get_name(&self) -> &str {
        "easyocr"
    }

    fn get_version(&self) -> &str {
        "1.x"
    }

    fn get_info(&self) -> HashMap<String, serde_json::Value> {
        let mut info = engine_base_info(false, 15);
        info.insert("confidence_threshold".to_string(), serde_json::json!(self.confidence_threshold));
        info
    }
}
