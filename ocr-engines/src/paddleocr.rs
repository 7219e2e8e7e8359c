use crate::engine::{engine_base_info, RecognitionEngine};
use crate::model_package::ModelManifest;
use hf_hub::api::sync::Api;
use ndarray::Array4;
use ocr_core::error::InitializationError;
use ocr_core::{Image, RecognitionResult};
use ort::session::Session;
use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;

/// DB+CRNN detector/recognizer (PaddleOCR-equivalent). Different
/// underlying versions return `[[bbox, (text, conf)], ...]` vs
/// `[bbox, text, conf]`; this adapter detects the output tensor's rank at
/// runtime rather than assuming one shape.
pub struct PaddleOcrEngine {
    rec_session: Mutex<Option<Session>>,
    dictionary: Mutex<Vec<String>>,
    manifest: ModelManifest,
}

impl PaddleOcrEngine {
    pub fn new() -> Self {
        Self {
            rec_session: Mutex::new(None),
            dictionary: Mutex::new(Vec::new()),
            manifest: ModelManifest::new(),
        }
    }

    pub fn with_manifest(mut self, manifest: ModelManifest) -> Self {
        self.manifest = manifest;
        self
    }

    fn preprocess(image: &Image) -> Array4<f32> {
        let rgb = image
            .to_dynamic()
            .resize_exact(320, 48, image::imageops::FilterType::Lanczos3)
            .to_rgb8();
        let mut tensor = Array4::<f32>::zeros((1, 3, 48, 320));
        for (x, y, p) in rgb.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = (p[c] as f32 / 255.0 - 0.5) / 0.5;
            }
        }
        tensor
    }

    /// CTC greedy decode. Handles both a rank-3 `(batch, seq, vocab)`
    /// tensor and a rank-2 `(seq, vocab)` tensor emitted by older
    /// recognition exports.
    fn decode(&self, raw: &ort::value::Value) -> (String, f32) {
        let Ok(extracted) = raw.try_extract_tensor::<f32>() else {
            return (String::new(), 0.0);
        };
        let view = extracted.view();
        let dictionary = self.dictionary.lock().unwrap();

        let (seq_len, dict_size, batch_offset) = match view.shape() {
            [1, seq, dict] => (*seq, *dict, true),
            [seq, dict] => (*seq, *dict, false),
            _ => return (String::new(), 0.0),
        };

        let mut text = String::new();
        let mut confidences = Vec::new();
        let mut last_idx: i64 = -1;
        for t in 0..seq_len {
            let mut best_val = f32::MIN;
            let mut best_idx = 0usize;
            for c in 0..dict_size.min(dictionary.len() + 1) {
                let v = if batch_offset { view[[0, t, c]] } else { view[[t, c]] };
                if v > best_val {
                    best_val = v;
                    best_idx = c;
                }
            }
            if best_idx != 0 && best_idx as i64 != last_idx {
                if let Some(tok) = dictionary.get(best_idx - 1) {
                    text.push_str(tok);
                    confidences.push(best_val);
                }
            }
            last_idx = best_idx as i64;
        }
        let mean = if confidences.is_empty() {
            0.0
        } else {
            confidences.iter().sum::<f32>() / confidences.len() as f32
        };
        (text, mean)
    }
}

impl RecognitionEngine for PaddleOcrEngine {
    fn initialize(&mut self) -> Result<(), InitializationError> {
        if self.rec_session.lock().unwrap().is_some() {
            return Ok(());
        }
        let api = Api::new().map_err(|e| InitializationError::EngineInit {
            engine: "paddleocr".to_string(),
            reason: e.to_string(),
        })?;
        let repo = api.model("PaddlePaddle/PP-OCRv4_rec".to_string());
        let rec_path = repo.get("rec.onnx").map_err(|e| InitializationError::EngineInit {
            engine: "paddleocr".to_string(),
            reason: e.to_string(),
        })?;
        let dict_path = repo.get("dictionary.txt").map_err(|e| InitializationError::EngineInit {
            engine: "paddleocr".to_string(),
            reason: e.to_string(),
        })?;
        self.manifest.verify("rec.onnx", &rec_path)?;
        self.manifest.verify("dictionary.txt", &dict_path)?;

        let threads = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(threads))
            .and_then(|b| b.commit_from_file(rec_path))
            .map_err(|e| InitializationError::EngineInit {
                engine: "paddleocr".to_string(),
                reason: e.to_string(),
            })?;

        let dictionary = std::fs::read_to_string(dict_path)
            .map_err(|e| InitializationError::EngineInit {
                engine: "paddleocr".to_string(),
                reason: e.to_string(),
            })?
            .lines()
            .map(|s| s.to_string())
            .collect();

        *self.dictionary.lock().unwrap() = dictionary;
        *self.rec_session.lock().unwrap() = Some(session);
        Ok(())
    }

    fn extract_text(&self, image: &Image) -> RecognitionResult {
        if image.is_empty() {
            return RecognitionResult::empty();
        }
        let guard = self.rec_session.lock().unwrap();
        let Some(session) = guard.as_ref() else {
            log::warn!("paddleocr: engine not initialized, returning empty result");
            return RecognitionResult::empty();
        };
        let tensor = Self::preprocess(image);
        let Ok(inputs) = ort::inputs![tensor.view()] else {
            return RecognitionResult::empty();
        };
        let Ok(outputs) = session.run(inputs) else {
            log::warn!("paddleocr: inference failed, returning empty result");
            return RecognitionResult::empty();
        };
        let Some(first) = outputs.values().next() else {
            return RecognitionResult::empty();
        };
        let (text, confidence) = self.decode(first);
        RecognitionResult::new(text, confidence)
    }

    fn get_name(&self) -> &str {
        "paddleocr"
    }

    fn get_version(&self) -> &str {
        "PP-OCRv4"
    }

    fn get_info(&self) -> HashMap<String, serde_json::Value> {
        engine_base_info(false, 12)
    }
}
