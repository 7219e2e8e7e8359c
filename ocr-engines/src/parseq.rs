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

const TARGET_HEIGHT: u32 = 32;
const TARGET_WIDTH: u32 = 128;

/// Maps the small model-identifier alias set to canonical weight repo
/// names.
fn canonical_model_name(alias: &str) -> &'static str {
    match alias.to_lowercase().as_str() {
        "tiny" | "small" => "baudm/parseq-tiny",
        "large" | "big" => "baudm/parseq-large",
        _ => "baudm/parseq",
    }
}

/// Permutation-based scene-text model (PARSeq-equivalent). Single-line
/// input resized to a fixed 32x128. Output is normalized to a plain
/// string regardless of the decode shape the model emits.
pub struct ParseqEngine {
    model_name: String,
    session: Mutex<Option<Session>>,
    charset: Mutex<Vec<String>>,
    manifest: ModelManifest,
}

impl ParseqEngine {
    pub fn new(model_alias: &str) -> Self {
        Self {
            model_name: model_alias.to_string(),
            session: Mutex::new(None),
            charset: Mutex::new(Vec::new()),
            manifest: ModelManifest::new(),
        }
    }

    /// Pins expected SHA-256 digests for this engine's downloaded
    /// package; a mismatch during `initialize` becomes an
    /// `InitializationError` instead of a silent load of the wrong
    /// weights.
    pub fn with_manifest(mut self, manifest: ModelManifest) -> Self {
        self.manifest = manifest;
        self
    }

    fn normalize_decoded(raw: &ort::value::Value, charset: &[String]) -> (String, f32) {
        let Ok(extracted) = raw.try_extract_tensor::<f32>() else {
            return (String::new(), 0.0);
        };
        let view = extracted.view();
        let (seq_len, dict_size) = match view.shape() {
            [1, seq, dict] => (*seq, *dict),
            [seq, dict] => (*seq, *dict),
            _ => return (String::new(), 0.0),
        };
        let batched = view.shape().len() == 3;
        let mut text = String::new();
        let mut confidences = Vec::new();
        for t in 0..seq_len {
            let mut best_val = f32::MIN;
            let mut best_idx = 0usize;
            for c in 0..dict_size.min(charset.len() + 1) {
                let v = if batched { view[[0, t, c]] } else { view[[t, c]] };
                if v > best_val {
                    best_val = v;
                    best_idx = c;
                }
            }
            // index 0 is the end-of-sequence marker in PARSeq's charset.
            if best_idx == 0 {
                break;
            }
            if let Some(ch) = charset.get(best_idx - 1) {
                text.push_str(ch);
                confidences.push(best_val);
            }
        }
        let mean = if confidences.is_empty() {
            0.0
        } else {
            confidences.iter().sum::<f32>() / confidences.len() as f32
        };
        (text, mean)
    }
}

impl RecognitionEngine for ParseqEngine {
    fn initialize(&mut self) -> Result<(), InitializationError> {
        if self.session.lock().unwrap().is_some() {
            return Ok(());
        }
        let api = Api::new().map_err(|e| InitializationError::EngineInit {
            engine: "parseq".to_string(),
            reason: e.to_string(),
        })?;
        let repo = api.model(canonical_model_name(&self.model_name).to_string());
        let model_path = repo.get("model.onnx").map_err(|e| InitializationError::EngineInit {
            engine: "parseq".to_string(),
            reason: e.to_string(),
        })?;
        let charset_path = repo.get("charset.txt").map_err(|e| InitializationError::EngineInit {
            engine: "parseq".to_string(),
            reason: e.to_string(),
        })?;
        self.manifest.verify("model.onnx", &model_path)?;
        self.manifest.verify("charset.txt", &charset_path)?;

        let threads = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(threads))
            .and_then(|b| b.commit_from_file(model_path))
            .map_err(|e| InitializationError::EngineInit {
                engine: "parseq".to_string(),
                reason: e.to_string(),
            })?;

        let charset = std::fs::read_to_string(charset_path)
            .map_err(|e| InitializationError::EngineInit {
                engine: "parseq".to_string(),
                reason: e.to_string(),
            })?
            .chars()
            .map(|c| c.to_string())
            .collect();

        *self.charset.lock().unwrap() = charset;
        *self.session.lock().unwrap() = Some(session);
        Ok(())
    }

    fn extract_text(&self, image: &Image) -> RecognitionResult {
        if image.is_empty() {
            return RecognitionResult::empty();
        }
        let guard = self.session.lock().unwrap();
        let Some(session) = guard.as_ref() else {
            log::warn!("parseq: engine not initialized, returning empty result");
            return RecognitionResult::empty();
        };
        let charset = self.charset.lock().unwrap();

        let rgb = image
            .to_dynamic()
            .resize_exact(TARGET_WIDTH, TARGET_HEIGHT, image::imageops::FilterType::Lanczos3)
            .to_rgb8();
        let mut tensor = Array4::<f32>::zeros((1, 3, TARGET_HEIGHT as usize, TARGET_WIDTH as usize));
        for (x, y, p) in rgb.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = (p[c] as f32 / 255.0 - 0.5) / 0.5;
            }
        }

        let Ok(inputs) = ort::inputs![tensor.view()] else {
            return RecognitionResult::empty();
        };
        let Ok(outputs) = session.run(inputs) else {
            log::warn!("parseq: inference failed, returning empty result");
            return RecognitionResult::empty();
        };
        let Some(first) = outputs.values().next() else {
            return RecognitionResult::empty();
        };
        let (text, confidence) = Self::normalize_decoded(first, &charset);
        RecognitionResult::new(text, confidence)
    }

    fn get_name(&self) -> &str {
        "parseq"
    }

    fn get_version(&self) -> &str {
        &self.model_name
    }

    fn get_info(&self) -> HashMap<String, serde_json::Value> {
        let mut info = engine_base_info(false, 12);
        info.insert("model_name".to_string(), serde_json::json!(self.model_name));
        info
    }
}
