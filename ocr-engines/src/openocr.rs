use crate::engine::{engine_base_info, RecognitionEngine};
use hf_hub::api::sync::Api;
use ndarray::Array4;
use ocr_core::error::InitializationError;
use ocr_core::{Image, RecognitionResult};
use ort::session::Session;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Onnx,
    Torch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenOcrDevice {
    Cpu,
    Cuda,
}

/// Open-source detector+recognizer (OpenOCR-equivalent). Only the `onnx`
/// backend runs inference locally; `torch` is accepted for configuration
/// compatibility and falls back to `onnx` with a logged warning, per the
/// device/backend fallback policy.
pub struct OpenOcrEngine {
    backend: Backend,
    device: OpenOcrDevice,
    session: Mutex<Option<Session>>,
    dictionary: Mutex<Vec<String>>,
}

impl OpenOcrEngine {
    pub fn new() -> Self {
        Self {
            backend: Backend::Onnx,
            device: OpenOcrDevice::Cpu,
            session: Mutex::new(None),
            dictionary: Mutex::new(Vec::new()),
        }
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        if backend == Backend::Torch {
            log::warn!("openocr: torch backend requested but not available, falling back to onnx");
        }
        self.backend = Backend::Onnx;
        self
    }

    pub fn with_device(mut self, device: OpenOcrDevice) -> Self {
        self.device = device;
        self
    }
}

impl RecognitionEngine for OpenOcrEngine {
    fn initialize(&mut self) -> Result<(), InitializationError> {
        if self.session.lock().unwrap().is_some() {
            return Ok(());
        }
        if self.device == OpenOcrDevice::Cuda {
            #[cfg(not(feature = "cuda"))]
            {
                log::warn!("openocr: CUDA requested but not compiled in, falling back to CPU");
                self.device = OpenOcrDevice::Cpu;
            }
        }

        let api = Api::new().map_err(|e| InitializationError::EngineInit {
            engine: "openocr".to_string(),
            reason: e.to_string(),
        })?;
        let repo = api.model("topdu/OpenOCR".to_string());
        let model_path = repo.get("rec.onnx").map_err(|e| InitializationError::EngineInit {
            engine: "openocr".to_string(),
            reason: e.to_string(),
        })?;
        let dict_path = repo.get("dictionary.txt").map_err(|e| InitializationError::EngineInit {
            engine: "openocr".to_string(),
            reason: e.to_string(),
        })?;

        let threads = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(threads))
            .and_then(|b| b.commit_from_file(model_path))
            .map_err(|e| InitializationError::EngineInit {
                engine: "openocr".to_string(),
                reason: e.to_string(),
            })?;

        let dictionary = std::fs::read_to_string(dict_path)
            .map_err(|e| InitializationError::EngineInit {
                engine: "openocr".to_string(),
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
        let guard = self.session.lock().unwrap();
        let Some(session) = guard.as_ref() else {
            log::warn!("openocr: engine not initialized, returning empty result");
            return RecognitionResult::empty();
        };
        let dictionary = self.dictionary.lock().unwrap();

        let rgb = image.to_dynamic().resize_exact(160, 48, image::imageops::FilterType::Lanczos3).to_rgb8();
        let mut tensor = Array4::<f32>::zeros((1, 3, 48, 160));
        for (x, y, p) in rgb.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = p[c] as f32 / 255.0;
            }
        }

        let Ok(inputs) = ort::inputs![tensor.view()] else {
            return RecognitionResult::empty();
        };
        let Ok(outputs) = session.run(inputs) else {
            log::warn!("openocr: inference failed, returning empty result");
            return RecognitionResult::empty();
        };
        let Some(first) = outputs.values().next() else {
            return RecognitionResult::empty();
        };
        let Ok(logits) = first.try_extract_tensor::<f32>() else {
            return RecognitionResult::empty();
        };
        let view = logits.view();
        let (seq_len, dict_size) = match view.shape() {
            [1, s, d] => (*s, *d),
            _ => return RecognitionResult::empty(),
        };
        let mut text = String::new();
        let mut confidences = Vec::new();
        let mut last_idx: i64 = -1;
        for t in 0..seq_len {
            let mut best_val = f32::MIN;
            let mut best_idx = 0usize;
            for c in 0..dict_size.min(dictionary.len() + 1) {
                let v = view[[0, t, c]];
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
        let mean = if confidences.is_empty() { 0.0 } else { confidences.iter().sum::<f32>() / confidences.len() as f32 };
        RecognitionResult::new(text, mean)
    }

    fn get_name(&self) -> &str {
        "openocr"
    }

    fn get_version(&self) -> &str {
        "svtr-v2"
    }

    fn get_info(&self) -> HashMap<String, serde_json::Value> {
        let mut info = engine_base_info(false, 12);
        info.insert("backend".to_string(), serde_json::json!(format!("{:?}", self.backend).to_lowercase()));
        info.insert("device".to_string(), serde_json::json!(format!("{:?}", self.device).to_lowercase()));
        info
    }
}
