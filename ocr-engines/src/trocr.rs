use crate::engine::{engine_base_info, RecognitionEngine};
use hf_hub::api::sync::Api;
use ndarray::Array4;
use ocr_core::error::InitializationError;
use ocr_core::{Image, RecognitionResult};
use ort::session::Session;
use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;

const START_TOKEN: i64 = 2;
const END_TOKEN: i64 = 3;
const MAX_TOKENS: usize = 64;

/// Vision transformer encoder-decoder (TrOCR-equivalent). Single-line
/// only; confidence is derived from generation log-probs (approximated
/// here as the mean softmax-argmax score per produced token).
pub struct TrOcrEngine {
    model: Mutex<Option<Session>>,
    vocab: Mutex<Vec<String>>,
}

impl TrOcrEngine {
    pub fn new() -> Self {
        Self {
            model: Mutex::new(None),
            vocab: Mutex::new(Vec::new()),
        }
    }
}

impl RecognitionEngine for TrOcrEngine {
    fn initialize(&mut self) -> Result<(), InitializationError> {
        if self.model.lock().unwrap().is_some() {
            return Ok(());
        }
        let api = Api::new().map_err(|e| InitializationError::EngineInit {
            engine: "trocr".to_string(),
            reason: e.to_string(),
        })?;
        let repo = api.model("microsoft/trocr-base-printed".to_string());
        let model_path = repo.get("model.onnx").map_err(|e| InitializationError::EngineInit {
            engine: "trocr".to_string(),
            reason: e.to_string(),
        })?;
        let vocab_path = repo.get("vocab.txt").map_err(|e| InitializationError::EngineInit {
            engine: "trocr".to_string(),
            reason: e.to_string(),
        })?;

        let threads = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(threads))
            .and_then(|b| b.commit_from_file(model_path))
            .map_err(|e| InitializationError::EngineInit {
                engine: "trocr".to_string(),
                reason: e.to_string(),
            })?;

        let vocab = std::fs::read_to_string(vocab_path)
            .map_err(|e| InitializationError::EngineInit {
                engine: "trocr".to_string(),
                reason: e.to_string(),
            })?
            .lines()
            .map(|s| s.to_string())
            .collect();

        *self.vocab.lock().unwrap() = vocab;
        *self.model.lock().unwrap() = Some(session);
        Ok(())
    }

    fn extract_text(&self, image: &Image) -> RecognitionResult {
        if image.is_empty() {
            return RecognitionResult::empty();
        }
        let guard = self.model.lock().unwrap();
        let Some(session) = guard.as_ref() else {
            log::warn!("trocr: engine not initialized, returning empty result");
            return RecognitionResult::empty();
        };
        let vocab = self.vocab.lock().unwrap();

        let rgb = image.to_dynamic().resize_exact(384, 384, image::imageops::FilterType::Lanczos3).to_rgb8();
        let mut tensor = Array4::<f32>::zeros((1, 3, 384, 384));
        for (x, y, p) in rgb.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = (p[c] as f32 / 255.0 - 0.5) / 0.5;
            }
        }

        let mut token_ids: Vec<i64> = vec![START_TOKEN];
        let mut scores: Vec<f32> = Vec::new();

        for _ in 0..MAX_TOKENS {
            let token_array = match ndarray::Array::from_shape_vec((1, token_ids.len()), token_ids.clone()) {
                Ok(a) => a,
                Err(_) => break,
            };
            let Ok(inputs) = ort::inputs![
                "pixel_values" => tensor.view(),
                "decoder_input_ids" => token_array,
            ] else {
                break;
            };
            let Ok(outputs) = session.run(inputs) else {
                log::warn!("trocr: inference failed mid-generation, stopping early");
                break;
            };
            let Some(logits_value) = outputs.values().next() else {
                break;
            };
            let Ok(logits) = logits_value.try_extract_tensor::<f32>() else {
                break;
            };
            let view = logits.view();
            let Some(last_axis) = view.shape().last().copied() else {
                break;
            };
            let seq_pos = view.shape()[1] - 1;
            let mut best_val = f32::MIN;
            let mut best_idx = 0usize;
            for c in 0..last_axis {
                let v = view[[0, seq_pos, c]];
                if v > best_val {
                    best_val = v;
                    best_idx = c;
                }
            }
            token_ids.push(best_idx as i64);
            scores.push(best_val);
            if best_idx as i64 == END_TOKEN {
                break;
            }
        }

        let text: String = token_ids
            .iter()
            .filter(|&&id| id >= 5)
            .filter_map(|&id| vocab.get(id as usize).cloned())
            .collect::<Vec<_>>()
            .join("");

        let confidence = if scores.is_empty() {
            0.0
        } else {
            1.0 / (1.0 + (-scores.iter().sum::<f32>() / scores.len() as f32).exp())
        };
        RecognitionResult::new(text, confidence)
    }

    fn get_name(&self) -> &str {
        "trocr"
    }

    fn get_version(&self) -> &str {
        "base-printed"
    }

    fn get_info(&self) -> HashMap<String, serde_json::Value> {
        engine_base_info(false, 10)
    }
}
