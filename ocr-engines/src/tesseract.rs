use crate::engine::{engine_base_info, RecognitionEngine};
use leptess::{LepTess, Variable};
use ocr_core::error::InitializationError;
use ocr_core::{Image, RecognitionResult};
use std::collections::HashMap;
use std::sync::Mutex;

/// Classical character recognizer (Tesseract-equivalent). Per-character
/// confidence is aggregated to a mean; no multi-line smarts, acceptable
/// for clean printed text.
pub struct TesseractEngine {
    languages: String,
    inner: Mutex<Option<LepTess>>,
}

impl TesseractEngine {
    pub fn new() -> Self {
        Self::with_languages("eng")
    }

    pub fn with_languages(languages: &str) -> Self {
        Self {
            languages: languages.to_string(),
            inner: Mutex::new(None),
        }
    }
}

impl RecognitionEngine for TesseractEngine {
    fn initialize(&mut self) -> Result<(), InitializationError> {
        if self.inner.lock().unwrap().is_some() {
            return Ok(());
        }
        let mut lt = LepTess::new(None, &self.languages).map_err(|e| InitializationError::EngineInit {
            engine: "tesseract".to_string(),
            reason: e.to_string(),
        })?;
        lt.set_variable(Variable::TesseditPagesegMode, "7")
            .map_err(|e| InitializationError::EngineInit {
                engine: "tesseract".to_string(),
                reason: e.to_string(),
            })?;
        *self.inner.lock().unwrap() = Some(lt);
        Ok(())
    }

    fn extract_text(&self, image: &Image) -> RecognitionResult {
        if image.is_empty() {
            log::warn!("tesseract: empty image, returning empty result");
            return RecognitionResult::empty();
        }
        let mut guard = self.inner.lock().unwrap();
        let Some(lt) = guard.as_mut() else {
            log::warn!("tesseract: engine not initialized, returning empty result");
            return RecognitionResult::empty();
        };

        let dynamic = image.to_dynamic();
        let rgb = dynamic.to_rgb8();
        let pix = match leptess::leptonica::Pix::from_raw_data(rgb.width() as i32, rgb.height() as i32, rgb.as_raw()) {
            Ok(pix) => pix,
            Err(_) => {
                log::warn!("tesseract: failed to build pix, returning empty result");
                return RecognitionResult::empty();
            }
        };
        lt.set_image_from_pix(pix);

        let text = lt.get_utf8_text().unwrap_or_default();
        let mean_confidence = lt.mean_text_conf();
        RecognitionResult::new(text.trim(), mean_confidence as f32 / 100.0)
    }

    fn get_name(&self) -> &str {
        "tesseract"
    }

    fn get_version(&self) -> &str {
        "5.x"
    }

    fn get_info(&self) -> HashMap<String, serde_json::Value> {
        let mut info = engine_base_info(false, 20);
        info.insert("languages".to_string(), serde_json::json!(self.languages));
        info
    }

    fn postprocess(&self, text: &str) -> String {
        text.trim().to_string()
    }
}
