use ocr_core::config::EngineKind;
use ocr_core::error::InitializationError;
use ocr_core::{Image, RecognitionResult};
use std::collections::HashMap;

/// `{initialize, extract_text, get_name, get_version, get_info,
/// postprocess}`. Concrete adapters wrap third-party models; a registry
/// maps the engine-kind string to a constructor so extension happens by
/// registering, not by growing an inheritance tree.
pub trait RecognitionEngine: Send {
    /// Idempotent: calling twice after a successful first call is a
    /// no-op, not a reload.
    fn initialize(&mut self) -> Result<(), InitializationError>;

    /// Validates the image (non-empty, correct channel count) before
    /// running inference. On invalid input returns `("", 0.0)` and logs;
    /// never panics for recoverable input errors.
    fn extract_text(&self, image: &Image) -> RecognitionResult;

    fn get_name(&self) -> &str;
    fn get_version(&self) -> &str;

    /// Includes `min_reliable_text_height_px` and a `thread_safe` flag so
    /// callers can route around known rough edges without a failed call.
    fn get_info(&self) -> HashMap<String, serde_json::Value>;

    /// Default implementation strips whitespace; adapters needing more
    /// (format repair, case folding) override it.
    fn postprocess(&self, text: &str) -> String {
        text.trim().to_string()
    }
}

fn base_info(thread_safe: bool, min_reliable_text_height_px: u32) -> HashMap<String, serde_json::Value> {
    let mut info = HashMap::new();
    info.insert("thread_safe".to_string(), serde_json::json!(thread_safe));
    info.insert(
        "min_reliable_text_height_px".to_string(),
        serde_json::json!(min_reliable_text_height_px),
    );
    info
}

pub(crate) use base_info as engine_base_info;

type Constructor = Box<dyn Fn() -> Box<dyn RecognitionEngine> + Send + Sync>;

/// Maps the closed engine-kind set to a constructor. Registration
/// failures (e.g. a feature-gated backend compiled out) are warned, not
/// hard failures, mirroring how a plugin registry tolerates a missing
/// optional backend.
pub struct EngineRegistry {
    constructors: HashMap<EngineKind, Constructor>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        let mut registry = Self { constructors: HashMap::new() };
        registry.register_defaults();
        registry
    }

    fn register_defaults(&mut self) {
        self.register(EngineKind::Easyocr, || Box::new(crate::easyocr::EasyOcrEngine::new()));
        self.register(EngineKind::Paddleocr, || Box::new(crate::paddleocr::PaddleOcrEngine::new()));
        self.register(EngineKind::Trocr, || Box::new(crate::trocr::TrOcrEngine::new()));
        self.register(EngineKind::Parseq, || Box::new(crate::parseq::ParseqEngine::new("base")));
        self.register(EngineKind::Openocr, || Box::new(crate::openocr::OpenOcrEngine::new()));
        self.register(EngineKind::ParseqEnhanced, || {
            Box::new(crate::parseq_enhanced::EnhancedEngine::new(Default::default()))
        });

        #[cfg(feature = "tesseract")]
        self.register(EngineKind::Tesseract, || Box::new(crate::tesseract::TesseractEngine::new()));
        #[cfg(not(feature = "tesseract"))]
        log::warn!("tesseract backend not compiled in (enable the 'tesseract' feature)");
    }

    pub fn register<F>(&mut self, kind: EngineKind, constructor: F)
    where
        F: Fn() -> Box<dyn RecognitionEngine> + Send + Sync + 'static,
    {
        self.constructors.insert(kind, Box::new(constructor));
    }

    pub fn create(&self, kind: EngineKind) -> Option<Box<dyn RecognitionEngine>> {
        self.constructors.get(&kind).map(|c| c())
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_creates_every_default_registered_kind() {
        let registry = EngineRegistry::new();
        for kind in [
            EngineKind::Easyocr,
            EngineKind::Paddleocr,
            EngineKind::Trocr,
            EngineKind::Parseq,
            EngineKind::ParseqEnhanced,
            EngineKind::Openocr,
        ] {
            assert!(registry.create(kind).is_some(), "{kind:?} should be registered");
        }
    }

    #[test]
    fn registry_returns_none_for_unregistered_kind_when_feature_off() {
        let registry = EngineRegistry::new();
        #[cfg(not(feature = "tesseract"))]
        assert!(registry.create(EngineKind::Tesseract).is_none());
        #[cfg(feature = "tesseract")]
        assert!(registry.create(EngineKind::Tesseract).is_some());
    }
}
