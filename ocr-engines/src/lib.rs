pub mod easyocr;
pub mod engine;
pub mod model_package;
pub mod openocr;
pub mod paddleocr;
pub mod parseq;
pub mod parseq_enhanced;
#[cfg(feature = "tesseract")]
pub mod tesseract;
pub mod trocr;

pub use engine::{EngineRegistry, RecognitionEngine};
pub use model_package::ModelManifest;
