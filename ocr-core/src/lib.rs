pub mod config;
pub mod date_parser;
pub mod error;
pub mod line_detect;
pub mod normalize;
pub mod postprocess;
pub mod preprocess;
pub mod types;

pub use error::{OcrCoreError, Result};
pub use types::{
    BBox, Crop, EnsembleCandidate, ErrorCategory, EvaluationRecord, Image, LineOutcome, Mask,
    RecognitionResult, Variant,
};
