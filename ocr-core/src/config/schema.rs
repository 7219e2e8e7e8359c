use crate::date_parser::DateParserConfig;
use crate::line_detect::LineDetectorConfig;
use crate::normalize::{GeometricNormalizerConfig, PhotometricNormalizerConfig};
use crate::postprocess::PostprocessorConfig;
use crate::preprocess::Profile;
use serde::{Deserialize, Serialize};

/// The closed set of recognition engine kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Tesseract,
    Easyocr,
    Paddleocr,
    Trocr,
    Parseq,
    ParseqEnhanced,
    Openocr,
}

impl EngineKind {
    pub const ALL: [EngineKind; 7] = [
        EngineKind::Tesseract,
        EngineKind::Easyocr,
        EngineKind::Paddleocr,
        EngineKind::Trocr,
        EngineKind::Parseq,
        EngineKind::ParseqEnhanced,
        EngineKind::Openocr,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Tesseract => "tesseract",
            EngineKind::Easyocr => "easyocr",
            EngineKind::Paddleocr => "paddleocr",
            EngineKind::Trocr => "trocr",
            EngineKind::Parseq => "parseq",
            EngineKind::ParseqEnhanced => "parseq_enhanced",
            EngineKind::Openocr => "openocr",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    Cpu,
    Cuda,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankStrategy {
    Confidence,
    Voting,
    Rerank,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerWeights {
    pub confidence: f64,
    pub pattern_match: f64,
    pub keyword_match: f64,
    pub contextual: f64,
    pub short_text_penalty: f64,
    pub symbol_penalty: f64,
    pub space_penalty: f64,
}

impl Default for RerankerWeights {
    fn default() -> Self {
        Self {
            confidence: 0.50,
            pattern_match: 0.20,
            keyword_match: 0.15,
            contextual: 0.20,
            short_text_penalty: 0.30,
            symbol_penalty: 0.20,
            space_penalty: 0.15,
        }
    }
}

impl RerankerWeights {
    /// Only the positive-weight terms are required to sum to 1, matching
    /// `ensemble.reranker.weights summing to 1` in the external schema;
    /// the penalty terms are subtracted, not blended.
    pub fn positive_sum(&self) -> f64 {
        self.confidence + self.pattern_match + self.keyword_match + self.contextual
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleConfig {
    #[serde(default)]
    pub strategy: RerankStrategy,
    #[serde(default = "default_num_variants")]
    pub num_variants: usize,
    #[serde(default)]
    pub variant_types: Vec<String>,
    #[serde(default)]
    pub reranker: RerankerWeights,
}

impl Default for RerankStrategy {
    fn default() -> Self {
        RerankStrategy::Rerank
    }
}

fn default_num_variants() -> usize {
    7
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            strategy: RerankStrategy::Rerank,
            num_variants: default_num_variants(),
            variant_types: Vec::new(),
            reranker: RerankerWeights::default(),
        }
    }
}

/// Engine-specific parameters, generalized from the per-kind config
/// structs the model package carried. `enhanced` nests the four
/// sub-configs the ensemble recognizer composes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineProfile {
    pub engine: EngineKind,
    #[serde(default)]
    pub device: Option<Device>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub confidence_threshold: Option<f32>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub preprocessing_profile: Option<String>,
    #[serde(default)]
    pub line_detector: LineDetectorConfig,
    #[serde(default)]
    pub geometric_normalizer: GeometricNormalizerConfig,
    #[serde(default)]
    pub photometric_normalizer: PhotometricNormalizerConfig,
    #[serde(default)]
    pub ensemble: EnsembleConfig,
    #[serde(default)]
    pub postprocessor: PostprocessorConfig,
    #[serde(default)]
    pub date_parser: DateParserConfig,
}

/// The merged, effective run specification: a named set of preprocessing
/// profiles plus the chosen engine profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub preprocessing_profiles: Vec<Profile>,
    pub engine_profile: EngineProfile,
}
