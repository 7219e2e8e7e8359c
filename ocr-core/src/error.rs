use thiserror::Error;

/// Malformed configuration: unknown engine kind, invalid weight sum, a
/// referenced profile that doesn't exist. Always surfaced to the caller.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed YAML in {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("unknown engine kind '{0}'")]
    UnknownEngineKind(String),
    #[error("preprocessing profile '{0}' is referenced but not defined")]
    MissingProfile(String),
    #[error("reranker weights sum to {0}, expected 1.0")]
    WeightsNotNormalized(f64),
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Model weights missing, corrupt, or incompatible with the requested
/// device. Surfaced with the offending engine name.
#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("engine '{engine}' failed to initialize: {reason}")]
    EngineInit { engine: String, reason: String },
    #[error("model file '{file}' missing in package at {dir}")]
    MissingModelFile { dir: String, file: String },
    #[error("checksum mismatch for '{file}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },
}

/// Bad input at the smallest stage that can safely degrade: empty image,
/// unreadable file, wrong dtype. Never propagated out of an engine call;
/// callers see this only from the evaluator or the config loader.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("empty image")]
    EmptyImage,
    #[error("unreadable file '{0}'")]
    UnreadableFile(String),
    #[error("unexpected channel count: {0}")]
    UnexpectedChannelCount(u8),
}

/// Transient inference failure. A single ensemble candidate failing is
/// not fatal; the sole-engine case degrades to `("", 0.0)`.
#[derive(Debug, Error)]
pub enum EngineRuntimeError {
    #[error("engine '{engine}' runtime failure: {reason}")]
    Inference { engine: String, reason: String },
}

/// A postprocessing transform (regex or fuzzy matching) failed. The
/// transform is skipped; remaining transforms still run.
#[derive(Debug, Error)]
pub enum PostprocessingError {
    #[error("regex failure in step '{step}': {reason}")]
    Regex { step: String, reason: String },
    #[error("fuzzy matching failure: {0}")]
    FuzzyMatch(String),
}

pub type Result<T> = std::result::Result<T, OcrCoreError>;

/// Umbrella error for anything that crosses an `ocr-core` public API
/// boundary. Internal stages prefer the narrower per-taxonomy error types
/// and only wrap them here when surfacing to a caller.
#[derive(Debug, Error)]
pub enum OcrCoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Initialization(#[from] InitializationError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    EngineRuntime(#[from] EngineRuntimeError),
    #[error(transparent)]
    Postprocessing(#[from] PostprocessingError),
}
