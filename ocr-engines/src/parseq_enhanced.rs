use crate::engine::{engine_base_info, RecognitionEngine};
use crate::parseq::ParseqEngine;
use ocr_core::config::{EnsembleConfig, RerankStrategy};
use ocr_core::error::InitializationError;
use ocr_core::line_detect::{LineDetector, LineDetectorConfig};
use ocr_core::normalize::{GeometricNormalizer, GeometricNormalizerConfig, PhotometricNormalizer, PhotometricNormalizerConfig};
use ocr_core::postprocess::{ContextualPostprocessor, PostprocessorConfig};
use ocr_core::types::{EnsembleCandidate, LineOutcome};
use ocr_core::{Image, RecognitionResult};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Default)]
pub struct EnhancedConfig {
    pub line_detector: LineDetectorConfig,
    pub geometric_normalizer: GeometricNormalizerConfig,
    pub photometric_normalizer: PhotometricNormalizerConfig,
    pub ensemble: EnsembleConfig,
    pub postprocessor: PostprocessorConfig,
}

/// The "enhanced" engine: line detection -> geometric normalization ->
/// photometric variant generation -> per-variant recognition ->
/// reranking -> line concatenation -> one contextual-postprocessing pass
/// over the joined text.
pub struct EnhancedEngine {
    config: EnhancedConfig,
    line_detector: LineDetector,
    geometric: GeometricNormalizer,
    photometric: PhotometricNormalizer,
    postprocessor: ContextualPostprocessor,
    underlying: Mutex<ParseqEngine>,
    expected_terms: Vec<String>,
}

impl EnhancedEngine {
    pub fn new(config: EnhancedConfig) -> Self {
        let line_detector = LineDetector::new(config.line_detector.clone());
        let geometric = GeometricNormalizer::new(config.geometric_normalizer.clone());
        let photometric = PhotometricNormalizer::new(config.photometric_normalizer.clone());
        let postprocessor = ContextualPostprocessor::new(config.postprocessor.clone());
        let expected_terms = config.postprocessor.known_words.clone();
        Self {
            config,
            line_detector,
            geometric,
            photometric,
            postprocessor,
            underlying: Mutex::new(ParseqEngine::new("base")),
            expected_terms,
        }
    }

    fn recognize_line(&self, line: &Image) -> LineOutcome {
        let deskewed = self.geometric.deskew(line);
        let rectified = self.geometric.perspective_warp(&deskewed);

        let variants = if self.config.ensemble.num_variants <= 1 {
            vec![ocr_core::types::Variant { name: "baseline".to_string(), image: rectified.clone() }]
        } else {
            self.photometric.generate_variants(&rectified)
        };

        let candidates: Vec<EnsembleCandidate> = variants
            .iter()
            .map(|variant| {
                let result = self.recognize_variant(&variant.image);
                let score = self.rerank_score(&result);
                EnsembleCandidate {
                    variant_name: variant.name.clone(),
                    text: result.text,
                    confidence: result.confidence,
                    rerank_score: score,
                }
            })
            .collect();

        let selected_index = self.select(&candidates);
        LineOutcome { candidates, selected_index }
    }

    /// Never panics for a per-variant recognition failure: a crashed
    /// variant is recorded as `("", 0.0)` and the rest continue.
    fn recognize_variant(&self, image: &Image) -> RecognitionResult {
        let guard = self.underlying.lock().unwrap();
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| guard.extract_text(image)))
            .unwrap_or_else(|_| RecognitionResult::empty())
    }

    fn select(&self, candidates: &[EnsembleCandidate]) -> usize {
        if candidates.is_empty() {
            return 0;
        }
        match self.config.ensemble.strategy {
            RerankStrategy::Confidence => candidates
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.confidence.total_cmp(&b.confidence))
                .map(|(i, _)| i)
                .unwrap_or(0),
            RerankStrategy::Voting => {
                let mut counts: HashMap<&str, (usize, f32)> = HashMap::new();
                for c in candidates {
                    let entry = counts.entry(c.text.as_str()).or_insert((0, 0.0));
                    entry.0 += 1;
                    entry.1 += c.confidence;
                }
                let Some((winning_text, _)) = counts
                    .iter()
                    .max_by(|(_, a), (_, b)| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)))
                    .map(|(t, v)| (*t, *v))
                else {
                    return 0;
                };
                candidates.iter().position(|c| c.text == winning_text).unwrap_or(0)
            }
            RerankStrategy::Rerank => {
                // Ties broken by higher raw confidence, then by earlier
                // variant enumeration order (the index itself).
                let mut best = 0usize;
                for i in 1..candidates.len() {
                    let (b, c) = (&candidates[best], &candidates[i]);
                    if c.rerank_score > b.rerank_score
                        || (c.rerank_score == b.rerank_score && c.confidence > b.confidence)
                    {
                        best = i;
                    }
                }
                best
            }
        }
    }

    /// Pure function of its inputs: the reranking score combining
    /// confidence, pattern/keyword matches, contextual score, and
    /// symbol/space/length penalties. Public so it can be exercised
    /// directly (e.g. for benchmarking) without running inference.
    pub fn rerank_score(&self, result: &RecognitionResult) -> f32 {
        let w = &self.config.ensemble.reranker;
        let text_upper = result.text.to_uppercase();

        let pattern_match = self
            .config
            .postprocessor
            .expected_patterns
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .any(|re| re.is_match(&result.text));
        let keyword_match = self.expected_terms.iter().any(|k| text_upper.contains(k.as_str()));
        let contextual = self.postprocessor.contextual_score(&result.text);
        let short_penalty = result.text.len() < 3;
        let symbol_ratio = symbol_ratio(&result.text);
        let space_ratio = space_ratio(&result.text);

        (w.confidence as f32 * result.confidence
            + w.pattern_match as f32 * bool_f32(pattern_match)
            + w.keyword_match as f32 * bool_f32(keyword_match)
            + w.contextual as f32 * contextual
            - w.short_text_penalty as f32 * bool_f32(short_penalty)
            - w.symbol_penalty as f32 * symbol_ratio
            - w.space_penalty as f32 * space_ratio)
            .clamp(f32::MIN, f32::MAX)
    }
}

fn bool_f32(b: bool) -> f32 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn symbol_ratio(text: &str) -> f32 {
    if text.is_empty() {
        return 0.0;
    }
    let odd = text.chars().filter(|c| !"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 /.-:".contains(*c)).count();
    odd as f32 / text.chars().count() as f32
}

fn space_ratio(text: &str) -> f32 {
    if text.is_empty() {
        return 0.0;
    }
    text.chars().filter(|c| c.is_whitespace()).count() as f32 / text.chars().count() as f32
}

impl RecognitionEngine for EnhancedEngine {
    fn initialize(&mut self) -> Result<(), InitializationError> {
        self.underlying.lock().unwrap().initialize()
    }

    fn extract_text(&self, image: &Image) -> RecognitionResult {
        if image.is_empty() {
            return RecognitionResult::empty();
        }
        let lines = self.line_detector.split_lines(image);
        let outcomes: Vec<LineOutcome> = lines.iter().map(|line| self.recognize_line(line)).collect();

        let selected_confidences: Vec<f32> = outcomes.iter().map(|o| o.selected().confidence).collect();
        let joined = outcomes
            .iter()
            .map(|o| o.selected().text.clone())
            .collect::<Vec<_>>()
            .join("\n");

        let postprocessed = self.postprocessor.process(&joined);
        let mean_confidence = if selected_confidences.is_empty() {
            0.0
        } else {
            selected_confidences.iter().sum::<f32>() / selected_confidences.len() as f32
        };
        RecognitionResult::new(postprocessed, mean_confidence)
    }

    fn get_name(&self) -> &str {
        "parseq_enhanced"
    }

    fn get_version(&self) -> &str {
        "enhanced-1"
    }

    fn get_info(&self) -> HashMap<String, serde_json::Value> {
        let mut info = engine_base_info(false, 12);
        info.insert(
            "strategy".to_string(),
            serde_json::json!(format!("{:?}", self.config.ensemble.strategy).to_lowercase()),
        );
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocr_core::types::EnsembleCandidate;

    fn candidate(text: &str, confidence: f32, score: f32) -> EnsembleCandidate {
        EnsembleCandidate {
            variant_name: "baseline".to_string(),
            text: text.to_string(),
            confidence,
            rerank_score: score,
        }
    }

    #[test]
    fn rerank_tie_break_keeps_earlier_variant() {
        let engine = EnhancedEngine::new(EnhancedConfig {
            ensemble: EnsembleConfig { strategy: RerankStrategy::Rerank, ..Default::default() },
            ..Default::default()
        });
        let candidates = vec![candidate("baseline", 0.8, 0.5), candidate("clahe", 0.8, 0.5)];
        assert_eq!(engine.select(&candidates), 0);
    }

    #[test]
    fn confidence_strategy_picks_argmax() {
        let engine = EnhancedEngine::new(EnhancedConfig {
            ensemble: EnsembleConfig { strategy: RerankStrategy::Confidence, ..Default::default() },
            ..Default::default()
        });
        let candidates = vec![candidate("a", 0.2, 0.9), candidate("b", 0.9, 0.1)];
        assert_eq!(engine.select(&candidates), 1);
    }
}
