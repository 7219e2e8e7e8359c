use crate::error::PostprocessingError;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Per-rule toggles plus the dictionaries the rules consult. Declared in
/// an engine profile's `postprocessor` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostprocessorConfig {
    #[serde(default = "default_true")]
    pub uppercase: bool,
    #[serde(default = "default_true")]
    pub remove_symbols: bool,
    #[serde(default = "default_true")]
    pub ambiguity_mapping: bool,
    #[serde(default = "default_true")]
    pub fuzzy_matching: bool,
    #[serde(default = "default_true")]
    pub fix_formats: bool,
    #[serde(default = "default_true")]
    pub cleanup: bool,
    #[serde(default)]
    pub known_words: Vec<String>,
    #[serde(default)]
    pub expected_patterns: Vec<String>,
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: usize,
}

fn default_true() -> bool {
    true
}
fn default_fuzzy_threshold() -> usize {
    2
}

impl Default for PostprocessorConfig {
    fn default() -> Self {
        Self {
            uppercase: true,
            remove_symbols: true,
            ambiguity_mapping: true,
            fuzzy_matching: true,
            fix_formats: true,
            cleanup: true,
            known_words: Vec::new(),
            expected_patterns: Vec::new(),
            fuzzy_threshold: default_fuzzy_threshold(),
        }
    }
}

/// Characters in the numeric context map, applied when both flanking
/// characters are digits.
const NUMERIC_MAP: &[(char, char)] = &[
    ('O', '0'),
    ('I', '1'),
    ('l', '1'),
    ('S', '5'),
    ('B', '8'),
    ('Z', '2'),
    ('G', '6'),
    ('T', '7'),
    ('|', '1'),
];

/// Digits mapped back to letters when isolated inside an alphabetic run.
/// Deliberately narrow: extending this set beyond `{0->O, 1->I}` is an
/// unresolved ambiguity the original system never pinned down.
const ALPHABETIC_MAP: &[(char, char)] = &[('0', 'O'), ('1', 'I')];

pub struct ContextualPostprocessor {
    config: PostprocessorConfig,
    patterns: Vec<Regex>,
}

impl ContextualPostprocessor {
    pub fn new(config: PostprocessorConfig) -> Self {
        let patterns = config
            .expected_patterns
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        Self { config, patterns }
    }

    /// Applies the ordered transforms; idempotent: `process(process(t)) ==
    /// process(t)`. A transform failure is logged and skipped, remaining
    /// transforms continue.
    pub fn process(&self, text: &str) -> String {
        let mut current = text.to_string();
        if self.config.uppercase {
            current = uppercase(&current);
        }
        if self.config.remove_symbols {
            current = remove_symbols(&current);
        }
        if self.config.ambiguity_mapping {
            current = ambiguity_mapping(&current);
        }
        if self.config.fuzzy_matching {
            match fuzzy_matching(&current, &self.config.known_words, self.config.fuzzy_threshold) {
                Ok(next) => current = next,
                Err(e) => log::warn!("fuzzy matching skipped: {e}"),
            }
        }
        if self.config.fix_formats {
            current = fix_formats(&current);
        }
        if self.config.cleanup {
            current = cleanup(&current);
        }
        current
    }

    /// `[0,1]` score combining expected-pattern match count, dictionary
    /// hit rate, and a penalty for odd symbol density. Used by the
    /// ensemble reranker.
    pub fn contextual_score(&self, text: &str) -> f32 {
        let pattern_hit = if self.patterns.iter().any(|r| r.is_match(text)) { 1.0 } else { 0.0 };
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let dict_hits = if self.config.known_words.is_empty() || tokens.is_empty() {
            0.0
        } else {
            let hits = tokens
                .iter()
                .filter(|t| self.config.known_words.iter().any(|w| w.eq_ignore_ascii_case(t)))
                .count();
            hits as f32 / tokens.len() as f32
        };
        let symbol_penalty = symbol_ratio(text);
        (0.5 * pattern_hit + 0.5 * dict_hits - symbol_penalty).clamp(0.0, 1.0)
    }
}

fn uppercase(text: &str) -> String {
    text.to_uppercase()
}

fn remove_symbols(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric() || " /.-:".contains(*c))
        .collect()
}

/// Context-sensitive substitution per character: numeric map when both
/// neighbors are digits, alphabetic map only for an isolated letter-like
/// digit flanked by letters, otherwise unchanged.
fn ambiguity_mapping(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(chars.len());
    for i in 0..chars.len() {
        let c = chars[i];
        let prev = if i > 0 { Some(chars[i - 1]) } else { None };
        let next = if i + 1 < chars.len() { Some(chars[i + 1]) } else { None };

        let flanked_by_digits = prev.map(|p| p.is_ascii_digit()).unwrap_or(false)
            && next.map(|n| n.is_ascii_digit()).unwrap_or(false);
        let flanked_by_letters = prev.map(|p| p.is_ascii_alphabetic()).unwrap_or(false)
            && next.map(|n| n.is_ascii_alphabetic()).unwrap_or(false);

        if flanked_by_digits {
            if let Some((_, mapped)) = NUMERIC_MAP.iter().find(|(k, _)| *k == c) {
                out.push(*mapped);
                continue;
            }
        } else if flanked_by_letters && c.is_ascii_digit() {
            if let Some((_, mapped)) = ALPHABETIC_MAP.iter().find(|(k, _)| *k == c) {
                out.push(*mapped);
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn fuzzy_matching(text: &str, known_words: &[String], threshold: usize) -> Result<String, PostprocessingError> {
    if known_words.is_empty() {
        return Ok(text.to_string());
    }
    let tokens: Vec<String> = text
        .split_whitespace()
        .map(|token| {
            let Some((best, distance)) = known_words
                .iter()
                .map(|w| (w, levenshtein(token, w)))
                .min_by_key(|(_, d)| *d)
            else {
                return token.to_string();
            };
            if distance <= threshold {
                best.clone()
            } else {
                token.to_string()
            }
        })
        .collect();
    Ok(tokens.join(" "))
}

#[cfg(feature = "fuzzy-fast")]
fn levenshtein(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

#[cfg(not(feature = "fuzzy-fast"))]
fn levenshtein(a: &str, b: &str) -> usize {
    pure_levenshtein(a, b)
}

/// Pure-Rust fallback used when the `fuzzy-fast` feature (backed by
/// `strsim`) is compiled out.
fn pure_levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (la, lb) = (a.len(), b.len());
    if la == 0 {
        return lb;
    }
    if lb == 0 {
        return la;
    }
    let mut matrix = vec![vec![0usize; lb + 1]; la + 1];
    for i in 0..=la {
        matrix[i][0] = i;
    }
    for j in 0..=lb {
        matrix[0][j] = j;
    }
    for i in 1..=la {
        for j in 1..=lb {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }
    matrix[la][lb]
}

fn fix_formats(text: &str) -> String {
    let spaced_tokens = Regex::new(r"\b([A-Z])\s+([A-Z])\s+([A-Z])\s+([A-Z])\b").unwrap();
    let mut out = spaced_tokens.replace_all(text, "$1$2$3$4").to_string();
    let date_sep = Regex::new(r"(\d{1,4})[.\-](\d{1,2})[.\-](\d{1,4})").unwrap();
    out = date_sep.replace_all(&out, "$1/$2/$3").to_string();
    out
}

fn cleanup(text: &str) -> String {
    let collapsed = Regex::new(r"\s+").unwrap().replace_all(text, " ").to_string();
    collapsed.trim().to_string()
}

fn symbol_ratio(text: &str) -> f32 {
    if text.is_empty() {
        return 0.0;
    }
    let odd = text
        .chars()
        .filter(|c| !c.is_ascii_alphanumeric() && !" /.-:".contains(*c))
        .count();
    odd as f32 / text.chars().count() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor(known_words: &[&str]) -> ContextualPostprocessor {
        ContextualPostprocessor::new(PostprocessorConfig {
            known_words: known_words.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        })
    }

    #[test]
    fn process_is_idempotent() {
        let p = processor(&["LOTE"]);
        let once = p.process("l0t3 2025");
        let twice = p.process(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn ambiguity_mapping_in_alphabetic_context() {
        assert_eq!(ambiguity_mapping("L0TE"), "LOTE");
    }

    #[test]
    fn digit_context_maps_letter_like_digits_to_digits() {
        assert_eq!(ambiguity_mapping("2O25"), "2025");
    }

    #[test]
    fn fuzzy_matching_resolves_lot3_to_lote() {
        let p = processor(&["LOTE"]);
        assert_eq!(p.process("LOT3"), "LOTE");
    }

    #[test]
    fn scenario_l0te_202_resolves_via_fuzzy_match() {
        let p = processor(&["LOTE"]);
        assert_eq!(p.process("L0TE.202"), "LOTE.202");
    }

    #[test]
    fn fuzzy_match_is_identity_when_token_already_known() {
        let p = processor(&["HELLO"]);
        assert_eq!(p.process("HELLO"), "HELLO");
    }

    #[test]
    fn cleanup_collapses_whitespace() {
        assert_eq!(cleanup("  A   B  "), "A B");
    }
}
