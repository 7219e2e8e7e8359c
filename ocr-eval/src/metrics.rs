use ocr_core::types::ErrorCategory;
use unicode_segmentation::UnicodeSegmentation;

/// Per-item accuracy numbers, extending the ground-truth/predicted pair
/// with a CER-derived error bucket and a similarity score.
#[derive(Debug, Clone)]
pub struct ItemMetrics {
    pub exact_match: bool,
    pub cer: f64,
    pub wer: f64,
    pub similarity: f64,
    pub error_category: ErrorCategory,
}

impl ItemMetrics {
    pub fn calculate(ground_truth: &str, predicted: &str) -> Self {
        let normalized_gt = normalize(ground_truth);
        let normalized_pred = normalize(predicted);
        let exact_match = normalized_gt == normalized_pred;
        let cer = character_error_rate(&normalized_gt, &normalized_pred);
        let wer = word_error_rate(&normalized_gt, &normalized_pred);
        Self {
            exact_match,
            cer,
            wer,
            similarity: 1.0 - cer,
            error_category: ErrorCategory::from_cer(cer),
        }
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `edit_distance(p, g) / max(1, len(g))`, graphemes rather than bytes so
/// multi-byte characters count once.
pub fn character_error_rate(ground_truth: &str, predicted: &str) -> f64 {
    let gt_chars: Vec<&str> = ground_truth.graphemes(true).collect();
    let pred_chars: Vec<&str> = predicted.graphemes(true).collect();
    let distance = levenshtein_distance(&gt_chars, &pred_chars);
    distance as f64 / gt_chars.len().max(1) as f64
}

pub fn word_error_rate(ground_truth: &str, predicted: &str) -> f64 {
    let gt_words: Vec<&str> = ground_truth.split_whitespace().collect();
    let pred_words: Vec<&str> = predicted.split_whitespace().collect();
    let distance = levenshtein_distance(&gt_words, &pred_words);
    distance as f64 / gt_words.len().max(1) as f64
}

fn levenshtein_distance<T: Eq>(a: &[T], b: &[T]) -> usize {
    let (len_a, len_b) = (a.len(), b.len());
    if len_a == 0 {
        return len_b;
    }
    if len_b == 0 {
        return len_a;
    }
    let mut matrix = vec![vec![0usize; len_b + 1]; len_a + 1];
    for i in 0..=len_a {
        matrix[i][0] = i;
    }
    for j in 0..=len_b {
        matrix[0][j] = j;
    }
    for i in 1..=len_a {
        for j in 1..=len_b {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            matrix[i][j] = (matrix[i - 1][j] + 1).min(matrix[i][j - 1] + 1).min(matrix[i - 1][j - 1] + cost);
        }
    }
    matrix[len_a][len_b]
}

/// One substitution pair observed during alignment: `expected -> got`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfusionPair {
    pub expected: char,
    pub got: char,
}

/// Walks the Levenshtein alignment of `ground_truth`/`predicted` and
/// records every substitution as a confusion pair. Insertions and
/// deletions don't produce a pair since there is no single character to
/// blame on either side.
pub fn confusion_pairs(ground_truth: &str, predicted: &str) -> Vec<ConfusionPair> {
    let gt: Vec<char> = ground_truth.chars().collect();
    let pred: Vec<char> = predicted.chars().collect();
    let (la, lb) = (gt.len(), pred.len());
    let mut matrix = vec![vec![0usize; lb + 1]; la + 1];
    for i in 0..=la {
        matrix[i][0] = i;
    }
    for j in 0..=lb {
        matrix[0][j] = j;
    }
    for i in 1..=la {
        for j in 1..=lb {
            let cost = if gt[i - 1] == pred[j - 1] { 0 } else { 1 };
            matrix[i][j] = (matrix[i - 1][j] + 1).min(matrix[i][j - 1] + 1).min(matrix[i - 1][j - 1] + cost);
        }
    }

    let mut pairs = Vec::new();
    let (mut i, mut j) = (la, lb);
    while i > 0 && j > 0 {
        let sub_cost = if gt[i - 1] == pred[j - 1] { 0 } else { 1 };
        if matrix[i][j] == matrix[i - 1][j - 1] + sub_cost {
            if sub_cost == 1 {
                pairs.push(ConfusionPair { expected: gt[i - 1], got: pred[j - 1] });
            }
            i -= 1;
            j -= 1;
        } else if matrix[i][j] == matrix[i - 1][j] + 1 {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    pairs.reverse();
    pairs
}

/// A value at each of the fixed percentile points the evaluator reports.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct Percentiles {
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
}

/// Nearest-rank percentile over a sorted copy of `values`. Empty input
/// yields all zeros.
pub fn percentiles(values: &[f64]) -> Percentiles {
    if values.is_empty() {
        return Percentiles::default();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let at = |p: f64| -> f64 {
        let idx = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted[idx.min(sorted.len() - 1)]
    };
    Percentiles { p25: at(25.0), p50: at(50.0), p75: at(75.0), p90: at(90.0), p95: at(95.0) }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_match_has_zero_cer_and_is_exact() {
        let m = ItemMetrics::calculate("hello world", "hello world");
        assert_eq!(m.cer, 0.0);
        assert!(m.exact_match);
        assert_eq!(m.error_category, ErrorCategory::Perfect);
    }

    #[test]
    fn exact_match_ignores_case_and_surrounding_whitespace() {
        let m = ItemMetrics::calculate("LOTE 2025", "  lote   2025  ");
        assert!(m.exact_match);
        assert_eq!(m.cer, 0.0);
        assert_eq!(m.error_category, ErrorCategory::from_cer(0.0));
    }

    #[test]
    fn complete_mismatch_has_cer_one() {
        let m = ItemMetrics::calculate("abc", "xyz");
        assert_eq!(m.cer, 1.0);
        assert!(!m.exact_match);
    }

    #[test]
    fn percentiles_of_singleton_are_that_value() {
        let p = percentiles(&[0.4]);
        assert_eq!(p.p50, 0.4);
        assert_eq!(p.p95, 0.4);
    }

    #[test]
    fn confusion_pairs_finds_single_substitution() {
        let pairs = confusion_pairs("hello", "hxllo");
        assert_eq!(pairs, vec![ConfusionPair { expected: 'e', got: 'x' }]);
    }
}
