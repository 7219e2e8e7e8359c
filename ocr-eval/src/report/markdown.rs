use crate::evaluator::Report;
use std::fmt::Write as _;
use std::path::Path;

pub fn write_summary(report: &Report, out_dir: &Path) -> std::io::Result<()> {
    let mut body = String::new();
    let _ = writeln!(body, "# Evaluation summary: {}", report.engine_name);
    let _ = writeln!(body, "\npreprocessing profile: `{}`\n", report.preprocessing_profile);
    let _ = writeln!(body, "| metric | value |");
    let _ = writeln!(body, "|---|---|");
    let _ = writeln!(body, "| items | {} |", report.records.len());
    let _ = writeln!(body, "| exact match rate | {:.4} |", report.exact_match_rate);
    let _ = writeln!(body, "| mean CER | {:.4} |", report.mean_cer);
    let _ = writeln!(body, "| mean WER | {:.4} |", report.mean_wer);
    let _ = writeln!(body, "| CER p50 | {:.4} |", report.cer_percentiles.p50);
    let _ = writeln!(body, "| CER p95 | {:.4} |", report.cer_percentiles.p95);

    let _ = writeln!(body, "\n## Error categories\n");
    let _ = writeln!(body, "| category | count |");
    let _ = writeln!(body, "|---|---|");
    for (category, count) in &report.error_category_counts {
        let _ = writeln!(body, "| {category} | {count} |");
    }

    let _ = writeln!(body, "\n## Top character confusions\n");
    let _ = writeln!(body, "| pair | count |");
    let _ = writeln!(body, "|---|---|");
    for (pair, count) in &report.top_confusion_pairs {
        let _ = writeln!(body, "| {pair} | {count} |");
    }

    std::fs::write(out_dir.join("report.md"), body)
}
