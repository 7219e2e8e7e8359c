use crate::evaluator::Report;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub fn write_report(report: &Report, out_dir: &Path, plot_paths: &[PathBuf]) -> std::io::Result<()> {
    let mut body = String::new();
    let _ = write!(
        body,
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{} report</title></head><body>",
        report.engine_name
    );
    let _ = write!(body, "<h1>{} — {}</h1>", report.engine_name, report.preprocessing_profile);
    let _ = write!(
        body,
        "<table border=\"1\"><tr><th>items</th><th>exact match</th><th>mean CER</th><th>mean WER</th></tr>"
    );
    let _ = write!(
        body,
        "<tr><td>{}</td><td>{:.4}</td><td>{:.4}</td><td>{:.4}</td></tr></table>",
        report.records.len(),
        report.exact_match_rate,
        report.mean_cer,
        report.mean_wer
    );

    for path in plot_paths {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            let _ = write!(body, "<h2>{name}</h2><img src=\"{name}\" alt=\"{name}\">");
        }
    }

    body.push_str("</body></html>");
    std::fs::write(out_dir.join("report.html"), body)
}
