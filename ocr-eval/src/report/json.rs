use crate::evaluator::Report;
use std::path::Path;

pub fn write_results(report: &Report, out_dir: &Path) -> std::io::Result<()> {
    let path = out_dir.join(format!("{}_results.json", report.engine_name));
    let body = serde_json::to_string_pretty(&report.records)?;
    std::fs::write(path, body)
}

pub fn write_statistics(report: &Report, out_dir: &Path) -> std::io::Result<()> {
    let path = out_dir.join("statistics.json");
    let body = serde_json::to_string_pretty(report)?;
    std::fs::write(path, body)
}
