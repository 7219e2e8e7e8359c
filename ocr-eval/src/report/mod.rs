pub mod csv;
pub mod html;
pub mod json;
pub mod markdown;
pub mod plots;

use crate::evaluator::Report;
use std::path::Path;

/// Writes every artifact named in the evaluation report layout under
/// `out_dir`: `<engine>_results.json`, `<engine>_results.csv`,
/// `statistics.json`, `report.html`, `report.md`, and (unless
/// `no_visualizations`) the eight named plots.
pub fn write_all(report: &Report, out_dir: &Path, no_visualizations: bool) -> std::io::Result<()> {
    std::fs::create_dir_all(out_dir)?;
    json::write_results(report, out_dir)?;
    json::write_statistics(report, out_dir)?;
    csv::write_results(report, out_dir)?;
    markdown::write_summary(report, out_dir)?;

    let plot_paths = if no_visualizations {
        Vec::new()
    } else {
        plots::render_all(report, out_dir).unwrap_or_else(|e| {
            log::warn!("plot rendering failed, continuing without plots: {e}");
            Vec::new()
        })
    };
    html::write_report(report, out_dir, &plot_paths)?;
    Ok(())
}
