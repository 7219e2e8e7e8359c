use crate::evaluator::Report;
use plotters::prelude::*;
use std::path::{Path, PathBuf};

const PLOT_NAMES: [&str; 8] = [
    "overview",
    "error_distribution",
    "confidence_analysis",
    "length_analysis",
    "time_analysis",
    "character_confusion",
    "performance_summary",
    "error_examples",
];

/// Renders the fixed set of named plots into `out_dir`. Isolated behind
/// this module so a `no_visualizations` flag can skip it entirely without
/// touching the rest of the report pipeline.
pub fn render_all(report: &Report, out_dir: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut paths = Vec::with_capacity(PLOT_NAMES.len());
    paths.push(overview(report, out_dir)?);
    paths.push(error_distribution(report, out_dir)?);
    paths.push(confidence_analysis(report, out_dir)?);
    paths.push(length_analysis(report, out_dir)?);
    paths.push(time_analysis(report, out_dir)?);
    paths.push(character_confusion(report, out_dir)?);
    paths.push(performance_summary(report, out_dir)?);
    paths.push(error_examples(report, out_dir)?);
    Ok(paths)
}

fn plot_path(out_dir: &Path, name: &str) -> PathBuf {
    out_dir.join(format!("{name}.png"))
}

fn bar_chart(
    out_dir: &Path,
    name: &str,
    title: &str,
    bars: &[(String, f64)],
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let path = plot_path(out_dir, name);
    let root = BitMapBackend::new(&path, (640, 480)).into_drawing_area();
    root.fill(&WHITE)?;

    let max_value = bars.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max).max(1e-6);
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d((0..bars.len().max(1)).into_segmented(), 0.0..(max_value * 1.15))?;

    chart.configure_mesh().x_labels(bars.len().max(1)).disable_x_mesh().draw()?;

    chart.draw_series(bars.iter().enumerate().map(|(i, (_, value))| {
        let x0 = SegmentValue::Exact(i);
        let x1 = SegmentValue::Exact(i + 1);
        Rectangle::new([(x0, 0.0), (x1, *value)], BLUE.filled())
    }))?;

    root.present()?;
    Ok(path)
}

fn overview(report: &Report, out_dir: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    bar_chart(
        out_dir,
        "overview",
        &format!("{} overview", report.engine_name),
        &[
            ("exact_match_rate".to_string(), report.exact_match_rate),
            ("mean_cer".to_string(), report.mean_cer),
            ("mean_wer".to_string(), report.mean_wer),
        ],
    )
}

fn error_distribution(report: &Report, out_dir: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut bars: Vec<(String, f64)> =
        report.error_category_counts.iter().map(|(k, v)| (k.clone(), *v as f64)).collect();
    bars.sort_by(|a, b| a.0.cmp(&b.0));
    bar_chart(out_dir, "error_distribution", "Error category counts", &bars)
}

fn confidence_analysis(report: &Report, out_dir: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut bars: Vec<(String, f64)> = report.confidence_buckets.iter().map(|(k, v)| (k.clone(), *v)).collect();
    bars.sort_by(|a, b| a.0.cmp(&b.0));
    bar_chart(out_dir, "confidence_analysis", "Mean CER by confidence bucket", &bars)
}

fn length_analysis(report: &Report, out_dir: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut bars: Vec<(String, f64)> = report.length_buckets.iter().map(|(k, v)| (k.clone(), *v)).collect();
    bars.sort_by(|a, b| a.0.cmp(&b.0));
    bar_chart(out_dir, "length_analysis", "Mean CER by ground-truth length bucket", &bars)
}

fn time_analysis(report: &Report, out_dir: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let p = report.processing_time_percentiles;
    bar_chart(
        out_dir,
        "time_analysis",
        "Processing time percentiles (ms)",
        &[
            ("p25".to_string(), p.p25),
            ("p50".to_string(), p.p50),
            ("p75".to_string(), p.p75),
            ("p90".to_string(), p.p90),
            ("p95".to_string(), p.p95),
        ],
    )
}

fn character_confusion(report: &Report, out_dir: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let bars: Vec<(String, f64)> =
        report.top_confusion_pairs.iter().map(|(pair, count)| (pair.clone(), *count as f64)).collect();
    bar_chart(out_dir, "character_confusion", "Top character confusion pairs", &bars)
}

fn performance_summary(report: &Report, out_dir: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let cer = report.cer_percentiles;
    let wer = report.wer_percentiles;
    bar_chart(
        out_dir,
        "performance_summary",
        "CER/WER p50 vs p95",
        &[
            ("cer_p50".to_string(), cer.p50),
            ("cer_p95".to_string(), cer.p95),
            ("wer_p50".to_string(), wer.p50),
            ("wer_p95".to_string(), wer.p95),
        ],
    )
}

fn error_examples(report: &Report, out_dir: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut worst: Vec<&ocr_core::types::EvaluationRecord> = report.records.iter().collect();
    worst.sort_by(|a, b| b.cer.total_cmp(&a.cer));
    let bars: Vec<(String, f64)> =
        worst.into_iter().take(10).map(|r| (r.image_id.clone(), r.cer)).collect();
    bar_chart(out_dir, "error_examples", "Worst 10 items by CER", &bars)
}
