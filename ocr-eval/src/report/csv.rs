use crate::evaluator::Report;
use std::path::Path;

fn to_io_error(e: csv::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e)
}

pub fn write_results(report: &Report, out_dir: &Path) -> std::io::Result<()> {
    let path = out_dir.join(format!("{}_results.csv", report.engine_name));
    let mut writer = csv::Writer::from_path(path).map_err(to_io_error)?;
    writer
        .write_record([
            "image_id",
            "ground_truth",
            "predicted_text",
            "confidence",
            "processing_time_ms",
            "exact_match",
            "cer",
            "wer",
            "similarity",
            "error_category",
        ])
        .map_err(to_io_error)?;
    for record in &report.records {
        writer
            .write_record([
                record.image_id.as_str(),
                record.ground_truth.as_str(),
                record.predicted_text.as_str(),
                &record.confidence.to_string(),
                &record.processing_time_ms.to_string(),
                &record.exact_match.to_string(),
                &record.cer.to_string(),
                &record.wer.to_string(),
                &record.similarity.to_string(),
                &format!("{:?}", record.error_category).to_lowercase(),
            ])
            .map_err(to_io_error)?;
    }
    writer.flush()
}
