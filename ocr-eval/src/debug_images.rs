use ocr_core::preprocess::Pipeline;
use ocr_core::Image;
use std::path::Path;

/// Writes `debug_images/<image_id>/{00_original,01_preprocessed,01_<step>}.png`
/// plus a `result.txt` with ground truth vs predicted. Opt-in: the
/// evaluator only calls this when asked to keep debug artifacts, since it
/// doubles the I/O of a run.
pub fn write_debug_images(
    out_dir: &Path,
    image_id: &str,
    image: Image,
    pipeline: &Pipeline,
    ground_truth: &str,
    predicted: &str,
) -> std::io::Result<()> {
    let dir = out_dir.join("debug_images").join(image_id);
    std::fs::create_dir_all(&dir)?;

    let steps = pipeline.visualize_steps(image).unwrap_or_default();
    for (name, step_image) in &steps {
        save_png(&step_image.to_dynamic(), &dir.join(format!("{name}.png")))?;
    }

    let result = format!("ground_truth: {ground_truth}\npredicted: {predicted}\n");
    std::fs::write(dir.join("result.txt"), result)
}

fn save_png(image: &image::DynamicImage, path: &Path) -> std::io::Result<()> {
    image.save(path).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
}
