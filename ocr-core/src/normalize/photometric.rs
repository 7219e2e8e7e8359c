use crate::types::{Image, Variant};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::filter::gaussian_blur_f32;
use serde::{Deserialize, Serialize};

/// The closed, deterministic variant set `generate_variants` produces for
/// a given configuration.
pub const VARIANT_NAMES: [&str; 7] = [
    "baseline",
    "clahe",
    "clahe_strong",
    "threshold_otsu",
    "invert",
    "adaptive_threshold",
    "sharp",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenoiseMethod {
    Bilateral,
    Median,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotometricNormalizerConfig {
    #[serde(default)]
    pub denoise: DenoiseMethod,
    #[serde(default)]
    pub shadow_removal: bool,
    #[serde(default = "default_true")]
    pub clahe: bool,
    #[serde(default = "default_clahe_clip")]
    pub clahe_clip: f32,
    #[serde(default)]
    pub sharpen: bool,
    #[serde(default = "default_sharpen_strength")]
    pub sharpen_strength: f32,
    #[serde(default = "default_true")]
    pub brightness_normalize: bool,
}

impl Default for DenoiseMethod {
    fn default() -> Self {
        DenoiseMethod::None
    }
}

fn default_true() -> bool {
    true
}
fn default_clahe_clip() -> f32 {
    1.5
}
fn default_sharpen_strength() -> f32 {
    0.3
}

impl Default for PhotometricNormalizerConfig {
    fn default() -> Self {
        Self {
            denoise: DenoiseMethod::None,
            shadow_removal: false,
            clahe: true,
            clahe_clip: default_clahe_clip(),
            sharpen: false,
            sharpen_strength: default_sharpen_strength(),
            brightness_normalize: true,
        }
    }
}

pub struct PhotometricNormalizer {
    config: PhotometricNormalizerConfig,
}

impl PhotometricNormalizer {
    pub fn new(config: PhotometricNormalizerConfig) -> Self {
        Self { config }
    }

    /// denoise -> optional shadow removal -> optional CLAHE -> optional
    /// sharpen -> optional brightness normalization, in that order.
    pub fn normalize(&self, image: &Image) -> Image {
        let mut current = image.clone();
        current = self.denoise(&current);
        if self.config.shadow_removal {
            current = remove_shadow(&current);
        }
        if self.config.clahe {
            current = apply_clahe(&current, self.config.clahe_clip.clamp(1.0, 3.0));
        }
        if self.config.sharpen {
            current = unsharp(&current, self.config.sharpen_strength.clamp(0.0, 0.5));
        }
        if self.config.brightness_normalize {
            current = normalize_brightness(&current);
        }
        current
    }

    fn denoise(&self, image: &Image) -> Image {
        match self.config.denoise {
            DenoiseMethod::None => image.clone(),
            DenoiseMethod::Median => median(image, 3),
            DenoiseMethod::Bilateral => gaussian_stand_in(image, 1.2),
        }
    }

    /// `generate_variants(image) -> ordered mapping name->image`.
    pub fn generate_variants(&self, image: &Image) -> Vec<Variant> {
        let normalized = self.normalize(image);
        VARIANT_NAMES
            .iter()
            .map(|name| Variant {
                name: name.to_string(),
                image: render_variant(&normalized, name),
            })
            .collect()
    }
}

fn render_variant(image: &Image, name: &str) -> Image {
    match name {
        "baseline" => image.clone(),
        "clahe" => apply_clahe(image, 1.5),
        "clahe_strong" => apply_clahe(image, 3.0),
        "threshold_otsu" => otsu_threshold(image),
        "invert" => invert(image),
        "adaptive_threshold" => adaptive_threshold(image),
        "sharp" => unsharp(image, 0.4),
        _ => image.clone(),
    }
}

fn median(image: &Image, k: u32) -> Image {
    match image {
        Image::Gray(img) => Image::Gray(imageproc::filter::median_filter(img, k, k)),
        Image::Rgb(img) => Image::Rgb(imageproc::filter::median_filter(img, k, k)),
    }
}

fn gaussian_stand_in(image: &Image, sigma: f32) -> Image {
    match image {
        Image::Gray(img) => Image::Gray(gaussian_blur_f32(img, sigma)),
        Image::Rgb(img) => Image::Rgb(gaussian_blur_f32(img, sigma)),
    }
}

/// Subtracts a blurred background estimate, the way a shadow-removal
/// pass approximates illumination correction without a true background
/// model.
fn remove_shadow(image: &Image) -> Image {
    let gray = to_gray(image);
    let background = gaussian_blur_f32(&gray, 21.0 / 2.0);
    let mut out = gray.clone();
    for (p, b) in out.pixels_mut().zip(background.pixels()) {
        let corrected = p[0] as f32 - b[0] as f32 + 128.0;
        p[0] = corrected.clamp(0.0, 255.0) as u8;
    }
    Image::Gray(out)
}

fn apply_clahe(image: &Image, clip: f32) -> Image {
    let gray = to_gray(image);
    let tiles = (8u32, 8u32);
    let (w, h) = (gray.width(), gray.height());
    let mut out = gray.clone();
    let tile_w = (w / tiles.0).max(1);
    let tile_h = (h / tiles.1).max(1);
    for ty in 0..tiles.1 {
        for tx in 0..tiles.0 {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = if tx == tiles.0 - 1 { w } else { (x0 + tile_w).min(w) };
            let y1 = if ty == tiles.1 - 1 { h } else { (y0 + tile_h).min(h) };
            if x1 <= x0 || y1 <= y0 {
                continue;
            }
            let tile = image::imageops::crop_imm(&gray, x0, y0, x1 - x0, y1 - y0).to_image();
            let equalized = imageproc::contrast::equalize_histogram(&tile);
            let blended = blend(&tile, &equalized, clip / 3.0);
            image::imageops::replace(&mut out, &blended, x0 as i64, y0 as i64);
        }
    }
    Image::Gray(out)
}

fn blend(a: &GrayImage, b: &GrayImage, weight: f32) -> GrayImage {
    let weight = weight.clamp(0.0, 1.0);
    let mut out = a.clone();
    for (p, q) in out.pixels_mut().zip(b.pixels()) {
        let v = p[0] as f32 * (1.0 - weight) + q[0] as f32 * weight;
        p[0] = v.clamp(0.0, 255.0) as u8;
    }
    out
}

fn unsharp(image: &Image, strength: f32) -> Image {
    let gray = to_gray(image);
    let blurred = gaussian_blur_f32(&gray, 1.0);
    let mut out = gray.clone();
    for (p, b) in out.pixels_mut().zip(blurred.pixels()) {
        let v = p[0] as f32 + strength * (p[0] as f32 - b[0] as f32);
        p[0] = v.clamp(0.0, 255.0) as u8;
    }
    Image::Gray(out)
}

fn otsu_threshold(image: &Image) -> Image {
    let gray = to_gray(image);
    let level = imageproc::contrast::otsu_level(&gray);
    Image::Gray(imageproc::contrast::threshold(&gray, level, imageproc::contrast::ThresholdType::Binary))
}

fn adaptive_threshold(image: &Image) -> Image {
    let gray = to_gray(image);
    let background = gaussian_blur_f32(&gray, 7.5);
    let mut out = GrayImage::new(gray.width(), gray.height());
    for (x, y, p) in gray.enumerate_pixels() {
        let local = background.get_pixel(x, y)[0] as i32 - 10;
        out.put_pixel(x, y, Luma([if p[0] as i32 > local { 255u8 } else { 0u8 }]));
    }
    Image::Gray(out)
}

fn invert(image: &Image) -> Image {
    match image {
        Image::Gray(img) => {
            let mut out = img.clone();
            for p in out.pixels_mut() {
                p[0] = 255 - p[0];
            }
            Image::Gray(out)
        }
        Image::Rgb(img) => {
            let mut out = img.clone();
            for p in out.pixels_mut() {
                for c in 0..3 {
                    p[c] = 255 - p[c];
                }
            }
            Image::Rgb(out)
        }
    }
}

/// CLAHE must not NaN on uniform input: `otsu_level`/histogram ops are
/// well-defined on flat images, so this pass is purely arithmetic.
fn normalize_brightness(image: &Image) -> Image {
    let gray = to_gray(image);
    let mean = gray.pixels().map(|p| p[0] as f64).sum::<f64>() / gray.len().max(1) as f64;
    if mean <= 0.0 || mean >= 255.0 {
        return Image::Gray(gray);
    }
    let target = 160.0;
    let scale = target / mean;
    Image::Gray(imageproc::map::map_colors(&gray, |p| {
        Luma([(p[0] as f64 * scale).clamp(0.0, 255.0) as u8])
    }))
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
    fn generate_variants_produces_the_closed_set() {
        let normalizer = PhotometricNormalizer::new(PhotometricNormalizerConfig::default());
        let img = Image::Gray(GrayImage::from_pixel(20, 20, Luma([128])));
        let variants = normalizer.generate_variants(&img);
        assert_eq!(variants.len(), VARIANT_NAMES.len());
        let names: Vec<&str> = variants.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, VARIANT_NAMES.to_vec());
    }

    #[test]
    fn clahe_does_not_nan_on_uniform_black_or_white() {
        let normalizer = PhotometricNormalizer::new(PhotometricNormalizerConfig::default());
        let black = Image::Gray(GrayImage::from_pixel(16, 16, Luma([0])));
        let white = Image::Gray(GrayImage::from_pixel(16, 16, Luma([255])));
        let _ = normalizer.normalize(&black);
        let _ = normalizer.normalize(&white);
    }
}
