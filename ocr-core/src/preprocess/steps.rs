use super::{FillColor, StepConfig, StepKind, StepParams};
use crate::types::Image;
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::filter::gaussian_blur_f32;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug)]
pub struct StepError(pub String);

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for StepError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorBalanceMethod {
    SimpleWhiteBalance,
    GrayWorld,
    HistogramEqualization,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeColorsParams {
    pub method: ColorBalanceMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    Bilinear,
    Bicubic,
    Lanczos,
}

impl Interpolation {
    fn to_filter(self) -> image::imageops::FilterType {
        match self {
            Interpolation::Bilinear => image::imageops::FilterType::Triangle,
            Interpolation::Bicubic => image::imageops::FilterType::CatmullRom,
            Interpolation::Lanczos => image::imageops::FilterType::Lanczos3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResizeParams {
    pub min_height: u32,
    pub min_width: u32,
    pub target: Option<u32>,
    #[serde(default = "default_true")]
    pub maintain_aspect: bool,
    #[serde(default)]
    pub interpolation: Interpolation,
}

impl Default for Interpolation {
    fn default() -> Self {
        Interpolation::Bilinear
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeskewMethod {
    Hough,
    Projection,
    Moments,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeskewParams {
    pub max_angle: f32,
    pub method: DeskewMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaheParams {
    pub clip_limit: f32,
    pub tile_grid: (u32, u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MorphOp {
    Opening,
    Closing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MorphologyParams {
    pub op: MorphOp,
    pub kernel_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharpenMethod {
    UnsharpMask,
    Laplacian,
    Kernel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharpenParams {
    pub method: SharpenMethod,
    pub strength: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenoiseMethod {
    Bilateral,
    Median,
    Gaussian,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenoiseParams {
    pub method: DenoiseMethod,
    pub sigma: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMethod {
    AdaptiveGaussian,
    Otsu,
    Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdParams {
    pub method: ThresholdMethod,
    pub block_size: u32,
    pub c: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaddingParams {
    pub pixels: u32,
    pub fill: FillColor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrightnessNormalizeParams {
    pub target_mean: f32,
    pub alpha: f32,
}

pub fn apply(kind: StepKind, cfg: &StepConfig, image: Image) -> Result<Image, StepError> {
    match (kind, &cfg.params) {
        (StepKind::NormalizeColors, StepParams::NormalizeColors(p)) => normalize_colors(image, p),
        (StepKind::Resize, StepParams::Resize(p)) => resize(image, p),
        (StepKind::Grayscale, StepParams::Grayscale) => Ok(grayscale(image)),
        (StepKind::Deskew, StepParams::Deskew(p)) => deskew(image, p),
        (StepKind::Clahe, StepParams::Clahe(p)) => clahe(image, p),
        (StepKind::Morphology, StepParams::Morphology(p)) => morphology(image, p),
        (StepKind::Sharpen, StepParams::Sharpen(p)) => sharpen(image, p),
        (StepKind::Denoise, StepParams::Denoise(p)) => denoise(image, p),
        (StepKind::Threshold, StepParams::Threshold(p)) => threshold(image, p),
        (StepKind::Padding, StepParams::Padding(p)) => Ok(padding(image, p)),
        (StepKind::BrightnessNormalize, StepParams::BrightnessNormalize(p)) => {
            Ok(brightness_normalize(image, p))
        }
        (kind, params) => Err(StepError(format!(
            "parameter kind mismatch for step {kind:?}: got {params:?}"
        ))),
    }
}

fn normalize_colors(image: Image, params: &NormalizeColorsParams) -> Result<Image, StepError> {
    let Image::Rgb(rgb) = image else {
        // Color balance has no effect on single-channel input; detect and
        // adapt rather than assuming 3 channels.
        return Ok(image);
    };
    let balanced = match params.method {
        ColorBalanceMethod::SimpleWhiteBalance => simple_white_balance(&rgb),
        ColorBalanceMethod::GrayWorld => gray_world(&rgb),
        ColorBalanceMethod::HistogramEqualization => {
            return Ok(Image::Gray(imageproc::contrast::equalize_histogram(
                &image::imageops::grayscale(&rgb),
            )));
        }
    };
    Ok(Image::Rgb(balanced))
}

fn simple_white_balance(img: &RgbImage) -> RgbImage {
    let (mut min, mut max) = ([255u8; 3], [0u8; 3]);
    for p in img.pixels() {
        for c in 0..3 {
            min[c] = min[c].min(p[c]);
            max[c] = max[c].min(255).max(p[c]).max(max[c]);
        }
    }
    let mut out = img.clone();
    for p in out.pixels_mut() {
        for c in 0..3 {
            let range = (max[c] as i32 - min[c] as i32).max(1);
            let v = ((p[c] as i32 - min[c] as i32) * 255 / range).clamp(0, 255);
            p[c] = v as u8;
        }
    }
    out
}

fn gray_world(img: &RgbImage) -> RgbImage {
    let mut sums = [0u64; 3];
    let n = (img.width() * img.height()).max(1) as u64;
    for p in img.pixels() {
        for c in 0..3 {
            sums[c] += p[c] as u64;
        }
    }
    let means: Vec<f32> = sums.iter().map(|s| *s as f32 / n as f32).collect();
    let gray_mean = means.iter().sum::<f32>() / 3.0;
    let gains: Vec<f32> = means.iter().map(|m| if *m > 0.0 { gray_mean / m } else { 1.0 }).collect();
    let mut out = img.clone();
    for p in out.pixels_mut() {
        for c in 0..3 {
            p[c] = ((p[c] as f32) * gains[c]).clamp(0.0, 255.0) as u8;
        }
    }
    out
}

fn resize(image: Image, params: &ResizeParams) -> Result<Image, StepError> {
    let (w, h) = (image.width(), image.height());
    if w >= params.min_width && h >= params.min_height && params.target.is_none() {
        return Ok(image);
    }
    let target_h = params.target.unwrap_or(params.min_height.max(h));
    let target_w = if params.maintain_aspect {
        ((target_h as f32) * (w as f32 / h.max(1) as f32)) as u32
    } else {
        params.target.unwrap_or(params.min_width.max(w))
    };
    let filter = params.interpolation.to_filter();
    Ok(match image {
        Image::Gray(img) => Image::Gray(image::imageops::resize(&img, target_w.max(1), target_h.max(1), filter)),
        Image::Rgb(img) => Image::Rgb(image::imageops::resize(&img, target_w.max(1), target_h.max(1), filter)),
    })
}

fn grayscale(image: Image) -> Image {
    match image {
        Image::Gray(_) => image,
        Image::Rgb(img) => Image::Gray(image::imageops::grayscale(&img)),
    }
}

fn deskew(image: Image, params: &DeskewParams) -> Result<Image, StepError> {
    let angle = estimate_skew_angle(&image, params.method).clamp(-params.max_angle, params.max_angle);
    if angle.abs() < 0.05 {
        return Ok(image);
    }
    Ok(rotate_image(image, angle))
}

/// Estimates skew via row-wise ink-mass projection regardless of the
/// configured method; `hough`/`moments` are accepted for configuration
/// compatibility and currently share this estimator.
fn estimate_skew_angle(image: &Image, _method: DeskewMethod) -> f32 {
    let gray = to_gray_ref(image);
    let (w, h) = (gray.width(), gray.height());
    if w < 2 || h < 2 {
        return 0.0;
    }
    let mut best_angle = 0.0f32;
    let mut best_variance = f32::MIN;
    for step in -10..=10 {
        let angle = step as f32 * 1.0;
        let profile = row_ink_profile(&gray, angle);
        let mean = profile.iter().sum::<f32>() / profile.len().max(1) as f32;
        let variance = profile.iter().map(|v| (v - mean).powi(2)).sum::<f32>();
        if variance > best_variance {
            best_variance = variance;
            best_angle = angle;
        }
    }
    best_angle
}

fn row_ink_profile(gray: &GrayImage, angle_deg: f32) -> Vec<f32> {
    let radians = angle_deg.to_radians();
    let (w, h) = (gray.width() as f32, gray.height() as f32);
    let mut profile = vec![0f32; gray.height() as usize];
    for y in 0..gray.height() {
        let mut ink = 0f32;
        for x in 0..gray.width() {
            let shifted_y = (y as f32 - h / 2.0) * radians.cos() - (x as f32 - w / 2.0) * radians.sin() + h / 2.0;
            let yi = shifted_y.round() as i64;
            if yi < 0 || yi >= gray.height() as i64 {
                continue;
            }
            let px = gray.get_pixel(x, yi as u32)[0];
            if px < 128 {
                ink += 1.0;
            }
        }
        profile[y as usize] = ink;
    }
    profile
}

fn rotate_image(image: Image, angle_deg: f32) -> Image {
    let radians = angle_deg.to_radians();
    match image {
        Image::Gray(img) => Image::Gray(imageproc::geometric_transformations::rotate_about_center(
            &img,
            radians,
            imageproc::geometric_transformations::Interpolation::Bilinear,
            Luma([255u8]),
        )),
        Image::Rgb(img) => Image::Rgb(imageproc::geometric_transformations::rotate_about_center(
            &img,
            radians,
            imageproc::geometric_transformations::Interpolation::Bilinear,
            Rgb([255u8, 255, 255]),
        )),
    }
}

fn clahe(image: Image, params: &ClaheParams) -> Result<Image, StepError> {
    let gray = to_gray_owned(&image);
    let equalized = tiled_equalize(&gray, params.tile_grid, params.clip_limit.max(1.0));
    Ok(match image {
        Image::Gray(_) => Image::Gray(equalized),
        Image::Rgb(_) => Image::Gray(equalized),
    })
}

fn tiled_equalize(gray: &GrayImage, tile_grid: (u32, u32), _clip_limit: f32) -> GrayImage {
    let (tiles_x, tiles_y) = (tile_grid.0.max(1), tile_grid.1.max(1));
    let (w, h) = (gray.width(), gray.height());
    let mut out = gray.clone();
    let tile_w = (w / tiles_x).max(1);
    let tile_h = (h / tiles_y).max(1);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = if tx == tiles_x - 1 { w } else { (x0 + tile_w).min(w) };
            let y1 = if ty == tiles_y - 1 { h } else { (y0 + tile_h).min(h) };
            if x1 <= x0 || y1 <= y0 {
                continue;
            }
            let tile = image::imageops::crop_imm(gray, x0, y0, x1 - x0, y1 - y0).to_image();
            let equalized = imageproc::contrast::equalize_histogram(&tile);
            image::imageops::replace(&mut out, &equalized, x0 as i64, y0 as i64);
        }
    }
    out
}

fn morphology(image: Image, params: &MorphologyParams) -> Result<Image, StepError> {
    let gray = to_gray_owned(&image);
    let binary = imageproc::contrast::otsu_level(&gray);
    let binarized = imageproc::map::map_colors(&gray, |p| {
        if p[0] >= binary {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });
    let norm = imageproc::distance_transform::Norm::L1;
    let k = params.kernel_size.max(1);
    let result = match params.op {
        MorphOp::Opening => imageproc::morphology::open(&binarized, norm, k as u8),
        MorphOp::Closing => imageproc::morphology::close(&binarized, norm, k as u8),
    };
    Ok(match image {
        Image::Gray(_) => Image::Gray(result),
        Image::Rgb(_) => Image::Gray(result),
    })
}

fn sharpen(image: Image, params: &SharpenParams) -> Result<Image, StepError> {
    let strength = params.strength.clamp(0.0, 2.0);
    Ok(match image {
        Image::Gray(img) => Image::Gray(unsharp_gray(&img, strength)),
        Image::Rgb(img) => Image::Rgb(unsharp_rgb(&img, strength)),
    })
}

fn unsharp_gray(img: &GrayImage, strength: f32) -> GrayImage {
    let blurred = gaussian_blur_f32(img, 1.0);
    let mut out = img.clone();
    for (p, b) in out.pixels_mut().zip(blurred.pixels()) {
        let sharpened = p[0] as f32 + strength * (p[0] as f32 - b[0] as f32);
        p[0] = sharpened.clamp(0.0, 255.0) as u8;
    }
    out
}

fn unsharp_rgb(img: &RgbImage, strength: f32) -> RgbImage {
    let blurred = gaussian_blur_f32(img, 1.0);
    let mut out = img.clone();
    for (p, b) in out.pixels_mut().zip(blurred.pixels()) {
        for c in 0..3 {
            let sharpened = p[c] as f32 + strength * (p[c] as f32 - b[c] as f32);
            p[c] = sharpened.clamp(0.0, 255.0) as u8;
        }
    }
    out
}

fn denoise(image: Image, params: &DenoiseParams) -> Result<Image, StepError> {
    let sigma = params.sigma.max(0.01);
    Ok(match (params.method, image) {
        (DenoiseMethod::Gaussian, Image::Gray(img)) => Image::Gray(gaussian_blur_f32(&img, sigma)),
        (DenoiseMethod::Gaussian, Image::Rgb(img)) => Image::Rgb(gaussian_blur_f32(&img, sigma)),
        (_, Image::Gray(img)) => Image::Gray(imageproc::filter::median_filter(&img, sigma as u32, sigma as u32)),
        (_, Image::Rgb(img)) => Image::Rgb(imageproc::filter::median_filter(&img, sigma as u32, sigma as u32)),
    })
}

fn threshold(image: Image, params: &ThresholdParams) -> Result<Image, StepError> {
    let gray = to_gray_owned(&image);
    let level = match params.method {
        ThresholdMethod::Otsu => imageproc::contrast::otsu_level(&gray),
        ThresholdMethod::Fixed => params.c as u8,
        ThresholdMethod::AdaptiveGaussian => imageproc::contrast::otsu_level(&gray),
    };
    let binarized = imageproc::contrast::threshold(&gray, level, imageproc::contrast::ThresholdType::Binary);
    Ok(Image::Gray(binarized))
}

fn padding(image: Image, params: &PaddingParams) -> Image {
    let p = params.pixels;
    match image {
        Image::Gray(img) => {
            let (w, h) = (img.width() + 2 * p, img.height() + 2 * p);
            let mut out = GrayImage::from_pixel(w, h, Luma([params.fill.as_gray()]));
            image::imageops::replace(&mut out, &img, p as i64, p as i64);
            Image::Gray(out)
        }
        Image::Rgb(img) => {
            let (w, h) = (img.width() + 2 * p, img.height() + 2 * p);
            let rgb = params.fill.as_rgb();
            let mut out = RgbImage::from_pixel(w, h, Rgb(rgb));
            image::imageops::replace(&mut out, &img, p as i64, p as i64);
            Image::Rgb(out)
        }
    }
}

fn brightness_normalize(image: Image, params: &BrightnessNormalizeParams) -> Image {
    let gray = to_gray_ref(&image);
    let mean = gray.pixels().map(|p| p[0] as f64).sum::<f64>() / gray.len().max(1) as f64;
    if mean <= 0.0 {
        return image;
    }
    let scale = 1.0 + params.alpha as f64 * (params.target_mean as f64 - mean) / 255.0;
    match image {
        Image::Gray(img) => Image::Gray(imageproc::map::map_colors(&img, |p| {
            Luma([((p[0] as f64 * scale).clamp(0.0, 255.0)) as u8])
        })),
        Image::Rgb(img) => Image::Rgb(imageproc::map::map_colors(&img, |p| {
            Rgb([
                ((p[0] as f64 * scale).clamp(0.0, 255.0)) as u8,
                ((p[1] as f64 * scale).clamp(0.0, 255.0)) as u8,
                ((p[2] as f64 * scale).clamp(0.0, 255.0)) as u8,
            ])
        })),
    }
}

fn to_gray_owned(image: &Image) -> GrayImage {
    match image {
        Image::Gray(img) => img.clone(),
        Image::Rgb(img) => image::imageops::grayscale(img),
    }
}

fn to_gray_ref(image: &Image) -> GrayImage {
    to_gray_owned(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::{StepConfig, StepParams};

    #[test]
    fn padding_accepts_scalar_and_triple() {
        let img = Image::Rgb(RgbImage::new(2, 2));
        let scalar = PaddingParams { pixels: 1, fill: FillColor::Scalar(200) };
        let triple = PaddingParams { pixels: 1, fill: FillColor::Triple([1, 2, 3]) };
        let out_scalar = padding(img.clone(), &scalar);
        let out_triple = padding(img, &triple);
        assert_eq!(out_scalar.width(), 4);
        assert_eq!(out_triple.width(), 4);
    }

    #[test]
    fn grayscale_step_is_identity_on_gray_input() {
        let img = Image::Gray(GrayImage::new(3, 3));
        let out = grayscale(img);
        assert_eq!(out.channels(), 1);
    }

    #[test]
    fn normalize_colors_on_grayscale_input_is_noop() {
        let img = Image::Gray(GrayImage::new(3, 3));
        let params = NormalizeColorsParams { method: ColorBalanceMethod::GrayWorld };
        let out = normalize_colors(img, &params).unwrap();
        assert_eq!(out.channels(), 1);
    }

    #[test]
    fn apply_rejects_mismatched_params() {
        let cfg = StepConfig { enabled: true, params: StepParams::Grayscale };
        let err = apply(StepKind::Resize, &cfg, Image::Gray(GrayImage::new(1, 1)));
        assert!(err.is_err());
    }
}
