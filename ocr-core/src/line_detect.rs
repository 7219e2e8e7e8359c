use crate::types::{BBox, Image};
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// The closed set of line-splitting strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Projection,
    Clustering,
    Morphological,
    Hybrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineDetectorConfig {
    pub method: Method,
    #[serde(default = "default_min_line_height")]
    pub min_line_height: u32,
    #[serde(default = "default_min_component_width")]
    pub min_component_width: u32,
    #[serde(default = "default_min_char_count")]
    pub min_char_count: u32,
    #[serde(default = "default_morphology_kernel_width")]
    pub morphology_kernel_width: u32,
    #[serde(default)]
    pub rotation_correction: bool,
    #[serde(default = "default_max_rotation_angle")]
    pub max_rotation_angle: f32,
}

fn default_min_line_height() -> u32 {
    8
}
fn default_min_component_width() -> u32 {
    4
}
fn default_min_char_count() -> u32 {
    1
}
fn default_morphology_kernel_width() -> u32 {
    15
}
fn default_max_rotation_angle() -> f32 {
    5.0
}

impl Default for LineDetectorConfig {
    fn default() -> Self {
        Self {
            method: Method::Hybrid,
            min_line_height: default_min_line_height(),
            min_component_width: default_min_component_width(),
            min_char_count: default_min_char_count(),
            morphology_kernel_width: default_morphology_kernel_width(),
            rotation_correction: false,
            max_rotation_angle: default_max_rotation_angle(),
        }
    }
}

pub struct LineDetector {
    config: LineDetectorConfig,
}

impl LineDetector {
    pub fn new(config: LineDetectorConfig) -> Self {
        Self { config }
    }

    /// `detect_lines(image) -> list of bbox`. Never returns an empty
    /// list: when nothing is found, falls back to one box covering the
    /// whole image.
    pub fn detect_lines(&self, image: &Image) -> Vec<BBox> {
        if image.is_empty() {
            return vec![whole_image_box(image)];
        }
        let gray = to_gray(image);
        let rotated_gray;
        let working = if self.config.rotation_correction {
            let angle = estimate_global_skew(&gray);
            if angle.abs() <= self.config.max_rotation_angle {
                rotated_gray = rotate(&gray, angle);
                &rotated_gray
            } else {
                &gray
            }
        } else {
            &gray
        };

        let mut boxes = match self.config.method {
            Method::Projection => self.projection_boxes(working),
            Method::Clustering => self.clustering_boxes(working),
            Method::Morphological => self.morphological_boxes(working),
            Method::Hybrid => self.hybrid_boxes(working),
        };

        boxes.retain(|b| self.passes_noise_filter(working, b));
        if boxes.is_empty() {
            return vec![whole_image_box(image)];
        }
        boxes.sort_by(|a, b| a.y_center().partial_cmp(&b.y_center()).unwrap());
        boxes
    }

    pub fn split_lines(&self, image: &Image) -> Vec<Image> {
        let boxes = self.detect_lines(image);
        boxes.iter().map(|b| crop(image, b)).collect()
    }

    pub fn visualize_lines(&self, image: &Image, bboxes: &[BBox]) -> Image {
        let mut rgb = image.to_dynamic().to_rgb8();
        for b in bboxes {
            let rect = imageproc::rect::Rect::at(b.x1 as i32, b.y1 as i32)
                .of_size(b.width().max(1.0) as u32, b.height().max(1.0) as u32);
            imageproc::drawing::draw_hollow_rect_mut(&mut rgb, rect, image::Rgb([255, 0, 0]));
        }
        Image::Rgb(rgb)
    }

    fn passes_noise_filter(&self, gray: &GrayImage, b: &BBox) -> bool {
        if b.height() < self.config.min_line_height as f32 {
            return false;
        }
        count_components(gray, b) >= self.config.min_char_count
    }

    fn projection_boxes(&self, gray: &GrayImage) -> Vec<BBox> {
        let h = gray.height();
        let w = gray.width();
        if h == 0 || w == 0 {
            return vec![];
        }
        let mut row_ink: Vec<f32> = (0..h)
            .map(|y| {
                (0..w)
                    .filter(|&x| gray.get_pixel(x, y)[0] < 128)
                    .count() as f32
            })
            .collect();
        let kernel = (self.config.min_line_height / 3).max(3) as usize;
        row_ink = smooth(&row_ink, kernel);
        let mean = row_ink.iter().sum::<f32>() / row_ink.len().max(1) as f32;
        let thresh = 0.3 * mean;

        let mut boxes = Vec::new();
        let mut run_start: Option<u32> = None;
        for y in 0..h {
            let above = row_ink[y as usize] > thresh;
            match (above, run_start) {
                (true, None) => run_start = Some(y),
                (false, Some(start)) => {
                    boxes.push(BBox { x1: 0.0, y1: start as f32, x2: w as f32, y2: y as f32 });
                    run_start = None;
                }
                _ => {}
            }
        }
        if let Some(start) = run_start {
            boxes.push(BBox { x1: 0.0, y1: start as f32, x2: w as f32, y2: h as f32 });
        }
        boxes
    }

    fn clustering_boxes(&self, gray: &GrayImage) -> Vec<BBox> {
        let centroids = connected_component_centroids(gray);
        if centroids.is_empty() {
            return vec![];
        }
        let mut sorted = centroids.clone();
        sorted.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        let eps = self.config.min_line_height as f32;
        let mut clusters: Vec<Vec<(f32, f32, f32, f32)>> = Vec::new();
        for c in sorted {
            if let Some(last) = clusters.last_mut() {
                if (c.1 - last.last().unwrap().1).abs() <= eps {
                    last.push(c);
                    continue;
                }
            }
            clusters.push(vec![c]);
        }
        clusters
            .into_iter()
            .map(|cluster| {
                let x1 = cluster.iter().map(|c| c.0).fold(f32::MAX, f32::min);
                let y1 = cluster.iter().map(|c| c.1).fold(f32::MAX, f32::min);
                let x2 = cluster.iter().map(|c| c.2).fold(f32::MIN, f32::max);
                let y2 = cluster.iter().map(|c| c.3).fold(f32::MIN, f32::max);
                BBox { x1, y1, x2, y2 }
            })
            .collect()
    }

    fn morphological_boxes(&self, gray: &GrayImage) -> Vec<BBox> {
        let level = imageproc::contrast::otsu_level(gray);
        let binary = imageproc::map::map_colors(gray, |p| {
            if p[0] < level { image::Luma([255u8]) } else { image::Luma([0u8]) }
        });
        let dilated = imageproc::morphology::dilate(
            &binary,
            imageproc::distance_transform::Norm::LInf,
            (self.config.morphology_kernel_width / 2).max(1) as u8,
        );
        let contours = imageproc::contours::find_contours::<u32>(&dilated);
        contours
            .into_iter()
            .filter_map(|c| {
                if c.points.is_empty() {
                    return None;
                }
                let x1 = c.points.iter().map(|p| p.x).min().unwrap() as f32;
                let y1 = c.points.iter().map(|p| p.y).min().unwrap() as f32;
                let x2 = c.points.iter().map(|p| p.x).max().unwrap() as f32;
                let y2 = c.points.iter().map(|p| p.y).max().unwrap() as f32;
                let b = BBox { x1, y1, x2, y2 };
                if b.height() >= self.config.min_line_height as f32
                    && b.width() >= self.config.min_component_width as f32
                {
                    Some(b)
                } else {
                    None
                }
            })
            .collect()
    }

    /// Runs all three methods and keeps the one yielding the most boxes
    /// with heights inside `[min_line_height, 3 * median(heights)]`; ties
    /// broken by largest total covered area.
    fn hybrid_boxes(&self, gray: &GrayImage) -> Vec<BBox> {
        let candidates = [
            self.projection_boxes(gray),
            self.clustering_boxes(gray),
            self.morphological_boxes(gray),
        ];
        candidates
            .into_iter()
            .max_by(|a, b| score_boxes(a, self.config.min_line_height).total_cmp(&score_boxes(b, self.config.min_line_height)))
            .unwrap_or_default()
    }
}

fn score_boxes(boxes: &[BBox], min_line_height: u32) -> f64 {
    if boxes.is_empty() {
        return 0.0;
    }
    let mut heights: Vec<f32> = boxes.iter().map(|b| b.height()).collect();
    heights.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median = heights[heights.len() / 2];
    let upper = 3.0 * median;
    let count = boxes
        .iter()
        .filter(|b| b.height() >= min_line_height as f32 && b.height() <= upper)
        .count();
    let area: f64 = boxes.iter().map(|b| (b.width() * b.height()) as f64).sum();
    count as f64 * 1_000_000.0 + area
}

fn smooth(values: &[f32], kernel: usize) -> Vec<f32> {
    if kernel <= 1 {
        return values.to_vec();
    }
    let half = kernel / 2;
    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half).min(values.len() - 1);
            let slice = &values[lo..=hi];
            slice.iter().sum::<f32>() / slice.len() as f32
        })
        .collect()
}

fn count_components(gray: &GrayImage, b: &BBox) -> u32 {
    let x0 = b.x1.max(0.0) as u32;
    let y0 = b.y1.max(0.0) as u32;
    let x1 = (b.x2 as u32).min(gray.width());
    let y1 = (b.y2 as u32).min(gray.height());
    if x1 <= x0 || y1 <= y0 {
        return 0;
    }
    let crop = image::imageops::crop_imm(gray, x0, y0, x1 - x0, y1 - y0).to_image();
    connected_component_centroids(&crop).len() as u32
}

fn connected_component_centroids(gray: &GrayImage) -> Vec<(f32, f32, f32, f32)> {
    let level = imageproc::contrast::otsu_level(gray);
    let binary = imageproc::map::map_colors(gray, |p| {
        if p[0] < level { image::Luma([255u8]) } else { image::Luma([0u8]) }
    });
    let labels = imageproc::region_labelling::connected_components(
        &binary,
        imageproc::region_labelling::Connectivity::Eight,
        image::Luma([0u8]),
    );
    let mut bounds: std::collections::HashMap<u32, (f32, f32, f32, f32)> = std::collections::HashMap::new();
    for y in 0..labels.height() {
        for x in 0..labels.width() {
            let label = labels.get_pixel(x, y)[0];
            if label == 0 {
                continue;
            }
            let entry = bounds.entry(label).or_insert((x as f32, y as f32, x as f32, y as f32));
            entry.0 = entry.0.min(x as f32);
            entry.1 = entry.1.min(y as f32);
            entry.2 = entry.2.max(x as f32);
            entry.3 = entry.3.max(y as f32);
        }
    }
    bounds.into_values().collect()
}

fn estimate_global_skew(gray: &GrayImage) -> f32 {
    let mut best_angle = 0.0;
    let mut best_score = f32::MIN;
    for step in -20..=20 {
        let angle = step as f32;
        let rotated = rotate(gray, angle);
        let ink: f32 = (0..rotated.height())
            .map(|y| {
                (0..rotated.width())
                    .filter(|&x| rotated.get_pixel(x, y)[0] < 128)
                    .count() as f32
            })
            .sum();
        let variance_proxy = ink;
        if variance_proxy > best_score {
            best_score = variance_proxy;
            best_angle = angle;
        }
    }
    best_angle
}

fn rotate(gray: &GrayImage, angle_deg: f32) -> GrayImage {
    imageproc::geometric_transformations::rotate_about_center(
        gray,
        angle_deg.to_radians(),
        imageproc::geometric_transformations::Interpolation::Bilinear,
        image::Luma([255u8]),
    )
}

fn whole_image_box(image: &Image) -> BBox {
    BBox {
        x1: 0.0,
        y1: 0.0,
        x2: image.width() as f32,
        y2: image.height() as f32,
    }
}

fn to_gray(image: &Image) -> GrayImage {
    match image {
        Image::Gray(img) => img.clone(),
        Image::Rgb(img) => image::imageops::grayscale(img),
    }
}

fn crop(image: &Image, b: &BBox) -> Image {
    let x0 = b.x1.max(0.0) as u32;
    let y0 = b.y1.max(0.0) as u32;
    let x1 = (b.x2 as u32).min(image.width()).max(x0 + 1);
    let y1 = (b.y2 as u32).min(image.height()).max(y0 + 1);
    match image {
        Image::Gray(img) => Image::Gray(image::imageops::crop_imm(img, x0, y0, x1 - x0, y1 - y0).to_image()),
        Image::Rgb(img) => Image::Rgb(image::imageops::crop_imm(img, x0, y0, x1 - x0, y1 - y0).to_image()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_image_falls_back_to_whole_image_box() {
        let detector = LineDetector::new(LineDetectorConfig::default());
        let img = Image::Gray(GrayImage::new(0, 0));
        let boxes = detector.detect_lines(&img);
        assert_eq!(boxes.len(), 1);
    }

    #[test]
    fn blank_image_falls_back_to_whole_image_box() {
        let detector = LineDetector::new(LineDetectorConfig { method: Method::Projection, ..Default::default() });
        let img = Image::Gray(GrayImage::from_pixel(40, 40, image::Luma([255u8])));
        let boxes = detector.detect_lines(&img);
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].width(), 40.0);
        assert_eq!(boxes[0].height(), 40.0);
    }

    #[test]
    fn output_is_ordered_top_to_bottom_and_sorting_twice_is_noop() {
        let mut boxes = vec![
            BBox { x1: 0.0, y1: 30.0, x2: 10.0, y2: 40.0 },
            BBox { x1: 0.0, y1: 0.0, x2: 10.0, y2: 10.0 },
        ];
        boxes.sort_by(|a, b| a.y_center().partial_cmp(&b.y_center()).unwrap());
        let once = boxes.clone();
        boxes.sort_by(|a, b| a.y_center().partial_cmp(&b.y_center()).unwrap());
        assert_eq!(once.len(), boxes.len());
        assert_eq!(once[0].y1, boxes[0].y1);
    }

    #[test]
    fn wide_image_returns_single_box() {
        let detector = LineDetector::new(LineDetectorConfig { method: Method::Projection, min_line_height: 2, ..Default::default() });
        let img = Image::Gray(GrayImage::from_pixel(500, 10, image::Luma([255u8])));
        let boxes = detector.detect_lines(&img);
        assert!(boxes.len() >= 1);
    }
}
