mod steps;

use crate::error::InputError;
use crate::types::Image;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;

pub use steps::StepError;

/// The closed set of preprocessing steps, always applied in this order
/// when individually enabled. A disabled step is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    NormalizeColors,
    Resize,
    Grayscale,
    Deskew,
    Clahe,
    Morphology,
    Sharpen,
    Denoise,
    Threshold,
    Padding,
    BrightnessNormalize,
}

/// Fixed application order. `steps::run_step` dispatches on `StepKind`;
/// any step not present in a profile's `steps` map is treated as disabled.
pub const STEP_ORDER: [StepKind; 11] = [
    StepKind::NormalizeColors,
    StepKind::Resize,
    StepKind::Grayscale,
    StepKind::Deskew,
    StepKind::Clahe,
    StepKind::Morphology,
    StepKind::Sharpen,
    StepKind::Denoise,
    StepKind::Threshold,
    StepKind::Padding,
    StepKind::BrightnessNormalize,
];

/// A fill value accepted as either a scalar or a 3-tuple; the known bug
/// class from the original system was assuming one shape for both.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FillColor {
    Scalar(u8),
    Triple([u8; 3]),
}

impl FillColor {
    pub fn as_rgb(&self) -> [u8; 3] {
        match self {
            FillColor::Scalar(v) => [*v, *v, *v],
            FillColor::Triple(t) => *t,
        }
    }

    pub fn as_gray(&self) -> u8 {
        match self {
            FillColor::Scalar(v) => *v,
            FillColor::Triple(t) => ((t[0] as u32 + t[1] as u32 + t[2] as u32) / 3) as u8,
        }
    }
}

pub use steps::{
    BrightnessNormalizeParams, ClaheParams, DeskewParams, MorphologyParams, NormalizeColorsParams,
    PaddingParams, ResizeParams, SharpenParams, ThresholdParams, DenoiseParams,
};

/// Per-step enabled flag plus step-specific parameters. Any field absent
/// from YAML falls back to its `#[serde(default)]` value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    pub enabled: bool,
    #[serde(flatten)]
    pub params: StepParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepParams {
    NormalizeColors(NormalizeColorsParams),
    Resize(ResizeParams),
    Grayscale,
    Deskew(DeskewParams),
    Clahe(ClaheParams),
    Morphology(MorphologyParams),
    Sharpen(SharpenParams),
    Denoise(DenoiseParams),
    Threshold(ThresholdParams),
    Padding(PaddingParams),
    BrightnessNormalize(BrightnessNormalizeParams),
}

impl StepParams {
    fn kind(&self) -> StepKind {
        match self {
            StepParams::NormalizeColors(_) => StepKind::NormalizeColors,
            StepParams::Resize(_) => StepKind::Resize,
            StepParams::Grayscale => StepKind::Grayscale,
            StepParams::Deskew(_) => StepKind::Deskew,
            StepParams::Clahe(_) => StepKind::Clahe,
            StepParams::Morphology(_) => StepKind::Morphology,
            StepParams::Sharpen(_) => StepKind::Sharpen,
            StepParams::Denoise(_) => StepKind::Denoise,
            StepParams::Threshold(_) => StepKind::Threshold,
            StepParams::Padding(_) => StepKind::Padding,
            StepParams::BrightnessNormalize(_) => StepKind::BrightnessNormalize,
        }
    }
}

/// An ordered list of named steps. Declared in configuration, instantiated
/// once into a `Pipeline`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub steps: Vec<StepConfig>,
    /// If true, a step failure aborts `process` instead of being skipped.
    #[serde(default)]
    pub strict: bool,
}

impl Profile {
    fn enabled_kinds(&self) -> std::collections::HashMap<StepKind, &StepConfig> {
        self.steps
            .iter()
            .filter(|s| s.enabled)
            .map(|s| (s.params.kind(), s))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct StepTiming {
    pub name: &'static str,
    pub time_ms: f64,
}

/// Applies an ordered, configurable stack of transforms to a single crop.
pub struct Pipeline {
    profile: Profile,
}

impl Pipeline {
    pub fn new(profile: Profile) -> Self {
        Self { profile }
    }

    /// `process(image) -> image`. Step order is fixed regardless of the
    /// order steps appear in configuration; output of step *i* is input
    /// of step *i+1*.
    pub fn process(&self, image: Image) -> Result<Image, InputError> {
        let (img, _) = self.run(image)?;
        Ok(img)
    }

    /// Returns intermediate results for debugging, keyed by step name.
    pub fn visualize_steps(&self, image: Image) -> Result<Vec<(String, Image)>, InputError> {
        let enabled = self.profile.enabled_kinds();
        let mut current = image;
        let mut out = Vec::new();
        out.push(("00_original".to_string(), current.clone()));
        for kind in STEP_ORDER {
            if let Some(cfg) = enabled.get(&kind) {
                current = self.apply_one(kind, cfg, current);
                out.push((format!("01_{:?}", kind).to_lowercase(), current.clone()));
            }
        }
        Ok(out)
    }

    fn run(&self, image: Image) -> Result<(Image, Vec<StepTiming>), InputError> {
        let enabled = self.profile.enabled_kinds();
        let mut current = image;
        let mut timings = Vec::new();

        for kind in STEP_ORDER {
            let Some(cfg) = enabled.get(&kind) else {
                continue;
            };
            let start = Instant::now();
            let before = current.clone();
            match steps::apply(kind, cfg, current) {
                Ok(next) => {
                    current = next;
                }
                Err(e) => {
                    if self.profile.strict {
                        return Err(InputError::UnreadableFile(format!(
                            "step {:?} failed: {e}",
                            kind
                        )));
                    }
                    warn!("preprocessing step {:?} failed, skipping: {e}", kind);
                    current = before;
                }
            }
            timings.push(StepTiming {
                name: step_name(kind),
                time_ms: start.elapsed().as_secs_f64() * 1000.0,
            });
        }
        debug!("preprocessing completed in {} steps", timings.len());
        Ok((current, timings))
    }

    fn apply_one(&self, kind: StepKind, cfg: &StepConfig, image: Image) -> Image {
        steps::apply(kind, cfg, image.clone()).unwrap_or(image)
    }
}

fn step_name(kind: StepKind) -> &'static str {
    match kind {
        StepKind::NormalizeColors => "normalize_colors",
        StepKind::Resize => "resize",
        StepKind::Grayscale => "grayscale",
        StepKind::Deskew => "deskew",
        StepKind::Clahe => "clahe",
        StepKind::Morphology => "morphology",
        StepKind::Sharpen => "sharpen",
        StepKind::Denoise => "denoise",
        StepKind::Threshold => "threshold",
        StepKind::Padding => "padding",
        StepKind::BrightnessNormalize => "brightness_normalize",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_profile_is_identity() {
        let profile = Profile {
            name: "none".to_string(),
            steps: vec![],
            strict: false,
        };
        let pipeline = Pipeline::new(profile);
        let img = Image::Gray(image::GrayImage::new(4, 4));
        let out = pipeline.process(img.clone()).unwrap();
        assert_eq!(out.width(), img.width());
        assert_eq!(out.height(), img.height());
        assert_eq!(out.channels(), img.channels());
    }

    #[test]
    fn disabled_step_is_noop() {
        let profile = Profile {
            name: "grayscale_disabled".to_string(),
            steps: vec![StepConfig {
                enabled: false,
                params: StepParams::Grayscale,
            }],
            strict: false,
        };
        let pipeline = Pipeline::new(profile);
        let img = Image::Rgb(image::RgbImage::new(4, 4));
        let out = pipeline.process(img).unwrap();
        assert_eq!(out.channels(), 3);
    }

    #[test]
    fn grayscale_step_drops_to_one_channel() {
        let profile = Profile {
            name: "gray".to_string(),
            steps: vec![StepConfig {
                enabled: true,
                params: StepParams::Grayscale,
            }],
            strict: false,
        };
        let pipeline = Pipeline::new(profile);
        let img = Image::Rgb(image::RgbImage::new(4, 4));
        let out = pipeline.process(img).unwrap();
        assert_eq!(out.channels(), 1);
    }
}
