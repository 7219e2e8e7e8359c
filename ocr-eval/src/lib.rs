pub mod debug_images;
pub mod evaluator;
pub mod metrics;
pub mod report;

pub use evaluator::{evaluate_dataset, GroundTruth, Report};
