pub mod geometric;
pub mod photometric;

pub use geometric::{GeometricNormalizer, GeometricNormalizerConfig};
pub use photometric::{PhotometricNormalizer, PhotometricNormalizerConfig};
