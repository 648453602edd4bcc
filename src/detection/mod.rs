pub mod config;
pub mod decode;
pub mod detector;
pub mod dhash;
pub mod images;
pub mod pixel;
pub mod text;

#[cfg(test)]
mod test_support;

pub use config::{clamp_threshold, DetectionMode, DetectorConfig, ThresholdSet};
pub use decode::{ImageDecoder, RasterDecoder};
pub use detector::{CaptureBundle, ChangeDetector};
