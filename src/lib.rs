//! Change detection for Observer agent loops.
//!
//! Before each model call the agent loop asks a [`ChangeDetector`] whether the
//! current capture (rendered prompt plus screen/camera images) differs enough
//! from the last significant one. Text is compared with normalized Levenshtein
//! similarity; images with a difference hash, exact pixel comparison, or a
//! hybrid of both.

pub mod detection;
pub mod settings;
mod utils;

pub use detection::{
    CaptureBundle, ChangeDetector, DetectionMode, DetectorConfig, ImageDecoder, RasterDecoder,
    ThresholdSet,
};
pub use settings::SettingsStore;
pub use utils::logging::init_logging;
