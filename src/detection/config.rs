use serde::{Deserialize, Serialize};

/// Strategy used to decide whether two captured images are the same.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DetectionMode {
    /// Perceptual hash only; degenerate hashes count as a change.
    DHashOnly,
    /// Exact per-pixel comparison for every pair.
    PixelDifferenceOnly,
    /// Perceptual hash with pixel verification at the extremes.
    Hybrid,
}

impl Default for DetectionMode {
    fn default() -> Self {
        DetectionMode::Hybrid
    }
}

/// Similarity cutoffs, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ThresholdSet {
    /// Normalized Levenshtein similarity at or above which prompt texts match.
    pub text_similarity: f64,

    /// dHash similarity at or above which two images are not clearly diverged.
    pub dhash_image_similarity: f64,

    /// Hybrid only: dHash similarity at or above which a pixel check is forced.
    pub suspicious_similarity: f64,

    /// Fraction of identical pixels at or above which two images match.
    pub pixel_image_similarity: f64,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            text_similarity: 0.90,
            dhash_image_similarity: 0.90,
            suspicious_similarity: 0.998,
            pixel_image_similarity: 0.95,
        }
    }
}

impl ThresholdSet {
    pub fn clamped(self) -> Self {
        Self {
            text_similarity: clamp_threshold(self.text_similarity),
            dhash_image_similarity: clamp_threshold(self.dhash_image_similarity),
            suspicious_similarity: clamp_threshold(self.suspicious_similarity),
            pixel_image_similarity: clamp_threshold(self.pixel_image_similarity),
        }
    }
}

/// Clamps a threshold into `[0, 1]`. NaN collapses to `0`.
pub fn clamp_threshold(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Mode plus thresholds; one snapshot drives a whole comparison.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectorConfig {
    pub mode: DetectionMode,
    pub thresholds: ThresholdSet,
}

impl DetectorConfig {
    pub fn new(mode: DetectionMode, thresholds: ThresholdSet) -> Self {
        Self {
            mode,
            thresholds: thresholds.clamped(),
        }
    }

    /// True when the suspicious cutoff sits below the dHash cutoff, which
    /// removes the hybrid noise band: every non-diverged pair gets a pixel check.
    pub fn has_inverted_hybrid_band(&self) -> bool {
        self.thresholds.suspicious_similarity < self.thresholds.dhash_image_similarity
    }
}
