use anyhow::{bail, Result};
use image::RgbaImage;

const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Share of pixels whose four RGBA channels match exactly.
///
/// Fails when dimensions differ; frames are never resized or cropped to fit.
pub fn pixel_similarity(lhs: &RgbaImage, rhs: &RgbaImage) -> Result<f64> {
    if lhs.dimensions() != rhs.dimensions() {
        bail!(
            "dimension mismatch: {}x{} vs {}x{}",
            lhs.width(),
            lhs.height(),
            rhs.width(),
            rhs.height()
        );
    }

    let total = u64::from(lhs.width()) * u64::from(lhs.height());
    if total == 0 {
        return Ok(1.0);
    }

    let differing = lhs
        .pixels()
        .zip(rhs.pixels())
        .filter(|(a, b)| a.0 != b.0)
        .count() as u64;

    Ok(1.0 - (differing as f64 / total as f64))
}

/// Pixel verdict: a dimension mismatch always counts as different.
pub fn compare_pixels(lhs: &RgbaImage, rhs: &RgbaImage, threshold: f64) -> bool {
    match pixel_similarity(lhs, rhs) {
        Ok(similarity) => similarity >= threshold,
        Err(err) => {
            log_warn!("pixel comparison treated as change: {err}");
            false
        }
    }
}
