use anyhow::{Context, Result};
use image::RgbaImage;

use super::config::{DetectionMode, DetectorConfig, ThresholdSet};
use super::decode::ImageDecoder;
use super::dhash::{compute_dhash, hamming_similarity};
use super::pixel::compare_pixels;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error};

/// Where a dHash similarity falls relative to the hybrid cutoffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HybridZone {
    /// Below the dHash cutoff: the frames clearly differ.
    Diverged,
    /// Between the cutoffs: differences are treated as sensor or encoding noise.
    NoiseBand,
    /// At or above the suspicious cutoff: too close to trust, verify pixels.
    Suspicious,
}

pub fn classify_hybrid(similarity: f64, thresholds: &ThresholdSet) -> HybridZone {
    if similarity < thresholds.dhash_image_similarity {
        HybridZone::Diverged
    } else if similarity < thresholds.suspicious_similarity {
        HybridZone::NoiseBand
    } else {
        HybridZone::Suspicious
    }
}

/// Which check settled a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairCheck {
    DHash,
    DegenerateHash,
    Pixels,
    Hybrid(HybridZone),
    HybridDegenerateFallback,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairVerdict {
    pub same: bool,
    pub check: PairCheck,
    pub dhash_similarity: Option<f64>,
}

impl PairVerdict {
    pub fn used_pixel_check(&self) -> bool {
        matches!(
            self.check,
            PairCheck::Pixels
                | PairCheck::Hybrid(HybridZone::Suspicious)
                | PairCheck::HybridDegenerateFallback
        )
    }
}

/// Judges two already decoded frames under `config`.
pub fn judge_decoded_pair(
    previous: &RgbaImage,
    current: &RgbaImage,
    config: &DetectorConfig,
) -> Result<PairVerdict> {
    let thresholds = &config.thresholds;
    let pixels_match = || compare_pixels(previous, current, thresholds.pixel_image_similarity);

    if config.mode == DetectionMode::PixelDifferenceOnly {
        return Ok(PairVerdict {
            same: pixels_match(),
            check: PairCheck::Pixels,
            dhash_similarity: None,
        });
    }

    let prev_hash = compute_dhash(previous).context("dHash of previous capture")?;
    let curr_hash = compute_dhash(current).context("dHash of current capture")?;
    let degenerate = prev_hash.is_degenerate() || curr_hash.is_degenerate();

    if degenerate {
        log_debug!(
            "degenerate dHash ({} / {})",
            prev_hash.to_base64(),
            curr_hash.to_base64()
        );
        return Ok(match config.mode {
            DetectionMode::DHashOnly => PairVerdict {
                same: false,
                check: PairCheck::DegenerateHash,
                dhash_similarity: None,
            },
            _ => PairVerdict {
                same: pixels_match(),
                check: PairCheck::HybridDegenerateFallback,
                dhash_similarity: None,
            },
        });
    }

    let similarity = hamming_similarity(&prev_hash, &curr_hash);

    if config.mode == DetectionMode::DHashOnly {
        return Ok(PairVerdict {
            same: similarity >= thresholds.dhash_image_similarity,
            check: PairCheck::DHash,
            dhash_similarity: Some(similarity),
        });
    }

    let zone = classify_hybrid(similarity, thresholds);
    let same = match zone {
        HybridZone::Diverged => false,
        HybridZone::NoiseBand => true,
        HybridZone::Suspicious => pixels_match(),
    };

    Ok(PairVerdict {
        same,
        check: PairCheck::Hybrid(zone),
        dhash_similarity: Some(similarity),
    })
}

/// Compares ordered image lists under one config snapshot.
pub struct ImageComparator<'a> {
    decoder: &'a dyn ImageDecoder,
    config: DetectorConfig,
}

impl<'a> ImageComparator<'a> {
    pub fn new(decoder: &'a dyn ImageDecoder, config: DetectorConfig) -> Self {
        Self { decoder, config }
    }

    /// Same only if counts match and every pair matches; stops at the first
    /// differing or failing pair.
    pub async fn compare_images(&self, previous: &[String], current: &[String]) -> bool {
        if previous.len() != current.len() {
            log_debug!(
                "image count changed: {} -> {}",
                previous.len(),
                current.len()
            );
            return false;
        }

        for (index, (prev, curr)) in previous.iter().zip(current).enumerate() {
            match self.compare_pair(prev, curr).await {
                Ok(verdict) if verdict.same => {
                    log_debug!("image {index} unchanged via {:?}", verdict.check);
                }
                Ok(verdict) => {
                    log_debug!(
                        "image {index} changed via {:?} (dHash similarity {:?})",
                        verdict.check,
                        verdict.dhash_similarity
                    );
                    return false;
                }
                Err(err) => {
                    log_error!("image {index} comparison failed, treating as change: {err:#}");
                    return false;
                }
            }
        }

        true
    }

    pub async fn compare_pair(&self, previous: &str, current: &str) -> Result<PairVerdict> {
        let (prev, curr) = tokio::try_join!(
            async {
                self.decoder
                    .decode(previous)
                    .await
                    .context("failed to decode previous capture")
            },
            async {
                self.decoder
                    .decode(current)
                    .await
                    .context("failed to decode current capture")
            },
        )?;

        let config = self.config;
        tokio::task::spawn_blocking(move || judge_decoded_pair(&prev, &curr, &config))
            .await
            .context("image comparison worker join failed")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::decode::RasterDecoder;
    use crate::detection::test_support::{encode_png_base64, flat_image, striped_image};
    use image::Rgba;

    fn config(mode: DetectionMode) -> DetectorConfig {
        DetectorConfig {
            mode,
            ..DetectorConfig::default()
        }
    }

    /// Same stripes as `striped_image(9, 8, 200, 50)` but darker everywhere:
    /// identical dHash, every pixel different.
    fn dimmed_stripes() -> RgbaImage {
        striped_image(9, 8, 180, 40)
    }

    /// Dimmed stripes with one pixel raised so exactly two hash bits flip.
    fn dimmed_stripes_two_bits_off() -> RgbaImage {
        let mut img = dimmed_stripes();
        img.put_pixel(1, 0, Rgba([255, 255, 255, 255]));
        img
    }

    #[test]
    fn hybrid_zone_boundaries_with_defaults() {
        let t = ThresholdSet::default();
        assert_eq!(classify_hybrid(0.89, &t), HybridZone::Diverged);
        assert_eq!(classify_hybrid(0.90, &t), HybridZone::NoiseBand);
        assert_eq!(classify_hybrid(0.95, &t), HybridZone::NoiseBand);
        assert_eq!(classify_hybrid(0.998, &t), HybridZone::Suspicious);
        assert_eq!(classify_hybrid(0.999, &t), HybridZone::Suspicious);
        assert_eq!(classify_hybrid(1.0, &t), HybridZone::Suspicious);
    }

    #[test]
    fn inverted_thresholds_skip_the_noise_band() {
        let t = ThresholdSet {
            suspicious_similarity: 0.5,
            ..ThresholdSet::default()
        };
        assert_eq!(classify_hybrid(0.95, &t), HybridZone::Suspicious);
        assert_eq!(classify_hybrid(0.7, &t), HybridZone::Diverged);
    }

    #[test]
    fn hybrid_verifies_perfect_hash_with_pixels() {
        let a = striped_image(9, 8, 200, 50);
        let verdict = judge_decoded_pair(&a, &a, &config(DetectionMode::Hybrid)).unwrap();
        assert!(verdict.same);
        assert!(verdict.used_pixel_check());
        assert_eq!(verdict.dhash_similarity, Some(1.0));

        let b = dimmed_stripes();
        let verdict = judge_decoded_pair(&a, &b, &config(DetectionMode::Hybrid)).unwrap();
        assert_eq!(verdict.check, PairCheck::Hybrid(HybridZone::Suspicious));
        assert!(!verdict.same);
    }

    #[test]
    fn hybrid_absorbs_noise_band_without_pixel_check() {
        let a = striped_image(9, 8, 200, 50);
        let b = dimmed_stripes_two_bits_off();
        let verdict = judge_decoded_pair(&a, &b, &config(DetectionMode::Hybrid)).unwrap();

        assert_eq!(verdict.dhash_similarity, Some(62.0 / 64.0));
        assert_eq!(verdict.check, PairCheck::Hybrid(HybridZone::NoiseBand));
        assert!(!verdict.used_pixel_check());
        assert!(verdict.same);
    }

    #[test]
    fn hybrid_rejects_diverged_hash() {
        let a = striped_image(9, 8, 200, 50);
        let b = striped_image(9, 8, 50, 200);
        let verdict = judge_decoded_pair(&a, &b, &config(DetectionMode::Hybrid)).unwrap();

        assert_eq!(verdict.dhash_similarity, Some(0.0));
        assert_eq!(verdict.check, PairCheck::Hybrid(HybridZone::Diverged));
        assert!(!verdict.same);
    }

    #[test]
    fn hybrid_falls_back_to_pixels_on_flat_frames() {
        let black = flat_image(9, 8, [0, 0, 0, 255]);
        let white = flat_image(9, 8, [255, 255, 255, 255]);

        let same = judge_decoded_pair(&black, &black, &config(DetectionMode::Hybrid)).unwrap();
        assert_eq!(same.check, PairCheck::HybridDegenerateFallback);
        assert!(same.same);

        let changed = judge_decoded_pair(&black, &white, &config(DetectionMode::Hybrid)).unwrap();
        assert!(!changed.same);
    }

    #[test]
    fn dhash_only_treats_degenerate_hash_as_change() {
        let black = flat_image(9, 8, [0, 0, 0, 255]);
        let verdict = judge_decoded_pair(&black, &black, &config(DetectionMode::DHashOnly)).unwrap();
        assert_eq!(verdict.check, PairCheck::DegenerateHash);
        assert!(!verdict.same);
    }

    #[test]
    fn dhash_only_ignores_pixel_level_differences() {
        let a = striped_image(9, 8, 200, 50);
        let verdict =
            judge_decoded_pair(&a, &dimmed_stripes(), &config(DetectionMode::DHashOnly)).unwrap();
        assert_eq!(verdict.check, PairCheck::DHash);
        assert!(verdict.same);
    }

    #[test]
    fn pixel_only_never_hashes() {
        let black = flat_image(9, 8, [0, 0, 0, 255]);
        let verdict =
            judge_decoded_pair(&black, &black, &config(DetectionMode::PixelDifferenceOnly))
                .unwrap();
        assert_eq!(verdict.check, PairCheck::Pixels);
        assert_eq!(verdict.dhash_similarity, None);
        assert!(verdict.same);
    }

    #[tokio::test]
    async fn count_mismatch_and_empty_lists() {
        let decoder = RasterDecoder;
        let comparator = ImageComparator::new(&decoder, DetectorConfig::default());
        let img = encode_png_base64(&striped_image(9, 8, 200, 50));

        assert!(!comparator.compare_images(&[img.clone()], &[]).await);
        assert!(!comparator.compare_images(&[], &[img]).await);
        assert!(comparator.compare_images(&[], &[]).await);
    }

    #[tokio::test]
    async fn undecodable_capture_counts_as_change() {
        let decoder = RasterDecoder;
        let comparator = ImageComparator::new(&decoder, DetectorConfig::default());
        let img = encode_png_base64(&striped_image(9, 8, 200, 50));

        assert!(comparator.compare_pair(&img, "@@@").await.is_err());
        assert!(
            !comparator
                .compare_images(&[img.clone()], &["@@@".to_string()])
                .await
        );
    }

    #[tokio::test]
    async fn resized_capture_counts_as_change_in_pixel_mode() {
        let decoder = RasterDecoder;
        let comparator =
            ImageComparator::new(&decoder, config(DetectionMode::PixelDifferenceOnly));
        let small = encode_png_base64(&flat_image(9, 8, [0, 0, 0, 255]));
        let large = encode_png_base64(&flat_image(18, 16, [0, 0, 0, 255]));

        assert!(!comparator.compare_images(&[small], &[large]).await);
    }
}
