use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use serde::{Deserialize, Serialize};

use super::config::{clamp_threshold, DetectionMode, DetectorConfig, ThresholdSet};
use super::decode::{ImageDecoder, RasterDecoder};
use super::images::ImageComparator;
use super::text::texts_match;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// What an agent saw on one iteration: the rendered prompt and its images in
/// capture order. Images are base64 rasters, optionally as data URIs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureBundle {
    pub prompt_text: String,
    #[serde(default)]
    pub images: Vec<String>,
}

impl CaptureBundle {
    pub fn new(prompt_text: impl Into<String>, images: Vec<String>) -> Self {
        Self {
            prompt_text: prompt_text.into(),
            images,
        }
    }
}

/// Decides, per agent iteration, whether the capture changed enough to run the model.
///
/// Keeps one baseline per agent: the last bundle judged significant. Mode and
/// thresholds are shared by every agent and take effect on the next call.
pub struct ChangeDetector {
    config: RwLock<DetectorConfig>,
    baselines: Mutex<HashMap<String, CaptureBundle>>,
    decoder: Arc<dyn ImageDecoder>,
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::with_config(DetectorConfig::default())
    }

    pub fn with_config(config: DetectorConfig) -> Self {
        Self::with_decoder(config, Arc::new(RasterDecoder))
    }

    pub fn with_decoder(config: DetectorConfig, decoder: Arc<dyn ImageDecoder>) -> Self {
        Self {
            config: RwLock::new(DetectorConfig::new(config.mode, config.thresholds)),
            baselines: Mutex::new(HashMap::new()),
            decoder,
        }
    }

    /// Returns `true` when `current` differs from the agent's baseline in text
    /// or images, or when the agent has no baseline yet. Only a `true` verdict
    /// replaces the baseline. Comparison failures count as change.
    pub async fn detect_significant_change(&self, agent_id: &str, current: CaptureBundle) -> bool {
        let baseline = self.lock_baselines().get(agent_id).cloned();

        let Some(baseline) = baseline else {
            log_info!(
                "agent {agent_id}: no baseline, treating first iteration as significant ({} images)",
                current.images.len()
            );
            self.lock_baselines().insert(agent_id.to_string(), current);
            return true;
        };

        let config = self.config();

        let text_same = texts_match(
            &baseline.prompt_text,
            &current.prompt_text,
            config.thresholds.text_similarity,
        );

        // Text already decided the verdict; skip decoding images.
        let images_same = text_same
            && ImageComparator::new(&*self.decoder, config)
                .compare_images(&baseline.images, &current.images)
                .await;

        let significant = !(text_same && images_same);

        if significant {
            log_debug!(
                "agent {agent_id}: significant change (text same: {text_same}, images same: {images_same}, mode: {:?})",
                config.mode
            );
            self.lock_baselines().insert(agent_id.to_string(), current);
        } else {
            log_debug!("agent {agent_id}: no significant change, skipping");
        }

        significant
    }

    /// Forgets the agent's baseline so its next iteration counts as the first.
    pub fn clear_agent_change_data(&self, agent_id: &str) {
        if self.lock_baselines().remove(agent_id).is_some() {
            log_info!("agent {agent_id}: change-detection baseline cleared");
        }
    }

    pub fn clear_all(&self) {
        self.lock_baselines().clear();
    }

    pub fn has_baseline(&self, agent_id: &str) -> bool {
        self.lock_baselines().contains_key(agent_id)
    }

    pub fn tracked_agents(&self) -> Vec<String> {
        let mut agents: Vec<String> = self.lock_baselines().keys().cloned().collect();
        agents.sort();
        agents
    }

    pub fn config(&self) -> DetectorConfig {
        *self.config.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replaces mode and thresholds at once; thresholds are clamped.
    pub fn apply_config(&self, config: DetectorConfig) {
        self.update_config(|current| {
            *current = DetectorConfig::new(config.mode, config.thresholds);
        });
    }

    pub fn set_change_detection_mode(&self, mode: DetectionMode) {
        self.update_config(|config| config.mode = mode);
        log_info!("change detection mode set to {mode:?}");
    }

    pub fn change_detection_mode(&self) -> DetectionMode {
        self.config().mode
    }

    pub fn set_text_similarity_threshold(&self, value: f64) {
        self.update_config(|config| config.thresholds.text_similarity = clamp_threshold(value));
    }

    pub fn set_dhash_similarity_threshold(&self, value: f64) {
        self.update_config(|config| {
            config.thresholds.dhash_image_similarity = clamp_threshold(value);
        });
    }

    pub fn set_suspicious_similarity_threshold(&self, value: f64) {
        self.update_config(|config| {
            config.thresholds.suspicious_similarity = clamp_threshold(value);
        });
    }

    pub fn set_pixel_similarity_threshold(&self, value: f64) {
        self.update_config(|config| {
            config.thresholds.pixel_image_similarity = clamp_threshold(value);
        });
    }

    pub fn thresholds(&self) -> ThresholdSet {
        self.config().thresholds
    }

    fn update_config(&self, update: impl FnOnce(&mut DetectorConfig)) {
        let snapshot = {
            let mut guard = self
                .config
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            update(&mut *guard);
            *guard
        };

        if snapshot.has_inverted_hybrid_band() {
            log_warn!(
                "suspicious threshold {} is below dHash threshold {}; hybrid noise band disabled",
                snapshot.thresholds.suspicious_similarity,
                snapshot.thresholds.dhash_image_similarity
            );
        }
    }

    fn lock_baselines(&self) -> MutexGuard<'_, HashMap<String, CaptureBundle>> {
        self.baselines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
