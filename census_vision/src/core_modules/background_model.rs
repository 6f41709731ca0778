// THEORY:
// The `BackgroundModel` is the only learning component of the engine and the
// long-lived state of the background-subtraction pipeline. Like a grid of
// tiny statisticians, every pixel keeps its own memory of what "normal" looks
// like at that location and judges each new sample against it.
//
// Key architectural principles:
// 1.  **Multi-modal memory**: a pixel is not described by one colour but by a
//     small mixture of Gaussians (mean colour, isotropic variance, weight).
//     A flickering monitor or swaying leaves settle into two or three modes
//     that are all considered background.
// 2.  **Adaptive learning**: each frame nudges the matching mode towards the
//     sample and decays every weight. The learning rate starts fast
//     (`1 / 2n` after `n` frames) and settles at `1 / history`.
// 3.  **Self-pruning**: modes whose weight decays below the complexity prior
//     are dropped, so each pixel carries only as many modes as the scene needs.
// 4.  **Background decision**: the heaviest modes whose cumulative weight stays
//     under the background ratio describe the background. A sample close
//     enough to one of them is background; anything else is foreground.
// 5.  **Shadows**: a foreground sample that is a uniformly darker version of a
//     background mode is reported with the shadow marker instead of full
//     foreground, so the binarisation step can drop it.
//
// The model is created once per run, sized by the first frame, and updated on
// every processed frame. It has no reset.

use crate::error::{CensusError, Result};
use image::{GrayImage, Luma, RgbImage};
use serde::Deserialize;

/// Tuning of the per-pixel Gaussian mixture.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackgroundModelConfig {
    /// Number of frames after which the learning rate stops shrinking.
    pub history: u32,
    /// Squared Mahalanobis distance under which a sample belongs to a background mode.
    pub var_threshold: f32,
    /// Squared Mahalanobis distance under which a sample updates an existing mode.
    pub var_threshold_gen: f32,
    /// Cumulative weight of the modes that describe the background.
    pub background_ratio: f32,
    pub var_init: f32,
    pub var_min: f32,
    pub var_max: f32,
    /// Prior that pulls rarely-matched modes towards removal.
    pub complexity_reduction: f32,
    pub max_modes: usize,
    pub detect_shadows: bool,
    /// Mask value written for shadow pixels.
    pub shadow_value: u8,
    /// Darkest a shadow may be relative to the background (0..1).
    pub shadow_tau: f32,
}

impl Default for BackgroundModelConfig {
    fn default() -> Self {
        Self {
            history: 500,
            var_threshold: 16.0,
            var_threshold_gen: 9.0,
            background_ratio: 0.9,
            var_init: 15.0,
            var_min: 4.0,
            var_max: 75.0,
            complexity_reduction: 0.05,
            max_modes: 5,
            detect_shadows: true,
            shadow_value: 127,
            shadow_tau: 0.5,
        }
    }
}

impl BackgroundModelConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(CensusError::InvalidConfig(message));

        if self.history == 0 {
            return invalid("background history must be at least 1".to_string());
        }
        if self.max_modes == 0 || self.max_modes > u8::MAX as usize {
            return invalid(format!("background max_modes must be in 1..=255, got {}", self.max_modes));
        }
        if !(self.var_min > 0.0 && self.var_min <= self.var_init && self.var_init <= self.var_max) {
            return invalid(format!(
                "background variances must satisfy 0 < var_min <= var_init <= var_max, got {} / {} / {}",
                self.var_min, self.var_init, self.var_max
            ));
        }
        if !(self.background_ratio > 0.0 && self.background_ratio <= 1.0) {
            return invalid(format!(
                "background_ratio must be in (0, 1], got {}",
                self.background_ratio
            ));
        }
        if !(self.shadow_tau > 0.0 && self.shadow_tau < 1.0) {
            return invalid(format!("shadow_tau must be in (0, 1), got {}", self.shadow_tau));
        }
        if self.var_threshold <= 0.0 || self.var_threshold_gen <= 0.0 || self.complexity_reduction < 0.0 {
            return invalid("background thresholds must be positive".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct GaussianMode {
    weight: f32,
    mean: [f32; 3],
    variance: f32,
}

/// Per-pixel mixture-of-Gaussians background model for one fixed frame size.
pub struct BackgroundModel {
    width: u32,
    height: u32,
    config: BackgroundModelConfig,
    /// `max_modes` slots per pixel, heaviest first.
    modes: Vec<GaussianMode>,
    /// How many slots of each pixel are live.
    modes_used: Vec<u8>,
    frames_seen: u64,
}

impl BackgroundModel {
    pub fn new(width: u32, height: u32, config: BackgroundModelConfig) -> Self {
        let pixels = width as usize * height as usize;
        Self {
            width,
            height,
            modes: vec![GaussianMode::default(); pixels * config.max_modes],
            modes_used: vec![0; pixels],
            frames_seen: 0,
            config,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// The learning rate the next `apply` will use.
    pub fn learning_rate(&self) -> f32 {
        let horizon = (2 * (self.frames_seen + 1)).min(self.config.history as u64);
        1.0 / horizon as f32
    }

    /// Updates the model with `frame` and returns its foreground mask:
    /// 0 for background, `shadow_value` for shadows, 255 for foreground.
    pub fn apply(&mut self, frame: &RgbImage) -> Result<GrayImage> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(CensusError::FrameSizeChanged {
                expected: (self.width, self.height),
                actual: frame.dimensions(),
            });
        }

        let alpha = self.learning_rate();
        self.frames_seen += 1;

        let slots = self.config.max_modes;
        let config = &self.config;
        let mut mask = GrayImage::new(self.width, self.height);

        for ((index, pixel), out) in frame.pixels().enumerate().zip(mask.pixels_mut()) {
            let sample = [pixel[0] as f32, pixel[1] as f32, pixel[2] as f32];
            let pixel_modes = &mut self.modes[index * slots..(index + 1) * slots];
            let used = self.modes_used[index] as usize;

            let (verdict, used) = update_pixel(pixel_modes, used, sample, alpha, config);
            self.modes_used[index] = used as u8;

            *out = match verdict {
                Verdict::Background => Luma([0]),
                Verdict::Shadow => Luma([config.shadow_value]),
                Verdict::Foreground => Luma([255]),
            };
        }

        Ok(mask)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Background,
    Shadow,
    Foreground,
}

/// Runs one update step for a single pixel. Returns the verdict on the sample
/// and the new number of live modes.
fn update_pixel(
    modes: &mut [GaussianMode],
    mut used: usize,
    sample: [f32; 3],
    alpha: f32,
    config: &BackgroundModelConfig,
) -> (Verdict, usize) {
    let prune = -alpha * config.complexity_reduction;
    let mut fits = false;
    let mut is_background = false;
    let mut total_weight = 0.0f32;

    // --- 1. Match against existing modes, heaviest first ---
    for mode in modes[..used].iter_mut() {
        let mut weight = (1.0 - alpha) * mode.weight + prune;

        if !fits {
            let diff = [
                mode.mean[0] - sample[0],
                mode.mean[1] - sample[1],
                mode.mean[2] - sample[2],
            ];
            let dist2 = diff[0] * diff[0] + diff[1] * diff[1] + diff[2] * diff[2];

            if total_weight < config.background_ratio && dist2 < config.var_threshold * mode.variance {
                is_background = true;
            }

            if dist2 < config.var_threshold_gen * mode.variance {
                fits = true;
                weight += alpha;
                let k = alpha / weight;
                for c in 0..3 {
                    mode.mean[c] -= k * diff[c];
                }
                let variance = mode.variance + k * (dist2 - mode.variance);
                mode.variance = variance.clamp(config.var_min, config.var_max);
            }
        }

        if weight < -prune {
            weight = 0.0;
        }
        mode.weight = weight;
        total_weight += weight;
    }

    // --- 2. Drop dead modes and restore the heaviest-first order ---
    sort_by_weight(&mut modes[..used]);
    used = modes[..used].iter().take_while(|m| m.weight > 0.0).count();

    if total_weight > 0.0 {
        for mode in modes[..used].iter_mut() {
            mode.weight /= total_weight;
        }
    }

    // --- 3. Judge the sample against the learned modes ---
    // Shadows are tested before a mode is spawned for the sample itself.
    let verdict = if is_background {
        Verdict::Background
    } else if config.detect_shadows && is_shadow(&modes[..used], sample, config) {
        Verdict::Shadow
    } else {
        Verdict::Foreground
    };

    // --- 4. Spawn a mode for an unexplained sample ---
    if !fits {
        let slot = if used == modes.len() { used - 1 } else { used };
        used = slot + 1;
        modes[slot] = GaussianMode {
            weight: if used == 1 { 1.0 } else { alpha },
            mean: sample,
            variance: config.var_init,
        };
        if used > 1 {
            for mode in modes[..slot].iter_mut() {
                mode.weight *= 1.0 - alpha;
            }
        }
        sort_by_weight(&mut modes[..used]);
    }

    (verdict, used)
}

fn sort_by_weight(modes: &mut [GaussianMode]) {
    modes.sort_by(|a, b| b.weight.total_cmp(&a.weight));
}

/// A sample is a shadow when it is a uniformly darker copy of a background mode.
fn is_shadow(modes: &[GaussianMode], sample: [f32; 3], config: &BackgroundModelConfig) -> bool {
    let mut total_weight = 0.0f32;
    for mode in modes {
        let numerator: f32 = (0..3).map(|c| sample[c] * mode.mean[c]).sum();
        let denominator: f32 = (0..3).map(|c| mode.mean[c] * mode.mean[c]).sum();
        if denominator == 0.0 {
            return false;
        }

        if numerator <= denominator && numerator >= config.shadow_tau * denominator {
            let a = numerator / denominator;
            let dist2a: f32 = (0..3).map(|c| (a * mode.mean[c] - sample[c]).powi(2)).sum();
            if dist2a < config.var_threshold * mode.variance * a * a {
                return true;
            }
        }

        total_weight += mode.weight;
        if total_weight > config.background_ratio {
            return false;
        }
    }
    false
}
