// THEORY:
// Preprocessing is the first stage of every frame: it turns a colour frame into
// a binary mask of the same size where 255 means "something is here" and 0
// means "nothing of interest". Two strategies fulfil that contract and a
// pipeline picks one of them for its whole run:
//
// - **Edge-based**: stateless. Grayscale, an edge-preserving bilateral smooth,
//   hysteresis edge detection, then a fixed cutoff. Objects show up as their
//   outlines, which the morphology stage later thickens and joins.
// - **Background subtraction**: stateful. A light Gaussian blur, then the
//   per-pixel mixture model decides foreground, background or shadow. The
//   cutoff sits above the shadow marker, so shadows are dropped here.
//
// The background model is created lazily from the first frame's dimensions
// and lives inside the `Preprocessor`, which the pipeline owns.

use crate::core_modules::background_model::{BackgroundModel, BackgroundModelConfig};
use crate::core_modules::frame::{Frame, StageImages};
use crate::error::{CensusError, Result};
use image::imageops::grayscale;
use image::{GrayImage, Luma};
use imageproc::edges::canny;
use imageproc::filter::{bilateral_filter, gaussian_blur_f32};
use serde::Deserialize;

/// Tuning of the edge-based strategy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Diameter of the bilateral filter's pixel neighbourhood.
    pub bilateral_diameter: u32,
    pub sigma_color: f32,
    pub sigma_space: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Edge responses strictly above this become 255.
    pub binarize_cutoff: u8,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            bilateral_diameter: 9,
            sigma_color: 75.0,
            sigma_space: 75.0,
            canny_low: 50.0,
            canny_high: 150.0,
            binarize_cutoff: 127,
        }
    }
}

impl EdgeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bilateral_diameter == 0 {
            return Err(CensusError::InvalidConfig(
                "bilateral_diameter must be at least 1".to_string(),
            ));
        }
        if !(self.sigma_color > 0.0 && self.sigma_space > 0.0) {
            return Err(CensusError::InvalidConfig(format!(
                "bilateral sigmas must be positive, got {} / {}",
                self.sigma_color, self.sigma_space
            )));
        }
        if !(self.canny_low >= 0.0 && self.canny_low <= self.canny_high) {
            return Err(CensusError::InvalidConfig(format!(
                "edge hysteresis pair must satisfy 0 <= low <= high, got {} / {}",
                self.canny_low, self.canny_high
            )));
        }
        Ok(())
    }
}

/// Tuning of the background-subtraction strategy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Side of the Gaussian blur kernel. Must be odd.
    pub blur_kernel_size: u32,
    /// Model output strictly above this becomes 255.
    pub foreground_cutoff: u8,
    pub model: BackgroundModelConfig,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            blur_kernel_size: 5,
            foreground_cutoff: 200,
            model: BackgroundModelConfig::default(),
        }
    }
}

impl BackgroundConfig {
    pub fn validate(&self) -> Result<()> {
        if self.blur_kernel_size == 0 || self.blur_kernel_size % 2 == 0 {
            return Err(CensusError::InvalidConfig(format!(
                "blur_kernel_size must be odd and positive, got {}",
                self.blur_kernel_size
            )));
        }
        self.model.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum PreprocessingConfig {
    EdgeBased(EdgeConfig),
    BackgroundSubtraction(BackgroundConfig),
}

impl PreprocessingConfig {
    pub fn edge_based() -> Self {
        PreprocessingConfig::EdgeBased(EdgeConfig::default())
    }

    pub fn background_subtraction() -> Self {
        PreprocessingConfig::BackgroundSubtraction(BackgroundConfig::default())
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            PreprocessingConfig::EdgeBased(config) => config.validate(),
            PreprocessingConfig::BackgroundSubtraction(config) => config.validate(),
        }
    }
}

/// The preprocessing stage of one pipeline.
pub enum Preprocessor {
    EdgeBased(EdgeConfig),
    BackgroundSubtraction {
        config: BackgroundConfig,
        /// Sized by the first frame.
        model: Option<BackgroundModel>,
    },
}

impl Preprocessor {
    pub fn new(config: &PreprocessingConfig) -> Result<Self> {
        config.validate()?;
        Ok(match config {
            PreprocessingConfig::EdgeBased(edge) => Preprocessor::EdgeBased(edge.clone()),
            PreprocessingConfig::BackgroundSubtraction(background) => Preprocessor::BackgroundSubtraction {
                config: background.clone(),
                model: None,
            },
        })
    }

    pub fn strategy_name(&self) -> &'static str {
        match self {
            Preprocessor::EdgeBased(_) => "edge-based",
            Preprocessor::BackgroundSubtraction { .. } => "background-subtraction",
        }
    }

    /// Produces the binary mask for `frame`, recording intermediates into `stages` when given.
    pub fn apply(&mut self, frame: &Frame, mut stages: Option<&mut StageImages>) -> Result<GrayImage> {
        let mut record = |name: &'static str, image: &GrayImage| {
            if let Some(stages) = stages.as_deref_mut() {
                stages.push(name, image.clone());
            }
        };

        match self {
            Preprocessor::EdgeBased(config) => {
                let gray = grayscale(frame);
                record("grayscale", &gray);

                let smoothed = bilateral_filter(&gray, config.bilateral_diameter, config.sigma_color, config.sigma_space);
                record("smoothed", &smoothed);

                let edges = canny(&smoothed, config.canny_low, config.canny_high);
                record("edges", &edges);

                let mask = binarize(&edges, config.binarize_cutoff);
                record("mask", &mask);
                Ok(mask)
            }
            Preprocessor::BackgroundSubtraction { config, model } => {
                let (width, height) = frame.dimensions();
                let model = model.get_or_insert_with(|| {
                    log::debug!("sizing background model for {}x{} frames", width, height);
                    BackgroundModel::new(width, height, config.model.clone())
                });

                let blurred = gaussian_blur_f32(frame, gaussian_sigma(config.blur_kernel_size));
                record("blurred", &grayscale(&blurred));

                let foreground = model.apply(&blurred)?;
                record("foreground", &foreground);

                let mask = binarize(&foreground, config.foreground_cutoff);
                record("mask", &mask);
                Ok(mask)
            }
        }
    }
}

/// Standard deviation of a Gaussian kernel of side `kernel_size`.
pub fn gaussian_sigma(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Pixels strictly above `cutoff` become 255, the rest 0.
pub fn binarize(image: &GrayImage, cutoff: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y)[0] > cutoff {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}
