// THEORY:
// Raw masks are noisy: edge maps have one-pixel breaks, background-subtraction
// masks have speckles and pinholes. The morphology stage repairs both with a
// square structuring element before any contour is traced.
//
// Two compositions are used, each paired with one preprocessing strategy:
// - dilate-then-erode, small element: thickens edge fragments so touching
//   pieces join, then trims them back to roughly their original width;
// - close-then-open, larger element: fills holes inside blobs, then removes
//   isolated specks smaller than the element.
//
// An odd `n x n` square element is the L-infinity ball of radius `n / 2`,
// which is how the operations are expressed with `imageproc`.

use crate::error::{CensusError, Result};
use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::morphology::{dilate, erode};
use serde::Deserialize;

/// Radius 254 at most; imageproc's u8 distance transform saturates at 255.
const MAX_KERNEL_SIZE: u32 = 509;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MorphologyComposition {
    DilateErode,
    CloseOpen,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MorphologyConfig {
    pub composition: MorphologyComposition,
    /// Side length of the square structuring element. Must be odd.
    pub kernel_size: u32,
    /// How many times each elementary operation is repeated.
    pub iterations: u32,
}

impl MorphologyConfig {
    pub fn dilate_erode() -> Self {
        Self {
            composition: MorphologyComposition::DilateErode,
            kernel_size: 3,
            iterations: 1,
        }
    }

    pub fn close_open() -> Self {
        Self {
            composition: MorphologyComposition::CloseOpen,
            kernel_size: 5,
            iterations: 1,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.kernel_size == 0 || self.kernel_size % 2 == 0 || self.kernel_size > MAX_KERNEL_SIZE {
            return Err(CensusError::InvalidConfig(format!(
                "morphology kernel_size must be odd and between 1 and {MAX_KERNEL_SIZE}, got {}",
                self.kernel_size
            )));
        }
        if self.iterations == 0 {
            return Err(CensusError::InvalidConfig(
                "morphology iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A validated, ready-to-run morphology stage.
#[derive(Debug, Clone)]
pub struct MorphologyPlan {
    composition: MorphologyComposition,
    radius: u8,
    iterations: u32,
}

impl MorphologyPlan {
    pub fn new(config: &MorphologyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            composition: config.composition,
            radius: (config.kernel_size / 2) as u8,
            iterations: config.iterations,
        })
    }

    /// Returns the cleaned mask. Dimensions are preserved.
    pub fn apply(&self, mask: &GrayImage) -> GrayImage {
        match self.composition {
            MorphologyComposition::DilateErode => {
                let dilated = self.repeat(mask, dilate);
                self.repeat(&dilated, erode)
            }
            MorphologyComposition::CloseOpen => {
                // close
                let closed = self.repeat(&self.repeat(mask, dilate), erode);
                // open
                self.repeat(&self.repeat(&closed, erode), dilate)
            }
        }
    }

    fn repeat(&self, mask: &GrayImage, op: fn(&GrayImage, Norm, u8) -> GrayImage) -> GrayImage {
        let mut current = op(mask, Norm::LInf, self.radius);
        for _ in 1..self.iterations {
            current = op(&current, Norm::LInf, self.radius);
        }
        current
    }
}
