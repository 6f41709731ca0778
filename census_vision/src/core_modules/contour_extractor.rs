// THEORY:
// The contour extractor is the bridge from pixels to objects. It traces the
// borders of every connected foreground region in the cleaned mask and keeps
// only the outermost ones: holes inside a region are not separate objects, and
// neither is anything nested inside such a hole.
//
// It is a stateless utility: one mask in, one list of contours out, no memory
// of earlier frames. The order of the returned contours is whatever the border
// follower produced and must not matter to anyone downstream.
//
// The noise filter lives here too. Contours whose enclosed area is at or below
// the configured minimum never reach the classifier.

use crate::core_modules::blob::BlobContour;
use crate::error::{CensusError, Result};
use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ContourConfig {
    /// Contours with an enclosed area at or below this value are discarded as noise.
    pub min_area: f64,
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self { min_area: 500.0 }
    }
}

impl ContourConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.min_area.is_finite() || self.min_area < 0.0 {
            return Err(CensusError::InvalidConfig(format!(
                "contours min_area must be a non-negative number, got {}",
                self.min_area
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ContourExtractor {
    min_area: f64,
}

impl ContourExtractor {
    pub fn new(config: &ContourConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            min_area: config.min_area,
        })
    }

    /// External contours of every foreground component whose area exceeds the minimum.
    pub fn extract(&self, mask: &GrayImage) -> Vec<BlobContour> {
        let traced = find_contours::<i32>(mask);
        let total = traced.len();

        let survivors: Vec<BlobContour> = traced
            .into_iter()
            .filter(|contour| matches!(contour.border_type, BorderType::Outer) && contour.parent.is_none())
            .filter_map(|contour| {
                let blob = BlobContour::from_points(contour.points);
                if blob.is_none() {
                    log::warn!("skipping a traced border with no points");
                }
                blob
            })
            .filter(|blob| blob.area > self.min_area)
            .collect();

        log::trace!(
            "traced {} borders, {} external contours above area {}",
            total,
            survivors.len(),
            self.min_area
        );
        survivors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::blob::BoundingBoxKey;
    use image::Luma;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    fn extractor(min_area: f64) -> ContourExtractor {
        ContourExtractor::new(&ContourConfig { min_area }).unwrap()
    }

    fn filled(mask: &mut GrayImage, x: i32, y: i32, w: u32, h: u32, value: u8) {
        draw_filled_rect_mut(mask, Rect::at(x, y).of_size(w, h), Luma([value]));
    }

    #[test]
    fn finds_one_contour_per_component() {
        let mut mask = GrayImage::new(200, 120);
        filled(&mut mask, 10, 10, 30, 60, 255);
        filled(&mut mask, 100, 20, 80, 30, 255);

        let mut boxes: Vec<_> = extractor(0.0)
            .extract(&mask)
            .into_iter()
            .map(|c| c.bounding_box)
            .collect();
        boxes.sort();

        assert_eq!(
            boxes,
            vec![
                BoundingBoxKey::new(10, 10, 30, 60),
                BoundingBoxKey::new(100, 20, 80, 30),
            ]
        );
    }

    #[test]
    fn holes_and_nested_islands_are_not_reported() {
        let mut mask = GrayImage::new(120, 120);
        filled(&mut mask, 10, 10, 100, 100, 255);
        filled(&mut mask, 30, 30, 60, 60, 0);
        filled(&mut mask, 50, 50, 20, 20, 255);

        let contours = extractor(0.0).extract(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].bounding_box, BoundingBoxKey::new(10, 10, 100, 100));
    }

    #[test]
    fn area_at_the_threshold_is_discarded() {
        let mut mask = GrayImage::new(100, 100);
        // 21 x 26 pixels enclose 20 * 25 = 500.
        filled(&mut mask, 5, 5, 21, 26, 255);
        // 22 x 26 pixels enclose 21 * 25 = 525.
        filled(&mut mask, 50, 50, 22, 26, 255);

        let contours = extractor(500.0).extract(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].area, 525.0);
        assert_eq!(contours[0].bounding_box, BoundingBoxKey::new(50, 50, 22, 26));
    }

    #[test]
    fn empty_mask_has_no_contours() {
        assert!(extractor(0.0).extract(&GrayImage::new(64, 48)).is_empty());
    }

    #[test]
    fn negative_min_area_is_rejected() {
        assert!(ContourExtractor::new(&ContourConfig { min_area: -1.0 }).is_err());
        assert!(ContourExtractor::new(&ContourConfig { min_area: f64::NAN }).is_err());
    }
}
