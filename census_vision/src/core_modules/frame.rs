// THEORY:
// A `Frame` is the unit of work for the whole engine: one decoded raster from
// the video, owned transiently by the pipeline for exactly one iteration. It
// carries no identity across iterations; anything that needs memory (the
// background model, the census) keeps it elsewhere.
//
// The `FrameSource` trait is the seam to the outside world. Decoding, file
// selection and camera plumbing all live behind it, so the core only ever sees
// "here is the next frame" or "the stream is over".
//
// `StageImages` is the debugging side channel: when enabled, each stage drops
// a named copy of its intermediate raster in here so a sink can show the
// grayscale, smoothed, edge and mask views next to the annotated frame.

use crate::error::Result;
use image::{GrayImage, RgbImage};
use std::collections::VecDeque;

/// One decoded video frame. Sources delivering other pixel layouts convert on ingest.
pub type Frame = RgbImage;

/// Supplies a finite, ordered sequence of frames.
///
/// `Ok(None)` is end-of-stream. It is a normal terminal signal, not an error.
/// Implementations release their handles in `Drop`.
pub trait FrameSource {
    /// A short human-readable name used in logs and error messages.
    fn describe(&self) -> String;

    /// Blocks until the next frame is available.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }
}

/// An in-memory source, handy for tests and for replaying captured frames.
pub struct VecFrameSource {
    name: String,
    frames: VecDeque<Frame>,
}

impl VecFrameSource {
    pub fn new(name: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self {
            name: name.into(),
            frames: frames.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for VecFrameSource {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frames.pop_front())
    }
}

/// Named intermediate rasters captured while a frame moves through the stages.
#[derive(Debug, Clone, Default)]
pub struct StageImages {
    entries: Vec<(&'static str, GrayImage)>,
}

impl StageImages {
    pub fn push(&mut self, name: &'static str, image: GrayImage) {
        self.entries.push((name, image));
    }

    pub fn get(&self, name: &str) -> Option<&GrayImage> {
        self.entries
            .iter()
            .find(|(stage, _)| *stage == name)
            .map(|(_, image)| image)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &GrayImage)> {
        self.entries.iter().map(|(name, image)| (*name, image))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_source_yields_frames_in_order_then_ends() {
        let frames = vec![
            RgbImage::from_pixel(2, 2, image::Rgb([1, 1, 1])),
            RgbImage::from_pixel(2, 2, image::Rgb([2, 2, 2])),
        ];
        let mut source = VecFrameSource::new("memory", frames);

        assert_eq!(source.next_frame().unwrap().unwrap().get_pixel(0, 0)[0], 1);
        assert_eq!(source.next_frame().unwrap().unwrap().get_pixel(0, 0)[0], 2);
        assert!(source.next_frame().unwrap().is_none());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn boxed_source_delegates() {
        let mut source: Box<dyn FrameSource> = Box::new(VecFrameSource::new("boxed", Vec::new()));
        assert_eq!(source.describe(), "boxed");
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn stage_images_lookup_by_name() {
        let mut stages = StageImages::default();
        stages.push("grayscale", GrayImage::new(3, 3));
        stages.push("edges", GrayImage::from_pixel(3, 3, image::Luma([255])));

        assert_eq!(stages.len(), 2);
        assert_eq!(stages.get("edges").unwrap().get_pixel(1, 1)[0], 255);
        assert!(stages.get("missing").is_none());
        let names: Vec<_> = stages.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["grayscale", "edges"]);
    }
}
