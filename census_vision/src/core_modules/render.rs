// THEORY:
// The render sink is the outbound seam, the mirror image of `FrameSource`.
// After every frame the pipeline hands it a `RenderRequest`: the original
// frame, one annotation per newly counted detection, the current counts and,
// when capture is enabled, the intermediate stage images. What the sink does
// with it (a window, a folder of PNGs, a log line) is a pure side effect and
// never flows back into the engine.
//
// Two sinks ship with the crate: `PngSequenceSink` writes annotated frames and
// stage images to a directory, `LogSink` only logs the summary lines.

use crate::core_modules::blob::BoundingBoxKey;
use crate::core_modules::census::CounterTable;
use crate::core_modules::classifier::Category;
use crate::core_modules::frame::{Frame, StageImages};
use crate::error::{CensusError, Result};
use image::{DynamicImage, Rgb};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::fs;
use std::path::{Path, PathBuf};

/// A labelled box to draw on the output frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub category: Category,
    /// Display name of the category under the active classifier profile.
    pub label: &'static str,
    pub bounding_box: BoundingBoxKey,
}

/// Everything a sink receives for one processed frame.
pub struct RenderRequest<'a> {
    /// Zero-based position of the frame in the run.
    pub frame_index: u64,
    pub frame: &'a Frame,
    pub annotations: &'a [Annotation],
    pub counts: &'a CounterTable,
    /// One "Label: count" line per label of the active profile.
    pub summary: &'a [String],
    pub stages: Option<&'a StageImages>,
}

pub trait RenderSink {
    fn render(&mut self, request: &RenderRequest<'_>) -> Result<()>;
}

impl<S: RenderSink + ?Sized> RenderSink for Box<S> {
    fn render(&mut self, request: &RenderRequest<'_>) -> Result<()> {
        (**self).render(request)
    }
}

/// Outline colour per category.
pub fn category_color(category: Category) -> Rgb<u8> {
    match category {
        Category::StandingHuman => Rgb([0, 255, 0]),
        Category::LyingHuman => Rgb([0, 200, 255]),
        Category::Child => Rgb([255, 200, 0]),
        Category::Animal => Rgb([255, 0, 255]),
        Category::Unknown => Rgb([255, 0, 0]),
    }
}

/// Returns a copy of `frame` with one outline per annotation.
pub fn annotate(frame: &Frame, annotations: &[Annotation]) -> Frame {
    let mut canvas = frame.clone();
    for annotation in annotations {
        let b = annotation.bounding_box;
        if b.width == 0 || b.height == 0 {
            continue;
        }
        let rect = Rect::at(b.x as i32, b.y as i32).of_size(b.width, b.height);
        draw_hollow_rect_mut(&mut canvas, rect, category_color(annotation.category));
    }
    canvas
}

/// Writes `frame_NNNNNN.png` plus `frame_NNNNNN_<stage>.png` per captured stage.
///
/// The PNGs carry the coloured boxes only. Labels and count lines go to the
/// log, one line per newly counted detection plus the summary.
pub struct PngSequenceSink {
    directory: PathBuf,
    written: u64,
}

impl PngSequenceSink {
    pub fn create(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)?;
        log::info!("writing annotated frames to {}", directory.display());
        Ok(Self { directory, written: 0 })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Number of annotated frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.written
    }

    fn save(&self, image: DynamicImage, file_name: String) -> Result<()> {
        let path = self.directory.join(file_name);
        image
            .save(&path)
            .map_err(|e| CensusError::Render(format!("{}: {}", path.display(), e)))
    }
}

impl RenderSink for PngSequenceSink {
    fn render(&mut self, request: &RenderRequest<'_>) -> Result<()> {
        let stem = format!("frame_{:06}", request.frame_index);

        let annotated = annotate(request.frame, request.annotations);
        self.save(DynamicImage::ImageRgb8(annotated), format!("{stem}.png"))?;
        if let Some(stages) = request.stages {
            for (name, image) in stages.iter() {
                self.save(DynamicImage::ImageLuma8(image.clone()), format!("{stem}_{name}.png"))?;
            }
        }
        self.written += 1;

        for annotation in request.annotations {
            log::info!("frame {}: {}", request.frame_index, label_line(annotation));
        }
        if !request.annotations.is_empty() {
            log::info!("frame {}: {}", request.frame_index, request.summary.join(", "));
        }
        Ok(())
    }
}

/// Text written next to a box: the label and where the box sits.
pub fn label_line(annotation: &Annotation) -> String {
    let b = annotation.bounding_box;
    format!("{} at ({}, {}) {}x{}", annotation.label, b.x, b.y, b.width, b.height)
}

/// Logs the count summary whenever a frame produced new annotations.
#[derive(Debug, Default)]
pub struct LogSink;

impl RenderSink for LogSink {
    fn render(&mut self, request: &RenderRequest<'_>) -> Result<()> {
        for annotation in request.annotations {
            log::info!("frame {}: {}", request.frame_index, label_line(annotation));
        }
        if !request.annotations.is_empty() {
            log::info!("counts: {} (total {})", request.summary.join(", "), request.counts.total());
        } else {
            log::trace!("frame {}: nothing new", request.frame_index);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, RgbImage};

    fn annotation(category: Category, x: u32, y: u32, w: u32, h: u32) -> Annotation {
        Annotation {
            category,
            label: category.name(),
            bounding_box: BoundingBoxKey::new(x, y, w, h),
        }
    }

    #[test]
    fn annotate_outlines_without_filling() {
        let frame = RgbImage::new(40, 40);
        let out = annotate(&frame, &[annotation(Category::Animal, 5, 5, 10, 10)]);

        assert_eq!(*out.get_pixel(5, 5), category_color(Category::Animal));
        assert_eq!(*out.get_pixel(14, 14), category_color(Category::Animal));
        assert_eq!(*out.get_pixel(10, 10), Rgb([0, 0, 0]));
        // The input frame is untouched.
        assert_eq!(*frame.get_pixel(5, 5), Rgb([0, 0, 0]));
    }

    #[test]
    fn png_sink_writes_frames_and_stages() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = PngSequenceSink::create(dir.path().join("out")).unwrap();

        let frame = RgbImage::new(16, 16);
        let mut stages = StageImages::default();
        stages.push("mask", GrayImage::new(16, 16));
        let counts = CounterTable::default();
        let annotations = [annotation(Category::Child, 1, 1, 4, 8)];
        let summary = vec!["Child: 1".to_string()];

        sink.render(&RenderRequest {
            frame_index: 3,
            frame: &frame,
            annotations: &annotations,
            counts: &counts,
            summary: &summary,
            stages: Some(&stages),
        })
        .unwrap();

        assert!(sink.directory().join("frame_000003.png").is_file());
        assert!(sink.directory().join("frame_000003_mask.png").is_file());
        assert_eq!(sink.frames_written(), 1);

        let reloaded = image::open(sink.directory().join("frame_000003.png")).unwrap().to_rgb8();
        assert_eq!(*reloaded.get_pixel(1, 1), category_color(Category::Child));
    }

    #[test]
    fn label_line_names_the_label_and_box() {
        let line = label_line(&Annotation {
            category: Category::StandingHuman,
            label: "Adult",
            bounding_box: BoundingBoxKey::new(12, 7, 30, 80),
        });
        assert_eq!(line, "Adult at (12, 7) 30x80");
    }

    #[test]
    fn log_sink_accepts_empty_frames() {
        let frame = RgbImage::new(4, 4);
        let counts = CounterTable::default();
        let request = RenderRequest {
            frame_index: 0,
            frame: &frame,
            annotations: &[],
            counts: &counts,
            summary: &[],
            stages: None,
        };
        assert!(LogSink.render(&request).is_ok());
    }
}
