// THEORY:
// `ImageSequenceSource` is the one `FrameSource` that needs nothing beyond the
// `image` crate: a directory of stills read in file-name order, one image per
// frame. It lets the whole engine run (and be tested) on machines without a
// video decoder.
//
// The directory listing is taken once in `open`. A directory with no supported
// images is an unavailable input, not an empty stream. A file that fails to
// decode mid-run ends the run with `Decode`.

use crate::core_modules::frame::{Frame, FrameSource};
use crate::error::{CensusError, Result};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

const SUPPORTED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

pub struct ImageSequenceSource {
    directory: PathBuf,
    pending: VecDeque<PathBuf>,
    delivered: u64,
}

impl ImageSequenceSource {
    pub fn open(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        let entries = fs::read_dir(&directory)
            .map_err(|e| CensusError::InputUnavailable(format!("{}: {}", directory.display(), e)))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && is_supported(&path) {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(CensusError::InputUnavailable(format!(
                "{} contains no png, jpg or bmp images",
                directory.display()
            )));
        }

        log::info!("found {} images in {}", files.len(), directory.display());
        Ok(Self {
            directory,
            pending: files.into(),
            delivered: 0,
        })
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn describe(&self) -> String {
        self.directory.display().to_string()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };
        let index = self.delivered;
        self.delivered += 1;

        let decoded = image::open(&path).map_err(|e| CensusError::Decode {
            source_name: path.display().to_string(),
            index,
            reason: e.to_string(),
        })?;
        Ok(Some(decoded.to_rgb8()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_frame(dir: &Path, name: &str, value: u8) {
        RgbImage::from_pixel(4, 3, Rgb([value, value, value]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn frames_come_out_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "frame_002.png", 20);
        write_frame(dir.path(), "frame_001.png", 10);
        write_frame(dir.path(), "frame_003.bmp", 30);
        fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

        let mut source = ImageSequenceSource::open(dir.path()).unwrap();
        assert_eq!(source.remaining(), 3);

        let mut values = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            assert_eq!(frame.dimensions(), (4, 3));
            values.push(frame.get_pixel(0, 0)[0]);
        }
        assert_eq!(values, vec![10, 20, 30]);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn a_directory_without_images_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("readme.md"), "nothing").unwrap();
        assert!(matches!(
            ImageSequenceSource::open(dir.path()),
            Err(CensusError::InputUnavailable(_))
        ));
    }

    #[test]
    fn a_missing_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageSequenceSource::open(dir.path().join("absent")),
            Err(CensusError::InputUnavailable(_))
        ));
    }

    #[test]
    fn a_corrupt_image_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "a.png", 1);
        fs::write(dir.path().join("b.png"), b"definitely not a png").unwrap();

        let mut source = ImageSequenceSource::open(dir.path()).unwrap();
        assert!(source.next_frame().unwrap().is_some());
        match source.next_frame() {
            Err(CensusError::Decode { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected a decode error, got {:?}", other.map(|f| f.is_some())),
        }
    }
}
