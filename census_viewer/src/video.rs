use census_vision::{CensusError, Frame, FrameSource, Result};
use image::RgbImage;
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use std::path::Path;

/// Decodes any container OpenCV can open, one RGB frame per call.
pub struct VideoFileSource {
    capture: VideoCapture,
    name: String,
    decoded: u64,
}

impl VideoFileSource {
    pub fn open(path: &Path) -> Result<Self> {
        let name = path.display().to_string();
        let unavailable = |reason: String| CensusError::InputUnavailable(format!("{name}: {reason}"));

        let capture = VideoCapture::from_file(&name, videoio::CAP_ANY).map_err(|e| unavailable(e.to_string()))?;
        if !capture.is_opened().map_err(|e| unavailable(e.to_string()))? {
            return Err(unavailable("could not be opened as a video".to_string()));
        }

        log::info!("opened video {}", name);
        Ok(Self {
            capture,
            name,
            decoded: 0,
        })
    }

    fn decode_error(&self, reason: impl ToString) -> CensusError {
        CensusError::Decode {
            source_name: self.name.clone(),
            index: self.decoded,
            reason: reason.to_string(),
        }
    }
}

impl FrameSource for VideoFileSource {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut bgr = Mat::default();
        let read = self.capture.read(&mut bgr).map_err(|e| self.decode_error(e))?;
        if !read || bgr.empty() {
            return Ok(None);
        }

        // BGR from the decoder, RGB for the engine.
        let mut rgb = Mat::default();
        imgproc::cvt_color(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0).map_err(|e| self.decode_error(e))?;
        let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
        let bytes = rgb.data_bytes().map_err(|e| self.decode_error(e))?.to_vec();
        let frame = RgbImage::from_raw(width, height, bytes)
            .ok_or_else(|| self.decode_error("frame buffer does not match its dimensions"))?;

        self.decoded += 1;
        Ok(Some(frame))
    }
}

impl Drop for VideoFileSource {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            log::warn!("failed to release {}: {}", self.name, e);
        }
    }
}
