use census_vision::core_modules::render::annotate;
use census_vision::{CensusError, RenderRequest, RenderSink, Result, StopHandle};
use image::{GrayImage, RgbImage};
use opencv::{
    core::{self, Mat, Point, Scalar},
    highgui, imgproc,
    prelude::*,
};

const MAIN_WINDOW: &str = "census";
const FRAME_DELAY_MS: i32 = 30;

/// Shows the annotated frame (and any stage images) in HighGUI windows.
/// Pressing 'q' in a window requests a stop.
pub struct WindowSink {
    stop: StopHandle,
}

impl WindowSink {
    pub fn new(stop: StopHandle) -> Self {
        Self { stop }
    }
}

fn render_error(e: opencv::Error) -> CensusError {
    CensusError::Render(e.to_string())
}

fn rgb_to_mat(image: &RgbImage) -> opencv::Result<Mat> {
    let size = core::Size::new(image.width() as i32, image.height() as i32);
    let mut rgb = Mat::new_size_with_default(size, core::CV_8UC3, Scalar::all(0.0))?;
    rgb.data_bytes_mut()?.copy_from_slice(image.as_raw());
    let mut bgr = Mat::default();
    imgproc::cvt_color(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
    Ok(bgr)
}

fn gray_to_mat(image: &GrayImage) -> opencv::Result<Mat> {
    let size = core::Size::new(image.width() as i32, image.height() as i32);
    let mut gray = Mat::new_size_with_default(size, core::CV_8UC1, Scalar::all(0.0))?;
    gray.data_bytes_mut()?.copy_from_slice(image.as_raw());
    Ok(gray)
}

fn put_line(canvas: &mut Mat, text: &str, origin: Point, color: Scalar) -> opencv::Result<()> {
    imgproc::put_text(
        canvas,
        text,
        origin,
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.6,
        color,
        2,
        imgproc::LINE_8,
        false,
    )
}

impl RenderSink for WindowSink {
    fn render(&mut self, request: &RenderRequest<'_>) -> Result<()> {
        let annotated = annotate(request.frame, request.annotations);
        let mut canvas = rgb_to_mat(&annotated).map_err(render_error)?;

        for annotation in request.annotations {
            let b = annotation.bounding_box;
            let origin = Point::new(b.x as i32, (b.y as i32 - 10).max(12));
            put_line(&mut canvas, annotation.label, origin, Scalar::new(0.0, 255.0, 0.0, 0.0)).map_err(render_error)?;
        }
        for (row, line) in request.summary.iter().enumerate() {
            let origin = Point::new(10, 30 + 30 * row as i32);
            put_line(&mut canvas, line, origin, Scalar::new(255.0, 255.0, 255.0, 0.0)).map_err(render_error)?;
        }
        highgui::imshow(MAIN_WINDOW, &canvas).map_err(render_error)?;

        if let Some(stages) = request.stages {
            for (name, image) in stages.iter() {
                let mat = gray_to_mat(image).map_err(render_error)?;
                highgui::imshow(name, &mat).map_err(render_error)?;
            }
        }

        let key = highgui::wait_key(FRAME_DELAY_MS).map_err(render_error)?;
        if key == 'q' as i32 {
            log::info!("'q' pressed, stopping");
            self.stop.request_stop();
        }
        Ok(())
    }
}

impl Drop for WindowSink {
    fn drop(&mut self) {
        if let Err(e) = highgui::destroy_all_windows() {
            log::warn!("failed to close windows: {}", e);
        }
    }
}
