use anyhow::{Context, Result};
use census_vision::{
    CensusError, CensusPipeline, FrameSource, ImageSequenceSource, PipelineConfig, PngSequenceSink,
    Preset, RenderSink, StopHandle,
};
use clap::Parser;
use std::path::{Path, PathBuf};

#[cfg(feature = "opencv")]
mod video;
#[cfg(feature = "opencv")]
mod window;

const ABOUT: &str = "census_viewer finds moving or outlined shapes in a video, sorts them into \
adults, children, animals and unknown objects by size and proportion, and keeps a running count. \
Press 'q' in the video window or Ctrl-C to stop.";

#[derive(Parser, Debug)]
#[command(name = "census_viewer", version, about = "Counts people and animals in a video")]
struct Args {
    /// A video file (requires the `opencv` feature) or a directory of still images.
    input: Option<PathBuf>,

    /// TOML configuration file. Takes precedence over --preset.
    #[arg(long)]
    config: Option<PathBuf>,

    /// household, posture-edges or posture-motion.
    #[arg(long)]
    preset: Option<Preset>,

    /// Write annotated frames as PNG files here instead of showing them.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Also render every intermediate stage image.
    #[arg(long)]
    stages: bool,

    /// Print a short description and exit.
    #[arg(long)]
    about: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.about {
        println!("{ABOUT}");
        return Ok(());
    }

    let input = args
        .input
        .clone()
        .ok_or_else(|| CensusError::InputUnavailable("no input selected".to_string()))?;

    let mut config = match (&args.config, args.preset) {
        (Some(path), preset) => {
            if let Some(preset) = preset {
                log::warn!("--preset {} ignored, {} decides the preset", preset, path.display());
            }
            PipelineConfig::load(path)?
        }
        (None, preset) => PipelineConfig::preset(preset.unwrap_or_default()),
    };
    if args.stages {
        config.capture_stages = true;
    }

    let stop = StopHandle::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || handler_stop.request_stop()).context("error setting Ctrl-C handler")?;

    let mut source = open_source(&input)?;
    let mut sink = open_sink(&args, &stop)?;
    let mut pipeline = CensusPipeline::new(config)?;

    let summary = pipeline.run(&mut source, &mut sink, &stop)?;

    println!("Frames processed: {} ({:?})", summary.frames_processed, summary.outcome);
    for line in pipeline.summary_lines(&summary.counts) {
        println!("{line}");
    }
    Ok(())
}

fn open_source(input: &Path) -> Result<Box<dyn FrameSource>> {
    if input.is_dir() {
        return Ok(Box::new(ImageSequenceSource::open(input)?));
    }
    open_video(input)
}

#[cfg(feature = "opencv")]
fn open_video(input: &Path) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(video::VideoFileSource::open(input)?))
}

#[cfg(not(feature = "opencv"))]
fn open_video(input: &Path) -> Result<Box<dyn FrameSource>> {
    Err(CensusError::InputUnavailable(format!(
        "{} is not a directory of images; video files need the `opencv` feature",
        input.display()
    ))
    .into())
}

fn open_sink(args: &Args, stop: &StopHandle) -> Result<Box<dyn RenderSink>> {
    if let Some(dir) = &args.output_dir {
        return Ok(Box::new(PngSequenceSink::create(dir)?));
    }
    open_window(stop)
}

#[cfg(feature = "opencv")]
fn open_window(stop: &StopHandle) -> Result<Box<dyn RenderSink>> {
    Ok(Box::new(window::WindowSink::new(stop.clone())))
}

#[cfg(not(feature = "opencv"))]
fn open_window(_stop: &StopHandle) -> Result<Box<dyn RenderSink>> {
    log::info!("built without the `opencv` feature, logging detections only");
    Ok(Box::new(census_vision::LogSink))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn preset_flag_parses() {
        let args = Args::try_parse_from(["census_viewer", "clips", "--preset", "posture-motion", "--stages"]).unwrap();
        assert_eq!(args.preset, Some(Preset::PostureMotion));
        assert!(args.stages);
        assert!(Args::try_parse_from(["census_viewer", "--preset", "garage"]).is_err());
    }

    #[test]
    fn a_missing_input_cannot_be_opened() {
        let missing = std::env::temp_dir().join("census_viewer_missing_input");
        assert!(open_source(&missing).is_err());
    }
}
