// THEORY:
// This file is the main entry point for the `census_vision` library crate.
// It exposes `CensusPipeline` and its configuration as the high-level API:
// frames go in through a `FrameSource`, counts and labelled boxes come out
// through a `RenderSink`. The stages themselves (`core_modules`) stay public
// so that front ends and tests can drive them one at a time, but a normal
// consumer only needs the re-exports below.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod pipeline;

pub use config::{PipelineConfig, Preset};
pub use core_modules::blob::{BoundingBoxKey, Detection};
pub use core_modules::census::{CounterTable, CountingPolicy};
pub use core_modules::classifier::{Category, ClassifierProfile};
pub use core_modules::frame::{Frame, FrameSource, StageImages, VecFrameSource};
pub use core_modules::image_sequence::ImageSequenceSource;
pub use core_modules::render::{Annotation, LogSink, PngSequenceSink, RenderRequest, RenderSink};
pub use error::{CensusError, Result};
pub use pipeline::{CensusPipeline, FrameReport, RunOutcome, RunSummary, StopHandle};
