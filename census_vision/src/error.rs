// THEORY:
// Every fallible operation in the engine reports through a single error type.
// The taxonomy is small: a run either starts (the input opened)
// or it does not, and once running, each frame either flows through every
// stage or the run ends. End-of-stream is *not* an error; sources signal it
// with `Ok(None)`. Degenerate geometry is *not* an error either; the
// classifier answers `Unknown` for it.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CensusError {
    /// No input was selected, or the selected input could not be opened.
    #[error("input unavailable: {0}")]
    InputUnavailable(String),

    /// A frame could not be read or decoded mid-stream.
    #[error("failed to decode frame {index} from {source_name}: {reason}")]
    Decode {
        source_name: String,
        index: u64,
        reason: String,
    },

    /// The background model is sized by the first frame of a run.
    #[error("frame size changed from {expected:?} to {actual:?}")]
    FrameSizeChanged {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("frame has no pixels")]
    EmptyFrame,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse configuration {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("render sink failed: {0}")]
    Render(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, CensusError>;
