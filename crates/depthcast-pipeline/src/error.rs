use depthcast_segment::SegmentationParamsError;
use std::path::PathBuf;

/// Errors raised by a [`crate::DepthCamera`].
#[derive(thiserror::Error, Debug)]
pub enum CameraError {
    #[error("camera is not open")]
    NotOpen,
    #[error("failed to open camera: {0}")]
    Open(String),
    #[error("frame grab failed: {0}")]
    Grab(String),
    #[error("no frames found in {0}")]
    NoFrames(PathBuf),
    #[error("frame {path} is {got:?}, expected {expected:?}")]
    SizeMismatch {
        path: PathBuf,
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Errors raised while loading or validating [`crate::Settings`].
#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Segmentation(#[from] SegmentationParamsError),
    #[error("unsupported camera resolution {width}x{height}")]
    UnsupportedResolution { width: usize, height: usize },
    #[error("projector size must be non-zero (got {width}x{height})")]
    InvalidProjector { width: usize, height: usize },
    #[error("frames_to_aggregate must be at least 1")]
    ZeroAggregation,
}

#[derive(thiserror::Error, Debug)]
pub enum DisplayError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Errors that stop the pipeline.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("camera failed to open")]
    CameraOpen(#[source] CameraError),
    #[error("camera failed to restart")]
    CameraRestart(#[source] CameraError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("failed to spawn {0} thread")]
    Spawn(&'static str, #[source] std::io::Error),
    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}
