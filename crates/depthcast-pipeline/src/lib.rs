//! Acquisition, processing and projection loop for depthcast.
//!
//! A [`Pipeline`] joins a [`DepthCamera`] and a [`Display`] with two threads:
//!
//! - the producer grabs depth frames, aggregates and cleans them, warps them
//!   into projector space with the current homography and segments them;
//! - the consumer renders the latest result in the selected [`RenderMode`]
//!   and maps key presses to [`Command`]s.
//!
//! Calibration, settings reloads and camera restarts are requested through
//! [`ControlFlags`] and carried out by the producer between frames.
//!
//! ```no_run
//! use depthcast_pipeline::{
//!     FixedSource, HeadlessDisplay, Pipeline, ReplayCamera, Settings,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::default();
//! let camera = ReplayCamera::new("recordings/")?;
//! let display = HeadlessDisplay::stdin()?;
//! let pipeline = Pipeline::new(
//!     settings.clone(),
//!     Box::new(FixedSource::new(settings)),
//!     Box::new(camera),
//!     Box::new(display),
//! )?;
//! let summary = pipeline.run()?;
//! println!("{} frames rendered", summary.stats.frames_rendered);
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
mod camera;
mod control;
mod display;
mod error;
mod pipeline;
pub mod render;
mod settings;
mod shared;

pub use camera::{
    CameraProbe, CapturedFrame, DepthCamera, FrameAggregator, ReplayCamera, SyntheticCamera,
};
pub use control::{Command, ControlFlags, RenderMode};
pub use display::{Display, DisplayLog, HeadlessDisplay, ScriptedDisplay};
pub use error::{CameraError, DisplayError, PipelineError, SettingsError};
pub use pipeline::{Pipeline, PipelineHandle, RunSummary};
pub use settings::{
    AdjustableSetting, CameraResolution, CameraSettings, DepthMode, FixedSource, JsonFileSource,
    OutputSettings, ProjectorSettings, Settings, SettingsSource, TimingSettings,
};
pub use shared::{
    CalibrationGate, FrameSlot, GateGuard, ProcessedFrame, RunStats, SettingsSlot, Shared,
    StatsSnapshot,
};
