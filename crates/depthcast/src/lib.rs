//! Facade crate for the `depthcast-*` workspace.
//!
//! A depth camera looks at a scene lit by a projector. depthcast segments
//! the depth frames into objects, calibrates the camera-to-projector
//! homography from a projected white frame and renders per-object content
//! back through the projector.
//!
//! ## API map
//! - `depthcast::core`: image buffers, homographies, warping, morphology, logging.
//! - `depthcast::segment`: region-growing segmentation of depth frames.
//! - `depthcast::calib`: calibration target localisation and homography estimation.
//! - `depthcast::pipeline`: camera/display boundaries and the two-thread live loop.
//! - `depthcast::oneshot`: single-image segmentation and calibration with file output.
//!
//! ## Quickstart
//!
//! ```no_run
//! use depthcast::oneshot::segment_file;
//! use depthcast::segment::SegmentationParams;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let report = segment_file(
//!     Path::new("depth.png"),
//!     &SegmentationParams::default(),
//!     &[],
//!     Path::new("out"),
//! )?;
//! println!("{} regions", report.regions.len());
//! # Ok(())
//! # }
//! ```

pub use depthcast_calib as calib;
pub use depthcast_core as core;
pub use depthcast_pipeline as pipeline;
pub use depthcast_segment as segment;

pub use depthcast_calib::{calibrate, CalibrationError};
pub use depthcast_core::{GrayImage, Homography};
pub use depthcast_pipeline::{Pipeline, RenderMode, Settings};
pub use depthcast_segment::{segment, RegionList, SegmentationParams};

pub mod oneshot;
