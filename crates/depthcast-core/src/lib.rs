//! Core types and utilities for the depthcast projector-camera toolkit.
//!
//! This crate is intentionally small: 8-bit image buffers, planar
//! homographies, perspective warping and the morphology used to clean depth
//! frames. It does *not* know about cameras, segmentation or rendering.

mod homography;
mod image;
mod logger;
mod morphology;

pub use homography::{estimate_homography, homography_from_4pt, warp_perspective_gray, Homography};
pub use image::{sample_bilinear, sample_bilinear_u8, DepthFrame, GrayImage, GrayImageView, ImageError};
pub use morphology::{apply_morphology, dilate, erode, MorphStep};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
