//! Projector-camera calibration from a quadrilateral target.
//!
//! While the projector shows a full-white frame, the lit area seen by the
//! camera is a quadrilateral. [`locate_target`] segments it out of the
//! intensity frame, and [`calibrate`] turns the resulting mask into the
//! homography from camera pixels to the projector's output rectangle:
//!
//! 1. outer contour of the mask and its convex hull,
//! 2. probabilistic Hough segments on the hull outline (exactly 4),
//! 3. pairwise line intersections inside the frame (exactly 4),
//! 4. corner separation check and matching to the canonical corners,
//! 5. 4-point homography.
//!
//! Every failure is a [`CalibrationError`]; callers keep their previous
//! homography and retry.

mod calibrate;
mod contour;
mod corners;
mod error;
mod hough;
mod lines;
mod params;
mod raster;
mod target;

pub use calibrate::{calibrate, calibrate_detailed, homography_from_segments, hull_outline, Calibration};
pub use contour::{convex_hull, trace_outer_contour};
pub use corners::{canonical_corners, check_separation, intersect_lines, match_canonical, CornerSet};
pub use error::{CalibrationError, CornerFailure, DegenerateReason};
pub use hough::{detect_segments, LineSegment};
pub use lines::ImplicitLine;
pub use params::{CalibrationParams, HoughParams, TargetSearchParams};
pub use raster::{draw_line, draw_polygon, fill_polygon};
pub use target::{locate_target, target_threshold};
