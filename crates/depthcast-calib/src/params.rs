use depthcast_segment::{SegmentationParams, TraversalMode};
use serde::{Deserialize, Serialize};

/// Probabilistic Hough segment detector tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoughParams {
    /// Distance resolution of the accumulator, in pixels.
    pub rho: f64,
    /// Angle resolution of the accumulator, in radians.
    pub theta: f64,
    /// Votes a bin needs before a segment is traced from it.
    pub threshold: u32,
    /// Shorter segments are discarded.
    pub min_line_length: f64,
    /// Largest run of missing pixels bridged while tracing a segment.
    pub max_line_gap: u32,
    /// Seed for the order in which edge pixels are visited.
    pub seed: u64,
}

impl Default for HoughParams {
    fn default() -> Self {
        Self {
            rho: 1.0,
            theta: std::f64::consts::PI / 180.0,
            threshold: 50,
            min_line_length: 50.0,
            max_line_gap: 10,
            seed: 0,
        }
    }
}

/// How the calibration target is found in the intensity frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetSearchParams {
    /// Smallest accepted target, in pixels.
    pub min_area: usize,
    pub z_limit: u8,
    pub medium_limit: u8,
    pub max_candidates: usize,
}

impl Default for TargetSearchParams {
    fn default() -> Self {
        Self {
            min_area: 15_000,
            z_limit: 10,
            medium_limit: 10,
            max_candidates: 4,
        }
    }
}

impl TargetSearchParams {
    /// Segmentation settings for the lit-area search once the background
    /// cutoff `min_distance` is known.
    pub fn segmentation(&self, min_distance: u8) -> SegmentationParams {
        SegmentationParams {
            z_limit: self.z_limit,
            min_distance,
            medium_limit: self.medium_limit,
            min_area: self.min_area,
            max_objects: self.max_candidates.max(1),
            traversal: TraversalMode::IterativeDirected,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationParams {
    pub hough: HoughParams,
    /// Line pairs whose determinant magnitude is below this are parallel.
    pub parallel_threshold: f64,
    /// Corners closer than this (pixels) make the target degenerate.
    pub min_corner_separation: f64,
    pub target: TargetSearchParams,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            hough: HoughParams::default(),
            parallel_threshold: 0.5,
            min_corner_separation: 10.0,
            target: TargetSearchParams::default(),
        }
    }
}
