use serde::Serialize;

/// Why the four target corners could not be located.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CornerFailure {
    /// The hull outline produced this many line segments instead of 4.
    LineCount(usize),
    /// The segments intersected inside the frame this many times instead of 4.
    CornerCount(usize),
}

impl std::fmt::Display for CornerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CornerFailure::LineCount(n) => write!(f, "expected 4 line segments, found {n}"),
            CornerFailure::CornerCount(n) => write!(f, "expected 4 corners, found {n}"),
        }
    }
}

/// Why the located corners cannot define a homography.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum DegenerateReason {
    CornersTooClose { distance: f64, min: f64 },
    /// Two found corners are equally close to one canonical corner.
    AmbiguousMatch { canonical: usize },
    /// Two canonical corners picked the same found corner.
    SharedCorner { found: usize },
    SingularHomography,
}

impl std::fmt::Display for DegenerateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegenerateReason::CornersTooClose { distance, min } => {
                write!(f, "corners {distance:.2}px apart (minimum {min:.2}px)")
            }
            DegenerateReason::AmbiguousMatch { canonical } => {
                write!(f, "canonical corner {canonical} has two equally close matches")
            }
            DegenerateReason::SharedCorner { found } => {
                write!(f, "found corner {found} matched more than one canonical corner")
            }
            DegenerateReason::SingularHomography => write!(f, "homography system is singular"),
        }
    }
}

/// Errors returned by the calibration engine. All of them are recoverable:
/// the caller keeps its previous homography and may retry.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("corner detection failed: {0}")]
    CornerDetectionFailure(CornerFailure),
    #[error("degenerate target geometry: {0}")]
    DegenerateGeometry(DegenerateReason),
    #[error("target mask is empty")]
    EmptyMask,
    #[error("no calibration target found (largest region {best_area} px, need {min_area} px)")]
    TargetNotFound { best_area: usize, min_area: usize },
}
