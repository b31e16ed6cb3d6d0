use crate::{CalibrationError, CornerFailure, DegenerateReason, ImplicitLine};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Four target corners in canonical order: top-right, bottom-right,
/// top-left, bottom-left.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CornerSet {
    pub corners: [Point2<f64>; 4],
}

impl CornerSet {
    pub fn top_right(&self) -> Point2<f64> {
        self.corners[0]
    }

    pub fn bottom_right(&self) -> Point2<f64> {
        self.corners[1]
    }

    pub fn top_left(&self) -> Point2<f64> {
        self.corners[2]
    }

    pub fn bottom_left(&self) -> Point2<f64> {
        self.corners[3]
    }
}

/// Corners of the projector's output rectangle, in [`CornerSet`] order.
pub fn canonical_corners(width: usize, height: usize) -> [Point2<f64>; 4] {
    let (w, h) = (width as f64, height as f64);
    [
        Point2::new(w, 0.0),
        Point2::new(w, h),
        Point2::new(0.0, 0.0),
        Point2::new(0.0, h),
    ]
}

/// Intersect every unordered pair of lines, keeping non-parallel pairs that
/// meet inside `0 <= x < width, 0 <= y < height`. Exactly four points must
/// survive.
pub fn intersect_lines(
    lines: &[ImplicitLine],
    width: usize,
    height: usize,
    parallel_threshold: f64,
) -> Result<Vec<Point2<f64>>, CalibrationError> {
    let mut points = Vec::new();
    for i in 0..lines.len() {
        for j in i + 1..lines.len() {
            let Some(p) = lines[i].intersect(&lines[j], parallel_threshold) else {
                continue;
            };
            if p.x >= 0.0 && p.y >= 0.0 && p.x < width as f64 && p.y < height as f64 {
                points.push(p);
            }
        }
    }
    if points.len() != 4 {
        return Err(CalibrationError::CornerDetectionFailure(
            CornerFailure::CornerCount(points.len()),
        ));
    }
    Ok(points)
}

/// Reject corner sets where two corners are closer than `min_separation`.
pub fn check_separation(points: &[Point2<f64>], min_separation: f64) -> Result<(), CalibrationError> {
    for i in 0..points.len() {
        for j in i + 1..points.len() {
            let distance = (points[i] - points[j]).norm();
            if distance < min_separation {
                return Err(CalibrationError::DegenerateGeometry(
                    DegenerateReason::CornersTooClose {
                        distance,
                        min: min_separation,
                    },
                ));
            }
        }
    }
    Ok(())
}

/// Assign each canonical corner its nearest found corner (squared distance).
///
/// An exact tie for the nearest, or two canonical corners sharing one found
/// corner, is a failure rather than being broken arbitrarily.
pub fn match_canonical(
    found: &[Point2<f64>; 4],
    canonical: &[Point2<f64>; 4],
) -> Result<CornerSet, CalibrationError> {
    let mut chosen = [0usize; 4];
    for (c_idx, c) in canonical.iter().enumerate() {
        let mut best: Option<(f64, usize)> = None;
        let mut tied = false;
        for (f_idx, f) in found.iter().enumerate() {
            let d2 = (f - c).norm_squared();
            match best {
                Some((bd, _)) if d2 == bd => tied = true,
                Some((bd, _)) if d2 > bd => {}
                _ => {
                    best = Some((d2, f_idx));
                    tied = false;
                }
            }
        }
        if tied {
            return Err(CalibrationError::DegenerateGeometry(
                DegenerateReason::AmbiguousMatch { canonical: c_idx },
            ));
        }
        let Some((_, f_idx)) = best else {
            return Err(CalibrationError::CornerDetectionFailure(
                CornerFailure::CornerCount(0),
            ));
        };
        if chosen[..c_idx].contains(&f_idx) {
            return Err(CalibrationError::DegenerateGeometry(
                DegenerateReason::SharedCorner { found: f_idx },
            ));
        }
        chosen[c_idx] = f_idx;
    }
    Ok(CornerSet {
        corners: chosen.map(|i| found[i]),
    })
}
