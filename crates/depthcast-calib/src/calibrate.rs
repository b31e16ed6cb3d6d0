use crate::contour::{convex_hull, trace_outer_contour};
use crate::corners::{canonical_corners, check_separation, intersect_lines, match_canonical};
use crate::raster::draw_polygon;
use crate::{
    detect_segments, CalibrationError, CalibrationParams, CornerFailure, CornerSet,
    DegenerateReason, ImplicitLine, LineSegment,
};
use depthcast_core::{homography_from_4pt, GrayImage, Homography};
use depthcast_segment::LabelMask;
use log::{debug, info};

/// Everything produced by a successful calibration.
#[derive(Clone, Debug)]
pub struct Calibration {
    /// Maps camera pixels onto the canonical projector rectangle.
    pub homography: Homography,
    /// Target corners in camera space, canonical order.
    pub corners: CornerSet,
    pub segments: Vec<LineSegment>,
    /// Convex hull outline the segments were detected on.
    pub outline: GrayImage,
}

/// Draw the convex hull outline of the mask's outer contour.
pub fn hull_outline(mask: &LabelMask) -> Result<GrayImage, CalibrationError> {
    let image = mask.to_gray_image();
    let contour = trace_outer_contour(&image);
    if contour.is_empty() {
        return Err(CalibrationError::EmptyMask);
    }
    let hull = convex_hull(&contour);
    let mut outline = GrayImage::new(mask.width, mask.height);
    draw_polygon(&mut outline, &hull, u8::MAX);
    Ok(outline)
}

/// Corner extraction and homography from already detected side segments.
///
/// `frame_size` bounds the accepted intersections; `canonical_size` is the
/// projector rectangle the corners are mapped onto.
pub fn homography_from_segments(
    segments: &[LineSegment],
    frame_size: (usize, usize),
    canonical_size: (usize, usize),
    params: &CalibrationParams,
) -> Result<(Homography, CornerSet), CalibrationError> {
    if segments.len() != 4 {
        return Err(CalibrationError::CornerDetectionFailure(
            CornerFailure::LineCount(segments.len()),
        ));
    }
    let lines: Vec<ImplicitLine> = segments
        .iter()
        .map(|s| ImplicitLine::through(s.start, s.end))
        .collect();

    let points = intersect_lines(&lines, frame_size.0, frame_size.1, params.parallel_threshold)?;
    check_separation(&points, params.min_corner_separation)?;

    let found: [_; 4] = [points[0], points[1], points[2], points[3]];
    let canonical = canonical_corners(canonical_size.0, canonical_size.1);
    let corners = match_canonical(&found, &canonical)?;
    debug!("target corners {:?}", corners.corners);

    let homography = homography_from_4pt(&corners.corners, &canonical).ok_or(
        CalibrationError::DegenerateGeometry(DegenerateReason::SingularHomography),
    )?;
    Ok((homography, corners))
}

/// Derive the camera-to-projector homography from the calibration target
/// mask.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "info", skip(target_mask, params), fields(area = target_mask.area))
)]
pub fn calibrate_detailed(
    target_mask: &LabelMask,
    canonical_size: (usize, usize),
    params: &CalibrationParams,
) -> Result<Calibration, CalibrationError> {
    if target_mask.area == 0 {
        return Err(CalibrationError::EmptyMask);
    }
    let outline = hull_outline(target_mask)?;
    let segments = detect_segments(&outline, &params.hough);
    let (homography, corners) = homography_from_segments(
        &segments,
        (target_mask.width, target_mask.height),
        canonical_size,
        params,
    )?;
    info!(
        "calibrated: {} segments, corners TL={:?} BR={:?}",
        segments.len(),
        corners.top_left(),
        corners.bottom_right()
    );
    Ok(Calibration {
        homography,
        corners,
        segments,
        outline,
    })
}

pub fn calibrate(
    target_mask: &LabelMask,
    canonical_size: (usize, usize),
    params: &CalibrationParams,
) -> Result<Homography, CalibrationError> {
    calibrate_detailed(target_mask, canonical_size, params).map(|c| c.homography)
}
