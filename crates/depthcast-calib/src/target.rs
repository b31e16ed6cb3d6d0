use crate::{CalibrationError, TargetSearchParams};
use depthcast_core::GrayImage;
use depthcast_segment::{segment, LabelMask};
use log::debug;

/// Background cutoff halfway between the frame mean and its maximum.
pub fn target_threshold(intensity: &GrayImage) -> u8 {
    let (max, mean) = intensity.max_and_mean();
    let half_span = ((max as f64 - mean) / 2.0).max(0.0) as u8;
    max.saturating_sub(half_span)
}

/// Find the lit calibration target in an intensity frame captured while the
/// projector shows a full-white image.
///
/// Pixels above [`target_threshold`] are segmented and the largest region
/// is returned when it covers at least `params.min_area` pixels.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "debug", skip(intensity, params), fields(w = intensity.width, h = intensity.height))
)]
pub fn locate_target(
    intensity: &GrayImage,
    params: &TargetSearchParams,
) -> Result<LabelMask, CalibrationError> {
    if intensity.is_empty() {
        return Err(CalibrationError::EmptyMask);
    }
    let threshold = target_threshold(intensity);
    let regions = segment(&intensity.view(), &params.segmentation(threshold));
    debug!(
        "target search: threshold {}, {} candidates, {} undersized",
        threshold,
        regions.len(),
        regions.undersized
    );

    match regions.largest() {
        Some(mask) if mask.area >= params.min_area => Ok(mask.clone()),
        best => Err(CalibrationError::TargetNotFound {
            best_area: best.map_or(0, |m| m.area),
            min_area: params.min_area,
        }),
    }
}
