//! Single-image segmentation and calibration, writing their results to disk.

use crate::calib::{calibrate_detailed, locate_target, CalibrationError, CornerSet, LineSegment};
use crate::core::{apply_morphology, GrayImage, Homography, MorphStep};
use crate::pipeline::artifacts::{
    label_overview, load_gray_png, save_gray_png, ArtifactWriter, ROI_MASK_FILE,
};
use crate::pipeline::Settings;
use crate::segment::{segment, RegionList, SegmentationParams, SegmentationParamsError};
use log::info;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum OneShotError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("failed to read or write {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Params(#[from] SegmentationParamsError),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}

fn load(path: &Path) -> Result<GrayImage, OneShotError> {
    load_gray_png(path).map_err(|source| OneShotError::Image {
        path: path.to_path_buf(),
        source,
    })
}

fn save(img: &GrayImage, path: PathBuf) -> Result<PathBuf, OneShotError> {
    save_gray_png(img, &path).map_err(|source| OneShotError::Image {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), OneShotError> {
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

#[derive(Clone, Debug, Serialize)]
pub struct SegmentReport {
    pub input: PathBuf,
    pub params: SegmentationParams,
    pub regions: RegionList,
    /// One binary PNG per region, in region order.
    pub mask_files: Vec<PathBuf>,
}

pub const SEGMENT_REPORT_FILE: &str = "segments.json";

/// Segment one 8-bit depth PNG. Writes `mask_<i>.png` per region,
/// `objects.png` and [`SEGMENT_REPORT_FILE`] into `out_dir`.
pub fn segment_file(
    input: &Path,
    params: &SegmentationParams,
    preprocessing: &[MorphStep],
    out_dir: &Path,
) -> Result<SegmentReport, OneShotError> {
    params.validate()?;
    let frame = apply_morphology(&load(input)?, preprocessing);
    let regions = segment(&frame.view(), params);
    info!(
        "{}: {} regions ({} undersized, {} dropped)",
        input.display(),
        regions.len(),
        regions.undersized,
        regions.dropped
    );

    fs::create_dir_all(out_dir)?;
    let mut mask_files = Vec::with_capacity(regions.len());
    for (i, mask) in regions.iter().enumerate() {
        mask_files.push(save(&mask.to_gray_image(), out_dir.join(format!("mask_{i}.png")))?);
    }
    save(&label_overview(&regions), out_dir.join("objects.png"))?;

    let report = SegmentReport {
        input: input.to_path_buf(),
        params: params.clone(),
        regions,
        mask_files,
    };
    write_json(&report, &out_dir.join(SEGMENT_REPORT_FILE))?;
    Ok(report)
}

#[derive(Clone, Debug, Serialize)]
pub struct CalibrationReport {
    pub input: PathBuf,
    pub projector_size: (usize, usize),
    pub target_area: usize,
    pub homography: Homography,
    pub corners: CornerSet,
    pub segments: Vec<LineSegment>,
}

pub const CALIBRATION_REPORT_FILE: &str = "homography.json";

/// Calibrate from one intensity PNG captured under a full-white projection.
///
/// Writes [`CALIBRATION_REPORT_FILE`] and the target mask as
/// [`ROI_MASK_FILE`]; hull and line images follow
/// `settings.output.save_debug_images`.
pub fn calibrate_file(
    input: &Path,
    settings: &Settings,
    out_dir: &Path,
) -> Result<CalibrationReport, OneShotError> {
    let intensity = load(input)?;
    let target = locate_target(&intensity, &settings.calibration.target)?;
    let projector_size = settings.projector_size();
    let cal = calibrate_detailed(&target, projector_size, &settings.calibration)?;

    fs::create_dir_all(out_dir)?;
    save(&target.to_gray_image(), out_dir.join(ROI_MASK_FILE))?;
    let mut output = settings.output.clone();
    output.dir = out_dir.to_path_buf();
    ArtifactWriter::new(&output).write_calibration(&cal);

    let report = CalibrationReport {
        input: input.to_path_buf(),
        projector_size,
        target_area: target.area,
        homography: cal.homography,
        corners: cal.corners,
        segments: cal.segments,
    };
    write_json(&report, &out_dir.join(CALIBRATION_REPORT_FILE))?;
    info!("wrote {}", out_dir.join(CALIBRATION_REPORT_FILE).display());
    Ok(report)
}
