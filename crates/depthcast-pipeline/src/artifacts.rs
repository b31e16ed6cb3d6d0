//! PNG input and debug output.

use crate::OutputSettings;
use depthcast_calib::{draw_line, Calibration};
use depthcast_core::GrayImage;
use depthcast_segment::RegionList;
use image::error::{ParameterError, ParameterErrorKind};
use image::{ImageBuffer, ImageError, ImageReader, Luma, RgbImage};
use log::{debug, warn};
use nalgebra::Point2;
use std::path::{Path, PathBuf};

pub const ROI_MASK_FILE: &str = "ROI_mask.png";

fn dimension_mismatch() -> ImageError {
    ImageError::Parameter(ParameterError::from_kind(
        ParameterErrorKind::DimensionMismatch,
    ))
}

pub fn load_gray_png(path: impl AsRef<Path>) -> Result<GrayImage, ImageError> {
    let img = ImageReader::open(path)?.decode()?.to_luma8();
    let (w, h) = (img.width() as usize, img.height() as usize);
    GrayImage::from_raw(w, h, img.into_raw()).map_err(|_| dimension_mismatch())
}

pub fn save_gray_png(img: &GrayImage, path: impl AsRef<Path>) -> Result<(), ImageError> {
    let buf = ImageBuffer::<Luma<u8>, _>::from_raw(
        img.width as u32,
        img.height as u32,
        img.data.clone(),
    )
    .ok_or_else(dimension_mismatch)?;
    buf.save(path)
}

/// Spread region ids over the gray range so small ids stay visible.
pub fn label_overview(regions: &RegionList) -> GrayImage {
    let mut out = regions.label_image();
    let n = regions.len().max(1) as u32;
    for v in &mut out.data {
        if *v != 0 {
            *v = ((*v as u32 * 255) / n).clamp(1, 255) as u8;
        }
    }
    out
}

/// Writes debug images into the output directory. Failures are logged and
/// never interrupt the caller.
#[derive(Clone, Debug)]
pub struct ArtifactWriter {
    dir: PathBuf,
    debug_images: bool,
}

impl ArtifactWriter {
    pub fn new(output: &OutputSettings) -> Self {
        Self {
            dir: output.dir.clone(),
            debug_images: output.save_debug_images,
        }
    }

    pub fn enabled(&self) -> bool {
        self.debug_images
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_dir(&self) -> bool {
        match std::fs::create_dir_all(&self.dir) {
            Ok(()) => true,
            Err(e) => {
                warn!("cannot create {}: {e}", self.dir.display());
                false
            }
        }
    }

    fn gray(&self, name: &str, img: &GrayImage) {
        if !self.ensure_dir() {
            return;
        }
        let path = self.dir.join(name);
        match save_gray_png(img, &path) {
            Ok(()) => debug!("wrote {}", path.display()),
            Err(e) => warn!("failed to write {}: {e}", path.display()),
        }
    }

    /// One PNG per region plus the label overview.
    pub fn write_regions(&self, regions: &RegionList) {
        if !self.debug_images {
            return;
        }
        for (i, mask) in regions.iter().enumerate() {
            self.gray(&format!("mask_{i}.png"), &mask.to_gray_image());
        }
        self.gray("objects.png", &label_overview(regions));
    }

    pub fn write_warped(&self, depth: &GrayImage) {
        if self.debug_images {
            self.gray("warped.png", depth);
        }
    }

    pub fn write_roi(&self, roi: &GrayImage) {
        if self.debug_images {
            self.gray(ROI_MASK_FILE, roi);
        }
    }

    /// Hull outline and the detected sides.
    pub fn write_calibration(&self, cal: &Calibration) {
        if !self.debug_images {
            return;
        }
        self.gray("hull.png", &cal.outline);
        let mut lines = GrayImage::new(cal.outline.width, cal.outline.height);
        for s in &cal.segments {
            let a = Point2::new(s.start.x.round() as i32, s.start.y.round() as i32);
            let b = Point2::new(s.end.x.round() as i32, s.end.y.round() as i32);
            draw_line(&mut lines, a, b, u8::MAX);
        }
        self.gray("lines.png", &lines);
    }

    pub fn write_preview(&self, frame: &RgbImage) {
        if !self.debug_images || !self.ensure_dir() {
            return;
        }
        let path = self.dir.join("preview.png");
        if let Err(e) = frame.save(&path) {
            warn!("failed to write {}: {e}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depthcast_segment::{segment, SegmentationParams};

    #[test]
    fn png_round_trip_keeps_pixels() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("depth.png");
        let mut img = GrayImage::new(5, 3);
        img.set(4, 2, 200);
        img.set(0, 0, 7);
        save_gray_png(&img, &path).expect("save");
        assert_eq!(load_gray_png(&path).expect("load"), img);
    }

    #[test]
    fn writer_is_silent_when_disabled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("out");
        let writer = ArtifactWriter::new(&OutputSettings {
            dir: out.clone(),
            save_debug_images: false,
        });
        writer.write_roi(&GrayImage::filled(2, 2, 255));
        assert!(!out.exists());
    }

    #[test]
    fn writer_emits_masks_and_overview() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = ArtifactWriter::new(&OutputSettings {
            dir: dir.path().to_path_buf(),
            save_debug_images: true,
        });
        let mut frame = GrayImage::new(40, 20);
        for y in 2..10 {
            for x in 2..10 {
                frame.set(x, y, 120);
                frame.set(x + 20, y + 8, 180);
            }
        }
        let regions = segment(
            &frame.view(),
            &SegmentationParams {
                min_area: 10,
                ..SegmentationParams::default()
            },
        );
        assert_eq!(regions.len(), 2);
        writer.write_regions(&regions);
        writer.write_roi(&regions.union_mask());

        assert!(dir.path().join("mask_0.png").exists());
        assert!(dir.path().join("mask_1.png").exists());
        let overview = load_gray_png(dir.path().join("objects.png")).expect("overview");
        assert_eq!(overview.get(3, 3), 127);
        assert_eq!(overview.get(25, 12), 255);
        assert!(dir.path().join(ROI_MASK_FILE).exists());
    }
}
