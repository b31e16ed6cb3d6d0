//! Projector frames for each render mode.
//!
//! Every renderer draws onto a canvas of the projector size. Frame content
//! that does not fit is clipped; missing content renders black.

use crate::{ProcessedFrame, ProjectorSettings, RenderMode};
use depthcast_segment::LabelMask;
use image::{Rgb, RgbImage};

const PALETTE: [[u8; 3]; 8] = [
    [230, 25, 75],
    [60, 180, 75],
    [255, 225, 25],
    [0, 130, 200],
    [245, 130, 48],
    [145, 30, 180],
    [70, 240, 240],
    [240, 50, 230],
];

/// Color assigned to the `index`-th region.
pub fn region_color(index: usize) -> Rgb<u8> {
    Rgb(PALETTE[index % PALETTE.len()])
}

/// Animated fill used inside a region in [`RenderMode::Patterns`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pattern {
    Gradient,
    Checker,
    Stripes,
    Pulse,
}

impl Pattern {
    const ALL: [Pattern; 4] = [Self::Gradient, Self::Checker, Self::Stripes, Self::Pulse];

    pub fn for_region(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    fn shade(self, x: u32, y: u32, tick: u64, base: Rgb<u8>) -> Rgb<u8> {
        let t = tick as u32;
        let scale = |k: u32| Rgb(base.0.map(|c| ((c as u32 * k) / 255) as u8));
        match self {
            Self::Gradient => scale((x + 4 * t) % 256),
            Self::Checker => {
                if ((x + t) / 16 + y / 16) % 2 == 0 {
                    base
                } else {
                    Rgb([0, 0, 0])
                }
            }
            Self::Stripes => {
                if ((x + y + 2 * t) / 8) % 2 == 0 {
                    base
                } else {
                    scale(64)
                }
            }
            Self::Pulse => {
                let phase = (t * 8) % 512;
                let level = if phase < 256 { phase } else { 511 - phase };
                scale(level.max(32))
            }
        }
    }
}

fn canvas(projector: &ProjectorSettings) -> RgbImage {
    RgbImage::new(projector.width as u32, projector.height as u32)
}

/// Full-white frame shown while the calibration target is captured.
pub fn calibration_target(projector: &ProjectorSettings) -> RgbImage {
    RgbImage::from_pixel(
        projector.width as u32,
        projector.height as u32,
        Rgb([255, 255, 255]),
    )
}

pub fn test_pattern(projector: &ProjectorSettings) -> RgbImage {
    let cell = (projector.width.max(projector.height) / 16).max(1) as u32;
    RgbImage::from_fn(projector.width as u32, projector.height as u32, |x, y| {
        if (x / cell + y / cell) % 2 == 0 {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    })
}

fn paint_mask(out: &mut RgbImage, mask: &LabelMask, mut color: impl FnMut(u32, u32) -> Rgb<u8>) {
    for idx in mask.pixel_indices() {
        let x = (idx % mask.width) as u32;
        let y = (idx / mask.width) as u32;
        if x < out.width() && y < out.height() {
            out.put_pixel(x, y, color(x, y));
        }
    }
}

/// Render one frame. `tick` advances the pattern animation.
pub fn render_frame(
    mode: RenderMode,
    frame: Option<&ProcessedFrame>,
    projector: &ProjectorSettings,
    tick: u64,
) -> RgbImage {
    match (mode, frame) {
        (RenderMode::Blank, _) => canvas(projector),
        (RenderMode::Solid, _) => {
            let v = projector.solid_level;
            RgbImage::from_pixel(projector.width as u32, projector.height as u32, Rgb([v, v, v]))
        }
        (RenderMode::TestPattern, _) => test_pattern(projector),
        (RenderMode::Depth, Some(f)) => {
            let mut out = canvas(projector);
            let w = out.width().min(f.depth.width as u32);
            let h = out.height().min(f.depth.height as u32);
            for y in 0..h {
                for x in 0..w {
                    let v = f.depth.get(x as usize, y as usize);
                    out.put_pixel(x, y, Rgb([v, v, v]));
                }
            }
            out
        }
        (RenderMode::Regions, Some(f)) => {
            let mut out = canvas(projector);
            for (i, mask) in f.regions.iter().enumerate() {
                let c = region_color(i);
                paint_mask(&mut out, mask, |_, _| c);
            }
            out
        }
        (RenderMode::Patterns, Some(f)) => {
            let mut out = canvas(projector);
            for (i, mask) in f.regions.iter().enumerate() {
                let pattern = Pattern::for_region(i);
                let base = region_color(i);
                paint_mask(&mut out, mask, |x, y| pattern.shade(x, y, tick, base));
            }
            out
        }
        (RenderMode::Depth | RenderMode::Regions | RenderMode::Patterns, None) => canvas(projector),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depthcast_core::{GrayImage, Homography};
    use depthcast_segment::RegionList;

    fn projector(w: usize, h: usize) -> ProjectorSettings {
        ProjectorSettings {
            width: w,
            height: h,
            solid_level: 100,
        }
    }

    fn frame_with_square() -> ProcessedFrame {
        let mut depth = GrayImage::new(20, 10);
        let mut mask = GrayImage::new(20, 10);
        for y in 2..6 {
            for x in 3..8 {
                depth.set(x, y, 150);
                mask.set(x, y, 255);
            }
        }
        let region = LabelMask::from_gray(1, &mask).expect("mask");
        ProcessedFrame {
            version: 1,
            depth,
            regions: RegionList {
                width: 20,
                height: 10,
                regions: vec![region],
                ..RegionList::default()
            },
            homography: Homography::identity(),
        }
    }

    fn is_black(img: &RgbImage) -> bool {
        img.pixels().all(|p| p.0 == [0, 0, 0])
    }

    #[test]
    fn modes_without_a_frame_render_black() {
        let p = projector(8, 6);
        for mode in [RenderMode::Blank, RenderMode::Depth, RenderMode::Regions, RenderMode::Patterns] {
            let img = render_frame(mode, None, &p, 0);
            assert_eq!(img.dimensions(), (8, 6));
            assert!(is_black(&img), "{mode:?}");
        }
    }

    #[test]
    fn solid_and_target_fill_the_canvas() {
        let p = projector(4, 3);
        assert!(render_frame(RenderMode::Solid, None, &p, 0)
            .pixels()
            .all(|px| px.0 == [100, 100, 100]));
        assert!(calibration_target(&p).pixels().all(|px| px.0 == [255; 3]));
    }

    #[test]
    fn regions_are_colored_and_clipped() {
        let frame = frame_with_square();
        let img = render_frame(RenderMode::Regions, Some(&frame), &projector(6, 4), 0);
        assert_eq!(img.dimensions(), (6, 4));
        assert_eq!(*img.get_pixel(3, 2), region_color(0));
        assert_eq!(*img.get_pixel(0, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn depth_mode_copies_gray_levels() {
        let frame = frame_with_square();
        let img = render_frame(RenderMode::Depth, Some(&frame), &projector(30, 12), 0);
        assert_eq!(img.get_pixel(4, 3).0, [150, 150, 150]);
        assert_eq!(img.get_pixel(25, 11).0, [0, 0, 0]);
    }

    #[test]
    fn patterns_stay_inside_regions() {
        let frame = frame_with_square();
        let img = render_frame(RenderMode::Patterns, Some(&frame), &projector(20, 10), 7);
        for (x, y, px) in img.enumerate_pixels() {
            if !frame.regions.regions[0].contains(x as usize, y as usize) {
                assert_eq!(px.0, [0, 0, 0]);
            }
        }
    }

    #[test]
    fn test_pattern_alternates() {
        let img = test_pattern(&projector(32, 16));
        assert_eq!(img.get_pixel(0, 0).0, [255; 3]);
        assert_eq!(img.get_pixel(2, 0).0, [0; 3]);
    }
}
