//! Grayscale erosion and dilation with an elliptical structuring element.
//!
//! Used to knock out speckle in depth frames before segmentation. Pixels
//! outside the image never take part in the min/max, so borders are not
//! eroded towards zero.

use crate::GrayImage;
use serde::{Deserialize, Serialize};

/// One preprocessing step; steps run in list order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MorphStep {
    Erode { radius: u32 },
    Dilate { radius: u32 },
}

/// Half-width of each row of a `(2r+1) x (2r+1)` ellipse, indexed by `dy + r`.
fn ellipse_rows(radius: u32) -> Vec<i64> {
    let r = radius as i64;
    let r2 = (r * r) as f64;
    (-r..=r)
        .map(|dy| {
            if r == 0 {
                0
            } else {
                (r2 - (dy * dy) as f64).max(0.0).sqrt().round() as i64
            }
        })
        .collect()
}

fn morph(src: &GrayImage, radius: u32, pick: fn(u8, u8) -> u8) -> GrayImage {
    if radius == 0 || src.is_empty() {
        return src.clone();
    }
    let rows = ellipse_rows(radius);
    let r = radius as i64;
    let w = src.width as i64;
    let h = src.height as i64;
    let mut out = src.clone();

    for y in 0..h {
        for x in 0..w {
            let mut acc = src.data[(y * w + x) as usize];
            for (i, &half) in rows.iter().enumerate() {
                let yy = y + i as i64 - r;
                if yy < 0 || yy >= h {
                    continue;
                }
                let x0 = (x - half).max(0);
                let x1 = (x + half).min(w - 1);
                let row = &src.data[(yy * w) as usize..((yy + 1) * w) as usize];
                for &v in &row[x0 as usize..=x1 as usize] {
                    acc = pick(acc, v);
                }
            }
            out.data[(y * w + x) as usize] = acc;
        }
    }
    out
}

pub fn erode(src: &GrayImage, radius: u32) -> GrayImage {
    morph(src, radius, u8::min)
}

pub fn dilate(src: &GrayImage, radius: u32) -> GrayImage {
    morph(src, radius, u8::max)
}

/// Run `steps` in order. An empty list returns a copy of `src`.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(src), fields(w = src.width, h = src.height)))]
pub fn apply_morphology(src: &GrayImage, steps: &[MorphStep]) -> GrayImage {
    let mut img = src.clone();
    for step in steps {
        img = match *step {
            MorphStep::Erode { radius } => erode(&img, radius),
            MorphStep::Dilate { radius } => dilate(&img, radius),
        };
    }
    img
}
