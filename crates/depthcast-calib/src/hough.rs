//! Probabilistic Hough transform for line segments.
//!
//! Edge pixels are visited in a seeded random order and vote into a
//! `(theta, rho)` accumulator. As soon as a bin reaches the vote threshold,
//! a segment is traced from the current pixel along the bin's direction,
//! bridging gaps of up to `max_line_gap` pixels. The traced pixels are
//! removed from the image (and their votes from the accumulator) so each
//! edge pixel contributes to at most one segment.

use crate::HoughParams;
use depthcast_core::GrayImage;
use log::debug;
use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// A detected segment with sub-pixel endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub start: Point2<f64>,
    pub end: Point2<f64>,
}

impl LineSegment {
    pub fn new(start: Point2<f64>, end: Point2<f64>) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }
}

struct Accumulator {
    num_rho: usize,
    cos: Vec<f64>,
    sin: Vec<f64>,
    votes: Vec<i32>,
}

impl Accumulator {
    fn new(width: usize, height: usize, params: &HoughParams) -> Self {
        let num_angle = ((std::f64::consts::PI / params.theta).round() as usize).max(1);
        let num_rho = (((width + height) * 2 + 1) as f64 / params.rho).round() as usize;
        let (sin, cos) = (0..num_angle)
            .map(|n| {
                let t = n as f64 * params.theta;
                (t.sin() / params.rho, t.cos() / params.rho)
            })
            .unzip();
        Self {
            num_rho,
            cos,
            sin,
            votes: vec![0; num_angle * num_rho],
        }
    }

    fn bin(&self, n: usize, x: usize, y: usize) -> usize {
        let r = (x as f64 * self.cos[n] + y as f64 * self.sin[n]).round() as i64;
        let r = (r + (self.num_rho as i64 - 1) / 2).clamp(0, self.num_rho as i64 - 1);
        n * self.num_rho + r as usize
    }

    /// Add one pixel's votes; returns the strongest bin it touched.
    fn vote(&mut self, x: usize, y: usize) -> (i32, usize) {
        let mut best = (0, 0);
        for n in 0..self.cos.len() {
            let b = self.bin(n, x, y);
            self.votes[b] += 1;
            if self.votes[b] > best.0 {
                best = (self.votes[b], n);
            }
        }
        best
    }

    fn unvote(&mut self, x: usize, y: usize) {
        for n in 0..self.cos.len() {
            let b = self.bin(n, x, y);
            self.votes[b] -= 1;
        }
    }
}

/// Walk from `(x0, y0)` along the line with normal angle `theta`, collecting
/// set pixels. The walk follows the pixels it hits, one pixel either side of
/// the predicted track.
fn trace(
    edges: &[bool],
    width: usize,
    height: usize,
    x0: usize,
    y0: usize,
    theta: f64,
    max_gap: u32,
) -> Vec<usize> {
    let (dx, dy) = (-theta.sin(), theta.cos());
    let x_major = dx.abs() > dy.abs();
    let (major_len, minor_len) = if x_major {
        (width as i64, height as i64)
    } else {
        (height as i64, width as i64)
    };
    let (major_step, slope) = if x_major {
        (dx.signum() as i64, dy / dx.abs())
    } else {
        (dy.signum() as i64, dx / dy.abs())
    };
    let (seed_major, seed_minor) = if x_major {
        (x0 as i64, y0 as f64)
    } else {
        (y0 as i64, x0 as f64)
    };
    let index = |major: i64, minor: i64| -> usize {
        if x_major {
            minor as usize * width + major as usize
        } else {
            major as usize * width + minor as usize
        }
    };

    let mut hits = vec![y0 * width + x0];
    for k in [1i64, -1] {
        let mut major = seed_major;
        let mut minor = seed_minor;
        let mut gap = 0;
        loop {
            major += k * major_step;
            minor += k as f64 * slope;
            if major < 0 || major >= major_len {
                break;
            }
            let track = minor.round() as i64;
            let hit = [0i64, -1, 1].into_iter().find(|&o| {
                let m = track + o;
                m >= 0 && m < minor_len && edges[index(major, m)]
            });
            match hit {
                Some(o) => {
                    hits.push(index(major, track + o));
                    minor += o as f64;
                    gap = 0;
                }
                None => {
                    gap += 1;
                    if gap > max_gap {
                        break;
                    }
                }
            }
        }
    }
    hits
}

/// Total least-squares fit through `pixels`, clipped to their extent.
fn fit_segment(pixels: &[usize], width: usize) -> Option<LineSegment> {
    if pixels.len() < 2 {
        return None;
    }
    let n = pixels.len() as f64;
    let pts: Vec<(f64, f64)> = pixels
        .iter()
        .map(|&i| ((i % width) as f64, (i / width) as f64))
        .collect();
    let (mx, my) = pts
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.0 / n, sy + p.1 / n));
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for &(x, y) in &pts {
        sxx += (x - mx) * (x - mx);
        syy += (y - my) * (y - my);
        sxy += (x - mx) * (y - my);
    }
    let angle = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    let (ux, uy) = (angle.cos(), angle.sin());

    let (mut t_min, mut t_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(x, y) in &pts {
        let t = (x - mx) * ux + (y - my) * uy;
        t_min = t_min.min(t);
        t_max = t_max.max(t);
    }
    Some(LineSegment::new(
        Point2::new(mx + t_min * ux, my + t_min * uy),
        Point2::new(mx + t_max * ux, my + t_max * uy),
    ))
}

/// Detect line segments among the non-zero pixels of `edges`.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "debug", skip(edges, params), fields(w = edges.width, h = edges.height))
)]
pub fn detect_segments(edges: &GrayImage, params: &HoughParams) -> Vec<LineSegment> {
    let (w, h) = (edges.width, edges.height);
    if w == 0 || h == 0 || params.rho <= 0.0 || params.theta <= 0.0 {
        return Vec::new();
    }

    let mut remaining: Vec<bool> = edges.data.iter().map(|&v| v != 0).collect();
    let mut voted = vec![false; w * h];
    let mut order: Vec<usize> = (0..w * h).filter(|&i| remaining[i]).collect();
    let mut rng = StdRng::seed_from_u64(params.seed);
    order.shuffle(&mut rng);

    let mut acc = Accumulator::new(w, h, params);
    let mut segments = Vec::new();

    for idx in order {
        if !remaining[idx] {
            continue;
        }
        let (x, y) = (idx % w, idx / w);
        let (votes, n) = acc.vote(x, y);
        voted[idx] = true;
        if votes < params.threshold as i32 {
            continue;
        }

        let theta = n as f64 * params.theta;
        let pixels = trace(&remaining, w, h, x, y, theta, params.max_line_gap);
        let segment = fit_segment(&pixels, w);
        let good = segment.is_some_and(|s| s.length() >= params.min_line_length);

        for &p in &pixels {
            if good && voted[p] {
                acc.unvote(p % w, p / w);
            }
            remaining[p] = false;
        }
        if let (true, Some(s)) = (good, segment) {
            segments.push(s);
        }
    }

    debug!("hough: {} segments", segments.len());
    segments
}
