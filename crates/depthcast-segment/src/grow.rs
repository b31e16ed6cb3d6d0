//! Region growing over a depth frame.
//!
//! Every pixel is visited once in raster order. A foreground pixel that no
//! earlier region has claimed seeds a new region, which is flooded through
//! 4-connected neighbours under three tests:
//!
//! - the neighbour is above `min_distance`,
//! - it differs from the pixel it was reached from by at most `z_limit`,
//! - it differs from the region's running mean by at most `medium_limit`.
//!
//! Pixels claimed by a region stay claimed even when the region is later
//! discarded (too small, or over the `max_objects` cap), so regions never
//! overlap and a discarded region is never reseeded.

use crate::{LabelMask, RegionList, SegmentationParams, TraversalMode};
use depthcast_core::GrayImageView;
use log::{debug, warn};

const UNCLAIMED: u32 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Dir {
    Right,
    Down,
    Left,
    Up,
}

impl Dir {
    const ALL: [Dir; 4] = [Dir::Right, Dir::Down, Dir::Left, Dir::Up];

    fn offset(self) -> (i64, i64) {
        match self {
            Dir::Right => (1, 0),
            Dir::Down => (0, 1),
            Dir::Left => (-1, 0),
            Dir::Up => (0, -1),
        }
    }

    /// Directions explored after arriving by `self`: everything except the
    /// way back.
    fn onward(self) -> &'static [Dir] {
        match self {
            Dir::Right => &[Dir::Right, Dir::Down, Dir::Up],
            Dir::Down => &[Dir::Right, Dir::Down, Dir::Left],
            Dir::Left => &[Dir::Down, Dir::Left, Dir::Up],
            Dir::Up => &[Dir::Right, Dir::Left, Dir::Up],
        }
    }
}

/// Running state of the region being grown.
struct Growth {
    pixels: Vec<usize>,
    mean: f64,
}

impl Growth {
    fn new(seed: usize, value: u8) -> Self {
        Self {
            pixels: vec![seed],
            mean: value as f64,
        }
    }

    fn accept(&mut self, idx: usize, value: u8) {
        let n = self.pixels.len() as f64;
        self.mean = (self.mean * n + value as f64) / (n + 1.0);
        self.pixels.push(idx);
    }
}

struct Grower<'a> {
    frame: &'a GrayImageView<'a>,
    params: &'a SegmentationParams,
    claimed: Vec<u32>,
    visited: usize,
}

impl<'a> Grower<'a> {
    fn neighbour(&self, idx: usize, dir: Dir) -> Option<usize> {
        let (dx, dy) = dir.offset();
        let x = (idx % self.frame.width) as i64 + dx;
        let y = (idx / self.frame.width) as i64 + dy;
        if x < 0 || y < 0 || x >= self.frame.width as i64 || y >= self.frame.height as i64 {
            return None;
        }
        Some(y as usize * self.frame.width + x as usize)
    }

    /// Acceptance test for `idx` reached from a pixel holding `from_value`.
    fn admits(&mut self, idx: usize, from_value: u8, mean: f64) -> bool {
        self.visited += 1;
        if self.claimed[idx] != UNCLAIMED {
            return false;
        }
        let v = self.frame.data[idx];
        if v <= self.params.min_distance {
            return false;
        }
        if v.abs_diff(from_value) > self.params.z_limit {
            return false;
        }
        (v as f64 - mean).abs() <= self.params.medium_limit as f64
    }

    fn grow(&mut self, seed: usize, id: u32) -> Vec<usize> {
        self.claimed[seed] = id;
        let growth = Growth::new(seed, self.frame.data[seed]);
        let growth = match self.params.traversal {
            TraversalMode::Recursive => self.flood_full(growth, id),
            TraversalMode::IterativeDirected => self.flood_directed(growth, id),
        };
        growth.pixels
    }

    /// Depth-first over all four neighbours. Candidates are tested when
    /// popped, against the value of the pixel that pushed them.
    fn flood_full(&mut self, mut growth: Growth, id: u32) -> Growth {
        let seed = growth.pixels[0];
        let mut stack: Vec<(usize, u8)> = Vec::new();
        self.push_neighbours(&mut stack, seed);

        while let Some((idx, from_value)) = stack.pop() {
            if !self.admits(idx, from_value, growth.mean) {
                continue;
            }
            self.claimed[idx] = id;
            growth.accept(idx, self.frame.data[idx]);
            self.push_neighbours(&mut stack, idx);
        }
        growth
    }

    fn push_neighbours(&self, stack: &mut Vec<(usize, u8)>, idx: usize) {
        let value = self.frame.data[idx];
        // Reverse so that RIGHT is explored first.
        for dir in Dir::ALL.iter().rev() {
            if let Some(n) = self.neighbour(idx, *dir) {
                stack.push((n, value));
            }
        }
    }

    /// Work-list flood that skips the arrival direction. Neighbours are
    /// tested and claimed when pushed.
    fn flood_directed(&mut self, mut growth: Growth, id: u32) -> Growth {
        let seed = growth.pixels[0];
        let all: &'static [Dir] = &Dir::ALL;
        let mut work: Vec<(usize, &'static [Dir])> = vec![(seed, all)];

        while let Some((idx, dirs)) = work.pop() {
            let value = self.frame.data[idx];
            for &dir in dirs {
                let Some(n) = self.neighbour(idx, dir) else {
                    self.visited += 1;
                    continue;
                };
                if !self.admits(n, value, growth.mean) {
                    continue;
                }
                self.claimed[n] = id;
                growth.accept(n, self.frame.data[n]);
                work.push((n, dir.onward()));
            }
        }
        growth
    }
}

/// Partition `frame` into at most `params.max_objects` regions.
///
/// Regions are returned in discovery order. Once the cap is reached, later
/// regions are counted in [`RegionList::dropped`] and discarded regardless
/// of their size; the regions already accepted are never replaced.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(
        level = "info",
        skip(frame, params),
        fields(w = frame.width, h = frame.height, traversal = ?params.traversal)
    )
)]
pub fn segment(frame: &GrayImageView<'_>, params: &SegmentationParams) -> RegionList {
    let (w, h) = (frame.width, frame.height);
    let mut list = RegionList {
        width: w,
        height: h,
        ..RegionList::default()
    };
    if w == 0 || h == 0 || frame.data.len() != w * h {
        if frame.data.len() != w * h {
            warn!(
                "frame buffer length {} does not match {}x{}",
                frame.data.len(),
                w,
                h
            );
        }
        return list;
    }

    let mut grower = Grower {
        frame,
        params,
        claimed: vec![UNCLAIMED; w * h],
        visited: 0,
    };
    let mut next_id: u32 = 1;

    for seed in 0..w * h {
        grower.visited += 1;
        if frame.data[seed] <= params.min_distance || grower.claimed[seed] != UNCLAIMED {
            continue;
        }

        let pixels = grower.grow(seed, next_id);
        next_id = next_id.saturating_add(1);

        if pixels.len() < params.min_area {
            debug!(
                "region at ({}, {}) too small: {} < {}",
                seed % w,
                seed / w,
                pixels.len(),
                params.min_area
            );
            list.undersized += 1;
            continue;
        }
        if list.regions.len() >= params.max_objects {
            warn!(
                "object limit {} reached, dropping region of area {}",
                params.max_objects,
                pixels.len()
            );
            list.dropped += 1;
            continue;
        }

        let region_id = list.regions.len() as u32 + 1;
        if let Some(mask) = LabelMask::from_indices(region_id, w, h, &pixels) {
            list.regions.push(mask);
        }
    }

    list.visited = grower.visited;
    debug!(
        "segmented {}x{}: {} regions, {} undersized, {} dropped, {} visited",
        w,
        h,
        list.regions.len(),
        list.undersized,
        list.dropped,
        list.visited
    );
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use depthcast_core::GrayImage;

    fn params(traversal: TraversalMode) -> SegmentationParams {
        SegmentationParams {
            z_limit: 5,
            min_distance: 10,
            medium_limit: 5,
            min_area: 1,
            max_objects: 8,
            traversal,
        }
    }

    fn frame_from_rows(rows: &[&[u8]]) -> GrayImage {
        let h = rows.len();
        let w = rows[0].len();
        let data = rows.iter().flat_map(|r| r.iter().copied()).collect();
        GrayImage::from_raw(w, h, data).expect("rectangular rows")
    }

    #[test]
    fn onward_never_turns_back() {
        for dir in Dir::ALL {
            let (dx, dy) = dir.offset();
            for next in dir.onward() {
                assert_ne!(next.offset(), (-dx, -dy));
            }
        }
    }

    #[test]
    fn z_step_splits_regions() {
        let img = frame_from_rows(&[
            &[100, 100, 120, 120],
            &[100, 100, 120, 120],
        ]);
        for mode in [TraversalMode::Recursive, TraversalMode::IterativeDirected] {
            let list = segment(&img.view(), &params(mode));
            assert_eq!(list.len(), 2, "{mode:?}");
            assert_eq!(list.regions[0].area, 4);
            assert_eq!(list.regions[1].area, 4);
            assert_eq!(list.regions[0].region_id, 1);
            assert_eq!(list.regions[1].region_id, 2);
        }
    }

    #[test]
    fn running_mean_stops_slow_ramp() {
        // Each step is within z_limit, but the ramp drifts from the mean.
        let img = frame_from_rows(&[&[100, 104, 108, 112, 116, 120, 124, 128]]);
        let list = segment(&img.view(), &params(TraversalMode::Recursive));
        assert!(list.len() > 1);
        assert!(list.regions[0].area < 8);
    }

    #[test]
    fn background_is_never_labeled() {
        let img = frame_from_rows(&[&[0, 10, 11, 11], &[10, 10, 11, 0]]);
        let list = segment(&img.view(), &params(TraversalMode::Recursive));
        assert_eq!(list.len(), 1);
        assert_eq!(list.regions[0].area, 3);
        assert!(!list.regions[0].contains(1, 0));
    }

    #[test]
    fn undersized_regions_are_counted_not_returned() {
        let img = frame_from_rows(&[&[50, 0, 90, 90], &[0, 0, 90, 90]]);
        let mut p = params(TraversalMode::Recursive);
        p.min_area = 2;
        let list = segment(&img.view(), &p);
        assert_eq!(list.len(), 1);
        assert_eq!(list.undersized, 1);
        assert_eq!(list.regions[0].region_id, 1);
    }

    #[test]
    fn empty_frame_gives_empty_list() {
        let img = GrayImage::new(0, 0);
        let list = segment(&img.view(), &params(TraversalMode::Recursive));
        assert!(list.is_empty());
        assert_eq!(list.visited, 0);
    }

    #[test]
    fn large_region_does_not_exhaust_stack() {
        let img = GrayImage::filled(640, 480, 200);
        let mut p = params(TraversalMode::Recursive);
        p.min_area = 1000;
        let list = segment(&img.view(), &p);
        assert_eq!(list.len(), 1);
        assert_eq!(list.regions[0].area, 640 * 480);
    }
}
