//! Outer boundary tracing and convex hull of a binary mask.

use depthcast_core::GrayImage;
use nalgebra::Point2;

/// 8-neighbourhood in clockwise order (image coordinates, y down),
/// starting from west.
const RING: [(i32, i32); 8] = [
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
];

fn is_set(mask: &GrayImage, p: Point2<i32>) -> bool {
    mask.get_checked(p.x as i64, p.y as i64)
        .is_some_and(|v| v != 0)
}

fn ring_index(from: Point2<i32>, to: Point2<i32>) -> Option<usize> {
    let d = (to.x - from.x, to.y - from.y);
    RING.iter().position(|&r| r == d)
}

/// Trace the outer boundary of the component containing the first set pixel
/// (raster order) using Moore-neighbour tracing.
///
/// Pixels are returned in clockwise order starting at that first pixel. An
/// empty mask gives an empty contour.
pub fn trace_outer_contour(mask: &GrayImage) -> Vec<Point2<i32>> {
    let Some(first) = mask.data.iter().position(|&v| v != 0) else {
        return Vec::new();
    };
    let start = Point2::new((first % mask.width) as i32, (first / mask.width) as i32);
    // Raster order guarantees the west neighbour is background.
    let start_back = Point2::new(start.x - 1, start.y);

    let mut contour = vec![start];
    let mut current = start;
    let mut back = start_back;
    let limit = 4 * mask.len() + 8;

    for _ in 0..limit {
        let Some(k) = ring_index(current, back) else {
            break;
        };
        let mut found = None;
        for i in 1..=8 {
            let d = RING[(k + i) % 8];
            let candidate = Point2::new(current.x + d.0, current.y + d.1);
            if is_set(mask, candidate) {
                let prev = RING[(k + i - 1) % 8];
                found = Some((candidate, Point2::new(current.x + prev.0, current.y + prev.1)));
                break;
            }
        }
        let Some((next, next_back)) = found else {
            // Isolated pixel.
            break;
        };
        if next == start && next_back == start_back {
            break;
        }
        contour.push(next);
        current = next;
        back = next_back;
    }

    if contour.len() > 1 && contour.last() == Some(&start) {
        contour.pop();
    }
    contour
}

fn cross(o: Point2<i32>, a: Point2<i32>, b: Point2<i32>) -> i64 {
    (a.x - o.x) as i64 * (b.y - o.y) as i64 - (a.y - o.y) as i64 * (b.x - o.x) as i64
}

/// Convex hull (monotone chain). Collinear points are dropped; fewer than
/// three distinct input points are returned as-is.
pub fn convex_hull(points: &[Point2<i32>]) -> Vec<Point2<i32>> {
    let mut pts: Vec<Point2<i32>> = points.to_vec();
    pts.sort_by(|a, b| (a.x, a.y).cmp(&(b.x, b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<Point2<i32>> = Vec::with_capacity(pts.len());
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<Point2<i32>> = Vec::with_capacity(pts.len());
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}
