use nalgebra::Point2;
use serde::{Deserialize, Serialize};

const AXIS_EPS: f64 = 1e-9;

/// Line `a*x + b*y + c = 0`.
///
/// Built in slope form: `b = -1` and `a` is the slope, except for exactly
/// vertical lines (`a = -1, b = 0`). The determinant of two lines is then
/// the difference of their slopes, which is what the parallelism threshold
/// compares against.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImplicitLine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl ImplicitLine {
    pub fn through(p1: Point2<f64>, p2: Point2<f64>) -> Self {
        let (dx, dy) = (p2.x - p1.x, p2.y - p1.y);
        let (a, b) = if dy.abs() <= AXIS_EPS {
            (0.0, -1.0)
        } else if dx.abs() <= AXIS_EPS {
            (-1.0, 0.0)
        } else {
            (dy / dx, -1.0)
        };
        Self {
            a,
            b,
            c: -a * p1.x - b * p1.y,
        }
    }

    pub fn determinant(&self, other: &ImplicitLine) -> f64 {
        self.a * other.b - other.a * self.b
    }

    /// Intersection point, or `None` when `|det| < parallel_threshold`.
    pub fn intersect(&self, other: &ImplicitLine, parallel_threshold: f64) -> Option<Point2<f64>> {
        let det = self.determinant(other);
        if det.abs() < parallel_threshold {
            return None;
        }
        let x = (other.b * -self.c - self.b * -other.c) / det;
        let y = (self.a * -other.c - other.a * -self.c) / det;
        Some(Point2::new(x, y))
    }

    /// Signed residual `a*x + b*y + c`.
    pub fn eval(&self, p: Point2<f64>) -> f64 {
        self.a * p.x + self.b * p.y + self.c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn axis_aligned_lines_use_explicit_forms() {
        let h = ImplicitLine::through(Point2::new(3.0, 10.0), Point2::new(90.0, 10.0));
        assert_eq!((h.a, h.b, h.c), (0.0, -1.0, 10.0));
        let v = ImplicitLine::through(Point2::new(100.0, 4.0), Point2::new(100.0, 200.0));
        assert_eq!((v.a, v.b, v.c), (-1.0, 0.0, 100.0));

        let p = h.intersect(&v, 0.5).expect("perpendicular");
        assert_abs_diff_eq!(p.x, 100.0);
        assert_abs_diff_eq!(p.y, 10.0);
    }

    #[test]
    fn sloped_line_passes_through_both_points() {
        let p1 = Point2::new(12.0, 7.0);
        let p2 = Point2::new(40.0, 91.0);
        let l = ImplicitLine::through(p1, p2);
        assert_abs_diff_eq!(l.eval(p1), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(l.eval(p2), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn near_parallel_pairs_are_skipped() {
        let a = ImplicitLine::through(Point2::new(0.0, 0.0), Point2::new(100.0, 10.0));
        let b = ImplicitLine::through(Point2::new(0.0, 50.0), Point2::new(100.0, 70.0));
        // Slopes 0.1 and 0.2.
        assert!(a.intersect(&b, 0.5).is_none());
        assert!(a.intersect(&b, 0.05).is_some());

        let v1 = ImplicitLine::through(Point2::new(5.0, 0.0), Point2::new(5.0, 9.0));
        let v2 = ImplicitLine::through(Point2::new(8.0, 0.0), Point2::new(8.0, 9.0));
        assert!(v1.intersect(&v2, 0.5).is_none());
    }
}
