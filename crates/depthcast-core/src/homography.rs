use crate::{sample_bilinear_u8, GrayImage, GrayImageView};
use nalgebra::{DMatrix, Matrix3, Point2, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};

/// Planar projective transform, `dst ~ H * src`.
///
/// In the pipeline `src` is camera space and `dst` is the projector's
/// canonical output rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    pub fn is_identity(&self) -> bool {
        self.h == Matrix3::identity()
    }

    /// Map a point; the result is non-finite when it lands on the line at
    /// infinity.
    #[inline]
    pub fn apply_f64(&self, p: Point2<f64>) -> Point2<f64> {
        let q = self.h * p.to_homogeneous();
        Point2::new(q.x / q.z, q.y / q.z)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }

    /// Scale so that `h[(2, 2)] == 1`. Fails for a zero or non-finite entry.
    fn rescaled(h: Matrix3<f64>) -> Option<Self> {
        let w = h[(2, 2)];
        if w.abs() < 1e-12 || h.iter().any(|v| !v.is_finite()) {
            return None;
        }
        Some(Self::new(h / w))
    }
}

/// Similarity that moves a point set to its centroid and scales it to a
/// mean radius of `sqrt(2)`. Keeps the linear systems well conditioned for
/// pixel-sized coordinates.
struct Conditioning {
    t: Matrix3<f64>,
}

impl Conditioning {
    fn of(pts: &[Point2<f64>]) -> Self {
        let n = pts.len() as f64;
        let centroid = pts.iter().fold(Vector3::zeros(), |acc, p| acc + p.to_homogeneous()) / n;
        let (cx, cy) = (centroid.x, centroid.y);
        let radius = pts
            .iter()
            .map(|p| (p.x - cx).hypot(p.y - cy))
            .sum::<f64>()
            / n;
        let s = if radius > 1e-12 {
            std::f64::consts::SQRT_2 / radius
        } else {
            1.0
        };
        Self {
            t: Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0),
        }
    }

    fn map(&self, p: &Point2<f64>) -> Point2<f64> {
        Point2::from_homogeneous(self.t * p.to_homogeneous()).unwrap_or(*p)
    }
}

/// The two linear constraints one correspondence `(x, y) -> (u, v)` puts on
/// the row-major entries of H.
fn constraint_rows(s: Point2<f64>, d: Point2<f64>) -> [[f64; 9]; 2] {
    let (x, y, u, v) = (s.x, s.y, d.x, d.y);
    [
        [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, -u],
        [0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y, -v],
    ]
}

/// Solve in conditioned coordinates and map the result back to pixels.
fn solve_conditioned(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
    solve: impl FnOnce(&[Point2<f64>], &[Point2<f64>]) -> Option<Matrix3<f64>>,
) -> Option<Homography> {
    let cs = Conditioning::of(src);
    let cd = Conditioning::of(dst);
    let src_n: Vec<_> = src.iter().map(|p| cs.map(p)).collect();
    let dst_n: Vec<_> = dst.iter().map(|p| cd.map(p)).collect();
    let hn = solve(&src_n, &dst_n)?;
    Homography::rescaled(cd.t.try_inverse()? * hn * cs.t)
}

/// Estimate H such that `dst ~ H * src` from N >= 4 correspondences.
///
/// Exactly four points go through [`homography_from_4pt`]; larger sets are
/// solved in the least-squares sense (smallest right singular vector).
pub fn estimate_homography(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Homography> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }
    if let (Ok(s), Ok(d)) = (
        <&[Point2<f64>; 4]>::try_from(src),
        <&[Point2<f64>; 4]>::try_from(dst),
    ) {
        return homography_from_4pt(s, d);
    }

    solve_conditioned(src, dst, |s, d| {
        let mut a = DMatrix::<f64>::zeros(2 * s.len(), 9);
        for (k, (p, q)) in s.iter().zip(d).enumerate() {
            for (r, row) in constraint_rows(*p, *q).iter().enumerate() {
                for (c, value) in row.iter().enumerate() {
                    a[(2 * k + r, c)] = *value;
                }
            }
        }
        let v_t = a.svd(false, true).v_t?;
        let h = v_t.row(v_t.nrows().checked_sub(1)?);
        Some(Matrix3::from_iterator(h.iter().copied()).transpose())
    })
}

/// Compute H such that `dst ~ H * src` from exactly four correspondences.
///
/// Corner order must be consistent between `src` and `dst`. Returns `None`
/// when three of the points are collinear (singular system).
pub fn homography_from_4pt(src: &[Point2<f64>; 4], dst: &[Point2<f64>; 4]) -> Option<Homography> {
    solve_conditioned(src, dst, |s, d| {
        // Fix h33 = 1 and move its column to the right-hand side.
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();
        for (k, (p, q)) in s.iter().zip(d).enumerate() {
            for (r, row) in constraint_rows(*p, *q).iter().enumerate() {
                let i = 2 * k + r;
                for c in 0..8 {
                    a[(i, c)] = row[c];
                }
                b[i] = -row[8];
            }
        }
        let h = a.lu().solve(&b)?;
        Some(Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0))
    })
}

/// Warp `src` into an `out_w x out_h` image.
///
/// `h_src_from_dst` maps each destination pixel back into `src`, which is
/// then sampled bilinearly; destination pixels landing outside `src` are `0`.
/// Pixel centres sit on integer coordinates, so the identity warp is an exact
/// copy.
pub fn warp_perspective_gray(
    src: &GrayImageView<'_>,
    h_src_from_dst: &Homography,
    out_w: usize,
    out_h: usize,
) -> GrayImage {
    let mut out = GrayImage::new(out_w, out_h);
    let x_range = -0.5..=src.width as f64 - 0.5;
    let y_range = -0.5..=src.height as f64 - 0.5;

    for (i, px) in out.data.iter_mut().enumerate() {
        let dst = Point2::new((i % out_w) as f64, (i / out_w) as f64);
        let p = h_src_from_dst.apply_f64(dst);
        if x_range.contains(&p.x) && y_range.contains(&p.y) {
            *px = sample_bilinear_u8(src, p.x as f32, p.y as f32);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn keystone() -> Homography {
        Homography::new(Matrix3::new(
            0.95, -0.08, 14.0, //
            0.04, 1.1, -9.0, //
            0.0004, -0.0007, 1.0,
        ))
    }

    #[test]
    fn inverse_undoes_the_mapping() {
        let h = keystone();
        let inv = h.inverse().expect("invertible");
        for p in [
            Point2::new(3.0, 4.0),
            Point2::new(-40.0, 75.0),
            Point2::new(640.0, 360.0),
        ] {
            let back = inv.apply_f64(h.apply_f64(p));
            assert_relative_eq!(back.x, p.x, epsilon = 1e-6);
            assert_relative_eq!(back.y, p.y, epsilon = 1e-6);
        }
    }

    #[test]
    fn four_point_solution_maps_quad_onto_projector_rectangle() {
        let camera = [
            Point2::new(612.0, 40.0),
            Point2::new(590.0, 455.0),
            Point2::new(35.0, 22.0),
            Point2::new(60.0, 470.0),
        ];
        let projector = [
            Point2::new(1280.0, 0.0),
            Point2::new(1280.0, 720.0),
            Point2::new(0.0, 0.0),
            Point2::new(0.0, 720.0),
        ];

        let h = homography_from_4pt(&camera, &projector).expect("solvable");
        assert_relative_eq!(h.h[(2, 2)], 1.0);
        for (c, p) in camera.iter().zip(projector.iter()) {
            let q = h.apply_f64(*c);
            assert_relative_eq!(q.x, p.x, epsilon = 1e-6);
            assert_relative_eq!(q.y, p.y, epsilon = 1e-6);
        }
    }

    #[test]
    fn many_correspondences_recover_the_transform() {
        let truth = keystone();
        let src: Vec<Point2<f64>> = (0..4)
            .flat_map(|j| (0..5).map(move |i| Point2::new(i as f64 * 70.0, j as f64 * 45.0)))
            .collect();
        let dst: Vec<Point2<f64>> = src.iter().map(|&p| truth.apply_f64(p)).collect();

        let est = estimate_homography(&src, &dst).expect("estimate");
        for (a, b) in est.h.iter().zip(truth.h.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-8, max_relative = 1e-6);
        }
    }

    #[test]
    fn four_correspondences_take_the_exact_path() {
        let src = [
            Point2::new(0.0, 0.0),
            Point2::new(100.0, 0.0),
            Point2::new(100.0, 80.0),
            Point2::new(0.0, 80.0),
        ];
        let dst = src.map(|p| keystone().apply_f64(p));
        assert_eq!(
            estimate_homography(&src, &dst),
            homography_from_4pt(&src, &dst)
        );
    }

    #[test]
    fn collinear_points_have_no_solution() {
        let src = [
            Point2::new(0.0, 5.0),
            Point2::new(10.0, 5.0),
            Point2::new(25.0, 5.0),
            Point2::new(40.0, 5.0),
        ];
        let dst = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        assert!(homography_from_4pt(&src, &dst).is_none());
    }

    #[test]
    fn too_few_or_unpaired_points_are_rejected() {
        let four = [Point2::new(0.0, 0.0); 4];
        let three = [Point2::new(1.0, 1.0); 3];
        assert!(estimate_homography(&four, &three).is_none());
        assert!(estimate_homography(&three, &three).is_none());
    }

    #[test]
    fn identity_warp_copies_image() {
        let mut src = GrayImage::new(8, 6);
        src.set(3, 2, 200);
        src.set(7, 5, 17);
        let out = warp_perspective_gray(&src.view(), &Homography::identity(), 8, 6);
        assert_eq!(out, src);
    }

    #[test]
    fn translation_shifts_content_and_blanks_the_border() {
        let mut src = GrayImage::new(10, 10);
        src.set(4, 4, 90);
        // Destination (x, y) samples source (x - 2, y - 1).
        let shift = Homography::new(Matrix3::new(1.0, 0.0, -2.0, 0.0, 1.0, -1.0, 0.0, 0.0, 1.0));
        let out = warp_perspective_gray(&src.view(), &shift, 10, 10);
        assert_eq!(out.get(6, 5), 90);
        assert_eq!(out.get(4, 4), 0);
        assert_eq!(out.get(0, 0), 0);
    }
}
