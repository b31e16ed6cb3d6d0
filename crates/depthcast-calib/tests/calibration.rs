use depthcast_calib::{
    calibrate, calibrate_detailed, fill_polygon, homography_from_segments, locate_target,
    CalibrationError, CalibrationParams, DegenerateReason, LineSegment, TargetSearchParams,
};
use depthcast_core::GrayImage;
use depthcast_segment::LabelMask;
use nalgebra::Point2;

const FRAME: (usize, usize) = (320, 240);

fn mask_from_quad(corners: &[Point2<f64>; 4]) -> LabelMask {
    let mut img = GrayImage::new(FRAME.0, FRAME.1);
    fill_polygon(&mut img, corners, 255);
    LabelMask::from_gray(1, &img).expect("non-empty quad")
}

/// Euclidean reprojection error of `from` against `to` stays below `tol`.
fn assert_maps_to(h: &depthcast_core::Homography, from: Point2<f64>, to: Point2<f64>, tol: f64) {
    let got = h.apply_f64(from);
    let error = (got - to).norm();
    assert!(
        error < tol,
        "{from:?} -> {got:?}, expected {to:?} (error {error:.3}, tol {tol})"
    );
}

#[test]
fn axis_aligned_target_round_trips_exactly() {
    let mut img = GrayImage::new(FRAME.0, FRAME.1);
    for y in 30..=209 {
        for x in 40..=279 {
            img.set(x, y, 255);
        }
    }
    let mask = LabelMask::from_gray(1, &img).expect("mask");
    let canonical = (640, 360);
    let cal = calibrate_detailed(&mask, canonical, &CalibrationParams::default()).expect("calibrates");
    assert_eq!(cal.segments.len(), 4);

    let h = cal.homography;
    assert_maps_to(&h, Point2::new(279.0, 30.0), Point2::new(640.0, 0.0), 0.5);
    assert_maps_to(&h, Point2::new(279.0, 209.0), Point2::new(640.0, 360.0), 0.5);
    assert_maps_to(&h, Point2::new(40.0, 30.0), Point2::new(0.0, 0.0), 0.5);
    assert_maps_to(&h, Point2::new(40.0, 209.0), Point2::new(0.0, 360.0), 0.5);
}

#[test]
fn perspective_target_round_trips_within_subpixel_band() {
    let tl = Point2::new(52.3, 41.7);
    let tr = Point2::new(268.4, 35.2);
    let br = Point2::new(281.6, 198.9);
    let bl = Point2::new(40.2, 206.5);
    let mask = mask_from_quad(&[tl, tr, br, bl]);

    let canonical = (230, 165);
    let h = calibrate(&mask, canonical, &CalibrationParams::default()).expect("calibrates");
    let (w, hgt) = (canonical.0 as f64, canonical.1 as f64);
    assert_maps_to(&h, tr, Point2::new(w, 0.0), 0.5);
    assert_maps_to(&h, br, Point2::new(w, hgt), 0.5);
    assert_maps_to(&h, tl, Point2::new(0.0, 0.0), 0.5);
    assert_maps_to(&h, bl, Point2::new(0.0, hgt), 0.5);
}

#[test]
fn close_corners_are_degenerate_not_a_homography() {
    // Two nearly coincident vertical sides give corners 5 px apart.
    let segments = [
        LineSegment::new(Point2::new(60.0, 10.0), Point2::new(300.0, 10.0)),
        LineSegment::new(Point2::new(60.0, 150.0), Point2::new(300.0, 150.0)),
        LineSegment::new(Point2::new(100.0, 5.0), Point2::new(100.0, 200.0)),
        LineSegment::new(Point2::new(105.0, 5.0), Point2::new(105.0, 200.0)),
    ];
    let err = homography_from_segments(&segments, FRAME, FRAME, &CalibrationParams::default())
        .unwrap_err();
    match err {
        CalibrationError::DegenerateGeometry(DegenerateReason::CornersTooClose { distance, .. }) => {
            assert!((distance - 5.0).abs() < 1e-9);
        }
        other => panic!("expected DegenerateGeometry, got {other:?}"),
    }
}

#[test]
fn short_sided_mask_is_rejected_as_degenerate() {
    // A 240x70 target: all four sides are long enough for the segment
    // detector, but the short sides put adjacent corners 69 px apart.
    let mut img = GrayImage::new(FRAME.0, FRAME.1);
    for y in 80..=149 {
        for x in 40..=279 {
            img.set(x, y, 255);
        }
    }
    let mask = LabelMask::from_gray(1, &img).expect("mask");
    let params = CalibrationParams {
        min_corner_separation: 100.0,
        ..CalibrationParams::default()
    };

    match calibrate(&mask, FRAME, &params) {
        Err(CalibrationError::DegenerateGeometry(DegenerateReason::CornersTooClose {
            distance,
            min,
        })) => {
            assert!(distance < min);
            assert!((distance - 69.0).abs() < 2.0, "distance {distance}");
        }
        other => panic!("expected DegenerateGeometry, got {other:?}"),
    }

    // The same mask calibrates under the default separation.
    assert!(calibrate(&mask, FRAME, &CalibrationParams::default()).is_ok());
}

#[test]
fn thin_sliver_fails_corner_detection() {
    let mut img = GrayImage::new(FRAME.0, FRAME.1);
    for y in 20..200 {
        for x in 150..154 {
            img.set(x, y, 255);
        }
    }
    let mask = LabelMask::from_gray(1, &img).expect("mask");
    assert!(matches!(
        calibrate(&mask, FRAME, &CalibrationParams::default()),
        Err(CalibrationError::CornerDetectionFailure(_))
    ));
}

#[test]
fn lit_target_is_located_and_calibrated() {
    let tl = Point2::new(52.3, 41.7);
    let tr = Point2::new(268.4, 35.2);
    let br = Point2::new(281.6, 198.9);
    let bl = Point2::new(40.2, 206.5);

    let mut intensity = GrayImage::filled(FRAME.0, FRAME.1, 40);
    fill_polygon(&mut intensity, &[tl, tr, br, bl], 230);

    let target = locate_target(&intensity, &TargetSearchParams::default()).expect("target");
    assert!(target.area > 30_000);

    let canonical = (230, 165);
    let h = calibrate(&target, canonical, &CalibrationParams::default()).expect("calibrates");
    assert_maps_to(&h, tl, Point2::new(0.0, 0.0), 0.5);
    assert_maps_to(&h, tr, Point2::new(230.0, 0.0), 0.5);
    assert_maps_to(&h, br, Point2::new(230.0, 165.0), 0.5);
    assert_maps_to(&h, bl, Point2::new(0.0, 165.0), 0.5);
}
