use depthcast_core::GrayImage;
use depthcast_segment::{segment, LabelMask, RegionList, SegmentationParams, TraversalMode};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MODES: [TraversalMode; 2] = [TraversalMode::Recursive, TraversalMode::IterativeDirected];

fn fill_rect(img: &mut GrayImage, x0: usize, y0: usize, w: usize, h: usize, v: u8) {
    for y in y0..y0 + h {
        for x in x0..x0 + w {
            img.set(x, y, v);
        }
    }
}

fn square_frame() -> GrayImage {
    let mut img = GrayImage::new(100, 100);
    fill_rect(&mut img, 40, 30, 20, 20, 200);
    img
}

fn square_params(min_area: usize, traversal: TraversalMode) -> SegmentationParams {
    SegmentationParams {
        z_limit: 5,
        min_distance: 10,
        medium_limit: 5,
        min_area,
        max_objects: 10,
        traversal,
    }
}

/// Several separated blobs at different depths with +-2 sensor noise, plus
/// a few single-pixel specks.
fn noisy_scene(seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut img = GrayImage::new(160, 120);
    let blobs = [
        (5, 5, 30, 20, 60u8),
        (50, 8, 25, 40, 120),
        (90, 60, 50, 30, 180),
        (10, 70, 35, 35, 230),
        (110, 10, 12, 12, 90),
    ];
    for &(x0, y0, w, h, base) in &blobs {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                let noise: i16 = rng.random_range(-2..=2);
                img.set(x, y, (base as i16 + noise) as u8);
            }
        }
    }
    for (x, y) in [(2, 110), (150, 2), (80, 100), (150, 110), (60, 60)] {
        img.set(x, y, 40);
    }
    img
}

fn pixel_sets(list: &RegionList) -> Vec<Vec<usize>> {
    list.iter().map(|m| m.pixel_indices().collect()).collect()
}

#[test]
fn single_square_yields_one_mask_of_400_pixels() {
    let img = square_frame();
    for mode in MODES {
        let list = segment(&img.view(), &square_params(50, mode));
        assert_eq!(list.len(), 1, "{mode:?}");
        let mask = &list.regions[0];
        assert_eq!(mask.area, 400);
        assert_eq!(mask.bbox.width(), 20);
        assert_eq!(mask.bbox.height(), 20);
        assert!((mask.center.x - 49.5).abs() < 1e-4);
        assert!((mask.center.y - 39.5).abs() < 1e-4);
    }
}

#[test]
fn square_below_min_area_yields_nothing() {
    let img = square_frame();
    for mode in MODES {
        let list = segment(&img.view(), &square_params(500, mode));
        assert!(list.is_empty(), "{mode:?}");
        assert_eq!(list.undersized, 1);
        assert_eq!(list.dropped, 0);
    }
}

#[test]
fn returned_masks_are_disjoint_and_satisfy_acceptance() {
    for seed in 0..4 {
        let img = noisy_scene(seed);
        for mode in MODES {
            let params = square_params(20, mode);
            let list = segment(&img.view(), &params);
            assert!(!list.is_empty());

            let mut owner = vec![0u32; img.len()];
            for mask in &list {
                for idx in mask.pixel_indices() {
                    assert_eq!(owner[idx], 0, "pixel {idx} claimed twice");
                    owner[idx] = mask.region_id;
                    assert!(img.data[idx] > params.min_distance);
                }
                assert_connected_within_z(&img, mask, params.z_limit);
            }
        }
    }
}

fn assert_connected_within_z(img: &GrayImage, mask: &LabelMask, z_limit: u8) {
    if mask.area < 2 {
        return;
    }
    for idx in mask.pixel_indices() {
        let (x, y) = ((idx % img.width) as i64, (idx / img.width) as i64);
        let v = img.data[idx];
        let has_partner = [(1, 0), (-1, 0), (0, 1), (0, -1)].iter().any(|(dx, dy)| {
            let (nx, ny) = (x + dx, y + dy);
            if nx < 0 || ny < 0 || nx >= img.width as i64 || ny >= img.height as i64 {
                return false;
            }
            let (nx, ny) = (nx as usize, ny as usize);
            mask.contains(nx, ny) && img.get(nx, ny).abs_diff(v) <= z_limit
        });
        assert!(has_partner, "isolated pixel {idx} in region {}", mask.region_id);
    }
}

#[test]
fn every_mask_meets_min_area() {
    let img = noisy_scene(7);
    for min_area in [1, 50, 200, 700, 2000] {
        let list = segment(&img.view(), &square_params(min_area, TraversalMode::Recursive));
        assert!(list.iter().all(|m| m.area >= min_area), "min_area={min_area}");
    }
    let specks = segment(&img.view(), &square_params(1, TraversalMode::Recursive));
    let no_specks = segment(&img.view(), &square_params(2, TraversalMode::Recursive));
    assert_eq!(specks.len(), 10);
    assert_eq!(no_specks.len(), 5);
    assert_eq!(no_specks.undersized, 5);
}

#[test]
fn cap_keeps_first_found_regions_unchanged() {
    let img = noisy_scene(3);
    for mode in MODES {
        let mut params = square_params(50, mode);
        let full = segment(&img.view(), &params);
        assert_eq!(full.len(), 5);

        params.max_objects = 2;
        let capped = segment(&img.view(), &params);
        assert_eq!(capped.len(), 2);
        assert_eq!(capped.dropped, 3);
        assert_eq!(pixel_sets(&capped), pixel_sets(&full)[..2].to_vec());
        assert_eq!(capped.regions[0].region_id, 1);
        assert_eq!(capped.regions[1].region_id, 2);
    }
}

#[test]
fn cap_keeps_first_even_when_later_region_is_bigger() {
    let mut img = GrayImage::new(80, 40);
    fill_rect(&mut img, 0, 0, 5, 5, 100);
    fill_rect(&mut img, 20, 0, 40, 40, 150);
    let mut params = square_params(10, TraversalMode::Recursive);
    params.max_objects = 1;
    let list = segment(&img.view(), &params);
    assert_eq!(list.len(), 1);
    assert_eq!(list.regions[0].area, 25);
    assert_eq!(list.dropped, 1);
}

#[test]
fn traversal_modes_agree_on_flat_blobs() {
    let mut shapes = Vec::new();

    let mut rect = GrayImage::new(64, 64);
    fill_rect(&mut rect, 3, 5, 40, 30, 150);
    shapes.push(rect);

    let mut ell = GrayImage::new(64, 64);
    fill_rect(&mut ell, 10, 10, 8, 40, 90);
    fill_rect(&mut ell, 10, 42, 40, 8, 90);
    shapes.push(ell);

    let mut plus = GrayImage::new(64, 64);
    fill_rect(&mut plus, 28, 4, 8, 56, 200);
    fill_rect(&mut plus, 4, 28, 56, 8, 200);
    shapes.push(plus);

    let mut disc = GrayImage::new(64, 64);
    for y in 0..64 {
        for x in 0..64 {
            let (dx, dy) = (x as f64 - 31.5, y as f64 - 31.5);
            if dx * dx + dy * dy < 25.0 * 25.0 {
                disc.set(x, y, 120);
            }
        }
    }
    shapes.push(disc);

    for img in &shapes {
        let a = segment(&img.view(), &square_params(10, TraversalMode::Recursive));
        let b = segment(&img.view(), &square_params(10, TraversalMode::IterativeDirected));
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
        let (area_a, area_b) = (a.regions[0].area as f64, b.regions[0].area as f64);
        assert!((area_a - area_b).abs() / area_a < 0.01, "{area_a} vs {area_b}");
    }
}

#[test]
fn segmentation_is_idempotent() {
    let img = noisy_scene(11);
    for mode in MODES {
        let params = square_params(20, mode);
        let first = segment(&img.view(), &params);
        let second = segment(&img.view(), &params);
        assert_eq!(first.len(), second.len());
        assert_eq!(pixel_sets(&first), pixel_sets(&second));
        let areas: Vec<usize> = first.iter().map(|m| m.area).collect();
        let areas_again: Vec<usize> = second.iter().map(|m| m.area).collect();
        assert_eq!(areas, areas_again);
        assert_eq!(first.visited, second.visited);
    }
}
