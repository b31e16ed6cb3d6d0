use depthcast_core::GrayImage;
use nalgebra::Point2;

/// Draw an 8-connected Bresenham line, clipping pixels outside `canvas`.
pub fn draw_line(canvas: &mut GrayImage, a: Point2<i32>, b: Point2<i32>, value: u8) {
    let dx = (b.x - a.x).abs();
    let dy = -(b.y - a.y).abs();
    let sx = if a.x < b.x { 1 } else { -1 };
    let sy = if a.y < b.y { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (a.x, a.y);

    loop {
        if x >= 0 && y >= 0 && (x as usize) < canvas.width && (y as usize) < canvas.height {
            canvas.set(x as usize, y as usize, value);
        }
        if x == b.x && y == b.y {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Draw the closed outline through `vertices`.
pub fn draw_polygon(canvas: &mut GrayImage, vertices: &[Point2<i32>], value: u8) {
    match vertices {
        [] => {}
        [p] => draw_line(canvas, *p, *p, value),
        _ => {
            for (i, &a) in vertices.iter().enumerate() {
                let b = vertices[(i + 1) % vertices.len()];
                draw_line(canvas, a, b, value);
            }
        }
    }
}

/// Fill a convex or simple polygon given in floating-point pixel coordinates.
///
/// A pixel is set when its centre lies inside the polygon (even-odd rule).
pub fn fill_polygon(canvas: &mut GrayImage, vertices: &[Point2<f64>], value: u8) {
    if vertices.len() < 3 {
        return;
    }
    let n = vertices.len();
    for y in 0..canvas.height {
        let yc = y as f64;
        let mut xs: Vec<f64> = Vec::new();
        for i in 0..n {
            let a = vertices[i];
            let b = vertices[(i + 1) % n];
            if (a.y <= yc && b.y > yc) || (b.y <= yc && a.y > yc) {
                xs.push(a.x + (yc - a.y) / (b.y - a.y) * (b.x - a.x));
            }
        }
        xs.sort_by(|p, q| p.total_cmp(q));
        for pair in xs.chunks_exact(2) {
            let x0 = pair[0].ceil().max(0.0) as usize;
            let x1 = pair[1].ceil() as i64 - 1;
            if x1 < 0 {
                continue;
            }
            let x1 = (x1 as usize).min(canvas.width.saturating_sub(1));
            for x in x0..=x1 {
                canvas.set(x, y, value);
            }
        }
    }
}
