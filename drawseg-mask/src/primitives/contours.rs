//! Contour extraction and convex-hull geometry

use drawseg_core::Mask;
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;

/// Gray image of `mask` inside a one pixel background frame.
///
/// `find_contours` reports regions touching column 0 as holes without a
/// parent, so the tracer never sees foreground on the image border.
fn framed_gray_image(mask: &Mask) -> GrayImage {
    let (w, h) = (mask.width() as u32, mask.height() as u32);
    GrayImage::from_fn(w + 2, h + 2, |x, y| {
        let inside = (1..=w).contains(&x) && (1..=h).contains(&y);
        let on = inside && mask.get((y - 1) as usize, (x - 1) as usize);
        Luma([if on { 255 } else { 0 }])
    })
}

/// Outer borders of the top-level foreground regions
pub fn external_contours(mask: &Mask) -> Vec<Vec<Point<i32>>> {
    if mask.is_empty() || !mask.has_foreground() {
        return Vec::new();
    }
    find_contours::<i32>(&framed_gray_image(mask))
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .map(|c| c.points.into_iter().map(|p| Point::new(p.x - 1, p.y - 1)).collect())
        .collect()
}

/// Perimeter of a closed polyline
pub fn arc_length(points: &[Point<i32>]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let mut total = 0.0;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        let dx = (b.x - a.x) as f64;
        let dy = (b.y - a.y) as f64;
        total += (dx * dx + dy * dy).sqrt();
    }
    total
}

fn cross(o: Point<i32>, a: Point<i32>, b: Point<i32>) -> i64 {
    (a.x - o.x) as i64 * (b.y - o.y) as i64 - (a.y - o.y) as i64 * (b.x - o.x) as i64
}

/// Convex hull by Andrew's monotone chain, counter-clockwise, without
/// repeated or collinear vertices.
pub fn convex_hull(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let mut pts: Vec<Point<i32>> = points.to_vec();
    pts.sort_by(|a, b| (a.x, a.y).cmp(&(b.x, b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<Point<i32>> = Vec::with_capacity(pts.len());
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<Point<i32>> = Vec::with_capacity(pts.len());
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

/// Set every pixel whose centre lies inside or on a convex polygon
pub fn fill_convex_polygon(mask: &mut Mask, polygon: &[Point<i32>]) {
    if polygon.is_empty() || mask.is_empty() {
        return;
    }
    const EPS: f64 = 1e-9;

    let y_min = polygon.iter().map(|p| p.y).min().unwrap_or(0).max(0);
    let y_max = polygon
        .iter()
        .map(|p| p.y)
        .max()
        .unwrap_or(-1)
        .min(mask.height() as i32 - 1);
    let last_col = mask.width() as i64 - 1;

    for y in y_min..=y_max {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for i in 0..polygon.len() {
            let a = polygon[i];
            let b = polygon[(i + 1) % polygon.len()];
            if y < a.y.min(b.y) || y > a.y.max(b.y) {
                continue;
            }
            if a.y == b.y {
                lo = lo.min(a.x.min(b.x) as f64);
                hi = hi.max(a.x.max(b.x) as f64);
            } else {
                let t = (y - a.y) as f64 / (b.y - a.y) as f64;
                let x = a.x as f64 + t * (b.x - a.x) as f64;
                lo = lo.min(x);
                hi = hi.max(x);
            }
        }
        if lo > hi {
            continue;
        }
        let x0 = ((lo - EPS).ceil() as i64).max(0);
        let x1 = ((hi + EPS).floor() as i64).min(last_col);
        for x in x0..=x1 {
            mask.set(y as usize, x as usize, true);
        }
    }
}
