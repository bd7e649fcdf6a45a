//! Whole-region fill strategies and box clipping

use super::contours::{convex_hull, external_contours, fill_convex_polygon};
use super::morphology::{close, EllipseKernel};
use drawseg_core::{BBox, ImageShape, Mask};
use std::collections::VecDeque;
use tracing::debug;

/// Pixel rectangle `[x0, x1) x [y0, y1)` of a box grown by `margin_ratio`
/// of its integer size on every side and clamped to the image.
pub fn box_region(bbox: &BBox, margin_ratio: f32, shape: ImageShape) -> (usize, usize, usize, usize) {
    let (x1, y1, x2, y2) = (
        bbox.x1 as i64,
        bbox.y1 as i64,
        bbox.x2 as i64,
        bbox.y2 as i64,
    );
    let margin_x = ((x2 - x1) as f32 * margin_ratio) as i64;
    let margin_y = ((y2 - y1) as f32 * margin_ratio) as i64;

    let clamp = |v: i64, hi: usize| v.clamp(0, hi as i64) as usize;
    (
        clamp(x1 - margin_x, shape.width),
        clamp(y1 - margin_y, shape.height),
        clamp(x2 + margin_x, shape.width),
        clamp(y2 + margin_y, shape.height),
    )
}

/// Solid convex hull of every external contour, boundary included
pub fn fill_all_holes_convex_hull(mask: &Mask) -> Mask {
    if mask.is_empty() {
        return mask.clone();
    }
    let points: Vec<_> = external_contours(mask).into_iter().flatten().collect();
    if points.is_empty() {
        return mask.clone();
    }

    let hull = convex_hull(&points);
    let mut filled = mask.clone();
    fill_convex_polygon(&mut filled, &hull);
    debug!(
        "fill_all_holes_convex_hull: {} -> {} pixels ({} hull vertices)",
        mask.area(),
        filled.area(),
        hull.len()
    );
    filled
}

/// Fill background not reachable from the four image corners.
///
/// The flood is 4-connected and a corner that is foreground seeds nothing,
/// so holes in a shape whose outline is open stay unfilled.
pub fn fill_all_holes_flood_fill(mask: &Mask) -> Mask {
    if mask.is_empty() {
        return mask.clone();
    }
    let (h, w) = (mask.height(), mask.width());
    let mut outside = vec![false; h * w];
    let mut queue = VecDeque::new();

    for (y, x) in [(0, 0), (0, w - 1), (h - 1, 0), (h - 1, w - 1)] {
        if !mask.get(y, x) && !outside[y * w + x] {
            outside[y * w + x] = true;
            queue.push_back((y, x));
        }
    }

    while let Some((y, x)) = queue.pop_front() {
        let mut visit = |ny: usize, nx: usize| {
            let idx = ny * w + nx;
            if !outside[idx] && !mask.get(ny, nx) {
                outside[idx] = true;
                queue.push_back((ny, nx));
            }
        };
        if y > 0 {
            visit(y - 1, x);
        }
        if y + 1 < h {
            visit(y + 1, x);
        }
        if x > 0 {
            visit(y, x - 1);
        }
        if x + 1 < w {
            visit(y, x + 1);
        }
    }

    let filled = Mask::from_fn(mask.shape(), |y, x| !outside[y * w + x]);
    debug!(
        "fill_all_holes_flood_fill: filled {} interior pixels",
        filled.area() - mask.area()
    );
    filled
}

/// Ignore the mask and fill the prompt box grown by `margin_ratio`
pub fn fill_with_box(mask: &Mask, bbox: &BBox, margin_ratio: f32) -> Mask {
    if mask.is_empty() {
        return mask.clone();
    }
    let shape = mask.shape();
    let (x0, y0, x1, y1) = box_region(bbox, margin_ratio, shape);
    let filled = Mask::from_fn(shape, |y, x| (x0..x1).contains(&x) && (y0..y1).contains(&y));
    debug!(
        "fill_with_box: {} pixel region [{}, {}, {}, {}]",
        filled.area(),
        x0,
        y0,
        x1,
        y1
    );
    filled
}

/// Repeated elliptical closing, then a flood fill of what is still enclosed
pub fn fill_with_morphological_closing(mask: &Mask, kernel_size: usize, iterations: usize) -> Mask {
    if mask.is_empty() {
        return mask.clone();
    }
    let kernel = EllipseKernel::new(kernel_size);
    let mut result = mask.clone();
    if kernel_size > 0 && !kernel.exceeds(mask) {
        for _ in 0..iterations {
            result = close(&result, &kernel);
        }
    }
    let result = fill_all_holes_flood_fill(&result);
    debug!(
        "fill_with_morphological_closing: {} -> {} pixels (kernel={}, iterations={})",
        mask.area(),
        result.area(),
        kernel_size,
        iterations
    );
    result
}

/// Clear foreground outside the box grown by `margin_ratio`
pub fn constrain_to_box(mask: &Mask, bbox: &BBox, margin_ratio: f32) -> Mask {
    if mask.is_empty() {
        return mask.clone();
    }
    let (x0, y0, x1, y1) = box_region(bbox, margin_ratio, mask.shape());
    Mask::from_fn(mask.shape(), |y, x| {
        mask.get(y, x) && (x0..x1).contains(&x) && (y0..y1).contains(&y)
    })
}
