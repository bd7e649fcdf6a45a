//! Connected-component filtering and small-hole filling

use drawseg_core::Mask;
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use tracing::debug;

/// 8-connected labels of the foreground (`foreground = true`) or background
pub(crate) struct Labels {
    pub image: ImageBuffer<Luma<u32>, Vec<u32>>,
    /// Pixel count per label, index 0 unused
    pub areas: Vec<usize>,
    /// Raster index of the first pixel of each label, index 0 unused
    pub first_pixel: Vec<usize>,
}

impl Labels {
    pub fn count(&self) -> usize {
        self.areas.len().saturating_sub(1)
    }

    pub fn label_at(&self, y: usize, x: usize) -> usize {
        self.image.get_pixel(x as u32, y as u32)[0] as usize
    }
}

pub(crate) fn label(mask: &Mask, foreground: bool) -> Labels {
    let (w, h) = (mask.width() as u32, mask.height() as u32);
    let data = mask.as_array();
    let gray = GrayImage::from_fn(w, h, |x, y| {
        Luma([if data[[y as usize, x as usize]] == foreground { 255 } else { 0 }])
    });

    let image = connected_components(&gray, Connectivity::Eight, Luma([0u8]));

    let mut areas = vec![0usize];
    let mut first_pixel = vec![0usize];
    for (x, y, px) in image.enumerate_pixels() {
        let l = px[0] as usize;
        if l == 0 {
            continue;
        }
        if l >= areas.len() {
            areas.resize(l + 1, 0);
            first_pixel.resize(l + 1, usize::MAX);
        }
        if areas[l] == 0 {
            first_pixel[l] = y as usize * w as usize + x as usize;
        }
        areas[l] += 1;
    }

    Labels {
        image,
        areas,
        first_pixel,
    }
}

/// Number of 8-connected foreground components
pub fn count_components(mask: &Mask) -> usize {
    if mask.is_empty() {
        return 0;
    }
    label(mask, true).count()
}

/// Drop 8-connected components with fewer than `min_area` pixels
pub fn remove_small_components(mask: &Mask, min_area: usize) -> Mask {
    if mask.is_empty() || !mask.has_foreground() {
        return mask.clone();
    }

    let labels = label(mask, true);
    let kept = labels.areas.iter().skip(1).filter(|&&a| a >= min_area).count();
    debug!(
        "remove_small_components: kept {}/{} components (min_area={})",
        kept,
        labels.count(),
        min_area
    );

    Mask::from_fn(mask.shape(), |y, x| {
        let l = labels.label_at(y, x);
        l != 0 && labels.areas[l] >= min_area
    })
}

/// Keep only the largest 8-connected component.
///
/// Equal areas are resolved in favour of the component whose first pixel
/// comes first in raster order.
pub fn keep_largest_component(mask: &Mask) -> Mask {
    if mask.is_empty() || !mask.has_foreground() {
        return mask.clone();
    }

    let labels = label(mask, true);
    let mut best = 0usize;
    for l in 1..labels.areas.len() {
        if labels.areas[l] == 0 {
            continue;
        }
        let better = best == 0
            || labels.areas[l] > labels.areas[best]
            || (labels.areas[l] == labels.areas[best]
                && labels.first_pixel[l] < labels.first_pixel[best]);
        if better {
            best = l;
        }
    }

    debug!(
        "keep_largest_component: {} components, largest has {} pixels",
        labels.count(),
        labels.areas[best]
    );

    Mask::from_fn(mask.shape(), |y, x| labels.label_at(y, x) == best)
}

/// Turn 8-connected background regions of at most `max_hole_area` pixels
/// into foreground. Background touching the border is treated like any
/// other region.
pub fn fill_small_holes(mask: &Mask, max_hole_area: usize) -> Mask {
    if mask.is_empty() {
        return mask.clone();
    }

    let holes = label(mask, false);
    let filled = holes
        .areas
        .iter()
        .skip(1)
        .filter(|&&a| a > 0 && a <= max_hole_area)
        .count();
    debug!(
        "fill_small_holes: filled {}/{} background regions (max_hole_area={})",
        filled,
        holes.count(),
        max_hole_area
    );

    Mask::from_fn(mask.shape(), |y, x| {
        if mask.get(y, x) {
            return true;
        }
        let l = holes.label_at(y, x);
        l != 0 && holes.areas[l] <= max_hole_area
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use drawseg_core::ImageShape;

    fn rect(shape: ImageShape, x0: usize, y0: usize, w: usize, h: usize) -> Mask {
        Mask::from_fn(shape, |y, x| {
            (x0..x0 + w).contains(&x) && (y0..y0 + h).contains(&y)
        })
    }

    #[test]
    fn test_remove_small_components() {
        let shape = ImageShape::new(50, 50);
        let big = rect(shape, 0, 0, 20, 20);
        let small = rect(shape, 40, 40, 3, 3);
        let mask = big.or(&small);

        let cleaned = remove_small_components(&mask, 100);
        assert_eq!(cleaned, big);
    }

    #[test]
    fn test_remove_small_components_threshold_inclusive() {
        let shape = ImageShape::new(20, 20);
        let mask = rect(shape, 2, 2, 10, 10);
        assert_eq!(remove_small_components(&mask, 100).area(), 100);
        assert_eq!(remove_small_components(&mask, 101).area(), 0);
    }

    #[test]
    fn test_diagonal_pixels_are_one_component() {
        let mut mask = Mask::new(ImageShape::new(5, 5));
        mask.set(0, 0, true);
        mask.set(1, 1, true);
        mask.set(2, 2, true);
        assert_eq!(count_components(&mask), 1);
    }

    #[test]
    fn test_keep_largest_component() {
        let shape = ImageShape::new(40, 40);
        let big = rect(shape, 20, 20, 10, 10);
        let small = rect(shape, 0, 0, 5, 5);
        let kept = keep_largest_component(&big.or(&small));
        assert_eq!(kept, big);
        assert_eq!(count_components(&kept), 1);
    }

    #[test]
    fn test_keep_largest_tie_prefers_raster_first() {
        let shape = ImageShape::new(30, 30);
        let first = rect(shape, 20, 0, 4, 4);
        let second = rect(shape, 0, 10, 4, 4);
        let kept = keep_largest_component(&first.or(&second));
        assert_eq!(kept, first);
    }

    #[test]
    fn test_keep_largest_on_empty() {
        let mask = Mask::new(ImageShape::new(10, 10));
        assert_eq!(keep_largest_component(&mask).area(), 0);
    }

    #[test]
    fn test_fill_small_holes() {
        let shape = ImageShape::new(30, 30);
        let outer = rect(shape, 5, 5, 20, 20);
        let hole = rect(shape, 10, 10, 3, 3);
        let mask = outer.and_not(&hole);

        let filled = fill_small_holes(&mask, 500);
        // The border background region is 500 pixels, so it is filled too
        assert_eq!(filled.area(), 900);

        let filled = fill_small_holes(&mask, 100);
        assert_eq!(filled, outer);
    }

    #[test]
    fn test_fill_small_holes_respects_limit() {
        let shape = ImageShape::new(30, 30);
        let outer = rect(shape, 5, 5, 20, 20);
        let hole = rect(shape, 10, 10, 5, 5);
        let mask = outer.and_not(&hole);
        assert_eq!(fill_small_holes(&mask, 24), mask);
        assert_eq!(fill_small_holes(&mask, 25), outer);
    }

    #[test]
    fn test_empty_mask_unchanged() {
        let mask = Mask::new(ImageShape::new(0, 7));
        assert_eq!(remove_small_components(&mask, 10), mask);
        assert_eq!(fill_small_holes(&mask, 10), mask);
        assert_eq!(count_components(&mask), 0);
    }
}
