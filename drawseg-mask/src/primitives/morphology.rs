//! Binary morphology with elliptical structuring elements

use drawseg_core::Mask;
use ndarray::Array2;

/// Elliptical structuring element described by its half-width on each row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EllipseKernel {
    size: usize,
    half_widths: Vec<usize>,
}

impl EllipseKernel {
    /// Ellipse inscribed in a `size` x `size` square. Row `dy` from the centre
    /// spans `round(sqrt(r^2 - dy^2))` pixels either side, with `r = size / 2`.
    pub fn new(size: usize) -> Self {
        let r = size / 2;
        let half_widths = (0..=2 * r)
            .map(|i| {
                let dy = i as f64 - r as f64;
                let rr = (r * r) as f64;
                (rr - dy * dy).max(0.0).sqrt().round() as usize
            })
            .collect();
        Self { size, half_widths }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn radius(&self) -> usize {
        self.size / 2
    }

    /// Whether a mask is too small for this kernel in either dimension
    pub fn exceeds(&self, mask: &Mask) -> bool {
        mask.height() < self.size || mask.width() < self.size
    }

    /// Offsets (dy, half-width) of every kernel row
    fn rows(&self) -> impl Iterator<Item = (isize, usize)> + '_ {
        let r = self.radius() as isize;
        self.half_widths
            .iter()
            .enumerate()
            .map(move |(i, &hw)| (i as isize - r, hw))
    }
}

/// Per-row prefix sums of foreground pixels, one extra leading column
fn row_prefix(mask: &Mask) -> Array2<usize> {
    let (h, w) = (mask.height(), mask.width());
    let data = mask.as_array();
    let mut prefix = Array2::zeros((h, w + 1));
    for y in 0..h {
        for x in 0..w {
            prefix[[y, x + 1]] = prefix[[y, x]] + usize::from(data[[y, x]]);
        }
    }
    prefix
}

/// Clipped column range `[lo, hi)` covered by half-width `hw` around `x`
fn span(x: usize, hw: usize, width: usize) -> (usize, usize) {
    (x.saturating_sub(hw), (x + hw + 1).min(width))
}

/// Set a pixel when any pixel under the kernel is set. Pixels outside the
/// image do not contribute.
pub fn dilate(mask: &Mask, kernel: &EllipseKernel) -> Mask {
    if mask.is_empty() {
        return mask.clone();
    }
    let (h, w) = (mask.height() as isize, mask.width());
    let prefix = row_prefix(mask);

    Mask::from_fn(mask.shape(), |y, x| {
        kernel.rows().any(|(dy, hw)| {
            let yy = y as isize + dy;
            if yy < 0 || yy >= h {
                return false;
            }
            let (lo, hi) = span(x, hw, w);
            prefix[[yy as usize, hi]] > prefix[[yy as usize, lo]]
        })
    })
}

/// Keep a pixel only when every pixel under the kernel is set. Pixels
/// outside the image count as set.
pub fn erode(mask: &Mask, kernel: &EllipseKernel) -> Mask {
    if mask.is_empty() {
        return mask.clone();
    }
    let (h, w) = (mask.height() as isize, mask.width());
    let prefix = row_prefix(mask);

    Mask::from_fn(mask.shape(), |y, x| {
        kernel.rows().all(|(dy, hw)| {
            let yy = y as isize + dy;
            if yy < 0 || yy >= h {
                return true;
            }
            let (lo, hi) = span(x, hw, w);
            prefix[[yy as usize, hi]] - prefix[[yy as usize, lo]] == hi - lo
        })
    })
}

/// Dilation followed by erosion
pub fn close(mask: &Mask, kernel: &EllipseKernel) -> Mask {
    erode(&dilate(mask, kernel), kernel)
}

/// Erosion followed by dilation
pub fn open(mask: &Mask, kernel: &EllipseKernel) -> Mask {
    dilate(&erode(mask, kernel), kernel)
}

/// Opening then closing, the smoothing pass of generic cleanup.
/// Masks smaller than the kernel are returned unchanged.
pub fn smooth(mask: &Mask, kernel_size: usize) -> Mask {
    let kernel = EllipseKernel::new(kernel_size);
    if kernel_size == 0 || mask.is_empty() || kernel.exceeds(mask) {
        return mask.clone();
    }
    close(&open(mask, &kernel), &kernel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use drawseg_core::ImageShape;

    #[test]
    fn test_kernel_shape_matches_ellipse() {
        let k = EllipseKernel::new(5);
        assert_eq!(k.half_widths, vec![0, 2, 2, 2, 0]);
        let k = EllipseKernel::new(3);
        assert_eq!(k.half_widths, vec![0, 1, 0]);
        let k = EllipseKernel::new(1);
        assert_eq!(k.half_widths, vec![0]);
    }

    #[test]
    fn test_dilate_single_pixel() {
        let mut mask = Mask::new(ImageShape::new(9, 9));
        mask.set(4, 4, true);
        let d = dilate(&mask, &EllipseKernel::new(3));
        // Plus-shaped cross
        assert_eq!(d.area(), 5);
        assert!(d.get(3, 4) && d.get(5, 4) && d.get(4, 3) && d.get(4, 5));
        assert!(!d.get(3, 3));
    }

    #[test]
    fn test_erode_removes_thin_line() {
        let shape = ImageShape::new(10, 10);
        let line = Mask::from_fn(shape, |y, _| y == 5);
        assert_eq!(erode(&line, &EllipseKernel::new(3)).area(), 0);
    }

    #[test]
    fn test_erode_border_counts_as_foreground() {
        let full = Mask::from_fn(ImageShape::new(6, 6), |_, _| true);
        assert_eq!(erode(&full, &EllipseKernel::new(5)), full);
    }

    #[test]
    fn test_close_bridges_small_gap() {
        let shape = ImageShape::new(20, 20);
        let mask = Mask::from_fn(shape, |y, x| (5..15).contains(&y) && x != 10 && (3..17).contains(&x));
        let closed = close(&mask, &EllipseKernel::new(5));
        assert!(closed.get(10, 10));
    }

    #[test]
    fn test_open_removes_speck() {
        let shape = ImageShape::new(30, 30);
        let mut mask = Mask::from_fn(shape, |y, x| (5..20).contains(&y) && (5..20).contains(&x));
        mask.set(27, 27, true);
        let opened = open(&mask, &EllipseKernel::new(5));
        assert!(!opened.get(27, 27));
        assert!(opened.get(12, 12));
    }

    #[test]
    fn test_smooth_skips_tiny_masks() {
        let mut mask = Mask::new(ImageShape::new(3, 3));
        mask.set(1, 1, true);
        assert_eq!(smooth(&mask, 5), mask);
    }

    mod props {
        use super::*;
        use ndarray::Array2;
        use proptest::prelude::*;

        fn arb_mask() -> impl Strategy<Value = Mask> {
            (1usize..20, 1usize..20).prop_flat_map(|(h, w)| {
                prop::collection::vec(any::<bool>(), h * w).prop_map(move |bits| {
                    Mask::from_array(Array2::from_shape_vec((h, w), bits).unwrap())
                })
            })
        }

        proptest! {
            #[test]
            fn test_close_never_removes(mask in arb_mask(), k in prop::sample::select(vec![1usize, 3, 5, 7])) {
                let closed = close(&mask, &EllipseKernel::new(k));
                prop_assert_eq!(closed.intersection_area(&mask), mask.area());
            }

            #[test]
            fn test_open_never_adds(mask in arb_mask(), k in prop::sample::select(vec![1usize, 3, 5, 7])) {
                let opened = open(&mask, &EllipseKernel::new(k));
                prop_assert_eq!(opened.intersection_area(&mask), opened.area());
            }

            #[test]
            fn test_dilate_and_erode_bracket_mask(mask in arb_mask()) {
                let k = EllipseKernel::new(3);
                let d = dilate(&mask, &k);
                let e = erode(&mask, &k);
                prop_assert_eq!(d.intersection_area(&mask), mask.area());
                prop_assert_eq!(e.intersection_area(&mask), e.area());
            }
        }
    }
}
