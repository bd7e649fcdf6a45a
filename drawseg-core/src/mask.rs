//! Canonical binary mask and the raw model mask formats it is built from

use crate::geometry::{BBox, ImageShape};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use ndarray::{Array2, ArrayD, Axis, Ix2};
use serde::{Deserialize, Serialize};

/// Binary segmentation mask, one cell per pixel, indexed `[row, col]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mask {
    data: Array2<bool>,
}

impl Mask {
    /// All-background mask of the given shape
    pub fn new(shape: ImageShape) -> Self {
        Self {
            data: Array2::from_elem((shape.height, shape.width), false),
        }
    }

    pub fn from_array(data: Array2<bool>) -> Self {
        Self { data }
    }

    /// Build a mask by evaluating `f(row, col)` for every pixel
    pub fn from_fn<F>(shape: ImageShape, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> bool,
    {
        Self {
            data: Array2::from_shape_fn((shape.height, shape.width), |(y, x)| f(y, x)),
        }
    }

    /// Interpret a grayscale image as a mask (values > 127 are foreground)
    pub fn from_gray_image(image: &GrayImage) -> Self {
        let (w, h) = image.dimensions();
        Self {
            data: Array2::from_shape_fn((h as usize, w as usize), |(y, x)| {
                image.get_pixel(x as u32, y as u32)[0] > 127
            }),
        }
    }

    /// 0/255 grayscale rendering, the form the image-processing routines expect
    pub fn to_gray_image(&self) -> GrayImage {
        let (h, w) = self.data.dim();
        GrayImage::from_fn(w as u32, h as u32, |x, y| {
            Luma([if self.data[[y as usize, x as usize]] { 255 } else { 0 }])
        })
    }

    pub fn shape(&self) -> ImageShape {
        let (h, w) = self.data.dim();
        ImageShape::new(h, w)
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    /// True when the mask has no pixels at all (zero height or width)
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of foreground pixels
    pub fn area(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    pub fn has_foreground(&self) -> bool {
        self.data.iter().any(|&v| v)
    }

    pub fn get(&self, y: usize, x: usize) -> bool {
        self.data.get((y, x)).copied().unwrap_or(false)
    }

    pub fn set(&mut self, y: usize, x: usize, value: bool) {
        if let Some(cell) = self.data.get_mut((y, x)) {
            *cell = value;
        }
    }

    pub fn as_array(&self) -> &Array2<bool> {
        &self.data
    }

    pub fn as_array_mut(&mut self) -> &mut Array2<bool> {
        &mut self.data
    }

    pub fn into_array(self) -> Array2<bool> {
        self.data
    }

    /// Tight box around foreground pixels with inclusive max coordinates,
    /// `None` when the mask has no foreground.
    pub fn bbox(&self) -> Option<BBox> {
        let mut min_x = usize::MAX;
        let mut min_y = usize::MAX;
        let mut max_x = 0usize;
        let mut max_y = 0usize;
        let mut found = false;

        for ((y, x), &v) in self.data.indexed_iter() {
            if v {
                found = true;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }

        found.then(|| BBox::new(min_x as f32, min_y as f32, max_x as f32, max_y as f32))
    }

    /// [`Mask::bbox`] with the all-zero box for empty masks
    pub fn bbox_or_zero(&self) -> BBox {
        self.bbox().unwrap_or_else(BBox::zero)
    }

    /// Nearest-neighbour resample to `shape`; a no-op when already there
    pub fn resize_nearest(&self, shape: ImageShape) -> Mask {
        if self.shape() == shape {
            return self.clone();
        }
        if self.is_empty() || shape.is_empty() {
            return Mask::new(shape);
        }
        let resized = imageops::resize(
            &self.to_gray_image(),
            shape.width as u32,
            shape.height as u32,
            FilterType::Nearest,
        );
        Mask::from_gray_image(&resized)
    }

    /// Pixel-wise AND. Shapes must match, otherwise `self` is returned.
    pub fn and(&self, other: &Mask) -> Mask {
        self.zip_with(other, |a, b| a && b)
    }

    /// Pixel-wise OR. Shapes must match, otherwise `self` is returned.
    pub fn or(&self, other: &Mask) -> Mask {
        self.zip_with(other, |a, b| a || b)
    }

    /// Pixels of `self` that are not set in `other`
    pub fn and_not(&self, other: &Mask) -> Mask {
        self.zip_with(other, |a, b| a && !b)
    }

    /// Number of pixels set in both masks
    pub fn intersection_area(&self, other: &Mask) -> usize {
        if self.shape() != other.shape() {
            return 0;
        }
        self.data
            .iter()
            .zip(other.data.iter())
            .filter(|(&a, &b)| a && b)
            .count()
    }

    fn zip_with<F>(&self, other: &Mask, f: F) -> Mask
    where
        F: Fn(bool, bool) -> bool,
    {
        if self.shape() != other.shape() {
            return self.clone();
        }
        let mut data = self.data.clone();
        data.zip_mut_with(&other.data, |a, &b| *a = f(*a, b));
        Mask { data }
    }
}

/// Mask exactly as the model returned it, before binarisation
#[derive(Debug, Clone, PartialEq)]
pub enum RawMask {
    Bool(ArrayD<bool>),
    Float(ArrayD<f32>),
    Byte(ArrayD<u8>),
}

impl RawMask {
    /// Dimensions of the underlying array
    pub fn dims(&self) -> Vec<usize> {
        match self {
            RawMask::Bool(a) => a.shape().to_vec(),
            RawMask::Float(a) => a.shape().to_vec(),
            RawMask::Byte(a) => a.shape().to_vec(),
        }
    }

    /// Convert to the canonical binary mask.
    ///
    /// Singleton axes are squeezed first. Floats are foreground when strictly
    /// greater than `threshold` (NaN is background). Bytes with a maximum of
    /// at most 1 are foreground when non-zero, otherwise above 127.
    /// Returns `None` when the array is not two-dimensional after squeezing.
    pub fn binarize(&self, threshold: f32) -> Option<Mask> {
        match self {
            RawMask::Bool(a) => squeeze_2d(a.clone()).map(Mask::from_array),
            RawMask::Float(a) => {
                squeeze_2d(a.mapv(|v| v > threshold)).map(Mask::from_array)
            }
            RawMask::Byte(a) => {
                let max = a.iter().copied().max().unwrap_or(0);
                let cut = if max <= 1 { 0 } else { 127 };
                squeeze_2d(a.mapv(|v| v > cut)).map(Mask::from_array)
            }
        }
    }
}

impl From<Array2<bool>> for RawMask {
    fn from(a: Array2<bool>) -> Self {
        RawMask::Bool(a.into_dyn())
    }
}

impl From<Array2<f32>> for RawMask {
    fn from(a: Array2<f32>) -> Self {
        RawMask::Float(a.into_dyn())
    }
}

impl From<Array2<u8>> for RawMask {
    fn from(a: Array2<u8>) -> Self {
        RawMask::Byte(a.into_dyn())
    }
}

impl From<Mask> for RawMask {
    fn from(m: Mask) -> Self {
        RawMask::Bool(m.into_array().into_dyn())
    }
}

fn squeeze_2d<T>(mut a: ArrayD<T>) -> Option<Array2<T>> {
    while a.ndim() > 2 {
        let axis = a.shape().iter().position(|&d| d == 1)?;
        a = a.index_axis_move(Axis(axis), 0);
    }
    a.into_dimensionality::<Ix2>().ok()
}
