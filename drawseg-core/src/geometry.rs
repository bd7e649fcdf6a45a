//! Bounding boxes and image-space geometry helpers

use serde::{Deserialize, Serialize};

/// Pixel dimensions of the source image every mask of a request shares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageShape {
    pub height: usize,
    pub width: usize,
}

impl ImageShape {
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }

    /// Total number of pixels
    pub fn area(&self) -> usize {
        self.height.saturating_mul(self.width)
    }

    pub fn is_empty(&self) -> bool {
        self.height == 0 || self.width == 0
    }
}

/// Region of the page, split into a 3x3 grid of thirds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
    LeftSide,
    RightSide,
    Top,
    Bottom,
}

/// Axis-aligned box in pixel coordinates (x1, y1, x2, y2)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// The all-zero box used for empty masks
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        let w = self.width();
        let h = self.height();
        if w <= 0.0 || h <= 0.0 {
            0.0
        } else {
            w * h
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Intersection over Union with another box.
    ///
    /// Non-finite or degenerate boxes yield 0.0.
    pub fn iou(&self, other: &BBox) -> f32 {
        if !self.is_finite() || !other.is_finite() {
            return 0.0;
        }

        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        if ix2 <= ix1 || iy2 <= iy1 {
            return 0.0;
        }

        let intersection = (ix2 - ix1) * (iy2 - iy1);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 || !union.is_finite() {
            return 0.0;
        }

        (intersection / union).clamp(0.0, 1.0)
    }

    /// Coordinates scaled to the 0-1 range of the image
    pub fn normalized(&self, shape: ImageShape) -> BBox {
        if shape.is_empty() {
            return BBox::zero();
        }
        let w = shape.width as f32;
        let h = shape.height as f32;
        BBox::new(self.x1 / w, self.y1 / h, self.x2 / w, self.y2 / h)
    }

    /// Inverse of [`BBox::normalized`]
    pub fn denormalized(&self, shape: ImageShape) -> BBox {
        let w = shape.width as f32;
        let h = shape.height as f32;
        BBox::new(self.x1 * w, self.y1 * h, self.x2 * w, self.y2 * h)
    }

    /// Box area divided by image area
    pub fn area_ratio(&self, shape: ImageShape) -> f32 {
        let image_area = shape.area();
        if image_area == 0 {
            return 0.0;
        }
        self.area() / image_area as f32
    }

    /// Grow by `ratio` of the box size on every side, clamped to the image
    pub fn expand(&self, ratio: f32, shape: ImageShape) -> BBox {
        let dx = self.width() * ratio;
        let dy = self.height() * ratio;
        BBox::new(
            (self.x1 - dx).max(0.0),
            (self.y1 - dy).max(0.0),
            (self.x2 + dx).min(shape.width as f32),
            (self.y2 + dy).min(shape.height as f32),
        )
    }

    /// Rescale from one image frame into another of a different resolution
    pub fn rescale(&self, from: ImageShape, to: ImageShape) -> BBox {
        if from.is_empty() || from == to {
            return *self;
        }
        let sx = to.width as f32 / from.width as f32;
        let sy = to.height as f32 / from.height as f32;
        BBox::new(self.x1 * sx, self.y1 * sy, self.x2 * sx, self.y2 * sy)
    }

    /// Rescale a box of inclusive pixel indices, so the last pixel of the
    /// source maps to the last pixel it covers in the target.
    pub fn rescale_pixels(&self, from: ImageShape, to: ImageShape) -> BBox {
        if from.is_empty() || from == to {
            return *self;
        }
        let sx = to.width as f32 / from.width as f32;
        let sy = to.height as f32 / from.height as f32;
        BBox::new(
            self.x1 * sx,
            self.y1 * sy,
            (self.x2 + 1.0) * sx - 1.0,
            (self.y2 + 1.0) * sy - 1.0,
        )
    }

    /// Smallest box containing both
    pub fn union(&self, other: &BBox) -> BBox {
        BBox::new(
            self.x1.min(other.x1),
            self.y1.min(other.y1),
            self.x2.max(other.x2),
            self.y2.max(other.y2),
        )
    }

    /// Whether the box centre falls into `region` of the image
    pub fn is_in_region(&self, shape: ImageShape, region: Region) -> bool {
        if shape.is_empty() {
            return false;
        }
        let (cx, cy) = self.center();
        let cx = cx / shape.width as f32;
        let cy = cy / shape.height as f32;

        const LEFT: f32 = 0.33;
        const RIGHT: f32 = 0.67;
        const TOP: f32 = 0.33;
        const BOTTOM: f32 = 0.67;

        match region {
            Region::TopLeft => cx < LEFT && cy < TOP,
            Region::TopRight => cx > RIGHT && cy < TOP,
            Region::BottomLeft => cx < LEFT && cy > BOTTOM,
            Region::BottomRight => cx > RIGHT && cy > BOTTOM,
            Region::Center => (LEFT..=RIGHT).contains(&cx) && (TOP..=BOTTOM).contains(&cy),
            Region::LeftSide => cx < LEFT,
            Region::RightSide => cx > RIGHT,
            Region::Top => cy < TOP,
            Region::Bottom => cy > BOTTOM,
        }
    }
}

impl From<(f32, f32, f32, f32)> for BBox {
    fn from(t: (f32, f32, f32, f32)) -> Self {
        BBox::new(t.0, t.1, t.2, t.3)
    }
}

impl From<[f32; 4]> for BBox {
    fn from(a: [f32; 4]) -> Self {
        BBox::new(a[0], a[1], a[2], a[3])
    }
}

/// Greedily merge boxes whose IoU with the group seed is at least
/// `iou_threshold` into their common bounding box.
pub fn merge_overlapping_boxes(boxes: &[BBox], iou_threshold: f32) -> Vec<BBox> {
    let mut remaining: Vec<BBox> = boxes.to_vec();
    let mut merged = Vec::new();

    while !remaining.is_empty() {
        let seed = remaining.remove(0);
        let mut group = seed;
        let mut i = 0;
        while i < remaining.len() {
            if seed.iou(&remaining[i]) >= iou_threshold {
                group = group.union(&remaining.remove(i));
            } else {
                i += 1;
            }
        }
        merged.push(group);
    }

    merged
}
