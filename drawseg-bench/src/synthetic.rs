// Synthetic drawing masks: rectangle outlines with broken line work and
// speckle, roughly what a model returns for a zone on a CAD sheet.

use drawseg_core::{BBox, ImageShape, ModelOutput, RawMask};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct DrawingGenerator {
    rng: StdRng,
    shape: ImageShape,
}

impl DrawingGenerator {
    pub fn new(shape: ImageShape, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            shape,
        }
    }

    /// A random box covering 20-60% of each side
    pub fn random_box(&mut self) -> BBox {
        let w = self.shape.width as f32;
        let h = self.shape.height as f32;
        let bw = self.rng.gen_range(0.2..0.6) * w;
        let bh = self.rng.gen_range(0.2..0.6) * h;
        let x1 = self.rng.gen_range(0.0..(w - bw).max(1.0));
        let y1 = self.rng.gen_range(0.0..(h - bh).max(1.0));
        BBox::new(x1, y1, x1 + bw, y1 + bh)
    }

    /// Probability map of a box outline with gaps plus background speckle
    pub fn outline_probabilities(&mut self, bbox: &BBox, line_width: usize) -> Array2<f32> {
        let (h, w) = (self.shape.height, self.shape.width);
        let (x0, y0) = (bbox.x1 as usize, bbox.y1 as usize);
        let x1 = (bbox.x2 as usize).min(w.saturating_sub(1));
        let y1 = (bbox.y2 as usize).min(h.saturating_sub(1));
        let lw = line_width.max(1);

        let mut probs = Array2::<f32>::zeros((h, w));
        for ((y, x), p) in probs.indexed_iter_mut() {
            let in_x = (x0..=x1).contains(&x);
            let in_y = (y0..=y1).contains(&y);
            let on_vertical = in_y && (x.abs_diff(x0) < lw || x.abs_diff(x1) < lw);
            let on_horizontal = in_x && (y.abs_diff(y0) < lw || y.abs_diff(y1) < lw);

            *p = if on_vertical || on_horizontal {
                if self.rng.gen_bool(0.05) {
                    0.1
                } else {
                    self.rng.gen_range(0.6..1.0)
                }
            } else if self.rng.gen_bool(0.002) {
                self.rng.gen_range(0.5..1.0)
            } else {
                self.rng.gen_range(0.0..0.3)
            };
        }
        probs
    }

    /// `count` noisy candidates of the same box, as a multimask model would return
    pub fn model_output(&mut self, bbox: &BBox, count: usize) -> ModelOutput {
        let mut masks = Vec::with_capacity(count);
        let mut scores = Vec::with_capacity(count);
        for i in 0..count {
            masks.push(RawMask::from(self.outline_probabilities(bbox, 1 + i % 3)));
            scores.push(self.rng.gen_range(0.5..0.99));
        }
        ModelOutput::new(masks, scores)
    }

    pub fn shape(&self) -> ImageShape {
        self.shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_is_deterministic() {
        let shape = ImageShape::new(64, 64);
        let mut a = DrawingGenerator::new(shape, 7);
        let mut b = DrawingGenerator::new(shape, 7);
        let box_a = a.random_box();
        assert_eq!(box_a, b.random_box());
        assert_eq!(a.outline_probabilities(&box_a, 2), b.outline_probabilities(&box_a, 2));
    }

    #[test]
    fn test_model_output_sizes() {
        let mut g = DrawingGenerator::new(ImageShape::new(32, 48), 1);
        let bbox = g.random_box();
        let out = g.model_output(&bbox, 3);
        assert_eq!(out.len(), 3);
        assert_eq!(out.masks[0].dims(), vec![32, 48]);
        assert!(bbox.x2 <= 48.0 && bbox.y2 <= 32.0);
    }
}
