//! Candidate masks and the raw model output they are built from

use crate::error::{Error, Result};
use crate::geometry::{BBox, ImageShape};
use crate::mask::{Mask, RawMask};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// One mask hypothesis with everything that must move with it when the
/// candidate set is filtered or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub mask: Mask,
    pub score: f32,
    pub bbox: BBox,
    pub low_res_logits: Option<Array2<f32>>,
}

impl Candidate {
    /// Candidate with the box derived from the mask
    pub fn new(mask: Mask, score: f32) -> Self {
        let bbox = mask.bbox_or_zero();
        Self {
            mask,
            score,
            bbox,
            low_res_logits: None,
        }
    }

    pub fn with_logits(mut self, logits: Array2<f32>) -> Self {
        self.low_res_logits = Some(logits);
        self
    }

    /// Recompute the box after the mask changed
    pub fn refresh_bbox(&mut self) {
        self.bbox = self.mask.bbox_or_zero();
    }

    /// Replace the mask and keep the box in sync
    pub fn set_mask(&mut self, mask: Mask) {
        self.mask = mask;
        self.refresh_bbox();
    }

    pub fn area(&self) -> usize {
        self.mask.area()
    }
}

/// Output of one model invocation, in the model's own formats
#[derive(Debug, Clone, Default)]
pub struct ModelOutput {
    pub masks: Vec<RawMask>,
    pub scores: Vec<f32>,
    /// Parallel to `masks`, or empty to derive boxes from the masks
    pub boxes: Vec<BBox>,
    pub low_res_logits: Option<Vec<Array2<f32>>>,
}

/// Candidates normalised from a [`ModelOutput`] plus what was repaired on the way
#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
    pub candidates: Vec<Candidate>,
    /// Indices of masks that could not be read as 2D and were replaced
    pub malformed: Vec<usize>,
    /// Logits were present but their count did not match the masks
    pub logits_dropped: bool,
}

impl ModelOutput {
    pub fn new(masks: Vec<RawMask>, scores: Vec<f32>) -> Self {
        Self {
            masks,
            scores,
            boxes: Vec::new(),
            low_res_logits: None,
        }
    }

    pub fn with_boxes(mut self, boxes: Vec<BBox>) -> Self {
        self.boxes = boxes;
        self
    }

    pub fn with_logits(mut self, logits: Vec<Array2<f32>>) -> Self {
        self.low_res_logits = Some(logits);
        self
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Binarise every raw mask and zip the parallel arrays into candidates.
    ///
    /// A score list or non-empty box list whose length differs from the mask
    /// count is rejected. A mask that cannot be squeezed to 2D becomes an
    /// all-background mask at `image_shape`. Mismatched logits are dropped.
    pub fn into_candidates(self, image_shape: ImageShape, threshold: f32) -> Result<IngestOutcome> {
        let count = self.masks.len();
        if self.scores.len() != count {
            return Err(Error::LengthMismatch {
                what: "scores".to_string(),
                expected: count,
                actual: self.scores.len(),
            });
        }
        if !self.boxes.is_empty() && self.boxes.len() != count {
            return Err(Error::LengthMismatch {
                what: "boxes".to_string(),
                expected: count,
                actual: self.boxes.len(),
            });
        }

        let mut outcome = IngestOutcome::default();

        let mut logits: Vec<Option<Array2<f32>>> = match self.low_res_logits {
            Some(l) if l.len() == count => l.into_iter().map(Some).collect(),
            Some(_) => {
                outcome.logits_dropped = true;
                vec![None; count]
            }
            None => vec![None; count],
        };

        for (i, (raw, score)) in self.masks.iter().zip(self.scores.iter()).enumerate() {
            let mask = match raw.binarize(threshold) {
                Some(m) => m,
                None => {
                    outcome.malformed.push(i);
                    Mask::new(image_shape)
                }
            };
            let bbox = match self.boxes.get(i) {
                Some(b) => *b,
                None => mask.bbox_or_zero(),
            };
            outcome.candidates.push(Candidate {
                mask,
                score: *score,
                bbox,
                low_res_logits: logits[i].take(),
            });
        }

        Ok(outcome)
    }
}
