//! Merging the candidates of several box prompts into one region

use drawseg_core::{Candidate, Mask};
use ndarray::{Array2, Zip};
use tracing::debug;

/// Union of every candidate's mask, with the mean score and a fresh box.
///
/// Masks are brought to the first mask's shape. Logits survive as their
/// element-wise maximum only when every candidate carries logits of the
/// same shape. Returns `None` for an empty set.
pub fn merge_candidates_union(candidates: Vec<Candidate>) -> Option<Candidate> {
    let first = candidates.first()?;
    let shape = first.mask.shape();
    let count = candidates.len();

    let mut union = Mask::new(shape);
    for c in &candidates {
        let m = if c.mask.shape() == shape {
            union.or(&c.mask)
        } else {
            union.or(&c.mask.resize_nearest(shape))
        };
        union = m;
    }

    let score = candidates.iter().map(|c| c.score).sum::<f32>() / count as f32;
    let logits = merge_logits(&candidates);

    debug!(
        "merge_candidates_union: {} candidates -> {} pixels, score {:.3}",
        count,
        union.area(),
        score
    );

    let mut merged = Candidate::new(union, score);
    merged.low_res_logits = logits;
    Some(merged)
}

fn merge_logits(candidates: &[Candidate]) -> Option<Array2<f32>> {
    let mut iter = candidates.iter();
    let mut acc = iter.next()?.low_res_logits.clone()?;
    for c in iter {
        let l = c.low_res_logits.as_ref()?;
        if l.dim() != acc.dim() {
            return None;
        }
        Zip::from(&mut acc).and(l).for_each(|a, &b| *a = a.max(b));
    }
    Some(acc)
}
