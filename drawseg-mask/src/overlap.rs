//! Exclusive pixel assignment across candidates

use crate::filters::by_score_desc;
use drawseg_core::{Candidate, Mask};
use tracing::debug;

/// Give every contested pixel to the highest-scoring mask that covers it.
///
/// Masks are visited by descending score; each loses the pixels already
/// claimed, then claims its original pixels. The result keeps the input
/// order. Masks of different shapes leave the set untouched and the reason
/// is returned alongside.
pub fn enforce_non_overlapping(candidates: Vec<Candidate>) -> (Vec<Candidate>, Option<String>) {
    if candidates.is_empty() {
        return (candidates, None);
    }
    let shape = candidates[0].mask.shape();
    if let Some(odd) = candidates.iter().find(|c| c.mask.shape() != shape) {
        let reason = format!(
            "non-overlap skipped: mask shapes differ ({}x{} vs {}x{})",
            shape.height,
            shape.width,
            odd.mask.height(),
            odd.mask.width()
        );
        return (candidates, Some(reason));
    }

    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| by_score_desc(&candidates[a], &candidates[b]));

    let mut claimed = Mask::new(shape);
    let mut exclusive: Vec<Option<Mask>> = vec![None; candidates.len()];
    for &i in &order {
        let original = &candidates[i].mask;
        exclusive[i] = Some(original.and_not(&claimed));
        claimed = claimed.or(original);
    }

    let mut removed = 0usize;
    let result: Vec<Candidate> = candidates
        .into_iter()
        .zip(exclusive)
        .map(|(mut c, m)| {
            if let Some(m) = m {
                removed += c.mask.area() - m.area();
                c.set_mask(m);
            }
            c
        })
        .collect();

    debug!("enforce_non_overlapping: removed {} contested pixels", removed);
    (result, None)
}
