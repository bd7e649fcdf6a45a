//! Candidate-set filters: predicted-quality threshold, NMS, edge rejection
//! and logit stability

use drawseg_core::{Candidate, ImageShape, Mask};
use ndarray::Array2;
use std::cmp::Ordering;
use tracing::debug;

/// Descending score order with NaN last; stable when used with `sort_by`
pub fn by_score_desc(a: &Candidate, b: &Candidate) -> Ordering {
    score_key(b.score).total_cmp(&score_key(a.score))
}

fn score_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

/// Keep candidates whose score is at least `min_score`
pub fn filter_by_score(candidates: Vec<Candidate>, min_score: f32) -> Vec<Candidate> {
    let before = candidates.len();
    let kept: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| c.score >= min_score)
        .collect();
    debug!(
        "filter_by_score: kept {}/{} (min_score={})",
        kept.len(),
        before,
        min_score
    );
    kept
}

/// Greedy non-maximum suppression over candidate boxes.
///
/// Candidates are visited by descending score; each kept box suppresses any
/// later box whose IoU with it exceeds `iou_threshold`. The survivors come
/// back in descending score order.
pub fn nms(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    if candidates.len() < 2 {
        return candidates;
    }
    candidates.sort_by(by_score_desc);

    let before = candidates.len();
    let mut kept: Vec<Candidate> = Vec::with_capacity(before);
    for c in candidates {
        if kept.iter().all(|k| k.bbox.iou(&c.bbox) <= iou_threshold) {
            kept.push(c);
        }
    }

    debug!(
        "nms: kept {}/{} (iou_threshold={})",
        kept.len(),
        before,
        iou_threshold
    );
    kept
}

/// Whether the mask's bounding box, in image coordinates, comes within
/// `tolerance` pixels of the image border. Empty masks are never near.
pub fn is_mask_near_edge(mask: &Mask, image_shape: ImageShape, tolerance: usize) -> bool {
    let bbox = match mask.bbox() {
        Some(b) => b.rescale_pixels(mask.shape(), image_shape),
        None => return false,
    };
    let tol = tolerance as f32;
    let w = image_shape.width as f32;
    let h = image_shape.height as f32;

    bbox.x1 <= tol || bbox.y1 <= tol || bbox.x2 >= w - tol - 1.0 || bbox.y2 >= h - tol - 1.0
}

/// Drop candidates whose masks touch the image border
pub fn filter_edge_masks(
    candidates: Vec<Candidate>,
    image_shape: ImageShape,
    tolerance: usize,
) -> Vec<Candidate> {
    let before = candidates.len();
    let kept: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| !is_mask_near_edge(&c.mask, image_shape, tolerance))
        .collect();
    debug!(
        "filter_edge_masks: kept {}/{} (tolerance={}px)",
        kept.len(),
        before,
        tolerance
    );
    kept
}

/// Ratio of pixels above `threshold + offset` to pixels above
/// `threshold - offset`; 0.0 when nothing clears the lower level.
pub fn compute_stability_score(logits: &Array2<f32>, threshold: f32, offset: f32) -> f32 {
    let high = threshold + offset;
    let low = threshold - offset;
    let mut intersection = 0usize;
    let mut union = 0usize;
    for &v in logits.iter() {
        if v > high {
            intersection += 1;
        }
        if v > low {
            union += 1;
        }
    }
    if union == 0 {
        return 0.0;
    }
    intersection as f32 / union as f32
}

/// Drop candidates whose logit stability is below `min_score`.
///
/// Needs logits on every candidate; otherwise the set is returned untouched
/// together with the reason the filter was skipped.
pub fn filter_by_stability(
    candidates: Vec<Candidate>,
    min_score: f32,
    threshold: f32,
    offset: f32,
) -> (Vec<Candidate>, Option<String>) {
    let missing = candidates.iter().filter(|c| c.low_res_logits.is_none()).count();
    if missing > 0 {
        let reason = format!(
            "stability filtering skipped: {} of {} candidates carry no logits",
            missing,
            candidates.len()
        );
        return (candidates, Some(reason));
    }

    let before = candidates.len();
    let kept: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| {
            c.low_res_logits
                .as_ref()
                .map(|l| compute_stability_score(l, threshold, offset) >= min_score)
                .unwrap_or(false)
        })
        .collect();
    debug!(
        "filter_by_stability: kept {}/{} (min_score={})",
        kept.len(),
        before,
        min_score
    );
    (kept, None)
}
