//! Candidate ranking by confidence, boundary complexity or area

use crate::filters::by_score_desc;
use crate::primitives::{arc_length, count_components, external_contours};
use drawseg_core::{Candidate, Mask};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Complexity at which the normalised complexity saturates at 1.0
const COMPLEXITY_SCALE: f32 = 10.0;

/// Values the final order was derived from, parallel to the candidates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum RankingValues {
    Combined(Vec<f32>),
    Area(Vec<usize>),
    Score(Vec<f32>),
}

impl RankingValues {
    pub fn len(&self) -> usize {
        match self {
            RankingValues::Combined(v) | RankingValues::Score(v) => v.len(),
            RankingValues::Area(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Total external contour perimeter over the square root of the area.
/// Simple convex blobs land around 3.5 to 4, ragged shapes well above.
pub fn compute_mask_complexity(mask: &Mask) -> f32 {
    let area = mask.area();
    if area == 0 {
        return 0.0;
    }
    let perimeter: f64 = external_contours(mask).iter().map(|c| arc_length(c)).sum();
    (perimeter / (area as f64).sqrt()) as f32
}

/// `(1 - w) * score + w * nc` where `nc` is the complexity scaled into
/// [0, 1], raised by `component_bonus` per extra connected component / 5.
pub fn compute_combined_score(score: f32, mask: &Mask, weight: f32, component_bonus: f32) -> f32 {
    let complexity = compute_mask_complexity(mask);
    let mut normalized = (complexity / COMPLEXITY_SCALE).min(1.0);

    if component_bonus > 0.0 {
        let components = count_components(mask);
        let bonus = component_bonus * components.saturating_sub(1) as f32 / 5.0;
        normalized = (normalized + bonus).min(1.0);
    }

    let combined = (1.0 - weight) * score + weight * normalized;
    debug!(
        "Combined score: score={:.3}, complexity={:.2} (norm={:.3}), combined={:.3}",
        score, complexity, normalized, combined
    );
    combined
}

/// Stable reorder of `candidates` by `keys`, returning the keys permuted the
/// same way.
fn reorder_by<K, F>(candidates: Vec<Candidate>, keys: Vec<K>, cmp: F) -> (Vec<Candidate>, Vec<K>)
where
    F: Fn(&K, &K) -> std::cmp::Ordering,
{
    let mut paired: Vec<(Candidate, K)> = candidates.into_iter().zip(keys).collect();
    paired.sort_by(|a, b| cmp(&a.1, &b.1));
    paired.into_iter().unzip()
}

fn desc_nan_last(a: &f32, b: &f32) -> std::cmp::Ordering {
    let key = |v: f32| if v.is_nan() { f32::NEG_INFINITY } else { v };
    key(*b).total_cmp(&key(*a))
}

/// Sort by combined score, highest first
pub fn rank_by_combined_score(
    candidates: Vec<Candidate>,
    weight: f32,
    component_bonus: f32,
) -> (Vec<Candidate>, Vec<f32>) {
    let combined: Vec<f32> = candidates
        .iter()
        .map(|c| compute_combined_score(c.score, &c.mask, weight, component_bonus))
        .collect();
    reorder_by(candidates, combined, desc_nan_last)
}

/// Sort by foreground pixel count
pub fn rank_by_area(candidates: Vec<Candidate>, largest_first: bool) -> (Vec<Candidate>, Vec<usize>) {
    let areas: Vec<usize> = candidates.iter().map(|c| c.area()).collect();
    if largest_first {
        reorder_by(candidates, areas, |a, b| b.cmp(a))
    } else {
        reorder_by(candidates, areas, |a, b| a.cmp(b))
    }
}

/// Sort by model confidence, highest first
pub fn rank_by_score(mut candidates: Vec<Candidate>) -> (Vec<Candidate>, Vec<f32>) {
    candidates.sort_by(by_score_desc);
    let scores = candidates.iter().map(|c| c.score).collect();
    (candidates, scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use drawseg_core::ImageShape;
    use ndarray::Array2;

    fn rect(shape: ImageShape, x0: usize, y0: usize, w: usize, h: usize) -> Mask {
        Mask::from_fn(shape, |y, x| {
            (x0..x0 + w).contains(&x) && (y0..y0 + h).contains(&y)
        })
    }

    #[test]
    fn test_complexity_empty_is_zero() {
        assert_eq!(compute_mask_complexity(&Mask::new(ImageShape::new(10, 10))), 0.0);
    }

    #[test]
    fn test_complexity_square_near_four() {
        let m = rect(ImageShape::new(100, 100), 20, 20, 50, 50);
        let c = compute_mask_complexity(&m);
        // Contour runs through pixel centres: perimeter 4 * 49 over sqrt(2500)
        assert!((c - 3.92).abs() < 0.05, "complexity {}", c);
    }

    #[test]
    fn test_complexity_ignores_position() {
        let shape = ImageShape::new(50, 50);
        let interior = compute_mask_complexity(&rect(shape, 15, 15, 20, 20));
        assert!((interior - 3.8).abs() < 1e-4, "complexity {}", interior);

        for (x0, y0) in [(0, 15), (0, 0), (15, 0), (30, 30)] {
            let c = compute_mask_complexity(&rect(shape, x0, y0, 20, 20));
            assert!((c - interior).abs() < 1e-4, "square at ({}, {}): {}", x0, y0, c);
        }
    }

    #[test]
    fn test_left_border_mask_ranks_by_shape() {
        let shape = ImageShape::new(50, 50);
        let bar = rect(shape, 0, 20, 45, 3);
        let square = rect(shape, 15, 15, 20, 20);
        let (ranked, _) = rank_by_combined_score(
            vec![Candidate::new(square, 0.9), Candidate::new(bar, 0.9)],
            0.5,
            0.0,
        );
        assert_eq!(ranked[0].mask.bbox().map(|b| b.x1), Some(0.0));
    }

    #[test]
    fn test_thin_shape_more_complex_than_square() {
        let shape = ImageShape::new(100, 100);
        let square = rect(shape, 20, 20, 40, 40);
        let bar = rect(shape, 5, 50, 90, 4);
        assert!(compute_mask_complexity(&bar) > compute_mask_complexity(&square));
    }

    #[test]
    fn test_combined_score_weights() {
        let m = rect(ImageShape::new(100, 100), 20, 20, 50, 50);
        assert!((compute_combined_score(0.8, &m, 0.0, 0.0) - 0.8).abs() < 1e-6);
        let nc = compute_mask_complexity(&m) / 10.0;
        assert!((compute_combined_score(0.8, &m, 1.0, 0.0) - nc).abs() < 1e-6);
    }

    #[test]
    fn test_component_bonus() {
        let shape = ImageShape::new(100, 100);
        let two = rect(shape, 10, 10, 20, 20).or(&rect(shape, 60, 60, 20, 20));
        let without = compute_combined_score(0.5, &two, 0.5, 0.0);
        let with = compute_combined_score(0.5, &two, 0.5, 1.0);
        assert!((with - without - 0.5 * 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_rank_by_area_moves_logits() {
        let shape = ImageShape::new(50, 50);
        let small = Candidate::new(rect(shape, 0, 0, 5, 5), 0.9).with_logits(Array2::from_elem((2, 2), 1.0));
        let large = Candidate::new(rect(shape, 0, 0, 20, 20), 0.5).with_logits(Array2::from_elem((2, 2), 2.0));

        let (ranked, areas) = rank_by_area(vec![small.clone(), large.clone()], true);
        assert_eq!(areas, vec![400, 25]);
        assert_eq!(ranked, vec![large.clone(), small.clone()]);

        let (ranked, areas) = rank_by_area(vec![large.clone(), small.clone()], false);
        assert_eq!(areas, vec![25, 400]);
        assert_eq!(ranked[0].low_res_logits, small.low_res_logits);
    }

    #[test]
    fn test_rank_by_score_is_stable() {
        let shape = ImageShape::new(10, 10);
        let a = Candidate::new(rect(shape, 0, 0, 2, 2), 0.7);
        let b = Candidate::new(rect(shape, 5, 5, 2, 2), 0.7);
        let c = Candidate::new(rect(shape, 3, 3, 2, 2), 0.9);
        let (ranked, scores) = rank_by_score(vec![a.clone(), b.clone(), c.clone()]);
        assert_eq!(scores, vec![0.9, 0.7, 0.7]);
        assert_eq!(ranked, vec![c, a, b]);
    }

    #[test]
    fn test_ranking_values_serialize() {
        let v = RankingValues::Area(vec![3, 1]);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"kind":"area","values":[3,1]}"#);
        assert_eq!(v.len(), 2);
    }
}
