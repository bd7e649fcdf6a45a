//! Detected page zones and their post-processing

use crate::prompts::{ZonePromptSet, ZoneType};
use drawseg_core::{BBox, Candidate, ImageShape};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// IoU above which two zones count as the same detection
pub const DEFAULT_ZONE_IOU_THRESHOLD: f32 = 0.7;

/// Largest gap in pixels between zones that still merge
pub const DEFAULT_MERGE_GAP: f32 = 20.0;

const LOCATION_BOOST: f32 = 1.1;
const LOCATION_PENALTY: f32 = 0.9;

/// One detected zone on a drawing sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneResult {
    pub zone_id: String,
    pub zone_type: ZoneType,
    pub prompt_matched: String,
    pub confidence: f32,
    pub bbox: BBox,
    pub bbox_normalized: Option<BBox>,
    pub area_ratio: Option<f32>,
}

impl ZoneResult {
    pub fn new(
        zone_id: impl Into<String>,
        zone_type: ZoneType,
        prompt_matched: impl Into<String>,
        confidence: f32,
        bbox: BBox,
    ) -> Self {
        Self {
            zone_id: zone_id.into(),
            zone_type,
            prompt_matched: prompt_matched.into(),
            confidence,
            bbox,
            bbox_normalized: None,
            area_ratio: None,
        }
    }

    /// Fill in the normalised box and area ratio for `shape`
    pub fn with_image_shape(mut self, shape: ImageShape) -> Self {
        self.refresh_geometry(shape);
        self
    }

    pub fn refresh_geometry(&mut self, shape: ImageShape) {
        self.bbox_normalized = Some(self.bbox.normalized(shape));
        self.area_ratio = Some(self.bbox.area_ratio(shape));
    }
}

/// Turn the candidates found for one text prompt into zones.
///
/// Candidates below `min_confidence` are dropped. Ids continue from
/// `next_index` as `zone_000`, `zone_001`, ... and the index past the
/// last zone is returned with them.
pub fn zones_from_candidates(
    prompt_set: &ZonePromptSet,
    prompt: &str,
    candidates: &[Candidate],
    image_shape: ImageShape,
    min_confidence: f32,
    next_index: usize,
) -> (Vec<ZoneResult>, usize) {
    let zone_type = prompt_set.zone_type_for_prompt(prompt);
    let mut index = next_index;
    let mut zones = Vec::new();

    for candidate in candidates {
        if candidate.score < min_confidence || !candidate.mask.has_foreground() {
            continue;
        }
        let bbox = candidate.bbox.rescale(candidate.mask.shape(), image_shape);
        zones.push(
            ZoneResult::new(
                format!("zone_{:03}", index),
                zone_type,
                prompt,
                candidate.score,
                bbox,
            )
            .with_image_shape(image_shape),
        );
        index += 1;
    }

    debug!("Prompt '{}' produced {} {} zone(s)", prompt, zones.len(), zone_type);
    (zones, index)
}

/// Greedy confidence-ordered filter: a zone is dropped when its box
/// overlaps an already kept zone with IoU above `iou_threshold`
pub fn filter_overlapping_zones(zones: Vec<ZoneResult>, iou_threshold: f32) -> Vec<ZoneResult> {
    let mut sorted = zones;
    sorted.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<ZoneResult> = Vec::with_capacity(sorted.len());
    for zone in sorted {
        if kept.iter().all(|k| zone.bbox.iou(&k.bbox) <= iou_threshold) {
            kept.push(zone);
        }
    }
    kept
}

/// Nudge confidences by whether each zone sits where its type usually
/// does. Types with no expected region are left alone.
pub fn validate_zone_locations(
    mut zones: Vec<ZoneResult>,
    prompt_set: &ZonePromptSet,
    image_shape: ImageShape,
) -> Vec<ZoneResult> {
    for zone in &mut zones {
        let region = prompt_set
            .get(zone.zone_type)
            .and_then(|p| p.typical_location)
            .and_then(|l| l.region());

        if let Some(region) = region {
            if zone.bbox.is_in_region(image_shape, region) {
                zone.confidence = (zone.confidence * LOCATION_BOOST).min(1.0);
            } else {
                zone.confidence *= LOCATION_PENALTY;
            }
        }
    }
    zones
}

/// Merge zones of `zone_type` that touch or nearly touch.
///
/// Zones are walked top to bottom, then left to right; a zone joins the
/// running group when the horizontal gap is at most `gap_threshold` with
/// positive vertical overlap, or the other way round. Other zone types
/// are returned first, unchanged.
pub fn merge_adjacent_zones(
    zones: Vec<ZoneResult>,
    zone_type: ZoneType,
    gap_threshold: f32,
    image_shape: ImageShape,
) -> Vec<ZoneResult> {
    let (mut targets, others): (Vec<_>, Vec<_>) =
        zones.into_iter().partition(|z| z.zone_type == zone_type);

    if targets.len() <= 1 {
        let mut all = others;
        all.extend(targets);
        return all;
    }

    targets.sort_by(|a, b| {
        a.bbox
            .y1
            .total_cmp(&b.bbox.y1)
            .then(a.bbox.x1.total_cmp(&b.bbox.x1))
    });

    let before = targets.len();
    let mut merged = Vec::with_capacity(targets.len());
    let mut iter = targets.into_iter();
    let Some(mut current) = iter.next() else {
        return others;
    };

    for next in iter {
        let a = current.bbox;
        let b = next.bbox;

        let h_gap = (b.x1 - a.x2).max(0.0);
        let v_overlap = a.y2.min(b.y2) - a.y1.max(b.y1);
        let v_gap = (b.y1 - a.y2).max(0.0);
        let h_overlap = a.x2.min(b.x2) - a.x1.max(b.x1);

        let adjacent = (h_gap <= gap_threshold && v_overlap > 0.0)
            || (v_gap <= gap_threshold && h_overlap > 0.0);

        if adjacent {
            current.bbox = a.union(&b);
            current.confidence = current.confidence.max(next.confidence);
            current.refresh_geometry(image_shape);
        } else {
            merged.push(current);
            current = next;
        }
    }
    merged.push(current);

    if merged.len() < before {
        debug!("Merged {} {} zones into {}", before, zone_type, merged.len());
    }

    let mut all = others;
    all.extend(merged);
    all
}

/// Options for [`post_process_zones`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZonePostProcessing {
    pub filter_overlapping: bool,
    pub validate_locations: bool,
    pub iou_threshold: f32,
}

impl Default for ZonePostProcessing {
    fn default() -> Self {
        Self {
            filter_overlapping: true,
            validate_locations: true,
            iou_threshold: DEFAULT_ZONE_IOU_THRESHOLD,
        }
    }
}

/// Overlap filter, location validation, then a stable sort by zone
/// priority
pub fn post_process_zones(
    zones: Vec<ZoneResult>,
    prompt_set: &ZonePromptSet,
    image_shape: ImageShape,
    options: &ZonePostProcessing,
) -> Vec<ZoneResult> {
    if zones.is_empty() {
        return zones;
    }
    let before = zones.len();

    let mut processed = zones;
    if options.filter_overlapping {
        processed = filter_overlapping_zones(processed, options.iou_threshold);
    }
    if options.validate_locations {
        processed = validate_zone_locations(processed, prompt_set, image_shape);
    }
    processed.sort_by_key(|z| prompt_set.priority_of(z.zone_type));

    info!("Zone post-processing kept {} of {} zones", processed.len(), before);
    processed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(id: &str, zone_type: ZoneType, confidence: f32, bbox: BBox) -> ZoneResult {
        ZoneResult::new(id, zone_type, "prompt", confidence, bbox)
    }

    #[test]
    fn test_with_image_shape() {
        let z = zone("z", ZoneType::Legend, 0.5, BBox::new(0.0, 0.0, 50.0, 50.0))
            .with_image_shape(ImageShape::new(100, 100));
        assert_eq!(z.bbox_normalized, Some(BBox::new(0.0, 0.0, 0.5, 0.5)));
        assert!((z.area_ratio.unwrap() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_filter_overlapping_keeps_most_confident() {
        let zones = vec![
            zone("a", ZoneType::PlanView, 0.6, BBox::new(0.0, 0.0, 100.0, 100.0)),
            zone("b", ZoneType::PlanView, 0.9, BBox::new(1.0, 1.0, 101.0, 101.0)),
            zone("c", ZoneType::Legend, 0.5, BBox::new(200.0, 200.0, 250.0, 250.0)),
        ];
        let kept = filter_overlapping_zones(zones, DEFAULT_ZONE_IOU_THRESHOLD);
        let ids: Vec<_> = kept.iter().map(|z| z.zone_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_validate_zone_locations() {
        let set = ZonePromptSet::structural();
        let shape = ImageShape::new(300, 300);
        let zones = vec![
            // title block where it belongs
            zone("in", ZoneType::TitleBlock, 0.95, BBox::new(250.0, 250.0, 290.0, 290.0)),
            // title block in the top-left corner
            zone("out", ZoneType::TitleBlock, 0.8, BBox::new(10.0, 10.0, 50.0, 50.0)),
            // legends may sit in any corner
            zone("legend", ZoneType::Legend, 0.7, BBox::new(10.0, 10.0, 50.0, 50.0)),
        ];
        let out = validate_zone_locations(zones, &set, shape);
        assert_eq!(out[0].confidence, 1.0);
        assert!((out[1].confidence - 0.72).abs() < 1e-6);
        assert_eq!(out[2].confidence, 0.7);
    }

    #[test]
    fn test_merge_adjacent_zones() {
        let shape = ImageShape::new(400, 400);
        let zones = vec![
            zone("n", ZoneType::NotesArea, 0.5, BBox::new(0.0, 0.0, 10.0, 10.0)),
            zone("d1", ZoneType::DetailView, 0.6, BBox::new(0.0, 100.0, 100.0, 200.0)),
            zone("d2", ZoneType::DetailView, 0.8, BBox::new(110.0, 120.0, 200.0, 180.0)),
            zone("d3", ZoneType::DetailView, 0.7, BBox::new(300.0, 300.0, 350.0, 350.0)),
        ];
        let out = merge_adjacent_zones(zones, ZoneType::DetailView, DEFAULT_MERGE_GAP, shape);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].zone_id, "n");
        assert_eq!(out[1].zone_id, "d1");
        assert_eq!(out[1].bbox, BBox::new(0.0, 100.0, 200.0, 200.0));
        assert_eq!(out[1].confidence, 0.8);
        assert!((out[1].area_ratio.unwrap() - 20000.0 / 160000.0).abs() < 1e-6);
        assert_eq!(out[2].zone_id, "d3");
    }

    #[test]
    fn test_merge_single_zone_untouched() {
        let zones = vec![zone("d", ZoneType::DetailView, 0.6, BBox::new(0.0, 0.0, 10.0, 10.0))];
        let out = merge_adjacent_zones(zones.clone(), ZoneType::DetailView, 20.0, ImageShape::new(50, 50));
        assert_eq!(out, zones);
    }

    #[test]
    fn test_post_process_sorts_by_priority() {
        let set = ZonePromptSet::structural();
        let shape = ImageShape::new(300, 300);
        let zones = vec![
            zone("legend", ZoneType::Legend, 0.7, BBox::new(10.0, 10.0, 40.0, 40.0)),
            zone("odd", ZoneType::Unknown, 0.9, BBox::new(100.0, 10.0, 120.0, 30.0)),
            zone("title", ZoneType::TitleBlock, 0.9, BBox::new(250.0, 250.0, 290.0, 290.0)),
        ];
        let out = post_process_zones(zones, &set, shape, &ZonePostProcessing::default());
        let ids: Vec<_> = out.iter().map(|z| z.zone_id.as_str()).collect();
        assert_eq!(ids, vec!["title", "legend", "odd"]);
    }

    #[test]
    fn test_post_process_empty() {
        let set = ZonePromptSet::structural();
        let out = post_process_zones(Vec::new(), &set, ImageShape::new(10, 10), &ZonePostProcessing::default());
        assert!(out.is_empty());
    }
}
