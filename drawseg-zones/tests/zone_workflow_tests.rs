//! Sheet-level zone workflow: prompts from a file, detections to zones,
//! post-processing and page classification

use drawseg_core::{BBox, Candidate, ImageShape, Mask};
use drawseg_zones::{
    classify_page_type, post_process_zones, zones_from_candidates, PageType, ZoneError,
    ZonePostProcessing, ZonePromptSet, ZoneType,
};
use std::io::Write;
use tempfile::NamedTempFile;

fn block(shape: ImageShape, x0: usize, y0: usize, x1: usize, y1: usize) -> Mask {
    Mask::from_fn(shape, |y, x| (x0..x1).contains(&x) && (y0..y1).contains(&y))
}

#[test]
fn test_prompt_set_from_toml_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
name = "minimal"

[[prompts]]
zone_type = "title_block"
primary_prompt = "title block"
alternate_prompts = ["drawing title"]
typical_location = "bottom_right"
typical_size_ratio = [0.15, 0.2]
priority = 1

[[prompts]]
zone_type = "plan_view"
primary_prompt = "floor plan"
"#
    )
    .unwrap();

    let set = ZonePromptSet::from_file(file.path()).unwrap();
    assert_eq!(set.name, "minimal");
    assert_eq!(set.zone_type_for_prompt("drawing title"), ZoneType::TitleBlock);
    assert_eq!(set.priority_of(ZoneType::PlanView), 5);
}

#[test]
fn test_invalid_prompt_file_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"{{"name": "bad", "prompts": [{{"zone_type": "legend", "primary_prompt": ""}}]}}"#
    )
    .unwrap();
    assert!(matches!(
        ZonePromptSet::from_file(file.path()),
        Err(ZoneError::InvalidPrompt(_))
    ));
}

#[test]
fn test_missing_prompt_file() {
    let err = ZonePromptSet::from_file("/nonexistent/zones.toml").unwrap_err();
    assert!(matches!(err, ZoneError::Io(_)));
}

#[test]
fn test_plan_sheet_end_to_end() {
    let set = ZonePromptSet::structural();
    let image = ImageShape::new(400, 600);
    // the model answered at half resolution
    let model_frame = ImageShape::new(200, 300);

    let plan_prompt = set.get(ZoneType::PlanView).unwrap().primary_prompt.clone();
    let plans = vec![
        Candidate::new(block(model_frame, 75, 50, 225, 150), 0.92),
        // near-duplicate of the first
        Candidate::new(block(model_frame, 76, 51, 225, 150), 0.85),
        // below the confidence floor
        Candidate::new(block(model_frame, 0, 0, 20, 20), 0.1),
    ];
    let (mut zones, next) = zones_from_candidates(&set, &plan_prompt, &plans, image, 0.3, 0);
    assert_eq!(next, 2);
    assert_eq!(zones[0].zone_id, "zone_000");
    assert_eq!(zones[0].bbox, BBox::new(150.0, 100.0, 448.0, 298.0));

    let title_prompt = "drawing title block";
    let titles = vec![Candidate::new(block(model_frame, 250, 160, 295, 195), 0.8)];
    let (title_zones, next) = zones_from_candidates(&set, title_prompt, &titles, image, 0.3, next);
    assert_eq!(next, 3);
    assert_eq!(title_zones[0].zone_type, ZoneType::TitleBlock);
    zones.extend(title_zones);

    let processed = post_process_zones(zones, &set, image, &ZonePostProcessing::default());
    assert_eq!(processed.len(), 2);
    assert_eq!(processed[0].zone_type, ZoneType::TitleBlock);
    assert!((processed[0].confidence - 0.88).abs() < 1e-5);

    let (page, confidence) = classify_page_type(&processed);
    assert_eq!(page, PageType::Plan);
    assert!(confidence > 0.0 && confidence <= 1.0);
}
