//! Worked scenarios for drawing cleanup, filtering and ranking

use drawseg_core::{BBox, Candidate, DrawingConfig, ImageShape, Mask, ModelOutput, PipelineConfig, RawMask};
use drawseg_mask::{
    compute_mask_complexity, nms, postprocess_mask_for_drawings, rank_by_combined_score, MaskPipeline,
    PipelineRequest, RankingValues,
};
use drawseg_zones::{
    classify_page_type, post_process_zones, zones_from_candidates, PageType, ZonePostProcessing,
    ZonePromptSet, ZoneResult, ZoneType,
};

fn outline(shape: ImageShape, x0: usize, y0: usize, x1: usize, y1: usize) -> Mask {
    Mask::from_fn(shape, |y, x| {
        let in_x = (x0..=x1).contains(&x);
        let in_y = (y0..=y1).contains(&y);
        ((x == x0 || x == x1) && in_y) || ((y == y0 || y == y1) && in_x)
    })
}

fn disc(shape: ImageShape, cx: f32, cy: f32, r: f32) -> Mask {
    Mask::from_fn(shape, |y, x| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        dx * dx + dy * dy <= r * r
    })
}

/// Five-pointed star by even-odd point-in-polygon
fn star(shape: ImageShape, cx: f32, cy: f32, outer: f32, inner: f32) -> Mask {
    let vertices: Vec<(f32, f32)> = (0..10)
        .map(|i| {
            let angle = std::f32::consts::PI * i as f32 / 5.0 - std::f32::consts::FRAC_PI_2;
            let r = if i % 2 == 0 { outer } else { inner };
            (cx + r * angle.cos(), cy + r * angle.sin())
        })
        .collect();

    Mask::from_fn(shape, |y, x| {
        let (px, py) = (x as f32, y as f32);
        let mut inside = false;
        let mut j = vertices.len() - 1;
        for i in 0..vertices.len() {
            let (xi, yi) = vertices[i];
            let (xj, yj) = vertices[j];
            if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    })
}

fn square(shape: ImageShape, x0: usize, y0: usize, side: usize) -> Mask {
    Mask::from_fn(shape, |y, x| {
        (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y)
    })
}

#[test]
fn test_box_fill_gives_solid_box() {
    let shape = ImageShape::new(100, 100);
    let line_work = outline(shape, 15, 15, 45, 40);
    let bbox = BBox::new(10.0, 10.0, 50.0, 50.0);

    // a 2% margin of 40 pixels truncates to nothing
    let filled = postprocess_mask_for_drawings(&line_work, &DrawingConfig::default(), None, Some(&bbox));
    assert_eq!(filled.area(), 40 * 40);
    for y in 0..100 {
        for x in 0..100 {
            let inside = (10..50).contains(&x) && (10..50).contains(&y);
            assert_eq!(filled.get(y, x), inside, "pixel ({}, {})", x, y);
        }
    }
}

#[test]
fn test_box_fill_through_pipeline() {
    let pipeline = MaskPipeline::new(PipelineConfig::default()).unwrap();
    let shape = ImageShape::new(100, 100);
    let output = ModelOutput::new(vec![RawMask::from(outline(shape, 15, 15, 45, 40).into_array())], vec![0.9]);
    let request = PipelineRequest::new(shape).with_box(BBox::new(10.0, 10.0, 50.0, 50.0));

    let result = pipeline.run(output, &request).unwrap();
    let best = result.best().unwrap();
    assert_eq!(best.mask.area(), 1600);
    assert_eq!(best.bbox, BBox::new(10.0, 10.0, 49.0, 49.0));
}

#[test]
fn test_tiny_mask_rejected() {
    let shape = ImageShape::new(1000, 1000);
    // 100 of 1,000,000 pixels is below the 0.001 floor
    let speck = square(shape, 500, 500, 10);
    assert_eq!(speck.area(), 100);

    let out = postprocess_mask_for_drawings(&speck, &DrawingConfig::default(), None, None);
    assert_eq!(out.shape(), shape);
    assert_eq!(out.area(), 0);
}

#[test]
fn test_identical_candidates_collapse_under_nms() {
    let shape = ImageShape::new(64, 64);
    let mask = square(shape, 10, 10, 30);
    let candidates = vec![
        Candidate::new(mask.clone(), 0.8),
        Candidate::new(mask.clone(), 0.9),
        Candidate::new(mask.clone(), 0.7),
    ];
    let kept = nms(candidates, 0.5);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].score, 0.9);

    let mut config = PipelineConfig::default();
    config.drawing.enabled = false;
    config.cleanup.enabled = false;
    config.nms.iou_threshold = 0.5;
    let pipeline = MaskPipeline::new(config).unwrap();
    let output = ModelOutput::new(
        vec![
            RawMask::from(mask.clone().into_array()),
            RawMask::from(mask.clone().into_array()),
            RawMask::from(mask.into_array()),
        ],
        vec![0.9, 0.8, 0.7],
    );
    let result = pipeline.run(output, &PipelineRequest::new(shape)).unwrap();
    assert_eq!(result.scores(), vec![0.9]);
}

#[test]
fn test_complex_shape_outranks_confident_simple_shape() {
    let shape = ImageShape::new(100, 100);
    let weight = 0.5;
    let circle_score = 0.95;
    let other_score = 0.85;
    let circle = disc(shape, 50.0, 50.0, 22.0);

    let normalized = |m: &Mask| (compute_mask_complexity(m) / 10.0).min(1.0);
    let nc_circle = normalized(&circle);

    let others = [
        ("star", star(shape, 50.0, 50.0, 45.0, 15.0)),
        ("square", square(shape, 30, 30, 40)),
    ];

    // (1 - w) s_c + w nc_c < (1 - w) s_o + w nc_o  <=>  nc_o - nc_c > (s_c - s_o)(1 - w) / w
    let margin = (circle_score - other_score) * (1.0 - weight) / weight;

    let mut star_wins = false;
    for (name, other) in others {
        let delta = normalized(&other) - nc_circle;
        if (delta - margin).abs() < 1e-4 {
            continue;
        }

        let (ranked, combined) = rank_by_combined_score(
            vec![
                Candidate::new(circle.clone(), circle_score),
                Candidate::new(other, other_score),
            ],
            weight,
            0.0,
        );
        assert_eq!(combined.len(), 2);
        let other_first = ranked[0].score == other_score;
        assert_eq!(other_first, delta > margin, "{}: delta {} margin {}", name, delta, margin);
        if name == "star" {
            star_wins = other_first;
        }
    }

    // the star's spikes are worth more than its lower confidence
    assert!(star_wins);
}

#[test]
fn test_complexity_ranking_through_pipeline() {
    let shape = ImageShape::new(100, 100);
    let mut config = PipelineConfig::default();
    config.drawing.enabled = false;
    config.cleanup.enabled = false;
    config.nms.enabled = false;
    let pipeline = MaskPipeline::new(config).unwrap();

    let output = ModelOutput::new(
        vec![
            RawMask::from(disc(shape, 50.0, 50.0, 22.0).into_array()),
            RawMask::from(star(shape, 50.0, 50.0, 45.0, 15.0).into_array()),
        ],
        vec![0.95, 0.85],
    );
    let result = pipeline.run(output, &PipelineRequest::new(shape)).unwrap();
    assert_eq!(result.scores(), vec![0.85, 0.95]);
    match result.ranking {
        RankingValues::Combined(values) => assert!(values[0] > values[1]),
        other => panic!("expected combined ranking, got {:?}", other),
    }
}

#[test]
fn test_boxed_line_work_to_plan_page() {
    let pipeline = MaskPipeline::new(PipelineConfig::default()).unwrap();
    let set = ZonePromptSet::structural();
    let shape = ImageShape::new(200, 300);

    let prompts = [
        ("floor framing plan", outline(shape, 80, 50, 220, 150), BBox::new(75.0, 45.0, 225.0, 155.0), 0.9),
        ("drawing title block", outline(shape, 230, 160, 295, 195), BBox::new(228.0, 158.0, 298.0, 198.0), 0.8),
    ];

    let mut zones = Vec::new();
    let mut next = 0;
    for (prompt, line_work, bbox, score) in prompts {
        let outline_area = line_work.area();
        let output = ModelOutput::new(vec![RawMask::from(line_work.into_array())], vec![score]);
        let result = pipeline.run(output, &PipelineRequest::new(shape).with_box(bbox)).unwrap();
        // box fill turns the outline into a solid region
        let best = result.best().unwrap();
        assert!(best.mask.area() > 2 * outline_area, "{}: {} pixels", prompt, best.mask.area());
        let (found, n) = zones_from_candidates(&set, prompt, &result.candidates, shape, 0.3, next);
        next = n;
        zones.extend(found);
    }
    assert_eq!(next, 2);

    let processed = post_process_zones(zones, &set, shape, &ZonePostProcessing::default());
    assert_eq!(
        processed.iter().map(|z| z.zone_type).collect::<Vec<_>>(),
        vec![ZoneType::TitleBlock, ZoneType::PlanView]
    );
    let plan_ratio = processed[1].area_ratio.unwrap();
    assert!(plan_ratio > 0.25 && plan_ratio < 0.35, "plan covers {}", plan_ratio);

    let (page, confidence) = classify_page_type(&processed);
    assert_eq!(page, PageType::Plan);
    assert!(confidence > 0.0 && confidence <= 1.0);

    let json = serde_json::to_string(&processed).unwrap();
    assert!(json.contains(r#""zone_type":"plan_view""#));
    let restored: Vec<ZoneResult> = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, processed);
}
