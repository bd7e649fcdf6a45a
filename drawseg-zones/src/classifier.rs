//! Page type classification from the zones found on a sheet

use crate::prompts::ZoneType;
use crate::zones::ZoneResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    SpecSheet,
    Plan,
    Elevation,
    Section,
    Details,
    Schedule,
    Unknown,
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PageType::SpecSheet => "spec_sheet",
            PageType::Plan => "plan",
            PageType::Elevation => "elevation",
            PageType::Section => "section",
            PageType::Details => "details",
            PageType::Schedule => "schedule",
            PageType::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Zones a page type needs, tolerates and forbids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRule {
    pub page_type: PageType,
    pub required: Vec<ZoneType>,
    pub optional: Vec<ZoneType>,
    pub excluded: Vec<ZoneType>,
    /// Zone type whose page coverage adds to the score
    pub dominant: Option<ZoneType>,
    pub min_detail_views: usize,
    pub min_schedule_tables: usize,
}

impl PageRule {
    fn new(page_type: PageType) -> Self {
        Self {
            page_type,
            required: Vec::new(),
            optional: Vec::new(),
            excluded: Vec::new(),
            dominant: None,
            min_detail_views: 0,
            min_schedule_tables: 0,
        }
    }
}

/// Rules for structural drawing sets, in tie-break order
pub fn structural_page_rules() -> Vec<PageRule> {
    use ZoneType::*;
    let views = vec![PlanView, ElevationView, SectionView];

    vec![
        PageRule {
            required: vec![NotesArea],
            optional: vec![ScheduleTable, Legend],
            excluded: views.clone(),
            ..PageRule::new(PageType::SpecSheet)
        },
        PageRule {
            required: vec![PlanView],
            optional: vec![ScheduleTable, NotesArea, Legend, GridSystem],
            dominant: Some(PlanView),
            ..PageRule::new(PageType::Plan)
        },
        PageRule {
            required: vec![ElevationView],
            optional: vec![SectionView, NotesArea, DetailView],
            dominant: Some(ElevationView),
            ..PageRule::new(PageType::Elevation)
        },
        PageRule {
            required: vec![SectionView],
            optional: vec![DetailView, NotesArea, ElevationView],
            dominant: Some(SectionView),
            ..PageRule::new(PageType::Section)
        },
        PageRule {
            optional: vec![NotesArea, Legend],
            dominant: Some(DetailView),
            min_detail_views: 3,
            ..PageRule::new(PageType::Details)
        },
        PageRule {
            required: vec![ScheduleTable],
            optional: vec![NotesArea, Legend],
            excluded: views,
            dominant: Some(ScheduleTable),
            min_schedule_tables: 2,
            ..PageRule::new(PageType::Schedule)
        },
    ]
}

/// Score a page against one rule, `None` when the rule does not apply
fn score_rule(rule: &PageRule, zones: &[ZoneResult], counts: &HashMap<ZoneType, usize>) -> Option<f32> {
    let present = |t: &ZoneType| counts.contains_key(t);

    if !rule.required.iter().all(present) {
        return None;
    }
    if rule.excluded.iter().any(present) {
        return None;
    }
    let count = |t: ZoneType| counts.get(&t).copied().unwrap_or(0);
    if count(ZoneType::DetailView) < rule.min_detail_views
        || count(ZoneType::ScheduleTable) < rule.min_schedule_tables
    {
        return None;
    }

    let mut score = rule.required.len() as f32;

    if let Some(dominant) = rule.dominant {
        let coverage: f32 = zones
            .iter()
            .filter(|z| z.zone_type == dominant)
            .map(|z| z.area_ratio.unwrap_or(0.0))
            .sum();
        score += coverage * 2.0;
    }

    score += 0.25 * rule.optional.iter().filter(|t| present(*t)).count() as f32;
    Some(score)
}

/// Classify a page with the structural rules
pub fn classify_page_type(zones: &[ZoneResult]) -> (PageType, f32) {
    classify_page_type_with(zones, &structural_page_rules())
}

/// Pick the best-scoring applicable rule. Confidence is the score over
/// three times the mean zone confidence, capped at 1. Earlier rules win
/// ties.
pub fn classify_page_type_with(zones: &[ZoneResult], rules: &[PageRule]) -> (PageType, f32) {
    if zones.is_empty() {
        return (PageType::Unknown, 0.0);
    }

    let mut counts: HashMap<ZoneType, usize> = HashMap::new();
    for zone in zones {
        *counts.entry(zone.zone_type).or_default() += 1;
    }
    let mean_confidence = zones.iter().map(|z| z.confidence).sum::<f32>() / zones.len() as f32;

    let mut best: Option<(PageType, f32)> = None;
    for rule in rules {
        if let Some(score) = score_rule(rule, zones, &counts) {
            debug!("Page rule {} scored {:.3}", rule.page_type, score);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((rule.page_type, score));
            }
        }
    }

    match best {
        Some((page_type, score)) => (page_type, (score / 3.0 * mean_confidence).min(1.0)),
        None => (PageType::Unknown, 0.0),
    }
}
