//! Zone prompt catalogue for structural and construction drawings

use crate::error::{Result, ZoneError};
use drawseg_core::Region;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

/// Kind of page zone a prompt looks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneType {
    TitleBlock,
    RevisionBlock,
    PlanView,
    ElevationView,
    SectionView,
    DetailView,
    ScheduleTable,
    NotesArea,
    Legend,
    GridSystem,
    DimensionString,
    NorthArrow,
    ScaleBar,
    Unknown,
}

impl ZoneType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneType::TitleBlock => "title_block",
            ZoneType::RevisionBlock => "revision_block",
            ZoneType::PlanView => "plan_view",
            ZoneType::ElevationView => "elevation_view",
            ZoneType::SectionView => "section_view",
            ZoneType::DetailView => "detail_view",
            ZoneType::ScheduleTable => "schedule_table",
            ZoneType::NotesArea => "notes_area",
            ZoneType::Legend => "legend",
            ZoneType::GridSystem => "grid_system",
            ZoneType::DimensionString => "dimension_string",
            ZoneType::NorthArrow => "north_arrow",
            ZoneType::ScaleBar => "scale_bar",
            ZoneType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ZoneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ZoneType {
    type Err = ZoneError;

    fn from_str(s: &str) -> Result<Self> {
        let zone = match s.trim().to_ascii_lowercase().as_str() {
            "title_block" => ZoneType::TitleBlock,
            "revision_block" => ZoneType::RevisionBlock,
            "plan_view" => ZoneType::PlanView,
            "elevation_view" => ZoneType::ElevationView,
            "section_view" => ZoneType::SectionView,
            "detail_view" => ZoneType::DetailView,
            "schedule_table" => ZoneType::ScheduleTable,
            "notes_area" => ZoneType::NotesArea,
            "legend" => ZoneType::Legend,
            "grid_system" => ZoneType::GridSystem,
            "dimension_string" => ZoneType::DimensionString,
            "north_arrow" => ZoneType::NorthArrow,
            "scale_bar" => ZoneType::ScaleBar,
            "unknown" => ZoneType::Unknown,
            other => return Err(ZoneError::Parse(format!("unknown zone type '{}'", other))),
        };
        Ok(zone)
    }
}

/// Where on the sheet a zone usually sits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypicalLocation {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
    LeftSide,
    RightSide,
    Top,
    Bottom,
    Edges,
    Corner,
    Any,
}

impl TypicalLocation {
    /// Grid region to check against, `None` for locations that cannot be
    /// judged from a single box centre
    pub fn region(&self) -> Option<Region> {
        match self {
            TypicalLocation::TopLeft => Some(Region::TopLeft),
            TypicalLocation::TopRight => Some(Region::TopRight),
            TypicalLocation::BottomLeft => Some(Region::BottomLeft),
            TypicalLocation::BottomRight => Some(Region::BottomRight),
            TypicalLocation::Center => Some(Region::Center),
            TypicalLocation::LeftSide => Some(Region::LeftSide),
            TypicalLocation::RightSide => Some(Region::RightSide),
            TypicalLocation::Top => Some(Region::Top),
            TypicalLocation::Bottom => Some(Region::Bottom),
            TypicalLocation::Edges | TypicalLocation::Corner | TypicalLocation::Any => None,
        }
    }
}

fn default_priority() -> u8 {
    5
}

fn default_enabled() -> bool {
    true
}

/// One zone to detect and the prompts that find it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonePromptConfig {
    pub zone_type: ZoneType,
    pub primary_prompt: String,
    #[serde(default)]
    pub alternate_prompts: Vec<String>,
    #[serde(default)]
    pub typical_location: Option<TypicalLocation>,
    /// (width, height) as fractions of the page
    #[serde(default)]
    pub typical_size_ratio: Option<(f32, f32)>,
    /// Expected count per page, `None` when it varies
    #[serde(default)]
    pub expected_per_page: Option<u32>,
    /// Lower sorts first
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl ZonePromptConfig {
    pub fn new(zone_type: ZoneType, primary_prompt: impl Into<String>) -> Self {
        Self {
            zone_type,
            primary_prompt: primary_prompt.into(),
            alternate_prompts: Vec::new(),
            typical_location: None,
            typical_size_ratio: None,
            expected_per_page: Some(1),
            priority: default_priority(),
            enabled: true,
        }
    }

    pub fn with_alternates(mut self, alternates: &[&str]) -> Self {
        self.alternate_prompts = alternates.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_location(mut self, location: TypicalLocation) -> Self {
        self.typical_location = Some(location);
        self
    }

    pub fn with_size_ratio(mut self, width: f32, height: f32) -> Self {
        self.typical_size_ratio = Some((width, height));
        self
    }

    pub fn with_expected(mut self, expected: Option<u32>) -> Self {
        self.expected_per_page = expected;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Primary prompt followed by the alternates
    pub fn all_prompts(&self) -> Vec<&str> {
        std::iter::once(self.primary_prompt.as_str())
            .chain(self.alternate_prompts.iter().map(String::as_str))
            .collect()
    }

    pub fn matches_prompt(&self, prompt: &str) -> bool {
        self.primary_prompt == prompt || self.alternate_prompts.iter().any(|p| p == prompt)
    }

    pub fn validate(&self) -> Result<()> {
        if self.primary_prompt.trim().is_empty() {
            return Err(ZoneError::InvalidPrompt(format!(
                "{} has an empty primary prompt",
                self.zone_type
            )));
        }

        if let Some((w, h)) = self.typical_size_ratio {
            let in_range = |v: f32| v > 0.0 && v <= 1.0;
            if !in_range(w) || !in_range(h) {
                return Err(ZoneError::InvalidPrompt(format!(
                    "{} size ratio ({}, {}) must be in (0, 1]",
                    self.zone_type, w, h
                )));
            }
        }

        Ok(())
    }
}

/// A named collection of zone prompts for one kind of drawing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonePromptSet {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub prompts: Vec<ZonePromptConfig>,
}

impl Default for ZonePromptSet {
    fn default() -> Self {
        Self::structural()
    }
}

impl ZonePromptSet {
    /// Prompts for structural and construction drawing sheets
    pub fn structural() -> Self {
        use TypicalLocation::*;
        use ZoneType::*;

        let prompts = vec![
            ZonePromptConfig::new(TitleBlock, "title block with project name drawing number and engineer stamp")
                .with_alternates(&[
                    "drawing title block",
                    "project information block",
                    "engineer stamp and project details",
                    "drawing information box",
                ])
                .with_location(BottomRight)
                .with_size_ratio(0.15, 0.20)
                .with_priority(1),
            ZonePromptConfig::new(RevisionBlock, "revision history block with dates and change descriptions")
                .with_alternates(&[
                    "revision table",
                    "drawing revisions",
                    "revision history",
                    "change log block",
                ])
                .with_location(TopRight)
                .with_size_ratio(0.15, 0.10)
                .with_priority(2),
            ZonePromptConfig::new(PlanView, "floor plan or framing plan view from above showing structural layout")
                .with_alternates(&[
                    "roof framing plan",
                    "foundation plan",
                    "floor framing plan",
                    "structural plan view",
                    "floor plan layout",
                    "building plan from above",
                ])
                .with_location(Center)
                .with_size_ratio(0.5, 0.5)
                .with_priority(3),
            ZonePromptConfig::new(ElevationView, "building elevation view showing side or front of structure")
                .with_alternates(&[
                    "structural elevation",
                    "building section elevation",
                    "exterior elevation",
                    "side view of building",
                    "front elevation",
                ])
                .with_location(Center)
                .with_size_ratio(0.4, 0.35)
                .with_expected(None)
                .with_priority(3),
            ZonePromptConfig::new(SectionView, "section cut view showing internal structural components")
                .with_alternates(&[
                    "building section",
                    "wall section",
                    "structural section cut",
                    "cross section view",
                    "sectional drawing",
                ])
                .with_location(Center)
                .with_size_ratio(0.35, 0.40)
                .with_expected(None)
                .with_priority(3),
            ZonePromptConfig::new(DetailView, "construction detail drawing showing specific connection or component")
                .with_alternates(&[
                    "structural detail",
                    "connection detail",
                    "typical detail",
                    "detail callout",
                    "enlarged detail",
                    "component detail",
                ])
                .with_location(Any)
                .with_size_ratio(0.2, 0.25)
                .with_expected(None)
                .with_priority(4),
            ZonePromptConfig::new(ScheduleTable, "schedule or table with structural specifications")
                .with_alternates(&[
                    "beam schedule",
                    "column schedule",
                    "footing schedule",
                    "material schedule",
                    "door schedule",
                    "window schedule",
                    "rebar schedule",
                    "structural schedule table",
                ])
                .with_location(RightSide)
                .with_size_ratio(0.25, 0.30)
                .with_expected(None)
                .with_priority(5),
            ZonePromptConfig::new(NotesArea, "general notes text area with specifications and requirements")
                .with_alternates(&[
                    "structural notes",
                    "general notes",
                    "specifications text",
                    "design notes",
                    "construction notes",
                ])
                .with_location(LeftSide)
                .with_size_ratio(0.20, 0.40)
                .with_priority(5),
            ZonePromptConfig::new(Legend, "legend or key explaining drawing symbols and abbreviations")
                .with_alternates(&[
                    "symbol legend",
                    "abbreviations list",
                    "drawing key",
                    "notation legend",
                ])
                .with_location(Corner)
                .with_size_ratio(0.12, 0.15)
                .with_priority(6),
            ZonePromptConfig::new(GridSystem, "column grid lines with bubble markers")
                .with_alternates(&[
                    "grid bubbles",
                    "column line markers",
                    "structural grid",
                    "grid line system",
                ])
                .with_location(Edges)
                .with_size_ratio(0.05, 0.05)
                .with_priority(7),
            ZonePromptConfig::new(DimensionString, "dimension lines and measurements")
                .with_alternates(&["dimensions", "measurement annotations", "dimension strings"])
                .with_location(Any)
                .with_expected(None)
                .with_priority(8),
            ZonePromptConfig::new(NorthArrow, "north arrow or orientation indicator")
                .with_alternates(&["compass indicator", "direction arrow", "orientation symbol"])
                .with_location(Corner)
                .with_size_ratio(0.05, 0.05)
                .with_priority(9),
            ZonePromptConfig::new(ScaleBar, "graphic scale bar")
                .with_alternates(&["scale indicator", "measurement scale"])
                .with_location(Bottom)
                .with_size_ratio(0.10, 0.03)
                .with_priority(9),
        ];

        Self {
            name: "structural".to_string(),
            description: "Structural and construction drawing zones".to_string(),
            prompts,
        }
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    pub fn get(&self, zone_type: ZoneType) -> Option<&ZonePromptConfig> {
        self.prompts.iter().find(|p| p.zone_type == zone_type)
    }

    pub fn zone_types(&self) -> Vec<ZoneType> {
        self.prompts.iter().map(|p| p.zone_type).collect()
    }

    pub fn primary_prompts(&self) -> Vec<&str> {
        self.prompts.iter().map(|p| p.primary_prompt.as_str()).collect()
    }

    /// Primary prompts of the enabled zones only
    pub fn enabled_prompts(&self) -> Vec<&str> {
        self.prompts
            .iter()
            .filter(|p| p.enabled)
            .map(|p| p.primary_prompt.as_str())
            .collect()
    }

    /// Zone type whose primary or alternate prompt is exactly `prompt`
    pub fn zone_type_for_prompt(&self, prompt: &str) -> ZoneType {
        self.prompts
            .iter()
            .find(|p| p.matches_prompt(prompt))
            .map(|p| p.zone_type)
            .unwrap_or(ZoneType::Unknown)
    }

    pub fn prompts_for_zone_type(&self, zone_type: ZoneType) -> Vec<&str> {
        self.get(zone_type).map(|p| p.all_prompts()).unwrap_or_default()
    }

    /// Sort key for a zone type, unknown types last
    pub fn priority_of(&self, zone_type: ZoneType) -> u8 {
        self.get(zone_type).map(|p| p.priority).unwrap_or(99)
    }

    pub fn set_enabled(&mut self, zone_type: ZoneType, enabled: bool) -> bool {
        match self.prompts.iter_mut().find(|p| p.zone_type == zone_type) {
            Some(p) => {
                p.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for prompt in &self.prompts {
            prompt.validate()?;
            if !seen.insert(prompt.zone_type) {
                return Err(ZoneError::DuplicateZoneType(prompt.zone_type));
            }
        }
        Ok(())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        debug!("Loading zone prompts from {}", path.as_ref().display());
        Self::from_str(&content)
    }

    /// Parse and validate a prompt set, trying JSON, then TOML, then YAML
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let set = if let Ok(set) = serde_json::from_str::<ZonePromptSet>(content) {
            set
        } else if let Ok(set) = toml::from_str::<ZonePromptSet>(content) {
            set
        } else if let Ok(set) = serde_yaml::from_str::<ZonePromptSet>(content) {
            set
        } else {
            return Err(ZoneError::Parse("unrecognised prompt set format".to_string()));
        };

        set.validate()?;
        if set.enabled_prompts().is_empty() {
            warn!("Zone prompt set '{}' has no enabled prompts", set.name);
        }
        Ok(set)
    }
}
