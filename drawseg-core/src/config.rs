// Configuration for the mask post-processing pipeline

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

/// Prefix shared by every environment override
pub const ENV_PREFIX: &str = "DRAWSEG_";

/// Strategy for turning line work into a solid region in drawing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMethod {
    /// Fill the prompt box (falls back to convex hull without one)
    BoxFill,
    /// Repeated large-kernel closing followed by a flood fill
    Morphological,
    /// Solid convex hull of the external contours
    ConvexHull,
}

impl fmt::Display for FillMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FillMethod::BoxFill => "box_fill",
            FillMethod::Morphological => "morphological",
            FillMethod::ConvexHull => "convex_hull",
        };
        f.write_str(s)
    }
}

impl FromStr for FillMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "box_fill" | "box" => Ok(FillMethod::BoxFill),
            "morphological" | "morph" => Ok(FillMethod::Morphological),
            "convex_hull" | "hull" => Ok(FillMethod::ConvexHull),
            other => Err(Error::Parse(format!("unknown fill method '{}'", other))),
        }
    }
}

/// Ranking by raw pixel area instead of confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaRanking {
    Disabled,
    LargestFirst,
    SmallestFirst,
}

impl FromStr for AreaRanking {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "disabled" | "off" | "false" => Ok(AreaRanking::Disabled),
            "largest_first" | "largest" => Ok(AreaRanking::LargestFirst),
            "smallest_first" | "smallest" => Ok(AreaRanking::SmallestFirst),
            other => Err(Error::Parse(format!("unknown area ranking '{}'", other))),
        }
    }
}

/// Generic per-mask cleanup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub enabled: bool,
    pub min_component_area: usize,
    pub fill_holes: bool,
    pub max_hole_area: usize,
    pub apply_morphology: bool,
    pub morphology_kernel_size: usize,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_component_area: 100,
            fill_holes: true,
            max_hole_area: 500,
            apply_morphology: true,
            morphology_kernel_size: 5,
        }
    }
}

/// Drawing-specific cleanup that fills enclosed areas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawingConfig {
    pub enabled: bool,
    pub keep_largest_only: bool,
    pub fill_all_holes: bool,
    pub min_area_ratio: f32,
    pub fill_method: FillMethod,
    pub morphology_kernel: usize,
    pub morphology_iterations: usize,
    pub box_fill_margin: f32,
}

impl Default for DrawingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keep_largest_only: true,
            fill_all_holes: true,
            min_area_ratio: 0.001,
            fill_method: FillMethod::BoxFill,
            morphology_kernel: 25,
            morphology_iterations: 3,
            box_fill_margin: 0.02,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxConstraintConfig {
    pub enabled: bool,
    pub margin: f32,
}

impl Default for BoxConstraintConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            margin: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    pub enabled: bool,
    pub min_score: f32,
    pub offset: f32,
    /// Logit level the offsets are taken around
    pub mask_threshold: f32,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_score: 0.95,
            offset: 1.0,
            mask_threshold: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NmsConfig {
    pub enabled: bool,
    pub iou_threshold: f32,
}

impl Default for NmsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            iou_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    pub enabled: bool,
    pub tolerance_pixels: usize,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tolerance_pixels: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IouFilterConfig {
    pub enabled: bool,
    pub min_score: f32,
}

impl Default for IouFilterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_score: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub complexity_scoring: bool,
    pub complexity_weight: f32,
    pub component_bonus: f32,
    pub area_ranking: AreaRanking,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            complexity_scoring: true,
            complexity_weight: 0.5,
            component_bonus: 0.0,
            area_ranking: AreaRanking::Disabled,
        }
    }
}

/// Immutable snapshot of every pipeline option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub cleanup: CleanupConfig,
    pub drawing: DrawingConfig,
    pub box_constraint: BoxConstraintConfig,
    pub stability: StabilityConfig,
    pub nms: NmsConfig,
    pub edge: EdgeConfig,
    pub iou_filter: IouFilterConfig,
    pub ranking: RankingConfig,
    /// Binarisation threshold for float masks
    pub mask_threshold: f32,
    pub enable_non_overlapping: bool,
    /// Skip per-mask cleanup and keep the raw pixels
    pub precision_mode: bool,
    /// Candidate count from which cleanup runs in parallel
    pub parallel_threshold: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cleanup: CleanupConfig::default(),
            drawing: DrawingConfig::default(),
            box_constraint: BoxConstraintConfig::default(),
            stability: StabilityConfig::default(),
            nms: NmsConfig::default(),
            edge: EdgeConfig::default(),
            iou_filter: IouFilterConfig::default(),
            ranking: RankingConfig::default(),
            mask_threshold: 0.5,
            enable_non_overlapping: false,
            precision_mode: false,
            parallel_threshold: 2,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON, TOML or YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_str(&content)
    }

    /// Parse configuration, trying JSON, then TOML, then YAML
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        if let Ok(config) = serde_json::from_str::<PipelineConfig>(content) {
            return Ok(config);
        }

        if let Ok(config) = toml::from_str::<PipelineConfig>(content) {
            return Ok(config);
        }

        if let Ok(config) = serde_yaml::from_str::<PipelineConfig>(content) {
            return Ok(config);
        }

        Err(Error::Parse("unrecognised configuration format".to_string()))
    }

    /// Defaults with `DRAWSEG_*` environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply `DRAWSEG_*` environment variables on top of this configuration.
    /// Values that do not parse are ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok());
    }

    /// Same as [`PipelineConfig::apply_env_overrides`] with an explicit lookup,
    /// `lookup` receives the key without the prefix.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let c = &mut self.cleanup;
        set_from(&lookup, "ENABLE_MASK_POSTPROCESSING", &mut c.enabled, parse_bool);
        set_from(&lookup, "MASK_MIN_COMPONENT_AREA", &mut c.min_component_area, parse);
        set_from(&lookup, "MASK_FILL_HOLES", &mut c.fill_holes, parse_bool);
        set_from(&lookup, "MASK_MAX_HOLE_AREA", &mut c.max_hole_area, parse);
        set_from(&lookup, "MASK_APPLY_MORPHOLOGY", &mut c.apply_morphology, parse_bool);
        set_from(&lookup, "MASK_MORPHOLOGY_KERNEL_SIZE", &mut c.morphology_kernel_size, parse);

        let d = &mut self.drawing;
        set_from(&lookup, "ENABLE_DRAWING_MODE", &mut d.enabled, parse_bool);
        set_from(&lookup, "DRAWING_KEEP_LARGEST_ONLY", &mut d.keep_largest_only, parse_bool);
        set_from(&lookup, "DRAWING_FILL_ALL_HOLES", &mut d.fill_all_holes, parse_bool);
        set_from(&lookup, "DRAWING_MIN_AREA_RATIO", &mut d.min_area_ratio, parse);
        set_from(&lookup, "DRAWING_FILL_METHOD", &mut d.fill_method, parse);
        set_from(&lookup, "DRAWING_MORPHOLOGY_KERNEL", &mut d.morphology_kernel, parse);
        set_from(&lookup, "DRAWING_MORPHOLOGY_ITERATIONS", &mut d.morphology_iterations, parse);
        set_from(&lookup, "DRAWING_BOX_FILL_MARGIN", &mut d.box_fill_margin, parse);

        set_from(&lookup, "ENABLE_BOX_CONSTRAINT", &mut self.box_constraint.enabled, parse_bool);
        set_from(&lookup, "BOX_CONSTRAINT_MARGIN", &mut self.box_constraint.margin, parse);

        set_from(&lookup, "ENABLE_STABILITY_FILTERING", &mut self.stability.enabled, parse_bool);
        set_from(&lookup, "STABILITY_SCORE_THRESH", &mut self.stability.min_score, parse);
        set_from(&lookup, "STABILITY_SCORE_OFFSET", &mut self.stability.offset, parse);

        set_from(&lookup, "ENABLE_NMS", &mut self.nms.enabled, parse_bool);
        set_from(&lookup, "NMS_IOU_THRESHOLD", &mut self.nms.iou_threshold, parse);

        set_from(&lookup, "ENABLE_EDGE_REJECTION", &mut self.edge.enabled, parse_bool);
        set_from(&lookup, "EDGE_TOLERANCE_PIXELS", &mut self.edge.tolerance_pixels, parse);

        set_from(&lookup, "ENABLE_NON_OVERLAPPING", &mut self.enable_non_overlapping, parse_bool);

        set_from(&lookup, "ENABLE_IOU_FILTERING", &mut self.iou_filter.enabled, parse_bool);
        set_from(&lookup, "MIN_IOU_SCORE", &mut self.iou_filter.min_score, parse);

        let r = &mut self.ranking;
        set_from(&lookup, "ENABLE_COMPLEXITY_SCORING", &mut r.complexity_scoring, parse_bool);
        set_from(&lookup, "COMPLEXITY_WEIGHT", &mut r.complexity_weight, parse);
        set_from(&lookup, "COMPONENT_BONUS", &mut r.component_bonus, parse);
        set_from(&lookup, "AREA_RANKING", &mut r.area_ranking, parse);

        set_from(&lookup, "MASK_THRESHOLD", &mut self.mask_threshold, parse);
        set_from(&lookup, "PRECISION_MODE", &mut self.precision_mode, parse_bool);
        set_from(&lookup, "PARALLEL_THRESHOLD", &mut self.parallel_threshold, parse);
    }

    /// Validate ranges and kernel sizes
    pub fn validate(&self) -> Result<()> {
        check_unit("mask_threshold", self.mask_threshold)?;
        check_unit("drawing.min_area_ratio", self.drawing.min_area_ratio)?;
        check_unit("drawing.box_fill_margin", self.drawing.box_fill_margin)?;
        check_unit("box_constraint.margin", self.box_constraint.margin)?;
        check_unit("stability.min_score", self.stability.min_score)?;
        check_unit("nms.iou_threshold", self.nms.iou_threshold)?;
        check_unit("iou_filter.min_score", self.iou_filter.min_score)?;
        check_unit("ranking.complexity_weight", self.ranking.complexity_weight)?;
        check_unit("ranking.component_bonus", self.ranking.component_bonus)?;

        if !self.stability.offset.is_finite() || self.stability.offset < 0.0 {
            return Err(Error::Config(
                "stability.offset must be a non-negative finite number".to_string(),
            ));
        }
        if !self.stability.mask_threshold.is_finite() {
            return Err(Error::Config("stability.mask_threshold must be finite".to_string()));
        }

        check_kernel("cleanup.morphology_kernel_size", self.cleanup.morphology_kernel_size)?;
        check_kernel("drawing.morphology_kernel", self.drawing.morphology_kernel)?;

        if self.drawing.morphology_iterations == 0 {
            return Err(Error::Config(
                "drawing.morphology_iterations must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(Error::Config(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}

fn check_kernel(name: &str, size: usize) -> Result<()> {
    if size == 0 || size % 2 == 0 {
        return Err(Error::Config(format!(
            "{} must be odd and positive, got {}",
            name, size
        )));
    }
    Ok(())
}

fn set_from<T, L, P>(lookup: &L, key: &str, slot: &mut T, parser: P)
where
    L: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Option<T>,
{
    if let Some(raw) = lookup(key) {
        match parser(&raw) {
            Some(v) => *slot = v,
            None => warn!("Ignoring {}{}: cannot parse '{}'", ENV_PREFIX, key, raw),
        }
    }
}

fn parse<T: FromStr>(raw: &str) -> Option<T> {
    raw.trim().parse().ok()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
