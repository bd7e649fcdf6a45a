//! Mask post-processing pipeline
//!
//! Raw model output goes through, in order: binarisation, IoU filter,
//! stability filter, NMS, edge rejection, per-mask cleanup, non-overlap
//! enforcement and ranking. Each stage can be switched off in
//! [`PipelineConfig`]; what ran is recorded in the [`PipelineReport`].

use crate::cleanup::cleanup_candidates;
use crate::filters::{filter_by_score, filter_by_stability, filter_edge_masks, nms};
use crate::overlap::enforce_non_overlapping;
use crate::ranking::{rank_by_area, rank_by_combined_score, rank_by_score, RankingValues};
use crate::report::{PipelineReport, Stage};
use drawseg_core::{AreaRanking, BBox, Candidate, ImageShape, Mask, ModelOutput, PipelineConfig, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Per-request inputs that are not part of the model output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRequest {
    pub image_shape: ImageShape,
    /// Prompt box in image coordinates
    pub prompt_box: Option<BBox>,
    /// Clear foreground outside `prompt_box` when the box constraint is on.
    /// False for a box that only guides the fill.
    #[serde(default = "default_constrain_to_box")]
    pub constrain_to_box: bool,
    /// The caller wants several candidates to choose from
    pub multimask_output: bool,
}

fn default_constrain_to_box() -> bool {
    true
}

impl PipelineRequest {
    pub fn new(image_shape: ImageShape) -> Self {
        Self {
            image_shape,
            prompt_box: None,
            constrain_to_box: true,
            multimask_output: false,
        }
    }

    pub fn with_box(mut self, bbox: BBox) -> Self {
        self.prompt_box = Some(bbox);
        self.constrain_to_box = true;
        self
    }

    /// Use `bbox` for box fill only, never as a constraint
    pub fn with_fill_box(mut self, bbox: BBox) -> Self {
        self.prompt_box = Some(bbox);
        self.constrain_to_box = false;
        self
    }

    /// The box the box constraint clips to, if any
    pub fn constraint_box(&self) -> Option<&BBox> {
        self.prompt_box.as_ref().filter(|_| self.constrain_to_box)
    }

    pub fn with_multimask(mut self, multimask: bool) -> Self {
        self.multimask_output = multimask;
        self
    }
}

/// Ranked candidates at image resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub candidates: Vec<Candidate>,
    pub ranking: RankingValues,
    pub report: PipelineReport,
}

impl PipelineOutput {
    pub fn best(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    pub fn masks(&self) -> Vec<&Mask> {
        self.candidates.iter().map(|c| &c.mask).collect()
    }

    pub fn scores(&self) -> Vec<f32> {
        self.candidates.iter().map(|c| c.score).collect()
    }

    pub fn boxes(&self) -> Vec<BBox> {
        self.candidates.iter().map(|c| c.bbox).collect()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Stateless pipeline over a shared, validated configuration
#[derive(Debug, Clone)]
pub struct MaskPipeline {
    config: Arc<PipelineConfig>,
}

impl MaskPipeline {
    /// Validate `config` and build a pipeline around it
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::from_shared(Arc::new(config))
    }

    pub fn from_shared(config: Arc<PipelineConfig>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage over one model output
    pub fn run(&self, output: ModelOutput, request: &PipelineRequest) -> Result<PipelineOutput> {
        let mut report = PipelineReport::new();
        let candidates = self.ingest(output, request, &mut report)?;
        Ok(self.process(candidates, request, report))
    }

    /// Normalise raw masks into candidates, repairing what can be repaired
    pub fn ingest(
        &self,
        output: ModelOutput,
        request: &PipelineRequest,
        report: &mut PipelineReport,
    ) -> Result<Vec<Candidate>> {
        let start = Instant::now();
        let count = output.len();
        let outcome = output.into_candidates(request.image_shape, self.config.mask_threshold)?;

        for &i in &outcome.malformed {
            warn!("Mask {} is not two-dimensional, replaced with an empty mask", i);
            report.diagnose(
                Stage::Ingest,
                format!("mask {} is not two-dimensional, replaced with an empty mask", i),
            );
        }
        if outcome.logits_dropped {
            warn!("Low-resolution logits do not match the mask count, dropping them");
            report.diagnose(
                Stage::Ingest,
                "low-resolution logits do not match the mask count, dropped",
            );
        }

        report.record(Stage::Ingest, count, outcome.candidates.len(), start);
        Ok(outcome.candidates)
    }

    /// Run the stages after ingestion over an existing candidate set
    pub fn process(
        &self,
        candidates: Vec<Candidate>,
        request: &PipelineRequest,
        mut report: PipelineReport,
    ) -> PipelineOutput {
        let config = &*self.config;
        let mut candidates = candidates;
        let initial = candidates.len();

        // IoU filter
        if config.iou_filter.enabled {
            let start = Instant::now();
            let before = candidates.len();
            candidates = filter_by_score(candidates, config.iou_filter.min_score);
            report.record(Stage::IouFilter, before, candidates.len(), start);
        } else {
            report.skip(Stage::IouFilter, candidates.len());
        }

        // Stability
        if config.stability.enabled {
            let start = Instant::now();
            let before = candidates.len();
            let (kept, skipped) = filter_by_stability(
                candidates,
                config.stability.min_score,
                config.stability.mask_threshold,
                config.stability.offset,
            );
            candidates = kept;
            match skipped {
                Some(reason) => {
                    warn!("{}", reason);
                    report.diagnose(Stage::Stability, reason);
                    report.skip(Stage::Stability, before);
                }
                None => report.record(Stage::Stability, before, candidates.len(), start),
            }
        } else {
            report.skip(Stage::Stability, candidates.len());
        }

        // NMS
        if config.nms.enabled && !request.multimask_output && candidates.len() >= 2 {
            let start = Instant::now();
            let before = candidates.len();
            candidates = nms(candidates, config.nms.iou_threshold);
            report.record(Stage::Nms, before, candidates.len(), start);
        } else {
            debug!(
                "Skipping NMS (enabled={}, multimask={}, candidates={})",
                config.nms.enabled,
                request.multimask_output,
                candidates.len()
            );
            report.skip(Stage::Nms, candidates.len());
        }

        // Edge rejection
        if config.edge.enabled {
            let start = Instant::now();
            let before = candidates.len();
            candidates = filter_edge_masks(candidates, request.image_shape, config.edge.tolerance_pixels);
            report.record(Stage::EdgeRejection, before, candidates.len(), start);
        } else {
            report.skip(Stage::EdgeRejection, candidates.len());
        }

        // Per-mask cleanup, resize included, always runs
        let start = Instant::now();
        let before = candidates.len();
        candidates = cleanup_candidates(
            candidates,
            config,
            request.image_shape,
            request.prompt_box.as_ref(),
            request.constraint_box(),
        );
        report.record(Stage::Cleanup, before, candidates.len(), start);

        // Non-overlap
        if config.enable_non_overlapping && !request.multimask_output {
            let start = Instant::now();
            let before = candidates.len();
            let (result, skipped) = enforce_non_overlapping(candidates);
            candidates = result;
            match skipped {
                Some(reason) => {
                    warn!("{}", reason);
                    report.diagnose(Stage::NonOverlap, reason);
                    report.skip(Stage::NonOverlap, before);
                }
                None => report.record(Stage::NonOverlap, before, candidates.len(), start),
            }
        } else {
            report.skip(Stage::NonOverlap, candidates.len());
        }

        // Ranking
        let start = Instant::now();
        let before = candidates.len();
        let ranking = if config.ranking.complexity_scoring {
            let (ranked, combined) = rank_by_combined_score(
                candidates,
                config.ranking.complexity_weight,
                config.ranking.component_bonus,
            );
            candidates = ranked;
            RankingValues::Combined(combined)
        } else if config.ranking.area_ranking != AreaRanking::Disabled {
            let largest_first = config.ranking.area_ranking == AreaRanking::LargestFirst;
            let (ranked, areas) = rank_by_area(candidates, largest_first);
            candidates = ranked;
            RankingValues::Area(areas)
        } else {
            let (ranked, scores) = rank_by_score(candidates);
            candidates = ranked;
            RankingValues::Score(scores)
        };
        report.record(Stage::Ranking, before, candidates.len(), start);

        info!(
            "Mask pipeline {}: {} -> {} candidates in {:.2}ms ({} diagnostics)",
            report.run_id,
            initial,
            candidates.len(),
            report.total_ms(),
            report.diagnostics.len()
        );

        PipelineOutput {
            candidates,
            ranking,
            report,
        }
    }
}
