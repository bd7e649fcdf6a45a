//! Post-processing and candidate selection for promptable segmentation
//! masks on engineering drawings.

pub mod cleanup;
pub mod filters;
pub mod merge;
pub mod overlap;
pub mod pipeline;
pub mod primitives;
pub mod ranking;
pub mod report;
pub mod segmenter;

pub use cleanup::{cleanup_candidates, cleanup_mask, postprocess_mask, postprocess_mask_for_drawings};
pub use filters::{
    compute_stability_score, filter_by_score, filter_by_stability, filter_edge_masks,
    is_mask_near_edge, nms,
};
pub use merge::merge_candidates_union;
pub use overlap::enforce_non_overlapping;
pub use pipeline::{MaskPipeline, PipelineOutput, PipelineRequest};
pub use ranking::{
    compute_combined_score, compute_mask_complexity, rank_by_area, rank_by_combined_score,
    rank_by_score, RankingValues,
};
pub use report::{Diagnostic, PipelineReport, Stage, StageRecord};
pub use segmenter::{InteractiveSegmenter, PointPrompt, Prompt, SegmentationModel};
