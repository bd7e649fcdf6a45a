//! Core types shared by the drawseg crates: masks, candidates, boxes,
//! configuration and errors.

pub mod candidate;
pub mod config;
pub mod error;
pub mod geometry;
pub mod mask;

pub use candidate::{Candidate, IngestOutcome, ModelOutput};
pub use config::{
    AreaRanking, BoxConstraintConfig, CleanupConfig, DrawingConfig, EdgeConfig, FillMethod,
    IouFilterConfig, NmsConfig, PipelineConfig, RankingConfig, StabilityConfig,
};
pub use error::{Error, Result};
pub use geometry::{merge_overlapping_boxes, BBox, ImageShape, Region};
pub use mask::{Mask, RawMask};
