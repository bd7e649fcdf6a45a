//! Drawing-sheet zones: the prompts that find them, their post-processing
//! and page type classification.

pub mod classifier;
pub mod error;
pub mod prompts;
pub mod zones;

pub use classifier::{classify_page_type, classify_page_type_with, structural_page_rules, PageRule, PageType};
pub use error::{Result, ZoneError};
pub use prompts::{TypicalLocation, ZonePromptConfig, ZonePromptSet, ZoneType};
pub use zones::{
    filter_overlapping_zones, merge_adjacent_zones, post_process_zones, validate_zone_locations,
    zones_from_candidates, ZonePostProcessing, ZoneResult, DEFAULT_MERGE_GAP,
    DEFAULT_ZONE_IOU_THRESHOLD,
};
