//! Mask-level image-processing primitives
//!
//! Every function takes a mask by reference and returns a new one; empty
//! masks come back unchanged and nothing here fails.

pub mod components;
pub mod contours;
pub mod fill;
pub mod morphology;

pub use components::{count_components, fill_small_holes, keep_largest_component, remove_small_components};
pub use contours::{arc_length, convex_hull, external_contours};
pub use fill::{
    constrain_to_box, fill_all_holes_convex_hull, fill_all_holes_flood_fill, fill_with_box,
    fill_with_morphological_closing,
};
pub use morphology::{close, dilate, erode, open, smooth, EllipseKernel};
