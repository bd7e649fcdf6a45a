//! Per-mask cleanup: generic sprinkle/hole cleanup, drawing-mode region
//! filling, box constraint and resize to image resolution

use crate::primitives::{
    close, constrain_to_box, fill_all_holes_convex_hull, fill_small_holes, fill_with_box,
    fill_with_morphological_closing, keep_largest_component, remove_small_components, smooth,
    EllipseKernel,
};
use drawseg_core::{BBox, Candidate, CleanupConfig, DrawingConfig, FillMethod, ImageShape, Mask, PipelineConfig};
use rayon::prelude::*;
use tracing::{debug, warn};

/// Generic cleanup: drop small components, fill small holes, then smooth
/// with an elliptical open-then-close.
pub fn postprocess_mask(mask: &Mask, config: &CleanupConfig) -> Mask {
    if mask.is_empty() {
        return mask.clone();
    }

    let mut processed = mask.clone();

    if config.min_component_area > 0 {
        processed = remove_small_components(&processed, config.min_component_area);
    }

    if config.fill_holes && config.max_hole_area > 0 {
        processed = fill_small_holes(&processed, config.max_hole_area);
    }

    if config.apply_morphology && config.morphology_kernel_size > 0 {
        processed = smooth(&processed, config.morphology_kernel_size);
    }

    debug!(
        "postprocess_mask: {} -> {} pixels",
        mask.area(),
        processed.area()
    );
    processed
}

/// Drawing cleanup: turn line work into the enclosed region.
///
/// `smoothing_kernel` is the closing kernel applied after the fill, `None`
/// to skip it. `prompt_box` must already be in the mask's frame.
pub fn postprocess_mask_for_drawings(
    mask: &Mask,
    config: &DrawingConfig,
    smoothing_kernel: Option<usize>,
    prompt_box: Option<&BBox>,
) -> Mask {
    if mask.is_empty() {
        return mask.clone();
    }

    let original_pixels = mask.area();
    if original_pixels == 0 {
        debug!("postprocess_mask_for_drawings: empty mask, returning as-is");
        return mask.clone();
    }
    let total_pixels = mask.shape().area();

    let mut processed = mask.clone();
    let mut box_filled = false;

    if config.fill_all_holes {
        processed = match (config.fill_method, prompt_box) {
            (FillMethod::BoxFill, Some(b)) => {
                box_filled = true;
                fill_with_box(&processed, b, config.box_fill_margin)
            }
            (FillMethod::Morphological, _) => fill_with_morphological_closing(
                &processed,
                config.morphology_kernel,
                config.morphology_iterations,
            ),
            _ => fill_all_holes_convex_hull(&processed),
        };
        debug!(
            "After {} fill: {} pixels",
            config.fill_method,
            processed.area()
        );
    }

    if config.keep_largest_only && !box_filled {
        processed = keep_largest_component(&processed);
    }

    if let Some(k) = smoothing_kernel.filter(|&k| k > 0) {
        let kernel = EllipseKernel::new(k);
        if !kernel.exceeds(&processed) {
            processed = close(&processed, &kernel);
        }
    }

    let final_pixels = processed.area();
    if (final_pixels as f64) < total_pixels as f64 * config.min_area_ratio as f64 {
        warn!(
            "Mask too small after processing ({}/{} < {}), returning empty",
            final_pixels, total_pixels, config.min_area_ratio
        );
        return Mask::new(mask.shape());
    }

    debug!(
        "postprocess_mask_for_drawings: {} -> {} pixels",
        original_pixels, final_pixels
    );
    processed
}

/// Full per-mask treatment for one request.
///
/// Cleanup runs in the mask's own frame (drawing mode wins over generic
/// mode, precision mode skips both), then the box constraint, then a
/// nearest-neighbour resize to `image_shape`. `fill_box` guides box fill,
/// `constraint_box` is what the box constraint clips to. Both are in
/// image coordinates.
pub fn cleanup_mask(
    mask: &Mask,
    config: &PipelineConfig,
    image_shape: ImageShape,
    fill_box: Option<&BBox>,
    constraint_box: Option<&BBox>,
) -> Mask {
    let local_box = fill_box.map(|b| b.rescale(image_shape, mask.shape()));
    let local_constraint = constraint_box.map(|b| b.rescale(image_shape, mask.shape()));
    let mut processed = mask.clone();

    if !config.precision_mode {
        if config.drawing.enabled {
            let smoothing = config
                .cleanup
                .apply_morphology
                .then_some(config.cleanup.morphology_kernel_size);
            processed = postprocess_mask_for_drawings(
                &processed,
                &config.drawing,
                smoothing,
                local_box.as_ref(),
            );
        } else if config.cleanup.enabled {
            processed = postprocess_mask(&processed, &config.cleanup);
        }
    }

    if config.box_constraint.enabled {
        if let Some(b) = local_constraint.as_ref() {
            processed = constrain_to_box(&processed, b, config.box_constraint.margin);
        }
    }

    if processed.shape() != image_shape {
        debug!(
            "Resizing mask {}x{} -> {}x{}",
            processed.height(),
            processed.width(),
            image_shape.height,
            image_shape.width
        );
        processed = processed.resize_nearest(image_shape);
    }

    processed
}

/// Apply [`cleanup_mask`] to every candidate and refresh the boxes.
/// Runs on the rayon pool once the set reaches `config.parallel_threshold`.
pub fn cleanup_candidates(
    candidates: Vec<Candidate>,
    config: &PipelineConfig,
    image_shape: ImageShape,
    fill_box: Option<&BBox>,
    constraint_box: Option<&BBox>,
) -> Vec<Candidate> {
    let process = |mut c: Candidate| {
        let mask = cleanup_mask(&c.mask, config, image_shape, fill_box, constraint_box);
        c.set_mask(mask);
        c
    };

    if candidates.len() >= config.parallel_threshold.max(1) && candidates.len() > 1 {
        candidates.into_par_iter().map(process).collect()
    } else {
        candidates.into_iter().map(process).collect()
    }
}
