//! Interactive segmentation: a promptable model followed by the pipeline

use crate::merge::merge_candidates_union;
use crate::pipeline::{MaskPipeline, PipelineOutput, PipelineRequest};
use crate::report::{PipelineReport, Stage};
use drawseg_core::{BBox, ImageShape, ModelOutput, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Click prompt in image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointPrompt {
    pub x: f32,
    pub y: f32,
    /// Foreground click when true, background click otherwise
    pub positive: bool,
}

/// What the user asked the model to segment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub points: Vec<PointPrompt>,
    pub boxes: Vec<BBox>,
    pub text: Option<String>,
    pub multimask_output: bool,
}

impl Prompt {
    pub fn from_box(bbox: BBox) -> Self {
        Self {
            boxes: vec![bbox],
            ..Self::default()
        }
    }

    pub fn from_boxes(boxes: Vec<BBox>) -> Self {
        Self {
            boxes,
            ..Self::default()
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_point(mut self, x: f32, y: f32, positive: bool) -> Self {
        self.points.push(PointPrompt { x, y, positive });
        self
    }

    pub fn with_multimask(mut self, multimask: bool) -> Self {
        self.multimask_output = multimask;
        self
    }

    /// Same prompt restricted to one box
    fn for_box(&self, bbox: BBox) -> Self {
        Self {
            points: self.points.clone(),
            boxes: vec![bbox],
            text: self.text.clone(),
            multimask_output: self.multimask_output,
        }
    }
}

/// A promptable segmentation model
#[cfg_attr(test, mockall::automock)]
pub trait SegmentationModel: Send + Sync {
    /// Predict candidate masks for `prompt` on an image of `image_shape`
    fn predict(&self, image_shape: ImageShape, prompt: &Prompt) -> Result<ModelOutput>;
}

/// Model plus post-processing, one call per user interaction
pub struct InteractiveSegmenter<M: SegmentationModel> {
    model: Arc<M>,
    pipeline: MaskPipeline,
}

impl<M: SegmentationModel> InteractiveSegmenter<M> {
    pub fn new(model: Arc<M>, pipeline: MaskPipeline) -> Self {
        Self { model, pipeline }
    }

    pub fn pipeline(&self) -> &MaskPipeline {
        &self.pipeline
    }

    /// Segment one prompt.
    ///
    /// Several boxes are predicted one by one and their candidates merged
    /// into a single region before post-processing. The union of the boxes
    /// guides box fill but is never used as a constraint. Model errors are
    /// returned as they are.
    pub fn segment(&self, image_shape: ImageShape, prompt: &Prompt) -> Result<PipelineOutput> {
        debug!(
            "Segmenting with {} ({} boxes, {} points)",
            std::any::type_name::<M>(),
            prompt.boxes.len(),
            prompt.points.len()
        );

        if prompt.boxes.len() > 1 {
            return self.segment_boxes(image_shape, prompt);
        }

        let output = self.model.predict(image_shape, prompt)?;
        let mut request = PipelineRequest::new(image_shape).with_multimask(prompt.multimask_output);
        if let Some(b) = prompt.boxes.first() {
            request = request.with_box(*b);
        }
        self.pipeline.run(output, &request)
    }

    fn segment_boxes(&self, image_shape: ImageShape, prompt: &Prompt) -> Result<PipelineOutput> {
        let mut report = PipelineReport::new();
        let mut all = Vec::new();
        for bbox in &prompt.boxes {
            let output = self.model.predict(image_shape, &prompt.for_box(*bbox))?;
            let request = PipelineRequest::new(image_shape);
            all.extend(self.pipeline.ingest(output, &request, &mut report)?);
        }

        let merged_box = prompt
            .boxes
            .iter()
            .skip(1)
            .fold(prompt.boxes[0], |acc, b| acc.union(b));

        let merged: Vec<_> = merge_candidates_union(all).into_iter().collect();
        if merged.is_empty() {
            report.diagnose(Stage::Ingest, "no candidates returned for any box");
        }
        info!(
            "Merged {} box prompts into {} candidate(s)",
            prompt.boxes.len(),
            merged.len()
        );

        let request = PipelineRequest::new(image_shape)
            .with_fill_box(merged_box)
            .with_multimask(prompt.multimask_output);
        Ok(self.pipeline.process(merged, &request, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drawseg_core::{Error, PipelineConfig, RawMask};
    use ndarray::Array2;

    fn square(size: usize, x0: usize, y0: usize, side: usize) -> RawMask {
        RawMask::from(Array2::from_shape_fn((size, size), |(y, x)| {
            (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y)
        }))
    }

    fn pipeline() -> MaskPipeline {
        let mut config = PipelineConfig::default();
        config.drawing.enabled = false;
        config.cleanup.enabled = false;
        MaskPipeline::new(config).unwrap()
    }

    #[test]
    fn test_single_box_passes_through() {
        let mut model = MockSegmentationModel::new();
        model
            .expect_predict()
            .times(1)
            .returning(|_, _| Ok(ModelOutput::new(vec![square(40, 5, 5, 10)], vec![0.9])));

        let segmenter = InteractiveSegmenter::new(Arc::new(model), pipeline());
        let prompt = Prompt::from_box(BBox::new(5.0, 5.0, 15.0, 15.0));
        let out = segmenter.segment(ImageShape::new(40, 40), &prompt).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.best().unwrap().mask.area(), 100);
    }

    #[test]
    fn test_multiple_boxes_merged() {
        let mut model = MockSegmentationModel::new();
        model.expect_predict().times(2).returning(|_, prompt| {
            let b = prompt.boxes[0];
            let mask = square(40, b.x1 as usize, b.y1 as usize, 5);
            Ok(ModelOutput::new(vec![mask], vec![0.8]))
        });

        let segmenter = InteractiveSegmenter::new(Arc::new(model), pipeline());
        let prompt = Prompt::from_boxes(vec![
            BBox::new(2.0, 2.0, 7.0, 7.0),
            BBox::new(20.0, 20.0, 25.0, 25.0),
        ]);
        let out = segmenter.segment(ImageShape::new(40, 40), &prompt).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.best().unwrap().mask.area(), 50);
        assert_eq!(out.best().unwrap().bbox, BBox::new(2.0, 2.0, 24.0, 24.0));
    }

    #[test]
    fn test_merged_boxes_not_constrained() {
        let mut model = MockSegmentationModel::new();
        model.expect_predict().times(2).returning(|_, prompt| {
            // the model spills two pixels past each box
            let b = prompt.boxes[0];
            let mask = square(40, b.x1 as usize - 2, b.y1 as usize - 2, 9);
            Ok(ModelOutput::new(vec![mask], vec![0.8]))
        });

        let mut config = PipelineConfig::default();
        config.drawing.enabled = false;
        config.cleanup.enabled = false;
        config.box_constraint.enabled = true;
        config.box_constraint.margin = 0.0;
        config.enable_non_overlapping = true;
        let segmenter = InteractiveSegmenter::new(Arc::new(model), MaskPipeline::new(config).unwrap());

        let mut prompt = Prompt::from_boxes(vec![
            BBox::new(4.0, 4.0, 9.0, 9.0),
            BBox::new(20.0, 20.0, 25.0, 25.0),
        ]);
        prompt.multimask_output = true;
        let out = segmenter.segment(ImageShape::new(40, 40), &prompt).unwrap();

        let best = out.best().unwrap();
        assert_eq!(best.mask.area(), 2 * 81);
        assert_eq!(best.bbox, BBox::new(2.0, 2.0, 26.0, 26.0));
        assert!(out.report.was_skipped(Stage::NonOverlap));
    }

    #[test]
    fn test_model_error_propagates() {
        let mut model = MockSegmentationModel::new();
        model
            .expect_predict()
            .returning(|_, _| Err(Error::Model("inference failed".to_string())));

        let segmenter = InteractiveSegmenter::new(Arc::new(model), pipeline());
        let err = segmenter
            .segment(ImageShape::new(10, 10), &Prompt::from_text("title block"))
            .unwrap_err();
        assert!(matches!(err, Error::Model(_)));
    }
}
