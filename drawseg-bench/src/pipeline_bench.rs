// End-to-end pipeline timing on synthetic drawings

use crate::synthetic::DrawingGenerator;
use drawseg_core::{ImageShape, PipelineConfig};
use drawseg_mask::{MaskPipeline, PipelineRequest, Stage};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

pub struct PipelineBenchOptions {
    pub size: usize,
    pub candidates: usize,
    pub iterations: usize,
    pub seed: u64,
    pub multimask: bool,
}

pub fn run_pipeline_bench(config: PipelineConfig, opts: &PipelineBenchOptions) -> anyhow::Result<()> {
    println!("Pipeline Benchmark");
    println!("------------------");
    println!("   Image:      {0}x{0}", opts.size);
    println!("   Candidates: {}", opts.candidates);
    println!("   Iterations: {}", opts.iterations);
    println!("   Drawing:    {} ({})", config.drawing.enabled, config.drawing.fill_method);
    println!();

    let pipeline = MaskPipeline::new(config)?;
    let mut generator = DrawingGenerator::new(ImageShape::new(opts.size, opts.size), opts.seed);

    let mut stage_ms: BTreeMap<String, f64> = BTreeMap::new();
    let mut total_ms = 0.0;
    let mut kept = 0usize;
    let mut last_report = None;

    for i in 0..opts.iterations {
        let bbox = generator.random_box();
        let output = generator.model_output(&bbox, opts.candidates);
        let request = PipelineRequest::new(generator.shape())
            .with_box(bbox)
            .with_multimask(opts.multimask);

        let start = Instant::now();
        let result = pipeline.run(output, &request)?;
        total_ms += start.elapsed().as_secs_f64() * 1000.0;
        kept += result.len();

        for record in &result.report.stages {
            *stage_ms.entry(record.stage.to_string()).or_default() += record.elapsed_ms;
        }
        debug!(
            "Iteration {}: {} candidate(s), cleanup {:.2}ms",
            i,
            result.len(),
            result.report.stage(Stage::Cleanup).map(|r| r.elapsed_ms).unwrap_or(0.0)
        );
        last_report = Some(result.report);
    }

    let runs = opts.iterations.max(1) as f64;
    println!("Results:");
    println!("   Mean run:        {:.2}ms", total_ms / runs);
    println!("   Mean kept:       {:.2}", kept as f64 / runs);
    for (stage, ms) in &stage_ms {
        println!("   {:<16} {:.3}ms", stage, ms / runs);
    }
    println!();

    if let Some(report) = last_report {
        info!("Last report: {}", report.to_json()?);
    }
    Ok(())
}
