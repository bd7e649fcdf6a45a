mod pipeline_bench;
mod primitives_bench;
mod synthetic;

use clap::{Parser, Subcommand};
use drawseg_core::{FillMethod, PipelineConfig};
use pipeline_bench::PipelineBenchOptions;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "drawseg-bench")]
#[command(about = "Mask post-processing benchmarks on synthetic drawings")]
struct Cli {
    #[command(subcommand)]
    command: Option<BenchCommand>,

    /// Pipeline configuration file (JSON, TOML or YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Seed for the synthetic drawings
    #[arg(long, global = true, default_value = "42")]
    seed: u64,
}

#[derive(Subcommand)]
enum BenchCommand {
    /// Run the full pipeline on synthetic model outputs
    Pipeline {
        /// Image side length in pixels
        #[arg(long, default_value = "512")]
        size: usize,

        /// Candidates per model output
        #[arg(long, default_value = "3")]
        candidates: usize,

        #[arg(long, default_value = "20")]
        iterations: usize,

        /// Keep every candidate, as for a multimask request
        #[arg(long)]
        multimask: bool,

        /// Override the drawing fill method (box_fill, morphological, convex_hull)
        #[arg(long)]
        fill_method: Option<FillMethod>,
    },
    /// Time each mask primitive
    Primitives {
        #[arg(long, value_delimiter = ',', default_value = "256,512,1024")]
        sizes: Vec<usize>,

        #[arg(long, default_value = "10")]
        iterations: usize,
    },
    /// Primitives, then the pipeline with every fill method
    Full,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<PipelineConfig> {
    let mut config = match path {
        Some(p) => PipelineConfig::from_file(p)?,
        None => PipelineConfig::default(),
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    info!("Benchmark configuration: {}", serde_json::to_string(&config)?);

    match cli.command {
        Some(BenchCommand::Pipeline {
            size,
            candidates,
            iterations,
            multimask,
            fill_method,
        }) => {
            let mut config = config;
            if let Some(method) = fill_method {
                config.drawing.fill_method = method;
            }
            let opts = PipelineBenchOptions {
                size,
                candidates,
                iterations,
                seed: cli.seed,
                multimask,
            };
            pipeline_bench::run_pipeline_bench(config, &opts)?;
        }
        Some(BenchCommand::Primitives { sizes, iterations }) => {
            primitives_bench::run_primitives_bench(&sizes, iterations, cli.seed)?;
        }
        Some(BenchCommand::Full) => {
            println!("drawseg Benchmarks");
            println!("==================\n");

            primitives_bench::run_primitives_bench(&[256, 512, 1024], 5, cli.seed)?;

            for method in [FillMethod::BoxFill, FillMethod::Morphological, FillMethod::ConvexHull] {
                let mut config = config.clone();
                config.drawing.fill_method = method;
                let opts = PipelineBenchOptions {
                    size: 512,
                    candidates: 3,
                    iterations: 10,
                    seed: cli.seed,
                    multimask: false,
                };
                pipeline_bench::run_pipeline_bench(config, &opts)?;
            }
        }
        None => {
            let opts = PipelineBenchOptions {
                size: 512,
                candidates: 3,
                iterations: 20,
                seed: cli.seed,
                multimask: false,
            };
            pipeline_bench::run_pipeline_bench(config, &opts)?;
        }
    }

    Ok(())
}
