// Timing of the individual mask primitives

use crate::synthetic::DrawingGenerator;
use drawseg_core::{ImageShape, Mask, RawMask};
use drawseg_mask::primitives::{
    count_components, fill_all_holes_convex_hull, fill_all_holes_flood_fill, fill_small_holes,
    fill_with_box, fill_with_morphological_closing, keep_largest_component, remove_small_components,
    smooth,
};
use drawseg_mask::compute_mask_complexity;
use rayon::prelude::*;
use std::time::{Duration, Instant};

type Case<'a> = (&'static str, Box<dyn Fn() -> Mask + Sync + 'a>);

fn case<'a, F: Fn() -> Mask + Sync + 'a>(name: &'static str, f: F) -> Case<'a> {
    (name, Box::new(f))
}

fn time<F: FnMut() -> Mask>(iterations: usize, mut f: F) -> (Duration, usize) {
    let start = Instant::now();
    let mut area = 0;
    for _ in 0..iterations {
        area = f().area();
    }
    (start.elapsed() / iterations.max(1) as u32, area)
}

pub fn run_primitives_bench(sizes: &[usize], iterations: usize, seed: u64) -> anyhow::Result<()> {
    println!("Primitive Benchmarks");
    println!("--------------------");

    for &size in sizes {
        let mut generator = DrawingGenerator::new(ImageShape::new(size, size), seed);
        let bbox = generator.random_box();
        let probs = generator.outline_probabilities(&bbox, 2);
        let mask = RawMask::from(probs)
            .binarize(0.5)
            .ok_or_else(|| anyhow::anyhow!("synthetic mask is not two-dimensional"))?;

        println!("  {0}x{0} ({1} px set, {2} components)", size, mask.area(), count_components(&mask));

        let cases: Vec<Case<'_>> = vec![
            case("remove_small_components", || remove_small_components(&mask, 100)),
            case("keep_largest_component", || keep_largest_component(&mask)),
            case("fill_small_holes", || fill_small_holes(&mask, 500)),
            case("fill_holes_convex_hull", || fill_all_holes_convex_hull(&mask)),
            case("fill_holes_flood_fill", || fill_all_holes_flood_fill(&mask)),
            case("fill_with_box", || fill_with_box(&mask, &bbox, 0.02)),
            case("morphological_closing", || fill_with_morphological_closing(&mask, 25, 3)),
            case("smooth_k5", || smooth(&mask, 5)),
        ];

        for (name, f) in &cases {
            let (mean, area) = time(iterations, f);
            println!("    {:<26} {:>10.3}ms  (area {})", name, mean.as_secs_f64() * 1000.0, area);
        }

        let start = Instant::now();
        let complexity = compute_mask_complexity(&mask);
        println!(
            "    {:<26} {:>10.3}ms  (value {:.3})",
            "mask_complexity",
            start.elapsed().as_secs_f64() * 1000.0,
            complexity
        );

        // All cases at once across the rayon pool
        let start = Instant::now();
        let total: usize = cases.par_iter().map(|(_, f)| f().area()).sum();
        println!(
            "    {:<26} {:>10.3}ms  (total area {})",
            "parallel_all",
            start.elapsed().as_secs_f64() * 1000.0,
            total
        );
        println!();
    }

    Ok(())
}
