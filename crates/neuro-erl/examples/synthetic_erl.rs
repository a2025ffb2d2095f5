//! Example: ERL of a synthetic segmentation with injected errors.
//!
//! Builds a ground truth of straight vertical neurites, derives a
//! segmentation that splits every `--split-every`-th neurite halfway and
//! merges neighbouring pairs every `--merge-every`-th neurite, then scores
//! it. The volume is written to a temporary slice stack so the chunked,
//! file-backed lookup path is exercised.
//!
//! Run from the workspace root:
//!   cargo run -p neuro-erl --example synthetic_erl -- --help
//!   cargo run -p neuro-erl --example synthetic_erl -- --chunks 8

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use neuro_erl::{
    Anisotropy, Error, Evaluation, EvaluationConfig, LabelVolume, LookupConfig, ObjectSkeleton,
    ScoreConfig, Shape3, SkeletonSet, SkeletonizeParams, Skeletonizer, SliceStack, Voxel,
    write_slices,
};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(about = "Score a synthetic segmentation with injected splits and merges")]
struct Args {
    /// Volume depth in planes
    #[arg(long, default_value_t = 64)]
    depth: usize,

    /// Neurites per row; the grid holds `grid * grid` neurites
    #[arg(long, default_value_t = 8)]
    grid: usize,

    /// Split every n-th neurite at mid depth (0 disables)
    #[arg(long, default_value_t = 3)]
    split_every: usize,

    /// Merge every n-th neurite into its left neighbour (0 disables)
    #[arg(long, default_value_t = 5)]
    merge_every: usize,

    #[arg(long, default_value_t = 4)]
    chunks: usize,

    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Physical voxel size as z,y,x
    #[arg(long, default_value = "40,4,4")]
    anisotropy: Anisotropy,
}

/// Each neurite occupies a 4x4 column; its skeleton is the column axis.
const CELL: usize = 4;

struct ColumnSkeletonizer;

impl Skeletonizer for ColumnSkeletonizer {
    fn skeletonize(
        &self,
        volume: &LabelVolume,
        _params: &SkeletonizeParams,
    ) -> Result<SkeletonSet, Error> {
        let shape = volume.shape();
        let mut set = SkeletonSet::new();
        for y in (CELL / 2..shape.height).step_by(CELL) {
            for x in (CELL / 2..shape.width).step_by(CELL) {
                let Some(id) = volume.get(Voxel::new(0, y, x)) else {
                    continue;
                };
                set.insert(id, ObjectSkeleton {
                    vertices: (0..shape.depth).map(|z| Voxel::new(z, y, x)).collect(),
                    edges: (1..shape.depth).map(|z| [z - 1, z]).collect(),
                    radii: vec![CELL as f32 / 2.0; shape.depth],
                });
            }
        }
        Ok(set)
    }
}

fn neurite(v: Voxel, grid: usize) -> u64 {
    ((v.y / CELL) * grid + v.x / CELL) as u64 + 1
}

fn segmentation(shape: Shape3, args: &Args) -> LabelVolume {
    let every = |n: usize, id: u64| n > 0 && id % n as u64 == 0;
    LabelVolume::from_fn(shape, |v| {
        let mut id = neurite(v, args.grid);
        if every(args.merge_every, id) && v.x >= CELL {
            id -= 1;
        }
        if every(args.split_every, id) && v.z >= shape.depth / 2 {
            id += 1_000_000;
        }
        id
    })
}

fn main() -> Result<()> {
    let args = Args::parse();
    let side = args.grid * CELL;
    let shape = Shape3::new(args.depth, side, side);

    let gt = LabelVolume::from_fn(shape, |v| neurite(v, args.grid));
    let seg = segmentation(shape, &args);

    let dir = tempfile::tempdir().context("creating temporary directory")?;
    write_slices(dir.path(), seg.as_view()).context("writing segmentation slices")?;
    let stack = SliceStack::open(dir.path()).context("opening segmentation slices")?;

    let cfg = EvaluationConfig {
        anisotropy: args.anisotropy,
        lookup: LookupConfig {
            chunk_count: args.chunks,
            workers: args.workers,
        },
        score: ScoreConfig::default(),
        skeletonize: SkeletonizeParams::default(),
    };

    let t0 = Instant::now();
    let store = Evaluation::new(cfg, &ColumnSkeletonizer)
        .run(&gt, &stack, None)
        .context("running evaluation")?;
    let elapsed = t0.elapsed();

    let score = store.score().context("evaluation recorded no score")?;
    print!("{}", score.report().worst_paths(5));
    println!("elapsed:        {:.1} ms", elapsed.as_secs_f64() * 1e3);
    Ok(())
}
