use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Parser};
use neuro_erl::{
    Anisotropy, CommandSkeletonizer, ErlScore, Evaluation, EvaluationConfig, LookupConfig,
    PrecomputedSkeletons, ScoreComparison, ScoreConfig, SkeletonizeParams, Skeletonizer,
    SliceStack, VolumeSource,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "erl_eval")]
#[command(about = "Score a proofread segmentation against ground truth by expected run length")]
#[command(group(
    ArgGroup::new("skeleton_source")
        .required(true)
        .args(["skeletons", "skeletonizer"])
))]
struct Cli {
    /// Ground-truth slice stack directory
    #[arg(long, required = true)]
    gt_path: PathBuf,
    /// Proofread segmentation slice stack directory
    #[arg(long, required = true)]
    proof_path: PathBuf,
    /// Physical voxel size as z,y,x
    #[arg(long, default_value = "40,4,4")]
    anisotropy: Anisotropy,
    /// Slice stack whose nonzero voxels mark segments to leave unscored
    #[arg(long)]
    mask: Option<PathBuf>,
    /// Number of z chunks the segmentation is read in
    #[arg(long, default_value_t = 1)]
    chunks: usize,
    /// Lookup worker threads (0 = all cores)
    #[arg(long, default_value_t = 1)]
    workers: usize,
    /// Ground-truth objects a segment may cover beyond the first
    #[arg(long, default_value_t = 0)]
    merge_threshold: usize,
    /// Precomputed ground-truth skeletons (JSON)
    #[arg(long)]
    skeletons: Option<PathBuf>,
    /// External skeletonization program
    #[arg(long)]
    skeletonizer: Option<PathBuf>,
    /// Extra argument for the skeletonization program (repeatable)
    #[arg(long = "skeletonizer-arg", requires = "skeletonizer")]
    skeletonizer_args: Vec<String>,
    /// Skeletonization parameters (JSON); absent fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write the full score as JSON
    #[arg(long)]
    output: Option<PathBuf>,
    /// Previously written score to compare against
    #[arg(long)]
    baseline: Option<PathBuf>,
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    ensure_dir_exists(&cli.gt_path, "ground truth")?;
    ensure_dir_exists(&cli.proof_path, "proofread segmentation")?;
    if let Some(mask) = &cli.mask {
        ensure_dir_exists(mask, "mask")?;
    }

    let params = match &cli.config {
        Some(path) => {
            ensure_file_exists(path, "config")?;
            SkeletonizeParams::from_json_file(path)
                .with_context(|| format!("loading skeletonization parameters {}", path.display()))?
        }
        None => SkeletonizeParams::default(),
    };
    let skeletonizer = skeletonizer(&cli)?;

    let gt = SliceStack::open(&cli.gt_path)
        .and_then(|s| s.read_all())
        .with_context(|| format!("loading ground truth {}", cli.gt_path.display()))?;
    let proof = open_source(&cli.proof_path, cli.chunks)
        .with_context(|| format!("opening segmentation {}", cli.proof_path.display()))?;
    let mask = match &cli.mask {
        Some(path) => Some(
            open_source(path, cli.chunks)
                .with_context(|| format!("opening mask {}", path.display()))?,
        ),
        None => None,
    };
    info!(shape = %gt.shape(), chunks = cli.chunks, "loaded volumes");

    let cfg = EvaluationConfig {
        anisotropy: cli.anisotropy,
        lookup: LookupConfig {
            chunk_count: cli.chunks,
            workers: cli.workers,
        },
        score: ScoreConfig {
            merge_threshold: cli.merge_threshold,
        },
        skeletonize: params,
    };
    let store = Evaluation::new(cfg, &*skeletonizer)
        .run(&gt, &*proof, mask.as_deref())
        .context("evaluating segmentation")?;
    let score = store
        .into_score()
        .context("evaluation finished without a score")?;

    let worst = if cli.verbose { 10 } else { 0 };
    print!("{}", score.report().worst_paths(worst));

    if let Some(path) = &cli.baseline {
        ensure_file_exists(path, "baseline")?;
        let baseline: ErlScore = read_json(path)?;
        println!();
        print!(
            "{}",
            ScoreComparison {
                baseline: &baseline,
                current: &score,
            }
        );
    }

    if let Some(path) = &cli.output {
        write_json(path, &score)?;
        info!(path = %path.display(), "wrote score");
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn skeletonizer(cli: &Cli) -> Result<Box<dyn Skeletonizer>> {
    match (&cli.skeletons, &cli.skeletonizer) {
        (Some(path), None) => {
            ensure_file_exists(path, "skeletons")?;
            Ok(Box::new(PrecomputedSkeletons::new(path)))
        }
        (None, Some(program)) => Ok(Box::new(
            CommandSkeletonizer::new(program).with_args(cli.skeletonizer_args.iter().cloned()),
        )),
        _ => bail!("exactly one of --skeletons and --skeletonizer is required"),
    }
}

/// Loads the stack into memory when it is read as a single chunk.
fn open_source(path: &Path, chunks: usize) -> Result<Box<dyn VolumeSource>> {
    let stack = SliceStack::open(path)?;
    if chunks == 1 {
        Ok(Box::new(stack.read_all()?))
    } else {
        Ok(Box::new(stack))
    }
}

fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).context("serializing json")?;
    fs::write(path, bytes).with_context(|| format!("writing json {}", path.display()))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("parsing json {}", path.display()))
}

fn ensure_dir_exists(path: &Path, what: &str) -> Result<()> {
    if !path.exists() {
        bail!("{} directory does not exist: {}", what, path.display());
    }
    if !path.is_dir() {
        bail!("{} path is not a directory: {}", what, path.display());
    }
    Ok(())
}

fn ensure_file_exists(path: &Path, what: &str) -> Result<()> {
    if !path.exists() {
        bail!("{} file does not exist: {}", what, path.display());
    }
    if !path.is_file() {
        bail!("{} path is not a file: {}", what, path.display());
    }
    Ok(())
}
