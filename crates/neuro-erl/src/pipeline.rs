//! Stage-by-stage evaluation of a proofread segmentation.
//!
//! Stages run in a fixed order, each reading what earlier stages recorded in
//! a [`StageStore`]:
//! 1. [`Stage::Skeletons`]: skeletonize the ground truth into a graph.
//! 2. [`Stage::Lookup`]: resolve every graph node in the segmentation.
//! 3. [`Stage::Score`]: classify edges and compute the ERL.
//!
//! A store only grows. Recording a stage twice is an error, so a result can
//! never be silently replaced by a later computation.

use core::fmt;

use erl_core::{Anisotropy, LabelVolume, VolumeSource};
use erl_lut::{LookupConfig, SegmentLookup, build_lookup};
use erl_score::{ErlScore, ScoreConfig, score_erl};
use erl_skel::{SkeletonGraph, SkeletonizeParams, Skeletonizer, skeletonize_graph};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Skeletons,
    Lookup,
    Score,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Skeletons => "skeletons",
            Stage::Lookup => "lookup",
            Stage::Score => "score",
        })
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] erl_core::Error),

    #[error("stage `{0}` was already recorded")]
    AlreadyRecorded(Stage),

    #[error("stage `{needed}` must run before `{stage}`")]
    MissingStage { stage: Stage, needed: Stage },
}

/// Append-only record of completed stages.
#[derive(Debug, Default)]
pub struct StageStore {
    graph: Option<SkeletonGraph>,
    lookup: Option<SegmentLookup>,
    score: Option<ErlScore>,
    order: Vec<Stage>,
}

impl StageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_graph(&mut self, graph: SkeletonGraph) -> Result<(), PipelineError> {
        record(&mut self.graph, &mut self.order, Stage::Skeletons, graph)
    }

    pub fn record_lookup(&mut self, lookup: SegmentLookup) -> Result<(), PipelineError> {
        record(&mut self.lookup, &mut self.order, Stage::Lookup, lookup)
    }

    pub fn record_score(&mut self, score: ErlScore) -> Result<(), PipelineError> {
        record(&mut self.score, &mut self.order, Stage::Score, score)
    }

    pub fn graph(&self) -> Option<&SkeletonGraph> {
        self.graph.as_ref()
    }

    pub fn lookup(&self) -> Option<&SegmentLookup> {
        self.lookup.as_ref()
    }

    pub fn score(&self) -> Option<&ErlScore> {
        self.score.as_ref()
    }

    /// Completed stages in the order they were recorded.
    pub fn stages(&self) -> &[Stage] {
        &self.order
    }

    pub fn contains(&self, stage: Stage) -> bool {
        self.order.contains(&stage)
    }

    pub fn into_score(self) -> Option<ErlScore> {
        self.score
    }
}

fn record<T>(
    slot: &mut Option<T>,
    order: &mut Vec<Stage>,
    stage: Stage,
    value: T,
) -> Result<(), PipelineError> {
    if slot.is_some() {
        return Err(PipelineError::AlreadyRecorded(stage));
    }
    *slot = Some(value);
    order.push(stage);
    debug!(%stage, "recorded stage");
    Ok(())
}

fn require<T>(value: Option<T>, stage: Stage, needed: Stage) -> Result<T, PipelineError> {
    value.ok_or(PipelineError::MissingStage { stage, needed })
}

#[derive(Debug, Clone, Default)]
pub struct EvaluationConfig {
    pub anisotropy: Anisotropy,
    pub lookup: LookupConfig,
    pub score: ScoreConfig,
    pub skeletonize: SkeletonizeParams,
}

/// Runs the evaluation stages with one skeletonizer and configuration.
pub struct Evaluation<'a> {
    cfg: EvaluationConfig,
    skeletonizer: &'a dyn Skeletonizer,
}

impl<'a> Evaluation<'a> {
    /// The skeletonizer sees `cfg.anisotropy`, whatever
    /// `cfg.skeletonize.anisotropy` held.
    pub fn new(mut cfg: EvaluationConfig, skeletonizer: &'a dyn Skeletonizer) -> Self {
        cfg.skeletonize.anisotropy = cfg.anisotropy;
        Self { cfg, skeletonizer }
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.cfg
    }

    pub fn skeletonize(
        &self,
        store: &mut StageStore,
        ground_truth: &LabelVolume,
    ) -> Result<(), PipelineError> {
        let graph = skeletonize_graph(self.skeletonizer, ground_truth, &self.cfg.skeletonize)?;
        if graph.is_empty() {
            warn!("ground truth produced no skeleton nodes");
        }
        info!(
            objects = graph.num_objects(),
            nodes = graph.num_nodes(),
            edges = graph.num_edges(),
            "skeletonized ground truth"
        );
        store.record_graph(graph)
    }

    pub fn lookup(
        &self,
        store: &mut StageStore,
        segmentation: &dyn VolumeSource,
        mask: Option<&dyn VolumeSource>,
    ) -> Result<(), PipelineError> {
        let graph = require(store.graph(), Stage::Lookup, Stage::Skeletons)?;
        let lookup = build_lookup(segmentation, &graph.node_voxels(), mask, &self.cfg.lookup)?;
        store.record_lookup(lookup)
    }

    pub fn score(&self, store: &mut StageStore) -> Result<(), PipelineError> {
        let graph = require(store.graph(), Stage::Score, Stage::Skeletons)?;
        let lookup = require(store.lookup(), Stage::Score, Stage::Lookup)?;
        let score = score_erl(
            graph,
            self.cfg.anisotropy,
            &lookup.table,
            &lookup.mask_ids,
            &self.cfg.score,
        )?;
        store.record_score(score)
    }

    /// Runs every stage into a fresh store.
    ///
    /// The segmentation must have the ground truth's shape.
    pub fn run(
        &self,
        ground_truth: &LabelVolume,
        segmentation: &dyn VolumeSource,
        mask: Option<&dyn VolumeSource>,
    ) -> Result<StageStore, PipelineError> {
        if segmentation.shape() != ground_truth.shape() {
            return Err(erl_core::Error::ShapeMismatch {
                expected: ground_truth.shape(),
                actual: segmentation.shape(),
            }
            .into());
        }

        let mut store = StageStore::new();
        self.skeletonize(&mut store, ground_truth)?;
        self.lookup(&mut store, segmentation, mask)?;
        self.score(&mut store)?;
        Ok(store)
    }
}
