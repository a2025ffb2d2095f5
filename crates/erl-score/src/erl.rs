use std::collections::BTreeSet;

use erl_core::{Anisotropy, Error, LabelId};
use erl_skel::{ObjectSpan, SkeletonGraph};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classify::{EdgeClass, ScoreConfig, classify_edges, merged_segments};

/// Score detail of one ground-truth object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathScore {
    pub object: LabelId,
    /// Physical length of the non-omitted edges.
    pub length: f64,
    /// Physical length of the correct edges.
    pub correct_length: f64,
    /// `Σ run² / length`, or `0` for a zero-length path.
    pub erl: f64,
    /// Lengths of the correct runs, longest first.
    pub runs: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErlScore {
    /// Expected run length: length-weighted mean of the path scores.
    pub erl: f64,
    /// Score a perfect segmentation would reach on the same graph.
    pub max_erl: f64,
    pub total_length: f64,
    pub merge_threshold: usize,
    pub paths: Vec<PathScore>,
    /// Edge classes, indexed like the graph's edges.
    pub edges: Vec<EdgeClass>,
    pub correct: usize,
    pub split: usize,
    pub merged: usize,
    pub omitted: usize,
    pub merged_segments: BTreeSet<LabelId>,
}

impl ErlScore {
    /// `erl / max_erl`, or `0` when the graph has no length.
    pub fn ratio(&self) -> f64 {
        if self.max_erl > 0.0 {
            self.erl / self.max_erl
        } else {
            0.0
        }
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }
}

/// Classifies and scores every edge of the ground-truth `graph` against the
/// segment ids in `table`.
///
/// Each object is one path. A path's runs are the connected components
/// of its correct edges; the path scores `Σ run² / length`, where `length`
/// excludes omitted edges. The overall score weights paths by length, which
/// reduces to `Σ run² / Σ length`.
pub fn score_erl(
    graph: &SkeletonGraph,
    anisotropy: Anisotropy,
    table: &[LabelId],
    mask_ids: &BTreeSet<LabelId>,
    cfg: &ScoreConfig,
) -> Result<ErlScore, Error> {
    if table.len() != graph.num_nodes() {
        return Err(Error::InconsistentGraph {
            table_len: table.len(),
            node_count: graph.num_nodes(),
        });
    }

    let merged_ids = merged_segments(graph, table, mask_ids, cfg);
    let edges = classify_edges(graph, table, mask_ids, &merged_ids);
    let lengths: Vec<f64> = (0..graph.num_edges())
        .map(|e| graph.edge_length(e, anisotropy))
        .collect();

    let mut runs = RunSets::new(graph.num_nodes());
    let paths: Vec<PathScore> = graph
        .objects()
        .iter()
        .map(|span| score_path(graph, span, &edges, &lengths, &mut runs))
        .collect();

    let total_length: f64 = paths.iter().map(|p| p.length).sum();
    let squared: f64 = paths.iter().flat_map(|p| &p.runs).map(|r| r * r).sum();
    let ceiling: f64 = paths.iter().map(|p| p.length * p.length).sum();
    let (erl, max_erl) = if total_length > 0.0 {
        (squared / total_length, ceiling / total_length)
    } else {
        warn!(
            edges = graph.num_edges(),
            "skeleton graph has no scorable length"
        );
        (0.0, 0.0)
    };

    let count = |class: EdgeClass| edges.iter().filter(|&&c| c == class).count();
    let score = ErlScore {
        erl,
        max_erl,
        total_length,
        merge_threshold: cfg.merge_threshold,
        correct: count(EdgeClass::Correct),
        split: count(EdgeClass::Split),
        merged: count(EdgeClass::Merged),
        omitted: count(EdgeClass::Omitted),
        paths,
        edges,
        merged_segments: merged_ids,
    };

    info!(
        erl = score.erl,
        max_erl = score.max_erl,
        split = score.split,
        merged = score.merged,
        omitted = score.omitted,
        "scored skeleton graph"
    );
    Ok(score)
}

fn score_path(
    graph: &SkeletonGraph,
    span: &ObjectSpan,
    classes: &[EdgeClass],
    lengths: &[f64],
    runs: &mut RunSets,
) -> PathScore {
    let edge_ids = span.edges.clone();
    let mut length = 0.0;
    let mut correct_length = 0.0;

    for e in edge_ids.clone() {
        if classes[e] == EdgeClass::Omitted {
            continue;
        }
        length += lengths[e];
        if classes[e] == EdgeClass::Correct {
            correct_length += lengths[e];
            let [a, b] = graph.edges()[e];
            runs.union(a, b);
        }
    }

    // Run length accumulates at the root of each component.
    let mut totals = vec![0.0; span.nodes.len()];
    for e in edge_ids {
        if classes[e] == EdgeClass::Correct {
            let [a, _] = graph.edges()[e];
            totals[runs.find(a) - span.nodes.start] += lengths[e];
        }
    }
    let mut path_runs: Vec<f64> = totals.into_iter().filter(|&l| l > 0.0).collect();
    path_runs.sort_by(|a, b| b.total_cmp(a));

    let erl = if length > 0.0 {
        path_runs.iter().map(|r| r * r).sum::<f64>() / length
    } else {
        0.0
    };

    debug!(
        object = span.object,
        length,
        runs = path_runs.len(),
        erl,
        "scored path"
    );
    PathScore {
        object: span.object,
        length,
        correct_length,
        erl,
        runs: path_runs,
    }
}

/// Union-find over graph nodes. Edges never cross objects, so every root
/// stays inside its object's node range.
struct RunSets {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl RunSets {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while x != root {
            let next = self.parent[x];
            self.parent[x] = root;
            x = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            core::cmp::Ordering::Less => self.parent[ra] = rb,
            core::cmp::Ordering::Greater => self.parent[rb] = ra,
            core::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use erl_core::{Anisotropy, LabelVolume, Shape3, Voxel};
    use erl_skel::{ObjectSkeleton, SkeletonGraph, SkeletonSet};

    use super::score_erl;
    use crate::{EdgeClass, ScoreConfig};

    fn line(z0: usize, len: usize, y: usize, x: usize) -> ObjectSkeleton {
        ObjectSkeleton {
            vertices: (0..len).map(|i| Voxel::new(z0 + i, y, x)).collect(),
            edges: (1..len).map(|i| [i - 1, i]).collect(),
            radii: Vec::new(),
        }
    }

    fn graph(objects: impl IntoIterator<Item = (u64, ObjectSkeleton)>) -> SkeletonGraph {
        SkeletonGraph::assemble(objects.into_iter().collect::<SkeletonSet>())
            .expect("valid skeletons")
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn split_at_block_boundary() {
        let vol = LabelVolume::from_fn(Shape3::new(11, 10, 10), |v| if v.z < 5 { 1 } else { 2 });
        let g = graph([(1, line(0, 11, 5, 5))]);
        let table: Vec<u64> = g
            .node_voxels()
            .into_iter()
            .map(|v| vol.get(v).expect("node inside volume"))
            .collect();

        let score = score_erl(
            &g,
            Anisotropy::ISOTROPIC,
            &table,
            &BTreeSet::new(),
            &ScoreConfig::default(),
        )
        .expect("consistent graph");

        assert_eq!(score.split, 1);
        assert_eq!(score.edges[4], EdgeClass::Split);
        assert_eq!(g.edges()[4], [4, 5]);
        assert!(approx(score.total_length, 10.0));
        assert_eq!(score.paths[0].runs, [5.0, 4.0]);
        assert!(approx(score.paths[0].erl, 4.1));
        assert!(score.paths[0].erl < score.paths[0].length);
        assert!(approx(score.max_erl, 10.0));
    }

    #[test]
    fn merged_objects_score_zero() {
        let g = graph([(1, line(0, 4, 0, 0)), (2, line(0, 4, 0, 5))]);
        let table = vec![7u64; g.num_nodes()];
        let none = BTreeSet::new();

        let strict = score_erl(&g, Anisotropy::ISOTROPIC, &table, &none, &ScoreConfig::default())
            .expect("consistent graph");
        assert_eq!(strict.merged, 6);
        assert_eq!(strict.merged_segments, BTreeSet::from([7]));
        assert_eq!(strict.erl, 0.0);

        let lenient = score_erl(
            &g,
            Anisotropy::ISOTROPIC,
            &table,
            &none,
            &ScoreConfig { merge_threshold: 1 },
        )
        .expect("consistent graph");
        assert_eq!(lenient.correct, 6);
        assert!(approx(lenient.erl, 3.0));
    }

    #[test]
    fn one_long_run_beats_many_short_runs() {
        let unbroken = graph([(1, line(0, 101, 0, 0))]);
        let whole = vec![1u64; 101];
        // Five 20-unit runs separated by four split edges.
        let broken = graph([(1, line(0, 105, 0, 0))]);
        let pieces: Vec<u64> = (0..105).map(|i| (i / 21) as u64 + 1).collect();
        let none = BTreeSet::new();
        let cfg = ScoreConfig::default();

        let long = score_erl(&unbroken, Anisotropy::ISOTROPIC, &whole, &none, &cfg)
            .expect("consistent graph");
        let short = score_erl(&broken, Anisotropy::ISOTROPIC, &pieces, &none, &cfg)
            .expect("consistent graph");

        assert!(approx(long.erl, 100.0));
        assert_eq!(short.split, 4);
        assert_eq!(short.paths[0].runs, [20.0; 5]);
        assert!(approx(short.erl, 2000.0 / 104.0));
        assert!(long.erl > short.erl);
    }

    #[test]
    fn masked_edges_do_not_count() {
        let g = graph([(1, line(0, 5, 0, 0))]);
        let table: [u64; 5] = [1, 1, 1, 9, 9];
        let mask = BTreeSet::from([9]);

        let score = score_erl(&g, Anisotropy::ISOTROPIC, &table, &mask, &ScoreConfig::default())
            .expect("consistent graph");
        assert_eq!(score.omitted, 2);
        assert_eq!(score.correct, 2);
        assert!(approx(score.total_length, 2.0));
        assert!(approx(score.erl, 2.0));
    }

    #[test]
    fn no_mask_omits_nothing() {
        let g = graph([(1, line(0, 6, 0, 0)), (2, line(0, 3, 4, 4))]);
        let table: Vec<u64> = (0..g.num_nodes() as u64).map(|i| i % 3).collect();
        let score = score_erl(
            &g,
            Anisotropy::ISOTROPIC,
            &table,
            &BTreeSet::new(),
            &ScoreConfig::default(),
        )
        .expect("consistent graph");
        assert_eq!(score.omitted, 0);
        assert_eq!(
            score.correct + score.split + score.merged,
            score.num_edges()
        );
    }

    #[test]
    fn anisotropy_scales_lengths() {
        let g = graph([(1, line(0, 3, 0, 0))]);
        let a = Anisotropy::new(40.0, 4.0, 4.0).expect("valid anisotropy");
        let score = score_erl(&g, a, &[3, 3, 3], &BTreeSet::new(), &ScoreConfig::default())
            .expect("consistent graph");
        assert!(approx(score.total_length, 80.0));
        assert!(approx(score.erl, 80.0));
        assert!(approx(score.ratio(), 1.0));
    }

    #[test]
    fn branching_runs_are_components() {
        // A star: centre 0 with three 1-unit arms, arm 3 split off.
        let star = ObjectSkeleton {
            vertices: vec![
                Voxel::new(1, 1, 1),
                Voxel::new(0, 1, 1),
                Voxel::new(1, 0, 1),
                Voxel::new(1, 1, 0),
            ],
            edges: vec![[0, 1], [0, 2], [0, 3]],
            radii: Vec::new(),
        };
        let g = graph([(1, star)]);
        let score = score_erl(
            &g,
            Anisotropy::ISOTROPIC,
            &[1, 1, 1, 2],
            &BTreeSet::new(),
            &ScoreConfig::default(),
        )
        .expect("consistent graph");
        assert_eq!(score.paths[0].runs, [2.0]);
        assert!(approx(score.erl, 4.0 / 3.0));
    }

    #[test]
    fn table_length_must_match_graph() {
        let g = graph([(1, line(0, 3, 0, 0))]);
        let err = score_erl(
            &g,
            Anisotropy::ISOTROPIC,
            &[1, 1],
            &BTreeSet::new(),
            &ScoreConfig::default(),
        )
        .expect_err("short table");
        assert!(matches!(err, erl_core::Error::InconsistentGraph {
            table_len: 2,
            node_count: 3
        }));
    }

    #[test]
    fn empty_graph_scores_zero() {
        let g = SkeletonGraph::default();
        let score = score_erl(
            &g,
            Anisotropy::ISOTROPIC,
            &[],
            &BTreeSet::new(),
            &ScoreConfig::default(),
        )
        .expect("empty graph");
        assert_eq!(score.erl, 0.0);
        assert_eq!(score.ratio(), 0.0);
    }
}
