use std::collections::{BTreeMap, BTreeSet};

use erl_core::LabelId;
use erl_skel::SkeletonGraph;
use serde::{Deserialize, Serialize};

/// Fate of one ground-truth skeleton edge in the evaluated segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeClass {
    /// Both endpoints lie in the same segment and that segment is not merged.
    Correct,
    /// Endpoints lie in different segments.
    Split,
    /// Both endpoints lie in one segment that also covers other objects.
    Merged,
    /// An endpoint lies in a masked segment; the edge does not count.
    Omitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreConfig {
    /// Ground-truth objects a segment may cover beyond the first before it
    /// counts as a merge.
    pub merge_threshold: usize,
}

/// Segment ids that cover more than `merge_threshold + 1` ground-truth
/// objects. Masked ids are never merged.
pub fn merged_segments(
    graph: &SkeletonGraph,
    table: &[LabelId],
    mask_ids: &BTreeSet<LabelId>,
    cfg: &ScoreConfig,
) -> BTreeSet<LabelId> {
    let mut objects: BTreeMap<LabelId, BTreeSet<LabelId>> = BTreeMap::new();
    for (node, &segment) in graph.nodes().iter().zip(table) {
        if mask_ids.contains(&segment) {
            continue;
        }
        objects.entry(segment).or_default().insert(node.object);
    }

    objects
        .into_iter()
        .filter(|(_, covered)| covered.len() - 1 > cfg.merge_threshold)
        .map(|(segment, _)| segment)
        .collect()
}

/// Classifies every edge of `graph`, indexed like `graph.edges()`.
///
/// `table` must hold one segment id per graph node.
pub fn classify_edges(
    graph: &SkeletonGraph,
    table: &[LabelId],
    mask_ids: &BTreeSet<LabelId>,
    merged: &BTreeSet<LabelId>,
) -> Vec<EdgeClass> {
    graph
        .edges()
        .iter()
        .map(|&[u, v]| {
            let (a, b) = (table[u], table[v]);
            if mask_ids.contains(&a) || mask_ids.contains(&b) {
                EdgeClass::Omitted
            } else if a != b {
                EdgeClass::Split
            } else if merged.contains(&a) {
                EdgeClass::Merged
            } else {
                EdgeClass::Correct
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use erl_core::Voxel;
    use erl_skel::{ObjectSkeleton, SkeletonGraph, SkeletonSet};

    use super::{EdgeClass, ScoreConfig, classify_edges, merged_segments};

    fn pair_graph() -> SkeletonGraph {
        let mut set = SkeletonSet::new();
        for (object, x) in [(1, 0), (2, 5), (3, 9)] {
            set.insert(object, ObjectSkeleton {
                vertices: vec![Voxel::new(0, 0, x), Voxel::new(1, 0, x)],
                edges: vec![[0, 1]],
                radii: Vec::new(),
            });
        }
        SkeletonGraph::assemble(set).expect("valid skeletons")
    }

    #[test]
    fn merge_threshold_counts_objects_beyond_the_first() {
        let g = pair_graph();
        // Segment 10 covers objects 1 and 2, segment 11 covers object 3.
        let table: [u64; 6] = [10, 10, 10, 10, 11, 11];
        let none = BTreeSet::new();

        let strict = merged_segments(&g, &table, &none, &ScoreConfig::default());
        assert_eq!(strict, BTreeSet::from([10]));

        let lenient = merged_segments(&g, &table, &none, &ScoreConfig { merge_threshold: 1 });
        assert!(lenient.is_empty());
    }

    #[test]
    fn classification_order() {
        let g = pair_graph();
        let table: [u64; 6] = [10, 10, 10, 10, 11, 12];
        let mask = BTreeSet::from([12]);
        let merged = merged_segments(&g, &table, &mask, &ScoreConfig::default());
        let classes = classify_edges(&g, &table, &mask, &merged);
        assert_eq!(classes, [
            EdgeClass::Merged,
            EdgeClass::Merged,
            EdgeClass::Omitted
        ]);

        let table: [u64; 6] = [10, 11, 12, 12, 13, 13];
        let merged = merged_segments(&g, &table, &BTreeSet::new(), &ScoreConfig::default());
        let classes = classify_edges(&g, &table, &BTreeSet::new(), &merged);
        assert_eq!(classes, [
            EdgeClass::Split,
            EdgeClass::Correct,
            EdgeClass::Correct
        ]);
    }

    #[test]
    fn masked_segments_are_never_merged() {
        let g = pair_graph();
        let table: [u64; 6] = [10; 6];
        let mask = BTreeSet::from([10]);
        assert!(merged_segments(&g, &table, &mask, &ScoreConfig::default()).is_empty());
    }

    #[test]
    fn wire_names_are_lowercase() {
        let json = serde_json::to_string(&[EdgeClass::Correct, EdgeClass::Omitted])
            .expect("serialize classes");
        assert_eq!(json, r#"["correct","omitted"]"#);
    }
}
