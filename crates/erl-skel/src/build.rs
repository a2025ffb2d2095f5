use std::collections::BTreeMap;

use erl_core::{Error, LabelId, Voxel};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::graph::{ObjectSpan, SkeletonGraph, SkeletonNode};

/// Centerline graph of one object as returned by a skeletonizer. Edge
/// endpoints index into `vertices`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectSkeleton {
    pub vertices: Vec<Voxel>,
    pub edges: Vec<[usize; 2]>,
    #[serde(default)]
    pub radii: Vec<f32>,
}

/// Skeletonizer output keyed by label id.
pub type SkeletonSet = BTreeMap<LabelId, ObjectSkeleton>;

impl SkeletonGraph {
    /// Merges per-object skeletons into one graph.
    ///
    /// Objects are laid out in ascending label order; object-local vertex
    /// ids are offset into the global id space. Missing radii default to
    /// `0.0`. Self-loop edges are dropped.
    pub fn assemble(skeletons: SkeletonSet) -> Result<Self, Error> {
        let total_nodes = skeletons.values().map(|s| s.vertices.len()).sum();
        let total_edges = skeletons.values().map(|s| s.edges.len()).sum();

        let mut graph = SkeletonGraph {
            nodes: Vec::with_capacity(total_nodes),
            edges: Vec::with_capacity(total_edges),
            objects: Vec::with_capacity(skeletons.len()),
        };

        for (object, skel) in skeletons {
            validate_object(object, &skel)?;
            if skel.vertices.is_empty() {
                warn!(object, "skipping empty skeleton");
                continue;
            }

            let node_start = graph.nodes.len();
            let edge_start = graph.edges.len();

            for (i, &voxel) in skel.vertices.iter().enumerate() {
                graph.nodes.push(SkeletonNode {
                    voxel,
                    radius: skel.radii.get(i).copied().unwrap_or(0.0),
                    object,
                });
            }

            let mut loops = 0usize;
            for [a, b] in skel.edges {
                if a == b {
                    loops += 1;
                    continue;
                }
                graph.edges.push([node_start + a, node_start + b]);
            }
            if loops > 0 {
                debug!(object, loops, "dropped self-loop edges");
            }

            graph.objects.push(ObjectSpan {
                object,
                nodes: node_start..graph.nodes.len(),
                edges: edge_start..graph.edges.len(),
            });
        }

        debug!(
            objects = graph.objects.len(),
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "assembled skeleton graph"
        );
        Ok(graph)
    }
}

fn validate_object(object: LabelId, skel: &ObjectSkeleton) -> Result<(), Error> {
    let n = skel.vertices.len();
    if !skel.radii.is_empty() && skel.radii.len() != n {
        return Err(Error::Format(format!(
            "skeleton {object}: {} radii for {n} vertices",
            skel.radii.len()
        )));
    }

    if let Some(&[a, b]) = skel.edges.iter().find(|e| e[0] >= n || e[1] >= n) {
        return Err(Error::Format(format!(
            "skeleton {object}: edge ({a}, {b}) references a vertex beyond {n}"
        )));
    }
    Ok(())
}
