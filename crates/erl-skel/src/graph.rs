use core::ops::Range;

use erl_core::{Anisotropy, LabelId, Point3, Voxel};

pub type NodeId = usize;
pub type EdgeId = usize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkeletonNode {
    pub voxel: Voxel,
    pub radius: f32,
    pub object: LabelId,
}

/// Node and edge index ranges of one skeletonized object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSpan {
    pub object: LabelId,
    pub nodes: Range<NodeId>,
    pub edges: Range<EdgeId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkeletonGraph {
    pub(crate) nodes: Vec<SkeletonNode>,
    pub(crate) edges: Vec<[NodeId; 2]>,
    pub(crate) objects: Vec<ObjectSpan>,
}

impl SkeletonGraph {
    pub fn nodes(&self) -> &[SkeletonNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[[NodeId; 2]] {
        &self.edges
    }

    pub fn objects(&self) -> &[ObjectSpan] {
        &self.objects
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_objects(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Voxel coordinates of all nodes, in node-id order.
    pub fn node_voxels(&self) -> Vec<Voxel> {
        self.nodes.iter().map(|n| n.voxel).collect()
    }

    /// Physical node positions: voxel coordinates scaled by `anisotropy`.
    pub fn get_nodes_position(&self, anisotropy: Anisotropy) -> Vec<Point3> {
        self.nodes.iter().map(|n| anisotropy.apply(n.voxel)).collect()
    }

    pub fn edge_length(&self, edge: EdgeId, anisotropy: Anisotropy) -> f64 {
        let [a, b] = self.edges[edge];
        anisotropy
            .apply(self.nodes[a].voxel)
            .distance(anisotropy.apply(self.nodes[b].voxel))
    }

    /// Total physical length of all edges.
    pub fn total_length(&self, anisotropy: Anisotropy) -> f64 {
        (0..self.edges.len())
            .map(|e| self.edge_length(e, anisotropy))
            .sum()
    }

    pub fn object_edges(&self, span: &ObjectSpan) -> &[[NodeId; 2]] {
        &self.edges[span.edges.clone()]
    }
}
