//! Ground-truth skeleton graphs.
//!
//! Skeletonization itself is delegated to an external [`Skeletonizer`] that
//! returns one centerline graph per label id. [`SkeletonGraph::assemble`]
//! merges those per-object graphs into a single graph:
//! - node ids are renumbered into one contiguous range, objects in ascending
//!   label order;
//! - every node remembers the object it came from;
//! - edges never cross objects.
//!
//! Node positions are integer voxels; physical positions and edge lengths are
//! derived on demand from an [`erl_core::Anisotropy`].

mod build;
mod graph;
mod params;
mod skeletonizer;

pub use build::{ObjectSkeleton, SkeletonSet};
pub use graph::{EdgeId, NodeId, ObjectSpan, SkeletonGraph, SkeletonNode};
pub use params::{SkeletonizeParams, TeasarParams};
pub use skeletonizer::{
    CommandSkeletonizer, PrecomputedSkeletons, Skeletonizer, load_skeletons, skeletonize_graph,
};
