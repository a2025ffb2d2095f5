//! Segment lookup tables for skeleton nodes.
//!
//! [`build_lookup`] resolves the segment id under every node coordinate of a
//! skeleton, reading the label volume one z-slab at a time so that volumes
//! larger than memory can be evaluated. The resulting table is identical for
//! every chunk count and worker count.
//!
//! When a mask volume is supplied, the ids found under nonzero mask voxels
//! are collected as well and restricted to ids that some node resolved to.

mod build;

pub use build::{LookupConfig, SegmentLookup, build_lookup};
