//! File-backed volume sources.
//!
//! A [`SliceStack`] is a directory of 2-D `.npy` arrays, one per z plane,
//! ordered by file name. Only the planes of the requested slab are loaded,
//! so peak memory is bounded by the chunk size rather than the volume.
//!
//! Integer and boolean dtypes of any width and byte order are accepted and
//! widened to `u64` labels; negative values are rejected.

mod npy;
mod slices;

pub use slices::{SliceStack, write_slices};
