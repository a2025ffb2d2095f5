//! Foundational types for skeleton-based segmentation evaluation.
//!
//! ## Volume Layout
//! Label volumes are dense, row-major `(z, y, x)` arrays of `u64` segment ids
//! with `z` as the slowest axis. Id `0` is background. A z-slab of a volume
//! is therefore a contiguous sub-slice, which is what makes chunked reads
//! cheap for resident volumes.
//!
//! ## Chunking
//! Volumes are chunked along `z` only. Chunk `i` of `n` covers
//! `[i * (depth / n), (i + 1) * (depth / n))`; the final chunk absorbs the
//! remainder and always ends at `depth`.
//!
//! ## Volume Sources
//! [`VolumeSource`] gives uniform slab access to a volume whatever its
//! backing. [`LabelVolume`] implements it by borrowing; file-backed sources
//! live in `erl-io`.

mod chunk;
mod error;
mod geom;
mod source;
mod volume;

pub use chunk::{chunk_index_of, chunk_range, chunk_ranges};
pub use error::{Error, Result};
pub use geom::{Anisotropy, Point3, Shape3, Voxel};
pub use source::{Slab, VolumeSource};
pub use volume::{LabelVolume, VolumeView};

/// Segment identity stored in a label volume.
pub type LabelId = u64;

/// Id reserved for unlabeled voxels.
pub const BACKGROUND: LabelId = 0;
