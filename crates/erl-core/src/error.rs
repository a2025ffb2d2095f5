use std::path::PathBuf;

use thiserror::Error;

use crate::geom::{Shape3, Voxel};

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("volume at {} disagrees with its declared shape: {detail}", path.display())]
    CorruptVolume { path: PathBuf, detail: String },

    #[error("node {index} at {voxel} lies outside volume of shape {shape}")]
    NodeOutOfBounds {
        index: usize,
        voxel: Voxel,
        shape: Shape3,
    },

    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: Shape3, actual: Shape3 },

    #[error("size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("format error: {0}")]
    Format(String),

    #[error("invalid chunking: chunk {index} of {count}")]
    InvalidChunkCount { index: usize, count: usize },

    #[error("invalid anisotropy: {0}")]
    InvalidAnisotropy(String),

    #[error("inconsistent graph: lookup table has {table_len} entries, graph has {node_count} nodes")]
    InconsistentGraph { table_len: usize, node_count: usize },

    #[error("skeletonizer failed: {0}")]
    Skeletonizer(String),

    #[error("worker pool: {0}")]
    ThreadPool(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors caused by missing or unreadable volume data.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::CorruptVolume { .. })
    }

    /// True for coordinate and extent disagreements.
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(
            self,
            Self::NodeOutOfBounds { .. } | Self::ShapeMismatch { .. } | Self::SizeMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use crate::{Shape3, Voxel};

    #[test]
    fn display_names_offending_node() {
        let err = Error::NodeOutOfBounds {
            index: 7,
            voxel: Voxel::new(10, 2, 3),
            shape: Shape3::new(10, 10, 10),
        };
        assert_eq!(
            err.to_string(),
            "node 7 at (10, 2, 3) lies outside volume of shape 10x10x10"
        );
        assert!(err.is_shape_mismatch());
        assert!(!err.is_io());
    }

    #[test]
    fn io_classification() {
        let err = Error::io(
            "/missing",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.is_io());

        let corrupt = Error::CorruptVolume {
            path: "/vol".into(),
            detail: "slice 3 is 4x4".into(),
        };
        assert!(corrupt.is_io());
    }
}
