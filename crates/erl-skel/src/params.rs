use std::path::Path;

use erl_core::{Anisotropy, Error};
use serde::{Deserialize, Serialize};

/// TEASAR path-tracing parameters, forwarded verbatim to the skeletonizer.
/// Distances are in physical units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeasarParams {
    pub scale: f64,
    #[serde(rename = "const")]
    pub constant: f64,
    pub pdrf_scale: f64,
    pub pdrf_exponent: u32,
    pub soma_acceptance_threshold: f64,
    pub soma_detection_threshold: f64,
    pub soma_invalidation_const: f64,
    pub soma_invalidation_scale: f64,
    pub max_paths: Option<usize>,
}

impl Default for TeasarParams {
    fn default() -> Self {
        Self {
            scale: 1.5,
            constant: 300.0,
            pdrf_scale: 100_000.0,
            pdrf_exponent: 4,
            soma_acceptance_threshold: 3500.0,
            soma_detection_threshold: 750.0,
            soma_invalidation_const: 300.0,
            soma_invalidation_scale: 2.0,
            max_paths: Some(300),
        }
    }
}

/// Full parameter bundle for one skeletonization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkeletonizeParams {
    pub teasar: TeasarParams,
    /// Connected components with fewer voxels are discarded.
    pub dust_threshold: usize,
    pub anisotropy: Anisotropy,
    pub fix_branching: bool,
    pub fix_borders: bool,
    pub fill_holes: bool,
    pub fix_avocados: bool,
    pub progress: bool,
    /// `<= 0` all cores, `1` single process, `n` processes.
    pub parallel: i32,
    /// Skeletons processed between progress updates.
    pub parallel_chunk_size: usize,
}

impl Default for SkeletonizeParams {
    fn default() -> Self {
        Self {
            teasar: TeasarParams::default(),
            dust_threshold: 1000,
            anisotropy: Anisotropy::ISOTROPIC,
            fix_branching: true,
            fix_borders: true,
            fill_holes: true,
            fix_avocados: true,
            progress: false,
            parallel: 1,
            parallel_chunk_size: 100,
        }
    }
}

impl SkeletonizeParams {
    /// Reads parameters from a JSON file. Absent fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_slice(&data)
            .map_err(|e| Error::Format(format!("parsing {}: {e}", path.display())))
    }
}
