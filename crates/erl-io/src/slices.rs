use core::ops::Range;
use std::fs;
use std::path::{Path, PathBuf};

use erl_core::{Error, LabelVolume, Shape3, Slab, VolumeSource, VolumeView};
use ndarray::Array2;
use tracing::debug;

use crate::npy::{read_header, read_plane, write_plane};

/// Label volume stored as one `.npy` file per z plane.
#[derive(Debug, Clone)]
pub struct SliceStack {
    dir: PathBuf,
    shape: Shape3,
    slices: Vec<PathBuf>,
}

impl SliceStack {
    /// Opens a stack and infers its shape from the slice count and the
    /// first slice header.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, Error> {
        let dir = dir.as_ref().to_path_buf();
        let slices = list_slices(&dir)?;

        let first = read_header(&slices[0])?;
        let &[height, width] = first.shape.as_slice() else {
            return Err(Error::Format(format!(
                "expected 2-D slices in {}, first slice has shape {:?}",
                dir.display(),
                first.shape
            )));
        };

        let shape = Shape3::new(slices.len(), height, width);
        debug!(
            dir = %dir.display(),
            %shape,
            dtype = %first.descr,
            fortran_order = first.fortran_order,
            "opened slice stack"
        );

        Ok(Self { dir, shape, slices })
    }

    /// Opens a stack whose total shape is declared up front. The slice count
    /// and first-slice dimensions must agree with the declaration; remaining
    /// slices are checked as they are read.
    pub fn open_with_shape(dir: impl AsRef<Path>, shape: Shape3) -> Result<Self, Error> {
        let dir = dir.as_ref().to_path_buf();
        let slices = list_slices(&dir)?;

        if slices.len() != shape.depth {
            return Err(Error::CorruptVolume {
                path: dir,
                detail: format!(
                    "declared depth {} but found {} slices",
                    shape.depth,
                    slices.len()
                ),
            });
        }

        let first = read_header(&slices[0])?;
        if first.shape != [shape.height, shape.width] {
            return Err(Error::CorruptVolume {
                path: slices[0].clone(),
                detail: format!(
                    "declared plane {}x{} but slice has shape {:?}",
                    shape.height, shape.width, first.shape
                ),
            });
        }

        debug!(dir = %dir.display(), %shape, "opened slice stack with declared shape");
        Ok(Self { dir, shape, slices })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn slices(&self) -> &[PathBuf] {
        &self.slices
    }
}

impl VolumeSource for SliceStack {
    fn shape(&self) -> Shape3 {
        self.shape
    }

    fn read_slab(&self, z: Range<usize>) -> Result<Slab<'_>, Error> {
        if z.start > z.end || z.end > self.shape.depth {
            return Err(Error::Format(format!(
                "slab {}..{} outside depth {}",
                z.start, z.end, self.shape.depth
            )));
        }

        let plane_len = self.shape.plane_len().ok_or(Error::SizeMismatch {
            expected: usize::MAX,
            actual: 0,
        })?;
        let mut data = Vec::with_capacity(plane_len * (z.end - z.start));

        for path in &self.slices[z.clone()] {
            let (dims, labels) = read_plane(path)?;
            if dims != (self.shape.height, self.shape.width) {
                return Err(Error::CorruptVolume {
                    path: path.clone(),
                    detail: format!(
                        "slice is {}x{}, stack planes are {}x{}",
                        dims.0, dims.1, self.shape.height, self.shape.width
                    ),
                });
            }
            data.extend_from_slice(&labels);
        }

        debug!(dir = %self.dir.display(), start = z.start, end = z.end, "read slab");
        let slab = LabelVolume::from_vec(self.shape.with_depth(z.end - z.start), data)?;
        Ok(Slab::Owned(slab))
    }
}

fn list_slices(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;

    let mut slices = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        let is_npy = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("npy"));
        if is_npy && path.is_file() {
            slices.push(path);
        }
    }

    if slices.is_empty() {
        return Err(Error::Format(format!(
            "no .npy slices in {}",
            dir.display()
        )));
    }

    slices.sort();
    Ok(slices)
}

/// Writes `volume` as a slice stack: `slice_00000.npy`, `slice_00001.npy`, ...
///
/// The directory is created if needed. Planes are written as little-endian
/// `u64`.
pub fn write_slices(dir: impl AsRef<Path>, volume: VolumeView<'_>) -> Result<Vec<PathBuf>, Error> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

    let shape = volume.shape();
    let digits = shape.depth.to_string().len().max(5);
    let mut written = Vec::with_capacity(shape.depth);

    for z in 0..shape.depth {
        let plane = Array2::from_shape_vec((shape.height, shape.width), volume.plane(z).to_vec())
            .map_err(|e| Error::Format(format!("plane {z}: {e}")))?;
        let path = dir.join(format!("slice_{z:0digits$}.npy"));
        write_plane(&path, plane)?;
        written.push(path);
    }

    debug!(dir = %dir.display(), %shape, "wrote slice stack");
    Ok(written)
}
