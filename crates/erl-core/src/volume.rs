use core::ops::Range;

use crate::{Error, LabelId, Shape3, Voxel};

/// Fully resident label volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVolume {
    shape: Shape3,
    data: Vec<LabelId>,
}

impl LabelVolume {
    pub fn from_vec(shape: Shape3, data: Vec<LabelId>) -> Result<Self, Error> {
        let expected = shape.checked_len().ok_or(Error::SizeMismatch {
            expected: usize::MAX,
            actual: data.len(),
        })?;

        if data.len() != expected {
            return Err(Error::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self { shape, data })
    }

    pub fn new_fill(shape: Shape3, value: LabelId) -> Self {
        let len = shape.checked_len().expect("volume size overflow");
        Self {
            shape,
            data: vec![value; len],
        }
    }

    /// Builds a volume by evaluating `f` at every voxel in `z, y, x` order.
    pub fn from_fn(shape: Shape3, mut f: impl FnMut(Voxel) -> LabelId) -> Self {
        let mut data = Vec::with_capacity(shape.checked_len().expect("volume size overflow"));
        for z in 0..shape.depth {
            for y in 0..shape.height {
                for x in 0..shape.width {
                    data.push(f(Voxel::new(z, y, x)));
                }
            }
        }
        Self { shape, data }
    }

    pub fn shape(&self) -> Shape3 {
        self.shape
    }

    pub fn data(&self) -> &[LabelId] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<LabelId> {
        self.data
    }

    pub fn get(&self, v: Voxel) -> Option<LabelId> {
        self.as_view().get(v)
    }

    pub fn as_view(&self) -> VolumeView<'_> {
        VolumeView {
            shape: self.shape,
            data: &self.data,
        }
    }

    /// Planes `z` of the volume, borrowed.
    pub fn slab(&self, z: Range<usize>) -> Result<VolumeView<'_>, Error> {
        self.as_view().slab(z)
    }
}

/// Borrowed, contiguous z-slab of a label volume.
///
/// Coordinates passed to a view are local: plane `0` is the first plane of
/// the slab.
#[derive(Debug, Clone, Copy)]
pub struct VolumeView<'a> {
    shape: Shape3,
    data: &'a [LabelId],
}

impl<'a> VolumeView<'a> {
    pub fn from_slice(shape: Shape3, data: &'a [LabelId]) -> Result<Self, Error> {
        let expected = shape.checked_len().ok_or(Error::SizeMismatch {
            expected: usize::MAX,
            actual: data.len(),
        })?;

        if data.len() != expected {
            return Err(Error::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> Shape3 {
        self.shape
    }

    pub fn data(&self) -> &'a [LabelId] {
        self.data
    }

    pub fn get(&self, v: Voxel) -> Option<LabelId> {
        if !self.shape.contains(v) {
            return None;
        }
        let idx = (v.z * self.shape.height + v.y) * self.shape.width + v.x;
        self.data.get(idx).copied()
    }

    pub fn plane(&self, z: usize) -> &'a [LabelId] {
        assert!(z < self.shape.depth, "plane index out of bounds");
        let len = self.shape.height * self.shape.width;
        &self.data[z * len..(z + 1) * len]
    }

    pub fn slab(&self, z: Range<usize>) -> Result<VolumeView<'a>, Error> {
        if z.start > z.end || z.end > self.shape.depth {
            return Err(Error::Format(format!(
                "slab {}..{} outside depth {}",
                z.start, z.end, self.shape.depth
            )));
        }

        let plane = self.shape.height * self.shape.width;
        Ok(VolumeView {
            shape: self.shape.with_depth(z.end - z.start),
            data: &self.data[z.start * plane..z.end * plane],
        })
    }

    pub fn to_owned(&self) -> LabelVolume {
        LabelVolume {
            shape: self.shape,
            data: self.data.to_vec(),
        }
    }
}
