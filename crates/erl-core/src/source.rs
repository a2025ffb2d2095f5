use core::ops::Range;

use crate::{Error, LabelVolume, Shape3, VolumeView, chunk_range};

/// A z-slab returned by a [`VolumeSource`]: borrowed from a resident volume
/// or freshly loaded from backing storage.
#[derive(Debug)]
pub enum Slab<'a> {
    Borrowed(VolumeView<'a>),
    Owned(LabelVolume),
}

impl Slab<'_> {
    pub fn view(&self) -> VolumeView<'_> {
        match self {
            Slab::Borrowed(v) => *v,
            Slab::Owned(v) => v.as_view(),
        }
    }

    pub fn shape(&self) -> Shape3 {
        self.view().shape()
    }

    pub fn into_owned(self) -> LabelVolume {
        match self {
            Slab::Borrowed(v) => v.to_owned(),
            Slab::Owned(v) => v,
        }
    }
}

/// Uniform slab access to a label volume.
pub trait VolumeSource: Send + Sync {
    fn shape(&self) -> Shape3;

    /// Reads planes `z` as one slab. Fails if the range exceeds the depth or
    /// the backing data cannot be read.
    fn read_slab(&self, z: Range<usize>) -> Result<Slab<'_>, Error>;

    /// The whole volume, when it is already in memory.
    fn resident(&self) -> Option<VolumeView<'_>> {
        None
    }

    fn read_chunk(&self, chunk_index: usize, chunk_count: usize) -> Result<Slab<'_>, Error> {
        let z = chunk_range(self.shape().depth, chunk_index, chunk_count)?;
        self.read_slab(z)
    }

    /// Loads the full volume into memory.
    fn read_all(&self) -> Result<LabelVolume, Error> {
        self.read_slab(0..self.shape().depth).map(Slab::into_owned)
    }
}

impl VolumeSource for LabelVolume {
    fn shape(&self) -> Shape3 {
        LabelVolume::shape(self)
    }

    fn read_slab(&self, z: Range<usize>) -> Result<Slab<'_>, Error> {
        self.slab(z).map(Slab::Borrowed)
    }

    fn resident(&self) -> Option<VolumeView<'_>> {
        Some(self.as_view())
    }
}
