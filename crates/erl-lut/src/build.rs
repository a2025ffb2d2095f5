use std::collections::BTreeSet;

use erl_core::{
    BACKGROUND, Error, LabelId, Shape3, VolumeSource, VolumeView, Voxel, chunk_index_of,
    chunk_range,
};
use rayon::prelude::*;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupConfig {
    /// Number of z-slabs the volume is read in. `1` reads it whole.
    pub chunk_count: usize,
    /// Worker threads for chunk processing. `1` is sequential, `0` uses all
    /// available cores.
    pub workers: usize,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            chunk_count: 1,
            workers: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentLookup {
    /// Segment id under each node, indexed like the input positions.
    pub table: Vec<LabelId>,
    /// Ids seen under the mask that also occur in `table`.
    pub mask_ids: BTreeSet<LabelId>,
}

impl SegmentLookup {
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn get(&self, node: usize) -> Option<LabelId> {
        self.table.get(node).copied()
    }

    /// Distinct segment ids referenced by the table.
    pub fn segment_ids(&self) -> BTreeSet<LabelId> {
        self.table.iter().copied().collect()
    }
}

struct ChunkOutput {
    resolved: Vec<(usize, LabelId)>,
    mask_ids: BTreeSet<LabelId>,
}

/// Resolves the segment id under every node of `nodes`.
///
/// With `chunk_count == 1` and a resident volume the table is filled by
/// direct indexing. Otherwise nodes are bucketed by the z-slab that owns
/// them and each slab is read once; buckets are disjoint, so every table
/// entry is written by exactly one chunk.
///
/// All nodes are validated against the volume before any data is read. A
/// failed slab read aborts the whole build.
pub fn build_lookup(
    volume: &dyn VolumeSource,
    nodes: &[Voxel],
    mask: Option<&dyn VolumeSource>,
    cfg: &LookupConfig,
) -> Result<SegmentLookup, Error> {
    let shape = volume.shape();
    if cfg.chunk_count == 0 {
        return Err(Error::InvalidChunkCount { index: 0, count: 0 });
    }
    if let Some(mask) = mask
        && mask.shape() != shape
    {
        return Err(Error::ShapeMismatch {
            expected: shape,
            actual: mask.shape(),
        });
    }
    validate_nodes(nodes, shape)?;

    let mut table = vec![BACKGROUND; nodes.len()];
    let mut mask_ids = BTreeSet::new();

    match volume.resident() {
        Some(view) if cfg.chunk_count == 1 => {
            for (i, (slot, &v)) in table.iter_mut().zip(nodes).enumerate() {
                *slot = resolve(view, i, v, v)?;
            }
            if let Some(mask) = mask {
                let mask_slab = mask.read_slab(0..shape.depth)?;
                collect_mask_ids(view, mask_slab.view(), &mut mask_ids)?;
            }
        }
        _ => {
            let buckets = bucket_nodes(nodes, shape.depth, cfg.chunk_count);
            for out in run_chunks(volume, mask, nodes, &buckets, cfg)? {
                for (i, id) in out.resolved {
                    table[i] = id;
                }
                mask_ids.extend(out.mask_ids);
            }
        }
    }

    if !mask_ids.is_empty() {
        let used: BTreeSet<LabelId> = table.iter().copied().collect();
        mask_ids.retain(|id| used.contains(id));
    }

    info!(
        nodes = nodes.len(),
        chunks = cfg.chunk_count,
        mask_ids = mask_ids.len(),
        "built segment lookup"
    );
    Ok(SegmentLookup { table, mask_ids })
}

fn validate_nodes(nodes: &[Voxel], shape: Shape3) -> Result<(), Error> {
    match nodes.iter().position(|&v| !shape.contains(v)) {
        Some(index) => Err(Error::NodeOutOfBounds {
            index,
            voxel: nodes[index],
            shape,
        }),
        None => Ok(()),
    }
}

fn bucket_nodes(nodes: &[Voxel], depth: usize, count: usize) -> Vec<Vec<usize>> {
    let mut buckets = vec![Vec::new(); count];
    for (i, v) in nodes.iter().enumerate() {
        buckets[chunk_index_of(v.z, depth, count)].push(i);
    }
    buckets
}

fn run_chunks(
    volume: &dyn VolumeSource,
    mask: Option<&dyn VolumeSource>,
    nodes: &[Voxel],
    buckets: &[Vec<usize>],
    cfg: &LookupConfig,
) -> Result<Vec<ChunkOutput>, Error> {
    let process = |index: usize| {
        process_chunk(volume, mask, nodes, &buckets[index], index, cfg.chunk_count)
    };

    if cfg.workers == 1 || cfg.chunk_count == 1 {
        return (0..cfg.chunk_count).map(process).collect();
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cfg.workers)
        .build()
        .map_err(|e| Error::ThreadPool(e.to_string()))?;
    pool.install(|| (0..cfg.chunk_count).into_par_iter().map(process).collect())
}

fn process_chunk(
    volume: &dyn VolumeSource,
    mask: Option<&dyn VolumeSource>,
    nodes: &[Voxel],
    members: &[usize],
    index: usize,
    count: usize,
) -> Result<ChunkOutput, Error> {
    let z = chunk_range(volume.shape().depth, index, count)?;
    let mut out = ChunkOutput {
        resolved: Vec::with_capacity(members.len()),
        mask_ids: BTreeSet::new(),
    };

    if z.is_empty() || (members.is_empty() && mask.is_none()) {
        return Ok(out);
    }

    let slab = volume.read_slab(z.clone())?;
    let view = slab.view();
    for &i in members {
        let v = nodes[i];
        let local = Voxel::new(v.z - z.start, v.y, v.x);
        out.resolved.push((i, resolve(view, i, local, v)?));
    }

    if let Some(mask) = mask {
        let mask_slab = mask.read_slab(z.clone())?;
        collect_mask_ids(view, mask_slab.view(), &mut out.mask_ids)?;
    }

    debug!(
        chunk = index,
        start = z.start,
        end = z.end,
        nodes = members.len(),
        mask_ids = out.mask_ids.len(),
        "resolved chunk"
    );
    Ok(out)
}

fn resolve(view: VolumeView<'_>, index: usize, local: Voxel, global: Voxel) -> Result<LabelId, Error> {
    view.get(local).ok_or(Error::NodeOutOfBounds {
        index,
        voxel: global,
        shape: view.shape(),
    })
}

fn collect_mask_ids(
    labels: VolumeView<'_>,
    mask: VolumeView<'_>,
    out: &mut BTreeSet<LabelId>,
) -> Result<(), Error> {
    if labels.shape() != mask.shape() {
        return Err(Error::ShapeMismatch {
            expected: labels.shape(),
            actual: mask.shape(),
        });
    }

    for (&id, &m) in labels.data().iter().zip(mask.data()) {
        if m > 0 {
            out.insert(id);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use core::ops::Range;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    use erl_core::{Error, LabelVolume, Shape3, Slab, VolumeSource, Voxel};

    use super::{LookupConfig, build_lookup};

    // Deterministic LCG for reproducible fixtures.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> u64 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            self.0 >> 33
        }

        fn below(&mut self, n: usize) -> usize {
            (self.next() % n as u64) as usize
        }
    }

    fn random_volume(shape: Shape3, labels: u64, seed: u64) -> LabelVolume {
        let mut rng = Lcg(seed);
        LabelVolume::from_fn(shape, |_| rng.next() % labels)
    }

    fn random_nodes(shape: Shape3, n: usize, seed: u64) -> Vec<Voxel> {
        let mut rng = Lcg(seed);
        (0..n)
            .map(|_| {
                Voxel::new(
                    rng.below(shape.depth),
                    rng.below(shape.height),
                    rng.below(shape.width),
                )
            })
            .collect()
    }

    /// Wraps a resident volume but hides residency and records slab reads.
    struct Streamed {
        inner: LabelVolume,
        reads: Mutex<Vec<Range<usize>>>,
        fail_at: Option<usize>,
    }

    impl Streamed {
        fn new(inner: LabelVolume) -> Self {
            Self {
                inner,
                reads: Mutex::new(Vec::new()),
                fail_at: None,
            }
        }
    }

    impl VolumeSource for Streamed {
        fn shape(&self) -> Shape3 {
            self.inner.shape()
        }

        fn read_slab(&self, z: Range<usize>) -> Result<Slab<'_>, Error> {
            if let Some(bad) = self.fail_at
                && z.contains(&bad)
            {
                return Err(Error::io(
                    format!("plane_{bad}.npy"),
                    std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated"),
                ));
            }
            self.reads.lock().expect("reads lock").push(z.clone());
            Ok(Slab::Owned(self.inner.slab(z)?.to_owned()))
        }
    }

    #[test]
    fn table_is_chunk_invariant() {
        let shape = Shape3::new(13, 7, 5);
        let vol = random_volume(shape, 9, 1);
        let mask = random_volume(shape, 3, 2);
        let nodes = random_nodes(shape, 300, 3);

        let reference = build_lookup(&vol, &nodes, Some(&mask), &LookupConfig::default())
            .expect("whole-volume lookup");
        for (i, v) in nodes.iter().enumerate() {
            assert_eq!(Some(reference.table[i]), vol.get(*v));
        }

        let streamed = Streamed::new(vol.clone());
        for chunk_count in [1, 2, 5, shape.depth, shape.depth + 4] {
            for workers in [1, 3] {
                let cfg = LookupConfig {
                    chunk_count,
                    workers,
                };
                let resident = build_lookup(&vol, &nodes, Some(&mask), &cfg).expect("resident");
                let chunked = build_lookup(&streamed, &nodes, Some(&mask), &cfg).expect("streamed");
                assert_eq!(resident, reference, "resident k={chunk_count} workers={workers}");
                assert_eq!(chunked, reference, "streamed k={chunk_count} workers={workers}");
            }
        }
    }

    #[test]
    fn chunked_reads_stay_within_slabs() {
        let shape = Shape3::new(10, 4, 4);
        let streamed = Streamed::new(random_volume(shape, 5, 7));
        let nodes = random_nodes(shape, 50, 8);

        let cfg = LookupConfig {
            chunk_count: 3,
            workers: 1,
        };
        build_lookup(&streamed, &nodes, None, &cfg).expect("lookup");

        let reads = streamed.reads.lock().expect("reads lock");
        assert!(reads.iter().all(|r| r.len() <= 4), "reads: {reads:?}");
        assert!(reads.len() <= 3);
    }

    #[test]
    fn mask_ids_are_restricted_to_table_ids() {
        let shape = Shape3::new(6, 6, 6);
        let vol = LabelVolume::from_fn(shape, |v| (v.z / 2 + 1) as u64 * 10 + (v.x % 2) as u64);
        let full_mask = LabelVolume::new_fill(shape, 1);
        // Only nodes in the top half, so ids from the bottom planes stay unused.
        let nodes: Vec<Voxel> = (0..3).map(|z| Voxel::new(z, 1, 0)).collect();

        for chunk_count in [1, 2, 6] {
            let cfg = LookupConfig {
                chunk_count,
                workers: 1,
            };
            let lut = build_lookup(&vol, &nodes, Some(&full_mask), &cfg).expect("lookup");
            assert_eq!(lut.table, vec![10, 10, 20]);
            assert!(lut.mask_ids.is_subset(&lut.segment_ids()));
            assert_eq!(lut.mask_ids, BTreeSet::from([10, 20]));
        }
    }

    #[test]
    fn mask_only_keeps_ids_under_nonzero_voxels() {
        let shape = Shape3::new(4, 2, 2);
        let vol = LabelVolume::from_fn(shape, |v| (v.z + 1) as u64);
        let mask = LabelVolume::from_fn(shape, |v| u64::from(v.z == 2));
        let nodes: Vec<Voxel> = (0..4).map(|z| Voxel::new(z, 0, 0)).collect();

        let cfg = LookupConfig {
            chunk_count: 2,
            workers: 1,
        };
        let lut = build_lookup(&vol, &nodes, Some(&mask), &cfg).expect("lookup");
        assert_eq!(lut.mask_ids, BTreeSet::from([3]));
    }

    #[test]
    fn no_mask_means_no_mask_ids() {
        let shape = Shape3::new(5, 3, 3);
        let vol = random_volume(shape, 4, 11);
        let nodes = random_nodes(shape, 20, 12);
        for chunk_count in [1, 5] {
            let cfg = LookupConfig {
                chunk_count,
                workers: 1,
            };
            let lut = build_lookup(&vol, &nodes, None, &cfg).expect("lookup");
            assert!(lut.mask_ids.is_empty());
            assert_eq!(lut.len(), nodes.len());
        }
    }

    #[test]
    fn out_of_bounds_node_is_rejected() {
        let shape = Shape3::new(10, 10, 10);
        let vol = LabelVolume::new_fill(shape, 1);
        let nodes = vec![Voxel::new(9, 9, 9), Voxel::new(10, 5, 5)];

        for chunk_count in [1, 3] {
            let cfg = LookupConfig {
                chunk_count,
                workers: 1,
            };
            let err = build_lookup(&vol, &nodes, None, &cfg).expect_err("node outside");
            assert!(matches!(err, Error::NodeOutOfBounds { index: 1, .. }), "{err}");
        }
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let shape = Shape3::new(4, 4, 4);
        let vol = LabelVolume::new_fill(shape, 1);
        let nodes = vec![Voxel::new(0, 0, 0)];

        let zero = LookupConfig {
            chunk_count: 0,
            workers: 1,
        };
        assert!(matches!(
            build_lookup(&vol, &nodes, None, &zero),
            Err(Error::InvalidChunkCount { .. })
        ));

        let small_mask = LabelVolume::new_fill(Shape3::new(4, 4, 3), 1);
        assert!(matches!(
            build_lookup(&vol, &nodes, Some(&small_mask), &LookupConfig::default()),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn failed_chunk_aborts_lookup() {
        let shape = Shape3::new(12, 3, 3);
        let mut streamed = Streamed::new(random_volume(shape, 4, 5));
        streamed.fail_at = Some(7);
        let mut nodes = random_nodes(shape, 40, 6);
        nodes.push(Voxel::new(7, 1, 1));

        for workers in [1, 4] {
            let cfg = LookupConfig {
                chunk_count: 4,
                workers,
            };
            let err = build_lookup(&streamed, &nodes, None, &cfg).expect_err("chunk 2 fails");
            assert!(err.is_io());
        }
    }

    #[test]
    fn empty_node_set() {
        let vol = LabelVolume::new_fill(Shape3::new(3, 3, 3), 2);
        let mask = LabelVolume::new_fill(Shape3::new(3, 3, 3), 1);
        let cfg = LookupConfig {
            chunk_count: 2,
            workers: 1,
        };
        let lut = build_lookup(&vol, &[], Some(&mask), &cfg).expect("lookup");
        assert!(lut.is_empty());
        assert!(lut.mask_ids.is_empty());
    }
}
