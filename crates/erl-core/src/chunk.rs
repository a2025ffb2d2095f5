use core::ops::Range;

use crate::Error;

/// Z-range of chunk `index` when `depth` planes are split into `count` slabs.
///
/// Every chunk holds `depth / count` planes except the last, which also takes
/// the remainder. When `count > depth` all but the last chunk are empty.
pub fn chunk_range(depth: usize, index: usize, count: usize) -> Result<Range<usize>, Error> {
    if count == 0 || index >= count {
        return Err(Error::InvalidChunkCount { index, count });
    }

    let size = depth / count;
    let start = index * size;
    let end = if index + 1 == count {
        depth
    } else {
        start + size
    };
    Ok(start..end)
}

/// All chunk ranges in order; they tile `0..depth` exactly.
pub fn chunk_ranges(depth: usize, count: usize) -> Result<Vec<Range<usize>>, Error> {
    (0..count.max(1))
        .map(|i| chunk_range(depth, i, count))
        .collect()
}

/// Chunk that owns plane `z`. Requires `count > 0`.
pub fn chunk_index_of(z: usize, depth: usize, count: usize) -> usize {
    debug_assert!(count > 0);
    let size = depth / count;
    if size == 0 {
        return count - 1;
    }
    (z / size).min(count - 1)
}

#[cfg(test)]
mod tests {
    use super::{chunk_index_of, chunk_range, chunk_ranges};

    fn assert_tiles(depth: usize, count: usize) {
        let ranges = chunk_ranges(depth, count).expect("valid chunking");
        assert_eq!(ranges.len(), count);
        assert_eq!(ranges[0].start, 0);
        assert_eq!(ranges[count - 1].end, depth);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "chunks must be contiguous");
        }
        for (i, r) in ranges.iter().enumerate() {
            for z in r.clone() {
                assert_eq!(chunk_index_of(z, depth, count), i, "z={z} depth={depth} count={count}");
            }
        }
    }

    #[test]
    fn remainder_goes_to_last_chunk() {
        assert_eq!(chunk_range(10, 0, 3).expect("chunk"), 0..3);
        assert_eq!(chunk_range(10, 1, 3).expect("chunk"), 3..6);
        assert_eq!(chunk_range(10, 2, 3).expect("chunk"), 6..10);
    }

    #[test]
    fn ranges_tile_extent() {
        for depth in [1, 2, 7, 10, 33] {
            for count in [1, 2, 3, 5, depth, depth + 3] {
                assert_tiles(depth, count);
            }
        }
    }

    #[test]
    fn more_chunks_than_planes() {
        let ranges = chunk_ranges(3, 5).expect("valid chunking");
        assert!(ranges[..4].iter().all(|r| r.is_empty()));
        assert_eq!(ranges[4], 0..3);
    }

    #[test]
    fn invalid_chunking_is_rejected() {
        assert!(chunk_range(10, 0, 0).is_err());
        assert!(chunk_range(10, 3, 3).is_err());
        assert!(chunk_ranges(10, 0).is_err());
    }
}
