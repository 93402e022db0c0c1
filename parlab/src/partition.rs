//! Chunk partitioning of the input sequence.
//!
//! The partitioner splits an input of length N into `workers` contiguous,
//! disjoint ranges. Every range but the trailing ones holds `ceil(N / workers)`
//! elements; ranges are clipped at N, so when N < workers the tail ranges are
//! empty. Concatenating the ranges in index order always reconstructs `0..N`.

use std::ops::Range;

/// Computes the chunk boundaries for `len` elements split across `workers`
/// mapper workers.
///
/// The result always contains exactly `workers` ranges, in index order.
/// Deterministic given `(len, workers)`.
///
/// # Panics
///
/// Panics in debug builds if `workers` is zero. Callers validate the worker
/// count before partitioning (see [`crate::run`]).
#[must_use]
pub fn chunk_bounds(len: usize, workers: usize) -> Vec<Range<usize>> {
    debug_assert!(workers >= 1, "worker count must be at least 1");

    let per_chunk = len.div_ceil(workers);
    (0..workers)
        .map(|index| {
            let start = (index * per_chunk).min(len);
            let end = (start + per_chunk).min(len);
            start..end
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flattens chunk bounds back into the element indices they cover.
    fn covered(bounds: &[Range<usize>]) -> Vec<usize> {
        bounds.iter().flat_map(Clone::clone).collect()
    }

    #[test]
    fn even_split() {
        let bounds = chunk_bounds(8, 4);
        assert_eq!(bounds, vec![0..2, 2..4, 4..6, 6..8]);
    }

    #[test]
    fn remainder_lands_in_last_chunk() {
        let bounds = chunk_bounds(10, 4);
        // ceil(10 / 4) = 3, so the last chunk holds the single leftover.
        assert_eq!(bounds, vec![0..3, 3..6, 6..9, 9..10]);
    }

    #[test]
    fn more_workers_than_elements_leaves_empty_tail() {
        let bounds = chunk_bounds(2, 4);
        assert_eq!(bounds, vec![0..1, 1..2, 2..2, 2..2]);
    }

    #[test]
    fn empty_input_yields_all_empty_chunks() {
        let bounds = chunk_bounds(0, 3);
        assert_eq!(bounds.len(), 3);
        assert!(bounds.iter().all(Range::is_empty));
    }

    #[test]
    fn single_worker_takes_everything() {
        assert_eq!(chunk_bounds(17, 1), vec![0..17]);
    }

    #[test]
    fn chunks_are_disjoint_and_ordered() {
        let bounds = chunk_bounds(23, 5);
        for pair in bounds.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(covered(&bounds), (0..23).collect::<Vec<_>>());
    }
}
