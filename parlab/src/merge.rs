//! K-way merge of sorted runs.
//!
//! The merge reducer maintains a min-priority frontier of one element per
//! non-exhausted run and repeatedly extracts the global minimum, advancing the
//! run it came from. O(N log W) for N total elements across W runs. Empty runs
//! are tolerated (the W > N case produces them routinely). Ties between runs
//! may be emitted in any order; stability is not part of the contract.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Merges W sorted runs into one sorted sequence.
///
/// Each input run must be internally sorted ascending; the runs' value ranges
/// may overlap arbitrarily.
#[must_use]
pub fn merge_runs(runs: &[Vec<i64>]) -> Vec<i64> {
    let total: usize = runs.iter().map(Vec::len).sum();
    let mut merged = Vec::with_capacity(total);

    // Frontier entries are (value, source run, position within run).
    let mut frontier = BinaryHeap::with_capacity(runs.len());
    for (source, run) in runs.iter().enumerate() {
        if let Some(&first) = run.first() {
            frontier.push(Reverse((first, source, 0_usize)));
        }
    }

    while let Some(Reverse((value, source, position))) = frontier.pop() {
        merged.push(value);
        let next = position + 1;
        if let Some(&value) = runs[source].get(next) {
            frontier.push(Reverse((value, source, next)));
        }
    }

    merged
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: merging sorted pieces of any input equals sorting the
        /// whole input.
        #[test]
        fn merge_equals_global_sort(
            values in proptest::collection::vec(-1_000_000..1_000_000_i64, 0..500),
            workers in 1..16_usize,
        ) {
            let bounds = crate::partition::chunk_bounds(values.len(), workers);
            let runs: Vec<Vec<i64>> = bounds
                .iter()
                .map(|range| {
                    let mut run = values[range.clone()].to_vec();
                    run.sort_unstable();
                    run
                })
                .collect();

            let mut expected = values;
            expected.sort_unstable();
            prop_assert_eq!(merge_runs(&runs), expected);
        }
    }
}
