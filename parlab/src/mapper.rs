//! Per-chunk mapper work.
//!
//! Mappers are pure: they touch no shared state, which is what lets the same
//! functions run unmodified on either execution substrate. The sorting variant
//! returns a sorted copy of its chunk; the aggregation variant returns the
//! chunk's maximum, falling back to the slot floor for an empty chunk so the
//! result can never win a comparison against a real value.

use crate::slot;

/// Sorts a chunk ascending. Unstable sort; duplicate keys are valid input and
/// their relative order is not part of the contract.
#[must_use]
pub fn sort_chunk(mut chunk: Vec<i64>) -> Vec<i64> {
    chunk.sort_unstable();
    chunk
}

/// Returns the maximum value in a chunk, or [`slot::FLOOR`] when the chunk is
/// empty.
#[must_use]
pub fn local_max(chunk: &[i64]) -> i64 {
    chunk.iter().copied().max().unwrap_or(slot::FLOOR)
}
