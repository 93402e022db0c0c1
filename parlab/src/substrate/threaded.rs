//! Threaded execution substrate.
//!
//! One scoped thread per chunk, sharing the parent's address space. Sorted
//! runs come back over an index-tagged channel and are reassembled by tag;
//! aggregation workers update the shared slot directly. Workers are joined
//! before the reduce phase begins, and a panicked worker aborts the run.

use super::DispatchError;
use crate::mapper;
use crate::slot::MaxAccumulator;
use std::ops::Range;
use std::sync::{mpsc, Barrier};
use std::thread;

/// Sorts every chunk on its own thread and returns the runs in chunk order.
///
/// # Errors
///
/// Returns [`DispatchError::WorkerPanic`] if any worker panicked, or
/// [`DispatchError::MissingResult`] if a chunk produced no result message.
pub(crate) fn sort_chunks(
    data: &[i64],
    bounds: &[Range<usize>],
) -> Result<Vec<Vec<i64>>, DispatchError> {
    let (sender, receiver) = mpsc::channel();
    let mut panicked = None;

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(bounds.len());
        for (index, range) in bounds.iter().enumerate() {
            let sender = sender.clone();
            let range = range.clone();
            handles.push(scope.spawn(move || {
                let run = mapper::sort_chunk(data[range].to_vec());
                // The receiver outlives every sender; a send can only fail if
                // the parent already gave up on the run.
                let _ = sender.send((index, run));
            }));
        }
        drop(sender);

        for (index, handle) in handles.into_iter().enumerate() {
            if handle.join().is_err() && panicked.is_none() {
                panicked = Some(index);
            }
        }
    });

    if let Some(worker) = panicked {
        return Err(DispatchError::WorkerPanic { worker });
    }

    // All workers have been joined, so every message is already buffered.
    let mut runs: Vec<Option<Vec<i64>>> = (0..bounds.len()).map(|_| None).collect();
    for (index, run) in receiver.try_iter() {
        runs[index] = Some(run);
    }

    runs.into_iter()
        .enumerate()
        .map(|(worker, run)| run.ok_or(DispatchError::MissingResult { worker }))
        .collect()
}

/// Computes every chunk's local maximum on its own thread, folding each into
/// the shared slot.
///
/// # Errors
///
/// Returns [`DispatchError::WorkerPanic`] if any worker panicked.
pub(crate) fn max_chunks<A>(
    data: &[i64],
    bounds: &[Range<usize>],
    slot: &A,
) -> Result<(), DispatchError>
where
    A: MaxAccumulator + Sync,
{
    let mut panicked = None;
    // Release all workers together. Spawn stagger would otherwise serialize
    // the slot updates and the contention under study would never happen.
    let barrier = Barrier::new(bounds.len());

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(bounds.len());
        for range in bounds {
            let range = range.clone();
            let barrier = &barrier;
            handles.push(scope.spawn(move || {
                barrier.wait();
                slot.update(mapper::local_max(&data[range]));
            }));
        }

        for (index, handle) in handles.into_iter().enumerate() {
            if handle.join().is_err() && panicked.is_none() {
                panicked = Some(index);
            }
        }
    });

    match panicked {
        Some(worker) => Err(DispatchError::WorkerPanic { worker }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::chunk_bounds;
    use crate::slot::{SyncStrategy, ThreadSlot};

    #[test]
    fn sort_chunks_returns_runs_in_chunk_order() {
        let data = vec![9, 7, 8, 3, 1, 2, 6, 4];
        let bounds = chunk_bounds(data.len(), 2);
        let runs = sort_chunks(&data, &bounds).unwrap();
        assert_eq!(runs, vec![vec![3, 7, 8, 9], vec![1, 2, 4, 6]]);
    }

    #[test]
    fn sort_chunks_with_empty_tail_chunks() {
        let data = vec![5, 2];
        let bounds = chunk_bounds(data.len(), 4);
        let runs = sort_chunks(&data, &bounds).unwrap();
        assert_eq!(runs, vec![vec![5], vec![2], Vec::new(), Vec::new()]);
    }

    #[test]
    fn max_chunks_folds_into_slot() {
        let data = vec![3, 14, 1, 5, 9, 2, 6];
        let bounds = chunk_bounds(data.len(), 3);
        let slot = ThreadSlot::new(SyncStrategy::Locked);
        max_chunks(&data, &bounds, &slot).unwrap();
        assert_eq!(slot.current(), 14);
    }
}
