//! Run orchestration.
//!
//! The orchestrator wires the partitioner, the dispatched mappers, and the
//! appropriate reducer, times the map and reduce phases, and checks the final
//! result against a trusted sequential recomputation. The correctness check
//! always runs and is always reported — `is_correct == false` is a legitimate
//! outcome of the unsynchronized aggregation mode, not an error, and nothing
//! here suppresses or repairs it.
//!
//! Configuration errors fail before any dispatch; worker failures abort the
//! run and surface immediately. There are no retries: every workload is
//! deterministic given its input, so retrying is the caller's decision.

use crate::merge;
use crate::partition;
use crate::segment::{SegmentError, SegmentSlot};
use crate::slot::{MaxAccumulator, SyncStrategy, ThreadSlot};
use crate::substrate::{process, threaded, DispatchError, Substrate};
use std::time::{Duration, Instant};

/// Result of a sorting run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOutcome {
    /// The merged, globally sorted sequence.
    pub sorted: Vec<i64>,
    /// Time spent dispatching mappers and collecting their runs.
    pub map_time: Duration,
    /// Time spent in the k-way merge.
    pub reduce_time: Duration,
    /// Whether the result equals the sequentially sorted input.
    pub is_correct: bool,
}

/// Result of a max-aggregation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxOutcome {
    /// The final value of the shared slot.
    pub global_max: i64,
    /// Time spent dispatching workers and joining them. Accumulation happens
    /// inside the workers, so the update traffic is included here.
    pub map_time: Duration,
    /// Time spent reading the final slot value.
    pub reduce_time: Duration,
    /// Whether the slot ended at the true maximum. Expected (not guaranteed)
    /// to be false under contention in unsynchronized mode.
    pub is_correct: bool,
}

/// Errors surfaced by the run entry points.
#[derive(Debug)]
pub enum RunError {
    /// The worker count is not usable.
    InvalidConfiguration {
        /// The rejected worker count.
        workers: usize,
    },
    /// Dispatching workers or collecting results failed.
    Dispatch(DispatchError),
    /// The cross-process slot could not be set up.
    Slot(SegmentError),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidConfiguration { workers } => {
                write!(f, "invalid configuration: worker count {workers} (need at least 1)")
            }
            Self::Dispatch(e) => write!(f, "worker dispatch failed: {e}"),
            Self::Slot(e) => write!(f, "shared slot setup failed: {e}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidConfiguration { .. } => None,
            Self::Dispatch(e) => Some(e),
            Self::Slot(e) => Some(e),
        }
    }
}

impl From<DispatchError> for RunError {
    fn from(e: DispatchError) -> Self {
        Self::Dispatch(e)
    }
}

impl From<SegmentError> for RunError {
    fn from(e: SegmentError) -> Self {
        Self::Slot(e)
    }
}

/// Runs the sorting workload: partition, sort each chunk under the chosen
/// substrate, k-way merge the runs, and verify against a sequential sort.
///
/// # Errors
///
/// Returns [`RunError::InvalidConfiguration`] for a zero worker count (before
/// any dispatch) and propagates worker failures; a failed worker aborts the
/// run with no partial result.
pub fn run_sort(data: &[i64], workers: usize, substrate: Substrate) -> Result<SortOutcome, RunError> {
    if workers == 0 {
        return Err(RunError::InvalidConfiguration { workers });
    }
    let bounds = partition::chunk_bounds(data.len(), workers);

    let map_start = Instant::now();
    let runs = match substrate {
        Substrate::Threaded => threaded::sort_chunks(data, &bounds)?,
        Substrate::ProcessIsolated => process::sort_chunks(data, &bounds)?,
    };
    let map_time = map_start.elapsed();

    let reduce_start = Instant::now();
    let sorted = merge::merge_runs(&runs);
    let reduce_time = reduce_start.elapsed();

    let mut expected = data.to_vec();
    expected.sort_unstable();
    let is_correct = sorted == expected;

    Ok(SortOutcome {
        sorted,
        map_time,
        reduce_time,
        is_correct,
    })
}

/// Runs the max-aggregation workload: partition, fold each chunk's local
/// maximum into the shared slot under the chosen substrate and strategy, and
/// verify against a sequential maximum.
///
/// # Errors
///
/// Returns [`RunError::InvalidConfiguration`] for a zero worker count (before
/// any dispatch), [`RunError::Slot`] if the cross-process slot cannot be set
/// up, and propagates worker failures.
pub fn run_max(
    data: &[i64],
    workers: usize,
    substrate: Substrate,
    strategy: SyncStrategy,
) -> Result<MaxOutcome, RunError> {
    if workers == 0 {
        return Err(RunError::InvalidConfiguration { workers });
    }
    let bounds = partition::chunk_bounds(data.len(), workers);

    let (global_max, map_time, reduce_time) = match substrate {
        Substrate::Threaded => {
            let slot = ThreadSlot::new(strategy);
            let map_start = Instant::now();
            threaded::max_chunks(data, &bounds, &slot)?;
            let map_time = map_start.elapsed();

            let reduce_start = Instant::now();
            let global_max = slot.current();
            (global_max, map_time, reduce_start.elapsed())
        }
        Substrate::ProcessIsolated => {
            let slot = SegmentSlot::new(strategy)?;
            let map_start = Instant::now();
            process::max_chunks(data, &bounds, &slot)?;
            let map_time = map_start.elapsed();

            let reduce_start = Instant::now();
            let global_max = slot.current();
            (global_max, map_time, reduce_start.elapsed())
        }
    };

    let expected = crate::mapper::local_max(data);
    let is_correct = global_max == expected;

    Ok(MaxOutcome {
        global_max,
        map_time,
        reduce_time,
        is_correct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input;
    use crate::slot::FLOOR;

    const SUBSTRATES: [Substrate; 2] = [Substrate::Threaded, Substrate::ProcessIsolated];

    #[test]
    fn zero_workers_is_rejected_before_dispatch() {
        let data = input::generate(1, 64);
        for substrate in SUBSTRATES {
            assert!(matches!(
                run_sort(&data, 0, substrate),
                Err(RunError::InvalidConfiguration { workers: 0 })
            ));
            assert!(matches!(
                run_max(&data, 0, substrate, SyncStrategy::Locked),
                Err(RunError::InvalidConfiguration { workers: 0 })
            ));
        }
    }

    #[test]
    fn sort_matches_sequential_sort_on_both_substrates() {
        let data = input::generate(11, 2_000);
        let mut expected = data.clone();
        expected.sort_unstable();

        for substrate in SUBSTRATES {
            let outcome = run_sort(&data, 4, substrate).unwrap();
            assert!(outcome.is_correct, "sort incorrect under {substrate}");
            assert_eq!(outcome.sorted, expected);
        }
    }

    #[test]
    fn sort_with_more_workers_than_elements() {
        let data = vec![3, 1];
        for substrate in SUBSTRATES {
            let outcome = run_sort(&data, 8, substrate).unwrap();
            assert!(outcome.is_correct);
            assert_eq!(outcome.sorted, vec![1, 3]);
        }
    }

    #[test]
    fn empty_input_sorts_to_empty() {
        for substrate in SUBSTRATES {
            let outcome = run_sort(&[], 4, substrate).unwrap();
            assert!(outcome.is_correct);
            assert!(outcome.sorted.is_empty());
        }
    }

    #[test]
    fn empty_input_max_is_floor() {
        for substrate in SUBSTRATES {
            let outcome = run_max(&[], 4, substrate, SyncStrategy::Locked).unwrap();
            assert!(outcome.is_correct);
            assert_eq!(outcome.global_max, FLOOR);
        }
    }

    #[test]
    fn locked_max_is_sound_across_trials() {
        let data = input::generate(23, 4_096);
        let expected = data.iter().copied().max().unwrap();

        for substrate in SUBSTRATES {
            for _ in 0..100 {
                let outcome = run_max(&data, 8, substrate, SyncStrategy::Locked).unwrap();
                assert!(outcome.is_correct, "locked max lost under {substrate}");
                assert_eq!(outcome.global_max, expected);
            }
        }
    }

    #[test]
    fn single_worker_strategies_are_observationally_identical() {
        let data = input::generate(31, 512);
        for substrate in SUBSTRATES {
            let locked = run_max(&data, 1, substrate, SyncStrategy::Locked).unwrap();
            let racy = run_max(&data, 1, substrate, SyncStrategy::Unsynchronized).unwrap();
            assert!(locked.is_correct);
            assert!(racy.is_correct);
            assert_eq!(locked.global_max, racy.global_max);
        }
    }

    #[test]
    fn locked_runs_are_idempotent_on_fixed_input() {
        let data = input::generate(47, 1_024);

        let first = run_sort(&data, 4, Substrate::Threaded).unwrap();
        let second = run_sort(&data, 4, Substrate::Threaded).unwrap();
        assert_eq!(first.sorted, second.sorted);

        let first = run_max(&data, 4, Substrate::Threaded, SyncStrategy::Locked).unwrap();
        let second = run_max(&data, 4, Substrate::Threaded, SyncStrategy::Locked).unwrap();
        assert_eq!(first.global_max, second.global_max);
    }

    #[test]
    fn worker_panic_surfaces_as_failure() {
        // A chunk bound outside the data would be a partitioner bug; here we
        // drive the threaded substrate directly with a poisoned bound to
        // check that a dying worker aborts the run instead of dropping the
        // chunk silently.
        let data = vec![1, 2, 3];
        let bounds = vec![0..2, 2..5];
        let result = crate::substrate::threaded::sort_chunks(&data, &bounds);
        assert!(matches!(
            result,
            Err(DispatchError::WorkerPanic { worker: 1 })
        ));
    }
}
