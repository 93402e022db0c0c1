//! Parlab: a parallel map-reduce laboratory.
//!
//! This crate is an experimental harness for studying map-reduce execution
//! under two concurrency substrates — shared-memory threads and isolated
//! forked processes — and two reduction algorithms: k-way merge of sorted
//! partitions, and monotonic maximum accumulation into a single shared slot.
//!
//! The interesting part is the synchronization contract on the shared slot.
//! Aggregation can run with the read-compare-write protected by mutual
//! exclusion ([`SyncStrategy::Locked`]) or deliberately unprotected
//! ([`SyncStrategy::Unsynchronized`]), which exposes a lost-update race. Every
//! run checks its result against a sequential recomputation and reports the
//! verdict, so the harness doubles as a correctness-verification tool for
//! concurrent accumulation: the locked mode must never lose an update, and
//! the unsynchronized mode is expected to lose some under contention.
//!
//! # Usage
//!
//! ```no_run
//! use parlab::{run_max, run_sort, Substrate, SyncStrategy};
//!
//! let data = parlab::input::generate(42, 131_072);
//!
//! let sort = run_sort(&data, 4, Substrate::ProcessIsolated)?;
//! assert!(sort.is_correct);
//!
//! let max = run_max(&data, 4, Substrate::Threaded, SyncStrategy::Unsynchronized)?;
//! println!("max {} correct: {}", max.global_max, max.is_correct);
//! # Ok::<(), parlab::RunError>(())
//! ```
//!
//! Worker failures are fatal to a run and surface as errors; an incorrect
//! result is not an error but data — see [`MaxOutcome::is_correct`].

pub mod input;
mod lock_util;
pub mod mapper;
pub mod merge;
pub mod partition;
pub mod run;
pub mod segment;
pub mod slot;
pub mod substrate;

pub use run::{run_max, run_sort, MaxOutcome, RunError, SortOutcome};
pub use slot::{MaxAccumulator, SyncStrategy, ThreadSlot, FLOOR};
pub use substrate::Substrate;
