//! The shared maximum slot and its synchronization strategies.
//!
//! The slot is the single concurrently-mutated resource in the harness: one
//! scalar that every aggregation worker tries to raise to its chunk's local
//! maximum. The synchronization strategy is fixed when the slot is built, so
//! no call site branches on it:
//!
//! - [`SyncStrategy::Locked`] runs the read-compare-write as one critical
//!   section. The final value is `max` of all submitted values regardless of
//!   interleaving.
//! - [`SyncStrategy::Unsynchronized`] runs the same three steps with no
//!   exclusion. Two callers interleaving between the read and the write can
//!   lose an update, leaving the slot strictly below the true maximum. That
//!   failure mode is the point of the mode; nothing here papers over it.
//!
//! [`ThreadSlot`] is the in-process slot shared by reference between threads.
//! The cross-process counterpart lives in [`crate::segment`].

use crate::lock_util::recover;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

/// Initial slot value: lower than any input, so the first real update always
/// wins. Also the local maximum reported for an empty chunk.
pub const FLOOR: i64 = i64::MIN;

/// Policy governing how the slot's read-compare-write executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// Mutual exclusion around the whole update.
    Locked,
    /// No protection; lost updates are possible and intentional.
    Unsynchronized,
}

/// A shared maximum accumulator.
///
/// `update` submits one chunk's local maximum; `current` reads the slot after
/// the workers have been joined. Implemented by [`ThreadSlot`] for the
/// threaded substrate and by [`crate::segment::SegmentSlot`] for the
/// process-isolated one.
pub trait MaxAccumulator {
    /// Raises the slot to `local_max` if it is greater, subject to the slot's
    /// synchronization strategy.
    fn update(&self, local_max: i64);

    /// Returns the slot's current value.
    fn current(&self) -> i64;
}

/// In-process shared maximum slot.
///
/// One atomic cell holds the value in both modes, so switching strategies
/// never moves the contended memory location. The mutex only provides
/// exclusion; the value itself always lives in `value`.
#[derive(Debug)]
pub struct ThreadSlot {
    value: AtomicI64,
    lock: Mutex<()>,
    strategy: SyncStrategy,
}

impl ThreadSlot {
    /// Creates a slot initialized to [`FLOOR`] with the given strategy.
    #[must_use]
    pub fn new(strategy: SyncStrategy) -> Self {
        Self {
            value: AtomicI64::new(FLOOR),
            lock: Mutex::new(()),
            strategy,
        }
    }
}

impl MaxAccumulator for ThreadSlot {
    fn update(&self, local_max: i64) {
        match self.strategy {
            SyncStrategy::Locked => {
                let _guard = recover(self.lock.lock());
                let current = self.value.load(Ordering::Relaxed);
                if local_max > current {
                    self.value.store(local_max, Ordering::Relaxed);
                }
            }
            SyncStrategy::Unsynchronized => {
                let current = self.value.load(Ordering::Relaxed);
                if local_max > current {
                    // Deliberate scheduling point between the stale read and
                    // the write. The bare gap is a handful of instructions and
                    // the lost update would almost never surface; yielding
                    // keeps the hazard observable under contention.
                    std::thread::yield_now();
                    self.value.store(local_max, Ordering::Relaxed);
                }
            }
        }
    }

    fn current(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }
}
