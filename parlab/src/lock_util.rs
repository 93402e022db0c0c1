//! Utility for handling lock poisoning on the shared maximum slot.
//!
//! The slot mutex is poisoned if a mapper worker panics while holding it. A
//! panicked worker already aborts the run as a worker failure, so recovering
//! the guard here only affects the error path: it lets the orchestrator read
//! the slot's last value for diagnostics instead of panicking a second time.

use std::sync::{MutexGuard, PoisonError};

/// Recovers from a poisoned slot mutex.
///
/// Emits a warning and continues with the inner guard. The value behind the
/// slot mutex is a single scalar, so a poisoned guard never exposes a
/// half-written state.
pub(crate) fn recover<'a, T>(
    result: Result<MutexGuard<'a, T>, PoisonError<MutexGuard<'a, T>>>,
) -> MutexGuard<'a, T> {
    result.unwrap_or_else(|poison| {
        libc_print::libc_eprintln!("[parlab] warning: recovering from poisoned slot lock");
        poison.into_inner()
    })
}
