//! Execution substrates: how mapper workers are dispatched.
//!
//! Both substrates satisfy the same capability: run W independent mapper
//! tasks, one per chunk, and make W index-tagged results available to the
//! reducer. [`Substrate::Threaded`] runs workers as scoped threads sharing the
//! parent's address space; [`Substrate::ProcessIsolated`] forks one child per
//! chunk, with sorted runs returned over per-child pipes and the aggregation
//! slot living in a shared memory segment (see [`crate::segment`]).
//!
//! A worker that panics or exits abnormally is fatal to the run. Missing
//! chunks would corrupt both reduction algorithms, so no partial-result
//! substitution is attempted.

pub(crate) mod process;
pub(crate) mod threaded;

use nix::sys::signal::Signal;

/// The concurrency mechanism used to run mapper workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Substrate {
    /// Lightweight workers sharing one address space, joined before reduce.
    Threaded,
    /// One forked process per chunk; isolated address spaces.
    ProcessIsolated,
}

impl std::fmt::Display for Substrate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Threaded => f.write_str("threaded"),
            Self::ProcessIsolated => f.write_str("process-isolated"),
        }
    }
}

/// Errors raised while dispatching workers or collecting their results.
#[derive(Debug)]
pub enum DispatchError {
    /// A result pipe could not be created.
    Pipe(nix::Error),
    /// A worker process could not be forked.
    Fork(nix::Error),
    /// Waiting for a worker process failed.
    Wait(nix::Error),
    /// Reading a worker's result message failed.
    Read {
        /// Index of the worker whose message could not be read.
        worker: usize,
        /// The underlying error.
        error: nix::Error,
    },
    /// A worker's result message ended early.
    TruncatedResult {
        /// Index of the worker whose message was cut short.
        worker: usize,
    },
    /// A result message carried a chunk index outside `0..workers`.
    BadTag {
        /// Index of the worker that sent the message.
        worker: usize,
        /// The out-of-range tag.
        tag: usize,
    },
    /// A result message claimed more elements than the chunk could hold.
    OversizedResult {
        /// Index of the worker that sent the message.
        worker: usize,
        /// The claimed element count.
        count: usize,
    },
    /// No result message arrived for a chunk.
    MissingResult {
        /// Index of the chunk with no result.
        worker: usize,
    },
    /// A worker thread panicked.
    WorkerPanic {
        /// Index of the worker that panicked.
        worker: usize,
    },
    /// A worker process exited with a nonzero status.
    WorkerExit {
        /// Index of the worker.
        worker: usize,
        /// The exit status.
        code: i32,
    },
    /// A worker process was killed by a signal.
    WorkerSignal {
        /// Index of the worker.
        worker: usize,
        /// The terminating signal.
        signal: Signal,
    },
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pipe(e) => write!(f, "failed to create result pipe: {e}"),
            Self::Fork(e) => write!(f, "failed to fork worker: {e}"),
            Self::Wait(e) => write!(f, "failed to wait for worker: {e}"),
            Self::Read { worker, error } => {
                write!(f, "failed to read result from worker {worker}: {error}")
            }
            Self::TruncatedResult { worker } => {
                write!(f, "result message from worker {worker} was truncated")
            }
            Self::BadTag { worker, tag } => {
                write!(f, "worker {worker} sent result with out-of-range tag {tag}")
            }
            Self::OversizedResult { worker, count } => {
                write!(f, "worker {worker} sent oversized result ({count} elements)")
            }
            Self::MissingResult { worker } => {
                write!(f, "no result received for chunk {worker}")
            }
            Self::WorkerPanic { worker } => write!(f, "worker {worker} panicked"),
            Self::WorkerExit { worker, code } => {
                write!(f, "worker {worker} exited with status {code}")
            }
            Self::WorkerSignal { worker, signal } => {
                write!(f, "worker {worker} was killed by signal {signal}")
            }
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Pipe(e) | Self::Fork(e) | Self::Wait(e) | Self::Read { error: e, .. } => Some(e),
            _ => None,
        }
    }
}
