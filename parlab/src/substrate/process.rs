//! Process-isolated execution substrate.
//!
//! One forked child per chunk. Children share no memory with the parent
//! (beyond the deliberate shared segment used by the aggregation slot), so
//! sorted runs come back as messages: each child writes one length-prefixed,
//! index-tagged message on its own pipe and exits via `_exit`. The parent is
//! the only reader; it collects exactly one message per chunk, reassembles
//! runs by tag, and reaps every child with `waitpid`. A child that exits
//! abnormally is fatal to the run.
//!
//! Wire format of a result message, all little-endian:
//! `[u32 chunk tag][u64 element count][count x i64]`.

use super::DispatchError;
use crate::mapper;
use crate::segment::SegmentSlot;
use crate::slot::MaxAccumulator;
use libc_print::libc_eprintln;
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{close, fork, pipe, read, write, ForkResult, Pid};
use std::ops::Range;
use std::os::unix::io::RawFd;

/// Size of a result message header: u32 tag + u64 count.
const HEADER_LEN: usize = 12;

/// Sorts every chunk in its own forked process and returns the runs in chunk
/// order.
///
/// # Errors
///
/// Returns an error if a pipe or fork fails, if a result message is missing,
/// truncated, or malformed, or if a worker exits abnormally. Worker status
/// errors take precedence over message errors, since a dead worker explains
/// its own missing message.
pub(crate) fn sort_chunks(
    data: &[i64],
    bounds: &[Range<usize>],
) -> Result<Vec<Vec<i64>>, DispatchError> {
    let mut children: Vec<(usize, Pid)> = Vec::with_capacity(bounds.len());
    let mut pipes: Vec<(usize, RawFd)> = Vec::with_capacity(bounds.len());

    for (index, range) in bounds.iter().enumerate() {
        let (read_fd, write_fd) = match pipe() {
            Ok(fds) => fds,
            Err(e) => {
                abandon(&children, &pipes);
                return Err(DispatchError::Pipe(e));
            }
        };

        // SAFETY: the child runs only the mapper and the pipe write, then
        // leaves through _exit without touching the parent's teardown.
        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                let _ = close(read_fd);
                child_sort(&data[range.clone()], index, write_fd);
            }
            Ok(ForkResult::Parent { child }) => {
                let _ = close(write_fd);
                children.push((index, child));
                pipes.push((index, read_fd));
            }
            Err(e) => {
                let _ = close(read_fd);
                let _ = close(write_fd);
                abandon(&children, &pipes);
                return Err(DispatchError::Fork(e));
            }
        }
    }

    // Drain every pipe before reaping: a child with a run larger than the
    // pipe capacity blocks in write until the parent reads it.
    let mut runs: Vec<Option<Vec<i64>>> = (0..bounds.len()).map(|_| None).collect();
    let mut message_error = None;

    for &(worker, fd) in &pipes {
        match read_message(fd, worker, data.len()) {
            Ok((tag, run)) => {
                if tag < runs.len() {
                    runs[tag] = Some(run);
                } else if message_error.is_none() {
                    message_error = Some(DispatchError::BadTag { worker, tag });
                }
            }
            Err(e) => {
                if message_error.is_none() {
                    message_error = Some(e);
                }
            }
        }
        let _ = close(fd);
    }

    reap(&children)?;
    if let Some(error) = message_error {
        return Err(error);
    }

    runs.into_iter()
        .enumerate()
        .map(|(worker, run)| run.ok_or(DispatchError::MissingResult { worker }))
        .collect()
}

/// Computes every chunk's local maximum in its own forked process, folding
/// each into the shared segment slot. No result messages exist here; the slot
/// is the cross-process register under test.
///
/// # Errors
///
/// Returns an error if a fork fails or a worker exits abnormally.
pub(crate) fn max_chunks(
    data: &[i64],
    bounds: &[Range<usize>],
    slot: &SegmentSlot,
) -> Result<(), DispatchError> {
    let mut children: Vec<(usize, Pid)> = Vec::with_capacity(bounds.len());

    for (index, range) in bounds.iter().enumerate() {
        // SAFETY: the child touches only its chunk and the shared segment,
        // then leaves through _exit.
        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                slot.update(mapper::local_max(&data[range.clone()]));
                // SAFETY: skip atexit handlers and destructors shared with
                // the parent.
                unsafe { libc::_exit(0) };
            }
            Ok(ForkResult::Parent { child }) => children.push((index, child)),
            Err(e) => {
                abandon(&children, &[]);
                return Err(DispatchError::Fork(e));
            }
        }
    }

    reap(&children)
}

/// Child-side sort worker: sort the chunk, send one tagged message, exit.
fn child_sort(chunk: &[i64], index: usize, fd: RawFd) -> ! {
    let run = mapper::sort_chunk(chunk.to_vec());
    let code = match write_message(fd, index, &run) {
        Ok(()) => 0,
        Err(e) => {
            libc_eprintln!("[parlab] worker {} failed to send result: {}", index, e);
            1
        }
    };
    let _ = close(fd);
    // SAFETY: _exit skips atexit handlers and destructors shared with the
    // parent process.
    unsafe { libc::_exit(code) }
}

/// Writes one result message: header then payload.
// Tags fit in u32: the worker count is tiny by construction.
#[allow(clippy::cast_possible_truncation)]
fn write_message(fd: RawFd, index: usize, run: &[i64]) -> nix::Result<()> {
    let mut message = Vec::with_capacity(HEADER_LEN + run.len() * 8);
    message.extend_from_slice(&(index as u32).to_le_bytes());
    message.extend_from_slice(&(run.len() as u64).to_le_bytes());
    for value in run {
        message.extend_from_slice(&value.to_le_bytes());
    }
    write_all(fd, &message)
}

/// Reads one result message from a worker's pipe.
///
/// `limit` bounds the accepted element count (no chunk can exceed the input
/// length), so a corrupt header cannot drive a huge allocation.
fn read_message(
    fd: RawFd,
    worker: usize,
    limit: usize,
) -> Result<(usize, Vec<i64>), DispatchError> {
    let mut header = [0_u8; HEADER_LEN];
    read_exact(fd, worker, &mut header)?;

    let mut tag_bytes = [0_u8; 4];
    tag_bytes.copy_from_slice(&header[..4]);
    let tag = u32::from_le_bytes(tag_bytes) as usize;

    let mut count_bytes = [0_u8; 8];
    count_bytes.copy_from_slice(&header[4..]);
    let count = u64::from_le_bytes(count_bytes) as usize;
    if count > limit {
        return Err(DispatchError::OversizedResult { worker, count });
    }

    let mut payload = vec![0_u8; count * 8];
    read_exact(fd, worker, &mut payload)?;

    let mut run = Vec::with_capacity(count);
    for word in payload.chunks_exact(8) {
        let mut bytes = [0_u8; 8];
        bytes.copy_from_slice(word);
        run.push(i64::from_le_bytes(bytes));
    }
    Ok((tag, run))
}

/// Writes the whole buffer, retrying on EINTR and short writes.
fn write_all(fd: RawFd, buf: &[u8]) -> nix::Result<()> {
    let mut written = 0;
    while written < buf.len() {
        match write(fd, &buf[written..]) {
            Ok(0) => return Err(Errno::EIO),
            Ok(n) => written += n,
            Err(Errno::EINTR) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Fills the whole buffer, retrying on EINTR. EOF before the buffer is full
/// means the worker died mid-message.
fn read_exact(fd: RawFd, worker: usize, buf: &mut [u8]) -> Result<(), DispatchError> {
    let mut filled = 0;
    while filled < buf.len() {
        match read(fd, &mut buf[filled..]) {
            Ok(0) => return Err(DispatchError::TruncatedResult { worker }),
            Ok(n) => filled += n,
            Err(Errno::EINTR) => {}
            Err(error) => return Err(DispatchError::Read { worker, error }),
        }
    }
    Ok(())
}

/// Reaps every child, reporting the first abnormal exit. All children are
/// waited on even after a failure is found, so none is left as a zombie.
fn reap(children: &[(usize, Pid)]) -> Result<(), DispatchError> {
    let mut failure = None;

    for &(worker, child) in children {
        let status = match waitpid(child, None) {
            Ok(status) => status,
            Err(e) => {
                if failure.is_none() {
                    failure = Some(DispatchError::Wait(e));
                }
                continue;
            }
        };

        if failure.is_some() {
            continue;
        }
        match status {
            WaitStatus::Exited(_, 0) => {}
            WaitStatus::Exited(_, code) => {
                failure = Some(DispatchError::WorkerExit { worker, code });
            }
            WaitStatus::Signaled(_, signal, _) => {
                failure = Some(DispatchError::WorkerSignal { worker, signal });
            }
            // No WUNTRACED/WCONTINUED flags are passed, so stop/continue
            // statuses cannot be observed here.
            _ => {}
        }
    }

    match failure {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Best-effort cleanup when dispatch fails partway: close result pipes and
/// reap whatever was already forked.
fn abandon(children: &[(usize, Pid)], pipes: &[(usize, RawFd)]) {
    for &(_, fd) in pipes {
        let _ = close(fd);
    }
    for &(_, child) in children {
        let _ = waitpid(child, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::chunk_bounds;
    use crate::slot::SyncStrategy;

    #[test]
    fn sort_chunks_round_trips_through_pipes() {
        let data = vec![42, -7, 19, 0, 88, -100, 3, 55, 21];
        let bounds = chunk_bounds(data.len(), 3);
        let runs = sort_chunks(&data, &bounds).unwrap();
        assert_eq!(
            runs,
            vec![vec![-7, 19, 42], vec![-100, 0, 88], vec![3, 21, 55]]
        );
    }

    #[test]
    fn sort_chunks_with_more_workers_than_elements() {
        let data = vec![2, 1];
        let bounds = chunk_bounds(data.len(), 4);
        let runs = sort_chunks(&data, &bounds).unwrap();
        assert_eq!(runs, vec![vec![2], vec![1], Vec::new(), Vec::new()]);
    }

    #[test]
    fn max_chunks_folds_into_segment() {
        let data = vec![5, 123, -4, 17, 99, 6];
        let bounds = chunk_bounds(data.len(), 2);
        let slot = SegmentSlot::new(SyncStrategy::Locked).unwrap();
        max_chunks(&data, &bounds, &slot).unwrap();
        assert_eq!(slot.current(), 123);
    }
}
