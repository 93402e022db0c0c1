//! Cross-process shared maximum slot.
//!
//! Forked workers have isolated address spaces, so the aggregation slot cannot
//! be an ordinary in-process value. [`SegmentSlot`] places the value cell and
//! a `PTHREAD_PROCESS_SHARED` mutex in an anonymous `MAP_SHARED` mapping set
//! up before the workers fork; every child inherits the same physical pages,
//! making the slot one shared register rather than a message. The contract is
//! the same as the in-process slot: the locked strategy makes the whole
//! read-compare-write atomic across processes, the unsynchronized strategy
//! leaves each step independently interleavable.

use crate::slot::{MaxAccumulator, SyncStrategy, FLOOR};
use nix::sys::mman::{mmap, munmap, MapFlags, ProtFlags};
use std::io;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicI64, Ordering};

/// Layout of the shared mapping. `repr(C)` keeps the mutex and the value cell
/// at fixed offsets in every process that inherits the mapping.
#[repr(C)]
struct SharedRegion {
    mutex: libc::pthread_mutex_t,
    value: AtomicI64,
}

/// A maximum slot backed by an anonymous shared memory mapping.
///
/// Created by the parent before forking workers; the mapping is inherited
/// across `fork(2)` and unmapped when the parent's slot is dropped. Forked
/// children exit via `_exit` and never run the drop.
pub struct SegmentSlot {
    region: *mut SharedRegion,
    strategy: SyncStrategy,
}

impl SegmentSlot {
    /// Maps the shared region and initializes the process-shared mutex and
    /// the value cell (to [`FLOOR`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the mapping cannot be created or the mutex cannot
    /// be initialized.
    pub fn new(strategy: SyncStrategy) -> Result<Self, SegmentError> {
        // SAFETY: anonymous mapping, no file descriptor, offset zero.
        let addr = unsafe {
            mmap(
                ptr::null_mut(),
                std::mem::size_of::<SharedRegion>(),
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED | MapFlags::MAP_ANONYMOUS,
                -1,
                0,
            )
        }
        .map_err(SegmentError::Map)?;

        let region = addr.cast::<SharedRegion>();

        // SAFETY: `region` points at a fresh read-write mapping large enough
        // for SharedRegion. The mutex must be marked process-shared before
        // any child can contend on it; libc has no safe wrapper for this.
        let mutex_rc = unsafe {
            let mut attr: libc::pthread_mutexattr_t = MaybeUninit::zeroed().assume_init();
            let mut rc = libc::pthread_mutexattr_init(&raw mut attr);
            if rc == 0 {
                libc::pthread_mutexattr_setpshared(&raw mut attr, libc::PTHREAD_PROCESS_SHARED);
                rc = libc::pthread_mutex_init(ptr::addr_of_mut!((*region).mutex), &raw const attr);
                libc::pthread_mutexattr_destroy(&raw mut attr);
            }
            ptr::addr_of_mut!((*region).value).write(AtomicI64::new(FLOOR));
            rc
        };

        if mutex_rc != 0 {
            let error = io::Error::from_raw_os_error(mutex_rc);
            // SAFETY: the mapping was created above with this exact length.
            let _ = unsafe { munmap(addr, std::mem::size_of::<SharedRegion>()) };
            return Err(SegmentError::MutexInit(error));
        }

        Ok(Self { region, strategy })
    }

    /// Shared view of the mapped region.
    fn region(&self) -> &SharedRegion {
        // SAFETY: the mapping lives until drop and the region was fully
        // initialized in new().
        unsafe { &*self.region }
    }
}

impl MaxAccumulator for SegmentSlot {
    fn update(&self, local_max: i64) {
        match self.strategy {
            SyncStrategy::Locked => {
                // SAFETY: the mutex was initialized process-shared in new()
                // and stays mapped for the life of self.
                let rc = unsafe { libc::pthread_mutex_lock(ptr::addr_of_mut!((*self.region).mutex)) };
                debug_assert_eq!(rc, 0, "pthread_mutex_lock failed");

                let current = self.region().value.load(Ordering::Relaxed);
                if local_max > current {
                    self.region().value.store(local_max, Ordering::Relaxed);
                }

                // SAFETY: lock is held by this process.
                let rc =
                    unsafe { libc::pthread_mutex_unlock(ptr::addr_of_mut!((*self.region).mutex)) };
                debug_assert_eq!(rc, 0, "pthread_mutex_unlock failed");
            }
            SyncStrategy::Unsynchronized => {
                let current = self.region().value.load(Ordering::Relaxed);
                if local_max > current {
                    // Same deliberate widening as the in-process slot: give
                    // the scheduler a chance to interleave another process
                    // between the stale read and the write.
                    let _ = nix::sched::sched_yield();
                    self.region().value.store(local_max, Ordering::Relaxed);
                }
            }
        }
    }

    fn current(&self) -> i64 {
        self.region().value.load(Ordering::Acquire)
    }
}

impl Drop for SegmentSlot {
    fn drop(&mut self) {
        // SAFETY: only the parent drops the slot (children _exit), so the
        // mutex is destroyed and the region unmapped exactly once.
        unsafe {
            libc::pthread_mutex_destroy(ptr::addr_of_mut!((*self.region).mutex));
            let _ = munmap(
                self.region.cast(),
                std::mem::size_of::<SharedRegion>(),
            );
        }
    }
}

/// Errors that can occur while setting up the shared segment.
#[derive(Debug)]
pub enum SegmentError {
    /// The anonymous shared mapping could not be created.
    Map(nix::Error),
    /// The process-shared mutex could not be initialized.
    MutexInit(io::Error),
}

impl std::fmt::Display for SegmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Map(e) => write!(f, "failed to map shared segment: {e}"),
            Self::MutexInit(e) => write!(f, "failed to initialize shared mutex: {e}"),
        }
    }
}

impl std::error::Error for SegmentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Map(_) => None,
            Self::MutexInit(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::wait::{waitpid, WaitStatus};
    use nix::unistd::{fork, ForkResult};

    #[test]
    fn segment_starts_at_floor() {
        let slot = SegmentSlot::new(SyncStrategy::Locked).unwrap();
        assert_eq!(slot.current(), FLOOR);
    }

    #[test]
    fn update_raises_value_in_parent() {
        let slot = SegmentSlot::new(SyncStrategy::Locked).unwrap();
        slot.update(42);
        slot.update(17);
        assert_eq!(slot.current(), 42);
    }

    #[test]
    fn child_update_is_visible_to_parent() {
        let slot = SegmentSlot::new(SyncStrategy::Locked).unwrap();

        // SAFETY: the child only touches the shared mapping and exits via
        // _exit, skipping destructors it shares with the parent.
        match unsafe { fork() }.unwrap() {
            ForkResult::Child => {
                slot.update(99);
                unsafe { libc::_exit(0) };
            }
            ForkResult::Parent { child } => {
                let status = waitpid(child, None).unwrap();
                assert_eq!(status, WaitStatus::Exited(child, 0));
                assert_eq!(slot.current(), 99);
            }
        }
    }
}
