use core::{
    cell::UnsafeCell,
    mem,
};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use crate::{
    common::{time_until, WaitError, WaitResult},
    macros::client_crash,
    semaphore::RawSemaphore,
};
use super::errno;

/// Unnamed POSIX semaphore (`sem_t`), waiters are woken in FIFO order.
///
/// The `sem_t` is boxed, as it may not be moved after it has been initialized.
pub struct PosixSemaphore {
    sem : Box<UnsafeCell<libc::sem_t>>,
}

// SAFETY: sem_t is designed to be used concurrently from multiple threads
unsafe impl Send for PosixSemaphore {}
unsafe impl Sync for PosixSemaphore {}

impl PosixSemaphore {
    #[inline]
    fn as_ptr(&self) -> *mut libc::sem_t {
        self.sem.get()
    }

    // Absolute CLOCK_REALTIME time for a deadline, as required by `sem_timedwait`
    fn realtime_deadline(deadline: Instant) -> Option<libc::timespec> {
        let remaining = time_until(deadline)?;
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        let abs = now.saturating_add(remaining);
        Some(libc::timespec {
            tv_sec: abs.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
            tv_nsec: abs.subsec_nanos() as _,
        })
    }
}

impl RawSemaphore for PosixSemaphore {
    fn new() -> Result<Self, i32> {
        // SAFETY: an all-zero sem_t is a valid (uninitialized) value to pass to sem_init
        let sem = Box::new(UnsafeCell::new(unsafe { mem::zeroed::<libc::sem_t>() }));
        let res = unsafe { libc::sem_init(sem.get(), 0, 0) };
        if res == -1 {
            Err(errno())
        } else {
            Ok(Self { sem })
        }
    }

    fn signal(&self, count: u32) {
        for _ in 0..count {
            let res = unsafe { libc::sem_post(self.as_ptr()) };
            if res == -1 {
                client_crash!("Semaphore", PosixSemaphore::signal, "sem_post failed", errno());
            }
        }
    }

    fn wait(&self) {
        loop {
            let res = unsafe { libc::sem_wait(self.as_ptr()) };
            if res == 0 {
                return;
            }
            let err = errno();
            if err != libc::EINTR {
                client_crash!("Semaphore", PosixSemaphore::wait, "sem_wait failed", err);
            }
        }
    }

    fn wait_until(&self, deadline: Instant) -> WaitResult {
        loop {
            // Recomputed each iteration, the realtime clock may have been changed while waiting
            let Some(timeout) = Self::realtime_deadline(deadline) else {
                // Still consume a pending signal, a passed deadline only means we can't block
                let res = unsafe { libc::sem_trywait(self.as_ptr()) };
                return if res == 0 { Ok(()) } else { Err(WaitError::Timeout) };
            };

            let res = unsafe { libc::sem_timedwait(self.as_ptr(), &timeout) };
            if res == 0 {
                return Ok(());
            }
            match errno() {
                libc::EINTR | libc::ETIMEDOUT => continue,
                err => client_crash!("Semaphore", PosixSemaphore::wait_until, "sem_timedwait failed", err),
            }
        }
    }
}

impl Drop for PosixSemaphore {
    fn drop(&mut self) {
        unsafe { libc::sem_destroy(self.as_ptr()) };
    }
}
