use core::{
    ptr,
    sync::atomic::AtomicU32,
};
use std::time::Instant;
use crate::common::{time_until, WaitError, WaitResult};
use crate::os::unix::errno;

/// Block while `word` contains `expected`, until woken or `deadline` passes.
pub fn wait(word: &AtomicU32, expected: u32, deadline: Option<Instant>) -> WaitResult {
    // FUTEX_WAIT takes a relative timeout, the caller loops on its own state anyway, so a late wake is harmless
    let timeout = match deadline {
        Some(deadline) => match time_until(deadline) {
            Some(dur) => Some(libc::timespec {
                tv_sec: dur.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
                tv_nsec: dur.subsec_nanos() as _,
            }),
            None => return Err(WaitError::Timeout),
        },
        None => None,
    };
    let timeout_ptr = timeout.as_ref().map_or(ptr::null(), |ts| ts as *const libc::timespec);

    let res = unsafe {
        libc::syscall(
            libc::SYS_futex,
            word as *const AtomicU32,
            libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
            expected,
            timeout_ptr,
        )
    };

    // EAGAIN (value changed) and EINTR are treated like a wake, the caller re-checks its state
    if res < 0 && errno() == libc::ETIMEDOUT {
        Err(WaitError::Timeout)
    } else {
        Ok(())
    }
}

#[inline]
fn wake(word: &AtomicU32, count: i32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            word as *const AtomicU32,
            libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
            count,
        );
    }
}

/// Wake a single thread blocked on `word`.
pub fn wake_one(word: &AtomicU32) {
    wake(word, 1);
}

/// Wake all threads blocked on `word`.
pub fn wake_all(word: &AtomicU32) {
    wake(word, i32::MAX);
}
