//! Kernel wait primitive: block on the value of a 32-bit word, and wake the threads blocked on it.
//!
//! This is the only place where the primitives of this crate interact with the kernel.
//! All primitives only get here on their contended path, the uncontended path is handled by a single atomic operation.
//!
//! # Backends
//!
//! - Linux: `futex(FUTEX_WAIT/FUTEX_WAKE)`, process private.
//! - Windows: `WaitOnAddress`, `WakeByAddressSingle` and `WakeByAddressAll`.
//! - Everything else, or when the `portable_wait` feature is enabled: queues keyed by the word's address from the parking lot.
//!
//! Wakeups can be spurious, so every caller re-checks the state it waited for after returning.

use core::sync::atomic::AtomicU32;
use std::time::Instant;
use cfg_if::cfg_if;
use crate::{
    common::WaitResult,
    macros::sync_debug,
};

mod spin_wait;
mod parking;

pub use spin_wait::SpinWait;

cfg_if!{
    if #[cfg(feature = "portable_wait")] {
        use self::parking as imp;
    } else if #[cfg(any(target_os = "linux", target_os = "android"))] {
        use crate::os::linux::futex as imp;
    } else if #[cfg(windows)] {
        use crate::os::windows::wait_on_address as imp;
    } else {
        use self::parking as imp;
    }
}

/// The portable backend, available on every platform.
pub mod portable {
    pub use super::parking::{wait, wake_one, wake_all};
}

/// Block the current thread while `word` contains `expected`.
///
/// Returns `Ok(())` when woken, when `word` didn't contain `expected` when the wait started, or spuriously.
/// Returns `Err(WaitError::Timeout)` if `deadline` passed before any of those happened.
///
/// The word itself is never modified.
#[inline]
pub fn wait_on_address(word: &AtomicU32, expected: u32, deadline: Option<Instant>) -> WaitResult {
    let res = imp::wait(word, expected, deadline);
    if res.is_err() {
        sync_debug!("Wait", wait_on_address, "wait on {:p} for {:#x} timed out", word, expected);
    }
    res
}

/// Wake a single thread blocked on `word`.
#[inline]
pub fn wake_by_address_one(word: &AtomicU32) {
    imp::wake_one(word)
}

/// Wake all threads blocked on `word`.
#[inline]
pub fn wake_by_address_all(word: &AtomicU32) {
    imp::wake_all(word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::Ordering;
    use std::{sync::Arc, thread, time::Duration};
    use crate::common::WaitError;

    #[test]
    fn value_mismatch_returns() {
        let word = AtomicU32::new(1);
        assert_eq!(wait_on_address(&word, 0, None), Ok(()));
        assert_eq!(portable::wait(&word, 0, None), Ok(()));
    }

    #[test]
    fn deadline_passes() {
        let word = AtomicU32::new(0);
        let deadline = Instant::now() + Duration::from_millis(20);
        // Spurious wakeups are allowed, so keep waiting until the deadline reports
        while wait_on_address(&word, 0, Some(deadline)).is_ok() {}
        assert!(Instant::now() >= deadline);
        assert_eq!(word.load(Ordering::Relaxed), 0);

        let deadline = Instant::now() + Duration::from_millis(20);
        while portable::wait(&word, 0, Some(deadline)).is_ok() {}
        assert_eq!(portable::wait(&word, 0, Some(Instant::now())), Err(WaitError::Timeout));
    }

    fn wake_all_with(wait: fn(&AtomicU32, u32, Option<Instant>) -> WaitResult, wake_all: fn(&AtomicU32)) {
        const NUM_THREADS : usize = 4;
        let word = Arc::new(AtomicU32::new(0));
        let handles = (0..NUM_THREADS).map(|_| {
            let word = word.clone();
            thread::spawn(move || {
                while word.load(Ordering::Acquire) == 0 {
                    _ = wait(&word, 0, None);
                }
            })
        }).collect::<Vec<_>>();

        thread::sleep(Duration::from_millis(20));
        word.store(1, Ordering::Release);
        wake_all(&word);

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn wake_all_native() {
        wake_all_with(wait_on_address, wake_by_address_all);
    }

    #[test]
    fn wake_all_portable() {
        wake_all_with(portable::wait, portable::wake_all);
    }

    #[test]
    fn wake_one_wakes_waiter() {
        let word = Arc::new(AtomicU32::new(0));
        let waiter = {
            let word = word.clone();
            thread::spawn(move || {
                while word.load(Ordering::Acquire) == 0 {
                    _ = wait_on_address(&word, 0, None);
                }
            })
        };

        thread::sleep(Duration::from_millis(10));
        word.store(1, Ordering::Release);
        wake_by_address_one(&word);
        waiter.join().unwrap();
    }
}
