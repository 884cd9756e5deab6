//! Portable address wait, built on the parking lot's address-keyed queues.
//!
//! The validation callback runs while the queue for the address is locked and a wake takes that same lock,
//! so a waker which changes the word before waking can never be missed.

use core::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;
use parking_lot_core::{self as thread_parker, ParkResult, DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};
use crate::common::{WaitError, WaitResult};

#[inline]
fn key(word: &AtomicU32) -> usize {
    word as *const _ as usize
}

/// Block while `word` contains `expected`, until woken or `deadline` passes.
pub fn wait(word: &AtomicU32, expected: u32, deadline: Option<Instant>) -> WaitResult {
    let validate = || word.load(Ordering::Relaxed) == expected;
    let before_sleep = || {};
    let timed_out = |_, _| {};
    let res = unsafe {
        thread_parker::park(
            key(word),
            validate,
            before_sleep,
            timed_out,
            DEFAULT_PARK_TOKEN,
            deadline
        )
    };

    match res {
        ParkResult::TimedOut => Err(WaitError::Timeout),
        ParkResult::Unparked(_) | ParkResult::Invalid => Ok(()),
    }
}

/// Wake a single thread blocked on `word`.
pub fn wake_one(word: &AtomicU32) {
    unsafe {
        thread_parker::unpark_one(key(word), |_| DEFAULT_UNPARK_TOKEN);
    }
}

/// Wake all threads blocked on `word`.
pub fn wake_all(word: &AtomicU32) {
    unsafe {
        thread_parker::unpark_all(key(word), DEFAULT_UNPARK_TOKEN);
    }
}
