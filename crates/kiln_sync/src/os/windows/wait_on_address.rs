use core::{
    ffi,
    mem,
    sync::atomic::AtomicU32,
};
use std::time::Instant;
use windows::Win32::{
    Foundation::ERROR_TIMEOUT,
    System::{
        WindowsProgramming::INFINITE,
        Threading::{WaitOnAddress, WakeByAddressSingle, WakeByAddressAll},
    },
};
use crate::common::{duration_to_millis, time_until, WaitError, WaitResult};
use super::errno;

/// Block while `word` contains `expected`, until woken or `deadline` passes.
pub fn wait(word: &AtomicU32, expected: u32, deadline: Option<Instant>) -> WaitResult {
    let timeout = match deadline {
        Some(deadline) => match time_until(deadline) {
            Some(dur) => duration_to_millis(dur),
            None => return Err(WaitError::Timeout),
        },
        None => INFINITE,
    };

    let woken = unsafe {
        WaitOnAddress(
            word as *const _ as *mut ffi::c_void,
            &expected as *const _ as *mut ffi::c_void,
            mem::size_of::<u32>(),
            timeout
        ).as_bool()
    };

    if !woken && errno() == ERROR_TIMEOUT.0 {
        Err(WaitError::Timeout)
    } else {
        Ok(())
    }
}

/// Wake a single thread blocked on `word`.
pub fn wake_one(word: &AtomicU32) {
    unsafe { WakeByAddressSingle(word as *const _ as *mut ffi::c_void) };
}

/// Wake all threads blocked on `word`.
pub fn wake_all(word: &AtomicU32) {
    unsafe { WakeByAddressAll(word as *const _ as *mut ffi::c_void) };
}
