use core::ptr::null_mut;
use std::time::Instant;
use windows::{
    core::PCWSTR,
    Win32::{
        Foundation::*,
        System::{WindowsProgramming::INFINITE, Threading::*},
    },
};
use crate::{
    common::{duration_to_millis, time_until, WaitError, WaitResult},
    macros::client_crash,
    semaphore::RawSemaphore,
};
use super::errno;

/// Unnamed kernel semaphore object.
pub struct Win32Semaphore {
    handle : HANDLE,
}

// SAFETY: kernel semaphore handles can be used from any thread
unsafe impl Send for Win32Semaphore {}
unsafe impl Sync for Win32Semaphore {}

impl RawSemaphore for Win32Semaphore {
    fn new() -> Result<Self, i32> {
        let handle = unsafe { CreateSemaphoreW(null_mut(), 0, i32::MAX, PCWSTR::default()) };
        match handle {
            Ok(handle) => Ok(Self { handle }),
            Err(err) => Err(err.code().0),
        }
    }

    fn signal(&self, count: u32) {
        let res = unsafe { ReleaseSemaphore(self.handle, count as i32, null_mut()).as_bool() };
        if !res {
            client_crash!("Semaphore", Win32Semaphore::signal, "ReleaseSemaphore failed", errno());
        }
    }

    fn wait(&self) {
        let res = unsafe { WaitForSingleObject(self.handle, INFINITE) };
        if res != WAIT_OBJECT_0 {
            client_crash!("Semaphore", Win32Semaphore::wait, "WaitForSingleObject failed", errno());
        }
    }

    fn wait_until(&self, deadline: Instant) -> WaitResult {
        loop {
            // A passed deadline still takes a pending signal, it just doesn't block
            let timeout = time_until(deadline).map_or(0, duration_to_millis);
            let res = unsafe { WaitForSingleObject(self.handle, timeout) };
            if res == WAIT_OBJECT_0 {
                return Ok(());
            }
            if res != WAIT_TIMEOUT {
                client_crash!("Semaphore", Win32Semaphore::wait_until, "WaitForSingleObject failed", errno());
            }
            // The millisecond granularity can wake us up slightly early
            if time_until(deadline).is_none() {
                return Err(WaitError::Timeout);
            }
        }
    }
}

impl Drop for Win32Semaphore {
    fn drop(&mut self) {
        unsafe { CloseHandle(self.handle) };
    }
}
