use core::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;
use crate::{
    common::WaitResult,
    wait::{wait_on_address, wake_by_address_all, wake_by_address_one},
};
use super::RawSemaphore;

/// Semaphore built on the address wait, does not need any kernel object.
///
/// Waiters are not woken in any particular order.
pub struct AddressSemaphore {
    count   : AtomicU32,
    waiters : AtomicU32,
}

impl AddressSemaphore {
    /// Try to take 1 from the count without blocking.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        let mut count = self.count.load(Ordering::SeqCst);
        while count != 0 {
            match self.count.compare_exchange_weak(count, count - 1, Ordering::Acquire, Ordering::Relaxed) {
                Ok(_) => return true,
                Err(cur) => count = cur,
            }
        }
        false
    }

    fn wait_impl(&self, deadline: Option<Instant>) -> WaitResult {
        if self.try_acquire() {
            return Ok(());
        }

        // The registration and the count check in `try_acquire` are SeqCst, as are the count increment and the waiter check in `signal`:
        // a signaller which doesn't see our registration must have made its count visible to our next check.
        self.waiters.fetch_add(1, Ordering::SeqCst);
        let res = loop {
            if self.try_acquire() {
                break Ok(());
            }
            if let Err(err) = wait_on_address(&self.count, 0, deadline) {
                // A signal may have arrived right as we timed out, don't waste it
                break if self.try_acquire() { Ok(()) } else { Err(err) };
            }
        };
        self.waiters.fetch_sub(1, Ordering::Relaxed);
        res
    }
}

impl RawSemaphore for AddressSemaphore {
    fn new() -> Result<Self, i32> {
        Ok(Self { count: AtomicU32::new(0), waiters: AtomicU32::new(0) })
    }

    fn signal(&self, count: u32) {
        if count == 0 {
            return;
        }

        self.count.fetch_add(count, Ordering::SeqCst);
        if self.waiters.load(Ordering::SeqCst) != 0 {
            if count == 1 {
                wake_by_address_one(&self.count);
            } else {
                wake_by_address_all(&self.count);
            }
        }
    }

    fn wait(&self) {
        // Can't time out without a deadline
        _ = self.wait_impl(None);
    }

    fn wait_until(&self, deadline: Instant) -> WaitResult {
        self.wait_impl(Some(deadline))
    }
}
