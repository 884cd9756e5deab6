use core::{
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};
use std::thread;
use crate::{
    macros::client_crash,
    semaphore::{LazySemaphore, RawSemaphore, Semaphore},
    wait::{wait_on_address, wake_by_address_one},
};

/// Neither signaled nor waited on, this is both the initial and the final state.
const UNUSED : u32 = 0;
/// Signaled, nobody waited yet.
const SIGNALED : u32 = 1;
/// Waited on, not signaled yet.
const WAITING : u32 = u32::MAX;

/// Single use rendezvous between a signalling and a waiting thread.
///
/// Between its creation and its destruction, an event is signaled exactly once and waited on exactly once, in any order.
/// A wait that comes after the signal returns immediately, a wait before the signal blocks until the signal.
/// Any other use of the event is a client error, this is not a reusable semaphore.
///
/// The event is a single word, signalling and waiting are a single atomic operation each, unless the wait comes first.
pub struct ThreadEvent {
    value : AtomicU32,
}

impl ThreadEvent {
    /// Create a new event.
    #[inline]
    pub const fn new() -> Self {
        Self { value: AtomicU32::new(UNUSED) }
    }

    /// Signal the event, waking the waiting thread if it's already blocked.
    ///
    /// # Panics
    ///
    /// Panics when the event was already signaled.
    #[inline]
    pub fn signal(&self) {
        let prev = self.value.fetch_add(1, Ordering::Release);
        if prev != UNUSED {
            self.signal_slow(prev);
        }
    }

    #[cold]
    fn signal_slow(&self, prev: u32) {
        if prev != WAITING {
            client_crash!("ThreadEvent", ThreadEvent::signal, "corrupt thread event value", prev);
        }
        wake_by_address_one(&self.value);
    }

    /// Wait until the event is signaled.
    ///
    /// # Panics
    ///
    /// Panics when the event was already waited on.
    #[inline]
    pub fn wait(&self) {
        let prev = self.value.fetch_sub(1, Ordering::Acquire);
        if prev != SIGNALED {
            self.wait_slow(prev);
        }
    }

    #[cold]
    fn wait_slow(&self, prev: u32) {
        if prev != UNUSED {
            client_crash!("ThreadEvent", ThreadEvent::wait, "corrupt thread event value", prev);
        }

        loop {
            let cur = self.value.load(Ordering::Acquire);
            match cur {
                UNUSED => return,
                WAITING => {
                    _ = wait_on_address(&self.value, WAITING, None);
                },
                _ => client_crash!("ThreadEvent", ThreadEvent::wait, "corrupt thread event value", cur),
            }
        }
    }

    /// Check if the event has been signaled, without a matching wait.
    #[inline]
    pub fn is_signaled(&self) -> bool {
        self.value.load(Ordering::Relaxed) == SIGNALED
    }
}

impl Default for ThreadEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadEvent {
    // Any event still in use is a leaked waiter or a missed signal, unless we're already unwinding from another failure
    fn destroy(&mut self) {
        let value = *self.value.get_mut();
        if value != UNUSED && !thread::panicking() {
            client_crash!("ThreadEvent", ThreadEvent::destroy, "thread event destroyed while still in use", value);
        }
    }
}

impl Drop for ThreadEvent {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for ThreadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadEvent")
            .field("value", &self.value.load(Ordering::Relaxed))
        .finish()
    }
}

/// Single use rendezvous, like [`ThreadEvent`], backed by a counting semaphore.
///
/// The semaphore is only created when the event is first signaled or waited on.
pub struct SemaphoreThreadEvent<S: RawSemaphore = Semaphore> {
    sem : LazySemaphore<S>,
}

impl<S: RawSemaphore> SemaphoreThreadEvent<S> {
    /// Create a new event.
    #[inline]
    pub const fn new() -> Self {
        Self { sem: LazySemaphore::new() }
    }

    /// Signal the event, waking the waiting thread if it's already blocked.
    #[inline]
    pub fn signal(&self) {
        self.sem.signal(1)
    }

    /// Wait until the event is signaled.
    #[inline]
    pub fn wait(&self) {
        self.sem.wait()
    }
}

impl<S: RawSemaphore> Default for SemaphoreThreadEvent<S> {
    fn default() -> Self {
        Self::new()
    }
}
