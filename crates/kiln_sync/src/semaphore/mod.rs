//! Counting semaphores.
//!
//! A semaphore is the fallback blocking mechanism for platforms without a usable address wait,
//! and the backing object of [`SemaphoreThreadEvent`](crate::thread_event::SemaphoreThreadEvent).
//!
//! The kernel objects behind a semaphore are only created when they are actually needed, see [`LazySemaphore`].

use core::{
    ptr::null_mut,
    sync::atomic::{AtomicPtr, Ordering},
};
use std::time::Instant;
use cfg_if::cfg_if;
use crate::{
    common::WaitResult,
    macros::{client_crash, sync_verbose},
};

mod address;
pub use address::AddressSemaphore;

#[cfg(all(unix, not(target_vendor = "apple")))]
pub use crate::os::unix::PosixSemaphore;
#[cfg(windows)]
pub use crate::os::windows::Win32Semaphore;

/// Raw counting semaphore.
///
/// Implementations start with a count of 0, every `signal` adds to the count and every `wait` takes 1 from it,
/// blocking while the count is 0. The underlying object is disposed of when the semaphore is dropped.
pub trait RawSemaphore: Send + Sync + Sized {
    /// Create a new semaphore with a count of 0.
    ///
    /// Returns the OS error code when the underlying object could not be created.
    fn new() -> Result<Self, i32>;

    /// Add `count` to the semaphore, waking up to `count` waiting threads.
    fn signal(&self, count: u32);

    /// Take 1 from the semaphore, blocking until the count is non-zero.
    fn wait(&self);

    /// Take 1 from the semaphore, blocking until the count is non-zero or `deadline` passes.
    ///
    /// A timed out wait does not take anything from the semaphore.
    fn wait_until(&self, deadline: Instant) -> WaitResult;
}

cfg_if!{
    if #[cfg(feature = "address_semaphore")] {
        /// Default semaphore of the platform.
        pub type Semaphore = AddressSemaphore;
    } else if #[cfg(windows)] {
        /// Default semaphore of the platform.
        pub type Semaphore = Win32Semaphore;
    } else if #[cfg(all(unix, not(target_vendor = "apple")))] {
        /// Default semaphore of the platform.
        pub type Semaphore = PosixSemaphore;
    } else {
        /// Default semaphore of the platform.
        pub type Semaphore = AddressSemaphore;
    }
}

/// Semaphore which only creates its underlying object when it's first used.
///
/// Creation is idempotent: when multiple threads race to create the semaphore, each creates its own object,
/// but only one gets installed, the others are disposed of immediately.
/// Failing to create the object is fatal.
pub struct LazySemaphore<S: RawSemaphore = Semaphore> {
    sem : AtomicPtr<S>,
}

impl<S: RawSemaphore> LazySemaphore<S> {
    /// Create a semaphore, without creating its underlying object.
    pub const fn new() -> Self {
        Self { sem: AtomicPtr::new(null_mut()) }
    }

    /// Check if the underlying object has been created.
    #[inline]
    pub fn is_created(&self) -> bool {
        !self.sem.load(Ordering::Acquire).is_null()
    }

    /// Get the underlying semaphore, creating it if needed.
    #[inline]
    pub fn get_or_create(&self) -> &S {
        let ptr = self.sem.load(Ordering::Acquire);
        if !ptr.is_null() {
            // SAFETY: an installed semaphore lives until `self` is dropped
            return unsafe { &*ptr };
        }
        self.create()
    }

    #[cold]
    fn create(&self) -> &S {
        let sem = match S::new() {
            Ok(sem) => sem,
            Err(err) => client_crash!("Semaphore", Self::create, "failed to create semaphore", err),
        };
        let new = Box::into_raw(Box::new(sem));

        match self.sem.compare_exchange(null_mut(), new, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => {
                sync_verbose!("Semaphore", "created semaphore {:p}", new);
                // SAFETY: just installed, lives until `self` is dropped
                unsafe { &*new }
            },
            Err(installed) => {
                sync_verbose!("Semaphore", "lost semaphore creation race, disposing of {:p}", new);
                // SAFETY: `new` was never shared
                drop(unsafe { Box::from_raw(new) });
                // SAFETY: an installed semaphore lives until `self` is dropped
                unsafe { &*installed }
            },
        }
    }

    /// Add `count` to the semaphore.
    #[inline]
    pub fn signal(&self, count: u32) {
        self.get_or_create().signal(count)
    }

    /// Take 1 from the semaphore, blocking until the count is non-zero.
    #[inline]
    pub fn wait(&self) {
        self.get_or_create().wait()
    }

    /// Take 1 from the semaphore, blocking until the count is non-zero or `deadline` passes.
    #[inline]
    pub fn wait_until(&self, deadline: Instant) -> WaitResult {
        self.get_or_create().wait_until(deadline)
    }
}

impl<S: RawSemaphore> Default for LazySemaphore<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: RawSemaphore> Drop for LazySemaphore<S> {
    fn drop(&mut self) {
        let ptr = *self.sem.get_mut();
        if !ptr.is_null() {
            // SAFETY: installed by `create` and exclusively owned now
            drop(unsafe { Box::from_raw(ptr) });
        }
    }
}
