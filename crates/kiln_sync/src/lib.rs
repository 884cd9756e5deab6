//! Low level synchronization primitives, each stored in a single 32-bit word.
//!
//! - [`UnfairLock`]: unfair mutual exclusion lock, and the [`Mutex`] built on top of it.
//! - [`Gate`]: single admission gate, released for all waiters at once by a broadcast.
//! - [`OnceGate`]: runs a body exactly once, and the [`Lazy`] value built on top of it.
//! - [`ThreadEvent`]: single use signal/wait rendezvous between 2 threads.
//!
//! The uncontended paths of all primitives are a single atomic operation, threads only interact with the kernel to block,
//! using the address wait in [`wait`], or a counting semaphore from [`semaphore`].
//!
//! Locks and gates record their owner as a [`ThreadId`], so misuse like locking recursively or unlocking from the wrong thread is detected,
//! such client errors are logged and panic.

#![allow(clippy::new_without_default)]

mod macros;
mod os;

pub mod common;
pub mod thread_id;
pub mod lock_word;
pub mod wait;
pub mod semaphore;

pub mod unfair_lock;
pub mod mutex;
pub mod gate;
pub mod quiescence;
pub mod once_gate;
pub mod lazy;
pub mod thread_event;

pub use common::{WaitError, WaitResult};
pub use thread_id::ThreadId;
pub use lock_word::LockWord;
pub use semaphore::{RawSemaphore, Semaphore, LazySemaphore};
pub use unfair_lock::UnfairLock;
pub use mutex::{Mutex, MutexGuard, MappedMutexGuard};
pub use gate::Gate;
pub use quiescence::{QuiescentCounter, QuiescentContext};
pub use once_gate::{OnceGate, OnceState, OncePublish, Direct, Quiescent};
pub use lazy::Lazy;
pub use thread_event::{ThreadEvent, SemaphoreThreadEvent};

// Every primitive is a single word, the same size as the OS wait primitives operate on
static_assertions::assert_eq_size!(UnfairLock, u32);
static_assertions::assert_eq_size!(Gate, u32);
static_assertions::assert_eq_size!(OnceGate<Direct>, u32);
static_assertions::assert_eq_size!(OnceGate<Quiescent>, u32);
static_assertions::assert_eq_size!(ThreadEvent, u32);
static_assertions::assert_eq_size!(ThreadId, u32);
static_assertions::assert_eq_size!(Option<ThreadId>, u32);
static_assertions::assert_impl_all!(UnfairLock: Send, Sync);
static_assertions::assert_impl_all!(Gate: Send, Sync);
static_assertions::assert_impl_all!(OnceGate: Send, Sync);
static_assertions::assert_impl_all!(ThreadEvent: Send, Sync);
static_assertions::assert_impl_all!(LazySemaphore: Send, Sync);
static_assertions::assert_not_impl_any!(MutexGuard<'static, u32>: Send);
