// Portions of the project have been copied from parking_lot and is copyrighted by Amanieu d'Antra under the MIT license (located in: '3rd-party-licenses/parking_lot')
use crate::unfair_lock::UnfairLock;

/// A mutual exclusion primitive useful for protecting shared data, built on an [`UnfairLock`].
///
/// The data can only be accessed through the RAII guards returned from `lock` and `try_lock`, which guarantees that the data is only ever accessed when the mutex is locked.
///
/// # Differences from the standard library `Mutex`
///
/// - No poisoning, the lock is released normally on panic.
/// - Only requires 4 bytes of space for the lock.
/// - Can be statically constructed.
/// - Locking the mutex recursively, or unlocking it from another thread, is detected and panics instead of deadlocking.
/// - Unfair: a thread that releases the mutex can immediately re-acquire it, even while other threads are waiting.
pub type Mutex<T> = lock_api::Mutex<UnfairLock, T>;

/// An RAII implementation of a "scoped lock" of a mutex.
/// When this structure is dropped (falls out of scope), the lock will be unlocked.
///
/// The guard can't be sent to another thread, as the lock records its owning thread.
pub type MutexGuard<'a, T> = lock_api::MutexGuard<'a, UnfairLock, T>;

/// An RAII mutex guard returned by `MutexGuard::map`, which can point to a subfield of the protected data.
pub type MappedMutexGuard<'a, T> = lock_api::MappedMutexGuard<'a, UnfairLock, T>;
