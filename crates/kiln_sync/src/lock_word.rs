//! Encoding of a lock owner and its flags into a single 32-bit word.
//!
//! ```text
//! 31                                   2   1   0
//! +------------------------------------+---+---+
//! |               owner                | F | W |
//! +------------------------------------+---+---+
//! ```
//!
//! - `owner`: [`ThreadId`] of the thread holding the lock, 0 when unlocked.
//! - `W`: at least one thread is (about to be) blocked waiting for the word to change.
//! - `F`: a `try_lock` failed while the lock was held, the unlock needs to take its slow path.
//!
//! All functions are pure, the flag bits only carry meaning while an owner is set.

use core::fmt;
use crate::thread_id::ThreadId;

/// Mask of the owner field.
pub const OWNER_MASK : u32 = 0xFFFF_FFFC;
/// Bit set when there are waiters on the word.
pub const WAITERS_BIT : u32 = 0x0000_0001;
/// Bit set when a `try_lock` failed while the word was locked.
pub const FAILED_TRYLOCK_BIT : u32 = 0x0000_0002;
/// Raw value of the NULL owner.
pub const OWNER_NULL : u32 = 0;

/// Value of a lock word.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LockWord(u32);

impl LockWord {
    /// Lock word of a free lock.
    pub const UNLOCKED : LockWord = LockWord(OWNER_NULL);

    /// Create a lock word from its raw value.
    #[inline]
    pub const fn from_raw(raw: u32) -> LockWord {
        LockWord(raw)
    }

    /// Get the raw value of the lock word.
    #[inline]
    pub const fn into_raw(self) -> u32 {
        self.0
    }

    /// Lock word for a lock held by `id`, without any flags.
    #[inline]
    pub const fn for_identity(id: ThreadId) -> LockWord {
        LockWord(id.as_u32() & OWNER_MASK)
    }

    /// Lock word for a lock held by the current thread, without any flags.
    #[inline]
    pub fn for_self() -> LockWord {
        Self::for_identity(ThreadId::current())
    }

    /// Get the owner of the lock, `None` if the lock is free.
    #[inline]
    pub const fn owner(self) -> Option<ThreadId> {
        ThreadId::from_raw(self.0 & OWNER_MASK)
    }

    /// Check if the lock is held.
    #[inline]
    pub const fn is_locked(self) -> bool {
        // equivalent to `self.owner().is_some()`
        self.0 & OWNER_MASK != 0
    }

    /// Check if the lock is held by `id`.
    #[inline]
    pub const fn is_locked_by(self, id: ThreadId) -> bool {
        // equivalent to `self.owner() == Some(id)`
        (self.0 ^ id.as_u32()) & OWNER_MASK == 0
    }

    /// Check if the lock is held by the current thread.
    #[inline]
    pub fn is_locked_by_self(self) -> bool {
        self.is_locked_by(ThreadId::current())
    }

    /// Check if threads are waiting on the word.
    #[inline]
    pub const fn has_waiters(self) -> bool {
        self.0 & WAITERS_BIT != 0
    }

    /// Check if a `try_lock` failed while the word was locked.
    #[inline]
    pub const fn has_failed_trylock(self) -> bool {
        self.0 & FAILED_TRYLOCK_BIT != 0
    }

    /// Get the lock word with the waiters bit set.
    #[inline]
    pub const fn with_waiters(self) -> LockWord {
        LockWord(self.0 | WAITERS_BIT)
    }

    /// Get the lock word with the failed trylock bit set.
    #[inline]
    pub const fn with_failed_trylock(self) -> LockWord {
        LockWord(self.0 | FAILED_TRYLOCK_BIT)
    }

    /// Get the lock word with the failed trylock bit cleared.
    #[inline]
    pub const fn without_failed_trylock(self) -> LockWord {
        LockWord(self.0 & !FAILED_TRYLOCK_BIT)
    }
}

impl fmt::Debug for LockWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockWord")
            .field("owner", &self.owner())
            .field("waiters", &self.has_waiters())
            .field("failed_trylock", &self.has_failed_trylock())
        .finish()
    }
}

impl From<u32> for LockWord {
    fn from(raw: u32) -> Self {
        LockWord(raw)
    }
}

impl From<LockWord> for u32 {
    fn from(word: LockWord) -> Self {
        word.0
    }
}
