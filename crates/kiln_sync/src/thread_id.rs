use core::{
    cell::Cell,
    fmt,
    num::NonZeroU32,
    sync::atomic::{AtomicU32, Ordering},
};
use parking_lot::Mutex;
use crate::macros::client_crash;

/// Largest index that can be handed out.
///
/// `MAX_INDEX + 1` would encode to `0xFFFF_FFFC`, which together with both flag bits collides with the done sentinel of a `OnceGate`.
const MAX_INDEX : u32 = (u32::MAX >> 2) - 1;

// Next never-used index, 0 is reserved for the NULL owner.
static NEXT_INDEX : AtomicU32 = AtomicU32::new(1);

// Indices of threads that have exited, ready to be reused.
static FREE_INDICES : Mutex<Vec<u32>> = Mutex::new(Vec::new());

thread_local! {
    // Raw identity of the current thread, 0 when none was allocated yet.
    // This has no destructor, so it stays accessible while other thread-locals are being destroyed.
    static CURRENT : Cell<u32> = const { Cell::new(0) };

    // Returns the identity to the free list when the thread exits.
    static RECLAIM : Reclaim = const { Reclaim };
}

struct Reclaim;

impl Drop for Reclaim {
    fn drop(&mut self) {
        // The identity stays current, so destructors running after this one can still release what they hold
        let raw = CURRENT.with(Cell::get);
        if let Some(id) = ThreadId::from_raw(raw) {
            FREE_INDICES.lock().push(id.index());
        }
    }
}

/// Identity of a live thread, as stored in the owner field of a lock word.
///
/// An identity is never 0 (the NULL owner) and always has its 2 low bits clear, so they can be used as flags by the lock word.
/// Identities are unique among all live threads, but the identity of an exited thread will be reused.
///
/// An identity is reclaimed when the destructor of an internal thread-local runs, and the order in which thread-local destructors run is unspecified.
/// Thread-local destructors running after it still see the same identity, but another thread may already have been handed that identity.
/// Locks, gates and once gates should therefore not be held across, or acquired from, thread-local destructors.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadId(NonZeroU32);

impl ThreadId {
    /// Get the identity of the calling thread.
    #[inline]
    pub fn current() -> ThreadId {
        match ThreadId::from_raw(CURRENT.with(Cell::get)) {
            Some(id) => id,
            None => Self::allocate_current(),
        }
    }

    /// Create an identity from its raw lock word representation.
    ///
    /// Returns `None` if the value is NULL or isn't a valid identity.
    #[inline]
    pub const fn from_raw(raw: u32) -> Option<ThreadId> {
        if raw & 0b11 != 0 || (raw >> 2) > MAX_INDEX {
            return None;
        }
        match NonZeroU32::new(raw) {
            Some(raw) => Some(ThreadId(raw)),
            None => None,
        }
    }

    /// Get the raw representation of the identity, as stored in a lock word.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0.get()
    }

    /// Get the index of the thread, i.e. its identity without the reserved flag bits.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0.get() >> 2
    }

    #[cold]
    fn allocate_current() -> ThreadId {
        let index = match FREE_INDICES.lock().pop() {
            Some(index) => index,
            None => NEXT_INDEX.fetch_add(1, Ordering::Relaxed),
        };
        if index == 0 || index > MAX_INDEX {
            client_crash!("ThreadId", ThreadId::current, "ran out of thread identities", index);
        }

        let id = ThreadId(unsafe { NonZeroU32::new_unchecked(index << 2) });
        CURRENT.with(|cur| cur.set(id.as_u32()));

        // Register the reclaim destructor, when the thread is already tearing down its thread-locals, the identity is never reclaimed.
        _ = RECLAIM.try_with(|_| ());
        id
    }
}

impl fmt::Debug for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ThreadId")
            .field(&self.index())
        .finish()
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.as_u32())
    }
}
