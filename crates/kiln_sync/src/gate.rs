use core::{
    fmt,
    sync::atomic::{fence, AtomicU32, Ordering},
};
use crate::{
    lock_word::{LockWord, OWNER_NULL},
    macros::client_crash,
    thread_id::ThreadId,
    wait::{wait_on_address, wake_by_address_all},
};

/// Single admission gate.
///
/// One thread enters the gate with [`try_enter`](Gate::try_enter), every other thread that wants to pass [`wait`](Gate::wait)s,
/// until the entered thread [`broadcast`](Gate::broadcast)s, which releases all waiting threads at once.
/// After the broadcast, the gate is back in its initial state and can be entered again.
///
/// Entering and broadcasting without any waiters is a single atomic operation each.
pub struct Gate {
    word : AtomicU32,
}

impl Gate {
    /// Create a new gate, which nobody has entered.
    #[inline]
    pub const fn new() -> Self {
        Self { word: AtomicU32::new(OWNER_NULL) }
    }

    /// Try to enter the gate, returns `true` if the current thread is now the only thread in the gate.
    #[inline]
    pub fn try_enter(&self) -> bool {
        let me = LockWord::for_self();
        self.word.compare_exchange(OWNER_NULL, me.into_raw(), Ordering::Acquire, Ordering::Relaxed).is_ok()
    }

    /// Open the gate again, releasing all threads waiting on it.
    ///
    /// # Panics
    ///
    /// Panics when the gate was not entered by the current thread.
    #[inline]
    pub fn broadcast(&self) {
        // Only the owner changes the owner field, so it can be checked before opening the gate
        let cur = LockWord::from_raw(self.word.load(Ordering::Relaxed));
        if !cur.is_locked_by_self() {
            Self::not_owner(cur);
        }

        let prev = LockWord::from_raw(self.word.swap(OWNER_NULL, Ordering::Release));
        if prev.has_waiters() {
            wake_by_address_all(&self.word);
        }
    }

    #[cold]
    fn not_owner(cur: LockWord) -> ! {
        client_crash!("Gate", Gate::broadcast, "gate not owned by current thread", cur.into_raw());
    }

    /// Wake-up path of a once gate whose word was already swapped from `prev`: validates the previous owner and wakes all waiters.
    #[cold]
    pub(crate) fn broadcast_slow(word: &AtomicU32, prev: LockWord) {
        if !prev.is_locked_by_self() {
            client_crash!("Gate", Gate::broadcast, "gate not owned by current thread", prev.into_raw());
        }
        if prev.has_waiters() {
            wake_by_address_all(word);
        }
    }

    /// Block until the gate has been broadcast, without entering it.
    ///
    /// Returns immediately when the gate isn't entered.
    ///
    /// # Panics
    ///
    /// Panics when the gate is entered by the current thread, as it would never be opened.
    pub fn wait(&self) {
        let id = ThreadId::current();
        let mut cur = LockWord::from_raw(self.word.load(Ordering::Relaxed));
        loop {
            if !cur.is_locked() {
                // Synchronize with the broadcast
                fence(Ordering::Acquire);
                return;
            }
            if cur.is_locked_by(id) {
                client_crash!("Gate", Gate::wait, "trying to lock recursively", cur.into_raw());
            }

            let waiting = cur.with_waiters();
            if waiting != cur {
                if let Err(val) = self.word.compare_exchange_weak(cur.into_raw(), waiting.into_raw(), Ordering::Relaxed, Ordering::Relaxed) {
                    cur = LockWord::from_raw(val);
                    continue;
                }
            }

            _ = wait_on_address(&self.word, waiting.into_raw(), None);
            cur = LockWord::from_raw(self.word.load(Ordering::Relaxed));
        }
    }

    /// Check if the gate is currently entered by any thread.
    #[inline]
    pub fn is_entered(&self) -> bool {
        LockWord::from_raw(self.word.load(Ordering::Relaxed)).is_locked()
    }

    /// Get the thread currently in the gate.
    #[inline]
    pub fn owner(&self) -> Option<ThreadId> {
        LockWord::from_raw(self.word.load(Ordering::Relaxed)).owner()
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gate")
            .field("word", &LockWord::from_raw(self.word.load(Ordering::Relaxed)))
        .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::{Arc, Barrier},
        thread,
        time::Duration,
    };

    #[test]
    fn enter_broadcast_cycle() {
        let gate = Gate::new();
        assert!(!gate.is_entered());
        gate.wait();

        assert!(gate.try_enter());
        assert!(gate.is_entered());
        assert_eq!(gate.owner(), Some(ThreadId::current()));
        assert!(!gate.try_enter());

        gate.broadcast();
        assert!(!gate.is_entered());
        assert!(gate.try_enter());
        gate.broadcast();
    }

    #[test]
    fn single_admission_and_broadcast() {
        const NUM_THREADS : usize = 8;
        let gate = Arc::new(Gate::new());
        let barrier = Arc::new(Barrier::new(NUM_THREADS));
        let attempted = Arc::new(AtomicU32::new(0));
        let admitted = Arc::new(AtomicU32::new(0));
        let released = Arc::new(AtomicU32::new(0));

        let handles = (0..NUM_THREADS).map(|_| {
            let gate = gate.clone();
            let barrier = barrier.clone();
            let attempted = attempted.clone();
            let admitted = admitted.clone();
            let released = released.clone();
            thread::spawn(move || {
                barrier.wait();
                let entered = gate.try_enter();
                attempted.fetch_add(1, Ordering::Relaxed);
                if entered {
                    admitted.fetch_add(1, Ordering::Relaxed);
                    while attempted.load(Ordering::Relaxed) != NUM_THREADS as u32 {
                        thread::yield_now();
                    }
                    // Give the losers time to block
                    thread::sleep(Duration::from_millis(20));
                    released.store(1, Ordering::Relaxed);
                    gate.broadcast();
                } else {
                    gate.wait();
                    // Only a broadcast lets a waiter through, and the store happened before it
                    assert_eq!(released.load(Ordering::Relaxed), 1);
                }
            })
        }).collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(admitted.load(Ordering::Relaxed), 1);
        assert!(!gate.is_entered());
    }

    #[test]
    #[should_panic(expected = "trying to lock recursively")]
    fn wait_on_own_gate_panics() {
        let gate = Gate::new();
        assert!(gate.try_enter());
        gate.wait();
    }

    #[test]
    fn foreign_broadcast_leaves_gate_entered() {
        let gate = Arc::new(Gate::new());
        assert!(gate.try_enter());

        let other = {
            let gate = gate.clone();
            thread::spawn(move || gate.broadcast())
        };
        assert!(other.join().is_err());
        assert!(gate.is_entered());
        assert_eq!(gate.owner(), Some(ThreadId::current()));

        let waiter = {
            let gate = gate.clone();
            thread::spawn(move || gate.wait())
        };
        thread::sleep(Duration::from_millis(20));
        gate.broadcast();
        waiter.join().unwrap();
        assert!(!gate.is_entered());
    }

    #[test]
    #[should_panic(expected = "gate not owned by current thread")]
    fn broadcast_without_enter_panics() {
        let gate = Gate::new();
        gate.broadcast();
    }
}
