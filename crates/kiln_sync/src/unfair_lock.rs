use core::{
    fmt,
    sync::atomic::{fence, AtomicU32, Ordering},
};
use crate::{
    lock_word::{LockWord, OWNER_NULL},
    macros::client_crash,
    thread_id::ThreadId,
    wait::{wait_on_address, wake_by_address_one, SpinWait},
};

/// Unfair mutual exclusion lock, stored in a single 32-bit word.
///
/// The word contains the [`ThreadId`] of the owning thread, so the lock can only be unlocked by the thread that locked it,
/// and locking it recursively is detected.
///
/// # Fairness
///
/// The lock makes no attempt at being fair: when the lock is released while there are waiters,
/// any thread can grab it before the woken up waiter gets to run.
/// This avoids handing the lock off to a thread which isn't running yet, keeping the throughput high and the number of kernel transitions low,
/// at the cost of possibly starving waiters under heavy contention.
///
/// Locking an uncontended lock, and unlocking a lock without waiters, is a single atomic operation.
pub struct UnfairLock {
    word : AtomicU32,
}

impl UnfairLock {
    /// Create a new unlocked lock.
    #[inline]
    pub const fn new() -> Self {
        Self { word: AtomicU32::new(OWNER_NULL) }
    }

    #[inline]
    fn load(&self) -> LockWord {
        LockWord::from_raw(self.word.load(Ordering::Relaxed))
    }

    /// Acquire the lock, blocking the current thread until it's able to do so.
    ///
    /// # Panics
    ///
    /// Panics when the lock is already held by the current thread.
    #[inline]
    pub fn lock(&self) {
        let id = ThreadId::current();
        let me = LockWord::for_identity(id);
        if self.word.compare_exchange(OWNER_NULL, me.into_raw(), Ordering::Acquire, Ordering::Relaxed).is_err() {
            self.lock_slow(id);
        }
    }

    #[cold]
    fn lock_slow(&self, id: ThreadId) {
        let me = LockWord::for_identity(id);
        // A woken waiter can't know whether it was the last one, so it re-acquires with the waiters bit set
        let mut next = me;
        let mut spin_wait = SpinWait::new();
        let mut cur = self.load();

        loop {
            if !cur.is_locked() {
                match self.word.compare_exchange_weak(cur.into_raw(), next.into_raw(), Ordering::Acquire, Ordering::Relaxed) {
                    Ok(_) => return,
                    Err(val) => {
                        cur = LockWord::from_raw(val);
                        continue;
                    },
                }
            }

            if cur.is_locked_by(id) {
                client_crash!("UnfairLock", UnfairLock::lock, "trying to lock recursively", cur.into_raw());
            }

            // Spin for a bit, as long as nobody is blocked yet
            if !cur.has_waiters() && spin_wait.spin() {
                cur = self.load();
                continue;
            }

            let waiting = cur.with_waiters();
            if waiting != cur {
                if let Err(val) = self.word.compare_exchange_weak(cur.into_raw(), waiting.into_raw(), Ordering::Relaxed, Ordering::Relaxed) {
                    cur = LockWord::from_raw(val);
                    continue;
                }
            }

            _ = wait_on_address(&self.word, waiting.into_raw(), None);
            next = me.with_waiters();
            cur = self.load();
        }
    }

    /// Try to acquire the lock without blocking.
    ///
    /// On failure, the owner of the lock is returned and the failed attempt is recorded in the lock,
    /// which the owner can observe using [`unlock_had_failed_trylock`](Self::unlock_had_failed_trylock) or [`try_unlock`](Self::try_unlock).
    #[inline]
    pub fn try_lock_with_owner(&self) -> Result<(), ThreadId> {
        let me = LockWord::for_self();
        let mut cur = self.load();
        loop {
            let (new, res) = match cur.owner() {
                None => (me, Ok(())),
                Some(owner) => (cur.with_failed_trylock(), Err(owner)),
            };
            if new == cur {
                return res;
            }

            match self.word.compare_exchange_weak(cur.into_raw(), new.into_raw(), Ordering::Acquire, Ordering::Relaxed) {
                Ok(_) => return res,
                Err(val) => cur = LockWord::from_raw(val),
            }
        }
    }

    /// Try to acquire the lock without blocking, returns `true` if the lock was acquired.
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.try_lock_with_owner().is_ok()
    }

    /// Release the lock.
    ///
    /// # Panics
    ///
    /// Panics when the lock is not held by the current thread.
    #[inline]
    pub fn unlock(&self) {
        _ = self.unlock_had_failed_trylock();
    }

    /// Release the lock, and return whether a [`try_lock`](Self::try_lock) failed while it was held.
    ///
    /// # Panics
    ///
    /// Panics when the lock is not held by the current thread.
    #[inline]
    pub fn unlock_had_failed_trylock(&self) -> bool {
        let me = LockWord::for_self();
        if self.word.compare_exchange(me.into_raw(), OWNER_NULL, Ordering::Release, Ordering::Relaxed).is_ok() {
            return false;
        }
        self.unlock_slow()
    }

    #[cold]
    fn unlock_slow(&self) -> bool {
        let cur = self.load();
        if !cur.is_locked_by_self() {
            client_crash!("UnfairLock", UnfairLock::unlock, "lock not owned by current thread", cur.into_raw());
        }

        let prev = LockWord::from_raw(self.word.swap(OWNER_NULL, Ordering::Release));
        if prev.has_waiters() {
            wake_by_address_one(&self.word);
        }
        prev.has_failed_trylock()
    }

    /// Release the lock, unless a [`try_lock`](Self::try_lock) failed while it was held.
    ///
    /// When a `try_lock` failed, only that record is cleared and `false` is returned: the lock is still held by the current thread.
    /// This allows the owner to re-check state which the failed thread may have published before giving the lock up.
    ///
    /// # Panics
    ///
    /// Panics when the lock is not held by the current thread.
    pub fn try_unlock(&self) -> bool {
        let mut cur = self.load();
        loop {
            if !cur.is_locked_by_self() {
                client_crash!("UnfairLock", UnfairLock::try_unlock, "lock not owned by current thread", cur.into_raw());
            }

            let new = if cur.has_failed_trylock() { cur.without_failed_trylock() } else { LockWord::UNLOCKED };
            match self.word.compare_exchange_weak(cur.into_raw(), new.into_raw(), Ordering::Release, Ordering::Relaxed) {
                Ok(_) => break,
                Err(val) => cur = LockWord::from_raw(val),
            }
        }

        if cur.has_failed_trylock() {
            // We keep the lock, so we need to see whatever the failed thread did before its attempt
            fence(Ordering::Acquire);
            return false;
        }
        if cur.has_waiters() {
            wake_by_address_one(&self.word);
        }
        true
    }

    /// Check if the lock is currently held by any thread.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.load().is_locked()
    }

    /// Check if the lock is currently held by the current thread.
    #[inline]
    pub fn is_locked_by_self(&self) -> bool {
        self.load().is_locked_by_self()
    }

    /// Get the current owner of the lock.
    #[inline]
    pub fn owner(&self) -> Option<ThreadId> {
        self.load().owner()
    }

    /// Assert that the lock is held by the current thread.
    ///
    /// # Panics
    ///
    /// Panics when the lock is not held by the current thread.
    #[inline]
    pub fn assert_owner(&self) {
        let cur = self.load();
        if !cur.is_locked_by_self() {
            client_crash!("UnfairLock", UnfairLock::assert_owner, "lock not owned by current thread", cur.into_raw());
        }
    }
}

impl Default for UnfairLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UnfairLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnfairLock")
            .field("word", &self.load())
        .finish()
    }
}

unsafe impl lock_api::RawMutex for UnfairLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self::new();

    // The lock word records the owning thread, a guard can't be unlocked on another thread
    type GuardMarker = lock_api::GuardNoSend;

    #[inline]
    fn lock(&self) {
        UnfairLock::lock(self)
    }

    #[inline]
    fn try_lock(&self) -> bool {
        UnfairLock::try_lock(self)
    }

    #[inline]
    unsafe fn unlock(&self) {
        UnfairLock::unlock(self)
    }

    #[inline]
    fn is_locked(&self) -> bool {
        UnfairLock::is_locked(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::{mpsc, Arc},
        thread,
        time::Duration,
    };

    #[test]
    fn lock_unlock() {
        let lock = UnfairLock::new();
        assert!(!lock.is_locked());
        assert_eq!(lock.owner(), None);

        lock.lock();
        assert!(lock.is_locked());
        assert!(lock.is_locked_by_self());
        assert_eq!(lock.owner(), Some(ThreadId::current()));
        lock.assert_owner();

        lock.unlock();
        assert!(!lock.is_locked());
        assert!(lock.try_lock());
        lock.unlock();
    }

    #[test]
    fn try_lock_reports_owner() {
        let lock = Arc::new(UnfairLock::new());
        lock.lock();
        let owner = ThreadId::current();

        let res = {
            let lock = lock.clone();
            thread::spawn(move || lock.try_lock_with_owner()).join().unwrap()
        };
        assert_eq!(res, Err(owner));
        assert!(lock.unlock_had_failed_trylock());

        lock.lock();
        assert!(!lock.unlock_had_failed_trylock());
    }

    #[test]
    fn try_unlock_keeps_lock_after_failed_trylock() {
        let lock = Arc::new(UnfairLock::new());
        lock.lock();
        {
            let lock = lock.clone();
            assert!(!thread::spawn(move || lock.try_lock()).join().unwrap());
        }

        assert!(!lock.try_unlock());
        assert!(lock.is_locked_by_self());
        assert!(lock.try_unlock());
        assert!(!lock.is_locked());
    }

    #[test]
    fn mutual_exclusion() {
        const NUM_THREADS : usize = 8;
        const NUM_ITERS : usize = 10_000;

        let lock = Arc::new(UnfairLock::new());
        let inside = Arc::new(AtomicU32::new(0));
        let total = Arc::new(AtomicU32::new(0));

        let handles = (0..NUM_THREADS).map(|_| {
            let lock = lock.clone();
            let inside = inside.clone();
            let total = total.clone();
            thread::spawn(move || {
                for _ in 0..NUM_ITERS {
                    lock.lock();
                    assert_eq!(inside.fetch_add(1, Ordering::Relaxed), 0);
                    total.store(total.load(Ordering::Relaxed) + 1, Ordering::Relaxed);
                    inside.fetch_sub(1, Ordering::Relaxed);
                    lock.unlock();
                }
            })
        }).collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(total.load(Ordering::Relaxed) as usize, NUM_THREADS * NUM_ITERS);
        assert!(!lock.is_locked());
    }

    #[test]
    fn waiter_gets_lock_after_unlock() {
        let lock = Arc::new(UnfairLock::new());
        lock.lock();

        let (sender, receiver) = mpsc::channel();
        let handle = {
            let lock = lock.clone();
            thread::spawn(move || {
                lock.lock();
                sender.send(()).unwrap();
                lock.unlock();
            })
        };

        thread::sleep(Duration::from_millis(20));
        assert!(receiver.try_recv().is_err());
        lock.unlock();
        receiver.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
    }

    #[test]
    #[should_panic(expected = "trying to lock recursively")]
    fn recursive_lock_panics() {
        let lock = UnfairLock::new();
        lock.lock();
        lock.lock();
    }

    #[test]
    #[should_panic(expected = "lock not owned by current thread")]
    fn unlock_unlocked_panics() {
        let lock = UnfairLock::new();
        lock.unlock();
    }

    #[test]
    fn unlock_from_other_thread_panics() {
        let lock = Arc::new(UnfairLock::new());
        lock.lock();
        let res = {
            let lock = lock.clone();
            thread::spawn(move || lock.unlock()).join()
        };
        assert!(res.is_err());
        assert!(lock.is_locked_by_self());
        lock.unlock();
    }
}
