use core::{
    fmt,
    marker::PhantomData,
    sync::atomic::{fence, AtomicU32, Ordering},
};
use crate::{
    gate::Gate,
    lock_word::{LockWord, FAILED_TRYLOCK_BIT, OWNER_NULL},
    macros::client_crash,
    quiescence,
    thread_id::ThreadId,
    wait::{wait_on_address, wake_by_address_all},
};

/// Value of a once gate which has never been entered.
const UNLOCKED : u32 = OWNER_NULL;
/// Value of a once gate whose body has completed, this can't be a valid owner.
const DONE : u32 = u32::MAX;

/// Number of generations the quiescence counter needs to advance before a quiescing gate is done, in encoded form.
const SAFE_DELTA : u32 = 4 << 2;

#[inline]
const fn encode_generation(gen: u32) -> u32 {
    (gen << 2) | FAILED_TRYLOCK_BIT
}

// The failed trylock bit on its own never appears in the lock word of a once gate, so marks a generation.
#[inline]
const fn is_generation(val: u32) -> bool {
    val & 0b11 == FAILED_TRYLOCK_BIT
}

/// Current state of a [`OnceGate`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OnceState {
    /// The body has not been run yet.
    New,
    /// A thread is currently running the body.
    InProgress,
    /// The body has completed, but not every thread is guaranteed to see this with an unordered load yet.
    Quiescing,
    /// The body has completed.
    Done,
}

impl OnceState {
    /// Returns whether the body has completed.
    #[inline]
    pub fn done(self) -> bool {
        matches!(self, OnceState::Quiescing | OnceState::Done)
    }
}

mod private {
    pub trait Sealed {}
}

/// Strategy used by a [`OnceGate`] to publish the completion of its body.
pub trait OncePublish: private::Sealed {
    /// Check whether the body has completed, synchronizing with it when it has.
    fn is_done(word: &AtomicU32) -> bool;

    /// Mark the body as completed, returns the previous value of the word.
    fn publish(word: &AtomicU32) -> u32;
}

/// Publish completion by a release store of the done value, readers check it with an acquire load.
pub struct Direct;

impl private::Sealed for Direct {}

impl OncePublish for Direct {
    #[inline]
    fn is_done(word: &AtomicU32) -> bool {
        word.load(Ordering::Acquire) == DONE
    }

    #[inline]
    fn publish(word: &AtomicU32) -> u32 {
        word.swap(DONE, Ordering::Release)
    }
}

/// Publish completion by recording the generation of the global [quiescence counter](crate::quiescence).
///
/// Readers that see the generation synchronize with the body using a fence, and check whether the counter has advanced far enough
/// since completion that every context is guaranteed to see the body's writes.
/// Once it has, the word is upgraded to the done value, after which a plain relaxed load is all a reader needs.
///
/// The relaxed fast path is only valid for threads which take part in the global quiescence counter,
/// which is why gates using it can only be created with the unsafe [`OnceGate::new_quiescent`].
/// Until the counter advances, the gate simply stays in the quiescing state, where every read still synchronizes.
pub struct Quiescent;

impl Quiescent {
    #[inline]
    fn mark_done_if_quiesced(word: &AtomicU32, recorded: u32) {
        let now = encode_generation(quiescence::global().generation());
        if now.wrapping_sub(recorded) >= SAFE_DELTA {
            word.store(DONE, Ordering::Relaxed);
        }
    }
}

impl private::Sealed for Quiescent {}

impl OncePublish for Quiescent {
    #[inline]
    fn is_done(word: &AtomicU32) -> bool {
        let val = word.load(Ordering::Relaxed);
        if val == DONE {
            return true;
        }
        if is_generation(val) {
            fence(Ordering::Acquire);
            Self::mark_done_if_quiesced(word, val);
            return true;
        }
        false
    }

    #[inline]
    fn publish(word: &AtomicU32) -> u32 {
        let gen = encode_generation(quiescence::global().generation());
        word.swap(gen, Ordering::Release)
    }
}

/// Runs a body exactly once, for the entire lifetime of the gate.
///
/// The first thread calling [`call_once`](OnceGate::call_once) runs the body, any other thread calling it in the meantime blocks until the body completed.
/// After completion, `call_once` costs a single load, how that load is ordered depends on the publication strategy `P`, see [`Direct`] and [`Quiescent`].
///
/// The state of the gate is stored in a single 32-bit word:
/// - the owner of the gate (with a waiters flag) while the body is running,
/// - the generation of the quiescence counter at completion while quiescing,
/// - a value which can't be any owner, once done.
///
/// When the body panics, the gate is reset to its initial state and waiting threads are woken, so the next caller runs its body.
pub struct OnceGate<P: OncePublish = Direct> {
    word     : AtomicU32,
    _publish : PhantomData<fn() -> P>,
}

impl OnceGate<Direct> {
    /// Create a new once gate.
    #[inline]
    pub const fn new() -> Self {
        Self::with_publish()
    }
}

impl OnceGate<Quiescent> {
    /// Create a new once gate, which publishes the completion of its body through the global quiescence counter.
    ///
    /// # Safety
    ///
    /// Every thread accessing the gate, or anything the body initializes, must be registered with [`quiescence::global`],
    /// from before the body starts running until its last access, and has to keep quiescing while registered.
    /// The registration must happen-before the body starts, e.g. by registering before the thread that may run the body is spawned.
    ///
    /// A thread that doesn't take part in the counter can read the done state without synchronizing with the body.
    #[inline]
    pub const unsafe fn new_quiescent() -> Self {
        Self::with_publish()
    }
}

impl<P: OncePublish> OnceGate<P> {
    #[inline]
    pub(crate) const fn with_publish() -> Self {
        Self { word: AtomicU32::new(UNLOCKED), _publish: PhantomData }
    }

    /// Run `f` if no body ran to completion on this gate yet.
    ///
    /// When this function returns, it's guaranteed that a body ran and completed (not necessarily `f`),
    /// and that all writes done by that body are visible to the calling thread.
    ///
    /// # Panics
    ///
    /// Panics when called from within the body running on this gate.
    #[inline]
    pub fn call_once<F>(&self, f: F)
    where
        F : FnOnce(),
    {
        if P::is_done(&self.word) {
            return;
        }

        let mut f = Some(f);
        self.call_once_slow(&mut || if let Some(f) = f.take() { f() });
    }

    // Non-generic, to avoid monomorphizing the whole slow path per closure.
    #[cold]
    fn call_once_slow(&self, f: &mut dyn FnMut()) {
        loop {
            if self.try_enter() {
                break;
            }
            if self.wait() {
                return;
            }
        }

        // Reset the gate when the body panics, so another thread can try again
        let guard = scopeguard::guard_on_unwind(&self.word, |word| {
            let prev = LockWord::from_raw(word.swap(UNLOCKED, Ordering::Release));
            if prev.has_waiters() {
                wake_by_address_all(word);
            }
        });
        f();
        drop(guard);

        let prev = P::publish(&self.word);
        if prev != LockWord::for_self().into_raw() {
            Gate::broadcast_slow(&self.word, LockWord::from_raw(prev));
        }
    }

    #[inline]
    fn try_enter(&self) -> bool {
        // Entering doesn't need any ordering, the body's writes are published by completing the gate
        let me = LockWord::for_self();
        self.word.compare_exchange(UNLOCKED, me.into_raw(), Ordering::Relaxed, Ordering::Relaxed).is_ok()
    }

    // Returns `true` when the body completed, `false` when the gate was reset by a panicking body.
    fn wait(&self) -> bool {
        let id = ThreadId::current();
        loop {
            if P::is_done(&self.word) {
                return true;
            }

            let raw = self.word.load(Ordering::Relaxed);
            if raw == DONE || is_generation(raw) {
                continue;
            }
            if raw == UNLOCKED {
                return false;
            }

            let cur = LockWord::from_raw(raw);
            if cur.is_locked_by(id) {
                client_crash!("OnceGate", Self::call_once_slow, "trying to lock recursively", raw);
            }

            let waiting = cur.with_waiters();
            if waiting != cur && self.word.compare_exchange_weak(raw, waiting.into_raw(), Ordering::Relaxed, Ordering::Relaxed).is_err() {
                continue;
            }
            _ = wait_on_address(&self.word, waiting.into_raw(), None);
        }
    }

    /// Check whether a body ran to completion on this gate.
    #[inline]
    pub fn is_done(&self) -> bool {
        P::is_done(&self.word)
    }

    /// Get the current state of the gate.
    #[inline]
    pub fn state(&self) -> OnceState {
        match self.word.load(Ordering::Acquire) {
            DONE => OnceState::Done,
            UNLOCKED => OnceState::New,
            val if is_generation(val) => OnceState::Quiescing,
            _ => OnceState::InProgress,
        }
    }
}

impl Default for OnceGate<Direct> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: OncePublish> fmt::Debug for OnceGate<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnceGate")
            .field("state", &self.state())
        .finish()
    }
}
