//! Quiescence counter.
//!
//! Every execution context (generally a worker thread) that takes part registers itself with a counter,
//! and periodically calls [`QuiescentCounter::quiesce`] at a point where it doesn't hold on to any shared state.
//! Each time all registered contexts have quiesced, the counter's generation is incremented.
//!
//! Every quiesce is an acquire-release operation on the counter, so once the generation has moved on, every context has passed through
//! a barrier after any write that happened before the generation was read. A [`OnceGate<Quiescent>`](crate::once_gate::Quiescent) uses this to
//! let its readers get away with an unordered load.

use core::{
    fmt,
    sync::atomic::{AtomicU32, AtomicU64, Ordering},
};
use crate::macros::client_crash;

/// Maximum number of contexts registered with a single counter.
pub const MAX_CONTEXTS : usize = 63;

// Set in the quiesced mask while the context completing a round advances the generation.
const ROUND_CLOSED : u64 = 1 << 63;
// Bits that can be handed out to contexts.
const CONTEXT_BITS : u64 = !ROUND_CLOSED;

/// Registration of an execution context with a [`QuiescentCounter`].
#[derive(PartialEq, Eq, Debug)]
pub struct QuiescentContext {
    bit : u64,
}

impl QuiescentContext {
    /// Index of the context in its counter.
    #[inline]
    pub fn index(&self) -> u32 {
        self.bit.trailing_zeros()
    }
}

/// Counter which advances each time all registered execution contexts have quiesced.
///
/// The context completing a round stores the new generation before reopening the round with a release store,
/// so between two consecutive quiesces a context can only ever observe two successive generations.
pub struct QuiescentCounter {
    generation : AtomicU32,
    // Contexts which quiesced in the current round, or `ROUND_CLOSED` while the round is being completed
    mask       : AtomicU64,
    // Registered contexts
    full_mask  : AtomicU64,
}

impl QuiescentCounter {
    /// Create a counter without any registered contexts.
    pub const fn new() -> Self {
        Self {
            generation: AtomicU32::new(0),
            mask: AtomicU64::new(0),
            full_mask: AtomicU64::new(0),
        }
    }

    /// Register a new execution context.
    ///
    /// The current generation can only advance once the new context has quiesced.
    ///
    /// # Panics
    ///
    /// Panics when [`MAX_CONTEXTS`] contexts are already registered.
    pub fn register(&self) -> QuiescentContext {
        let mut full = self.full_mask.load(Ordering::Relaxed);
        loop {
            if full == CONTEXT_BITS {
                client_crash!("Quiescence", QuiescentCounter::register, "too many quiescent contexts", full);
            }

            // Lowest free bit
            let bit = !full & full.wrapping_add(1);
            match self.full_mask.compare_exchange_weak(full, full | bit, Ordering::SeqCst, Ordering::Relaxed) {
                Ok(_) => return QuiescentContext { bit },
                Err(cur) => full = cur,
            }
        }
    }

    /// Unregister an execution context.
    ///
    /// # Panics
    ///
    /// Panics when the context isn't registered with this counter.
    pub fn unregister(&self, ctx: QuiescentContext) {
        let full = self.full_mask.fetch_and(!ctx.bit, Ordering::SeqCst);
        if full & ctx.bit == 0 {
            client_crash!("Quiescence", QuiescentCounter::unregister, "quiescent context not registered", ctx.bit);
        }

        // All remaining contexts may have quiesced already
        let mask = self.mask.fetch_and(!ctx.bit, Ordering::SeqCst);
        self.try_complete_round(mask & !ctx.bit);
    }

    /// Mark the context as quiesced, advancing the generation when it's the last one to do so.
    #[inline]
    pub fn quiesce(&self, ctx: &QuiescentContext) {
        let prev = self.mask.fetch_or(ctx.bit, Ordering::SeqCst);
        self.try_complete_round(prev | ctx.bit);
    }

    // `mask` is the value of the quiesced mask right after the caller's own update of it.
    fn try_complete_round(&self, mask: u64) {
        if mask & ROUND_CLOSED != 0 {
            return;
        }
        let full = self.full_mask.load(Ordering::SeqCst);
        if full == 0 || mask & full != full {
            return;
        }

        // Only one context can close the round, any later update of the mask retries with its own value
        if self.mask.compare_exchange(mask, ROUND_CLOSED, Ordering::AcqRel, Ordering::Relaxed).is_err() {
            return;
        }
        let gen = self.generation.load(Ordering::Relaxed);
        self.generation.store(gen.wrapping_add(1), Ordering::Relaxed);
        // Reopen the round, publishing the new generation to the next quiesce of every context
        self.mask.store(0, Ordering::Release);
    }

    /// Get the current generation.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Get the number of registered contexts.
    #[inline]
    pub fn num_contexts(&self) -> u32 {
        self.full_mask.load(Ordering::Relaxed).count_ones()
    }
}

impl Default for QuiescentCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QuiescentCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuiescentCounter")
            .field("generation", &self.generation())
            .field("mask", &format_args!("{:#x}", self.mask.load(Ordering::Relaxed)))
            .field("full_mask", &format_args!("{:#x}", self.full_mask.load(Ordering::Relaxed)))
        .finish()
    }
}

static GLOBAL : QuiescentCounter = QuiescentCounter::new();

/// Get the process wide quiescence counter.
#[inline]
pub fn global() -> &'static QuiescentCounter {
    &GLOBAL
}
