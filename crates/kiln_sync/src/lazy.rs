use core::{
    cell::{Cell, UnsafeCell},
    fmt,
    mem::MaybeUninit,
    ops::Deref,
};
use crate::once_gate::{Direct, OnceGate, OncePublish, Quiescent};

/// A value which is initialized on its first access.
///
/// The initializer runs exactly once, guarded by a [`OnceGate`], every access after that is a single load.
/// When the initializer panics, the `Lazy` is poisoned and every later access panics as well.
pub struct Lazy<T, F = fn() -> T, P: OncePublish = Direct> {
    once  : OnceGate<P>,
    value : UnsafeCell<MaybeUninit<T>>,
    init  : Cell<Option<F>>,
}

// SAFETY: the value is only written once, by the thread running the initializer, before any reference to it is handed out
unsafe impl<T: Send + Sync, F: Send, P: OncePublish> Sync for Lazy<T, F, P> {}

impl<T, F> Lazy<T, F, Direct> {
    /// Create a new lazy value with the given initializing function.
    #[inline]
    pub const fn new(init: F) -> Self {
        Self::with_gate(OnceGate::new(), init)
    }
}

impl<T, F> Lazy<T, F, Quiescent> {
    /// Create a new lazy value with the given initializing function, which publishes the value through the global quiescence counter.
    ///
    /// # Safety
    ///
    /// The same requirements as for [`OnceGate::new_quiescent`] apply to every thread accessing the value.
    #[inline]
    pub const unsafe fn new_quiescent(init: F) -> Self {
        Self::with_gate(OnceGate::new_quiescent(), init)
    }
}

impl<T, F, P: OncePublish> Lazy<T, F, P> {
    #[inline]
    const fn with_gate(once: OnceGate<P>, init: F) -> Self {
        Self {
            once,
            value: UnsafeCell::new(MaybeUninit::uninit()),
            init: Cell::new(Some(init)),
        }
    }

    /// Get the value, if it has been initialized.
    #[inline]
    pub fn get(this: &Self) -> Option<&T> {
        if this.once.is_done() {
            // SAFETY: the gate is done, so the value was written
            Some(unsafe { (*this.value.get()).assume_init_ref() })
        } else {
            None
        }
    }
}

impl<T, F: FnOnce() -> T, P: OncePublish> Lazy<T, F, P> {
    /// Force the evaluation of the lazy value, and return a reference to it.
    ///
    /// This is equivalent to the `Deref` impl, but is explicit.
    ///
    /// # Panics
    ///
    /// Panics when a previous initializer panicked.
    #[inline]
    pub fn force(this: &Self) -> &T {
        this.once.call_once(|| {
            match this.init.take() {
                Some(init) => {
                    let value = init();
                    // SAFETY: only the thread running the body of the gate writes the value
                    unsafe { (*this.value.get()).write(value) };
                },
                None => panic!("Lazy instance has previously been poisoned"),
            }
        });
        // SAFETY: `call_once` only returns when a body completed, and every body writes the value
        unsafe { (*this.value.get()).assume_init_ref() }
    }
}

impl<T, F: FnOnce() -> T, P: OncePublish> Deref for Lazy<T, F, P> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        Lazy::force(self)
    }
}

impl<T: Default> Default for Lazy<T, fn() -> T> {
    fn default() -> Self {
        Self::new(T::default)
    }
}

impl<T: fmt::Debug, F, P: OncePublish> fmt::Debug for Lazy<T, F, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Lazy::get(self) {
            Some(value) => f.debug_tuple("Lazy").field(value).finish(),
            None => f.write_str("Lazy(Uninit)"),
        }
    }
}

impl<T, F, P: OncePublish> Drop for Lazy<T, F, P> {
    fn drop(&mut self) {
        if self.once.is_done() {
            // SAFETY: the gate is done, so the value was written, and it's never dropped anywhere else
            unsafe { self.value.get_mut().assume_init_drop() };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};
    use std::{
        collections::HashMap,
        panic,
        sync::{Arc, Barrier},
        thread,
    };

    #[test]
    fn lazy_static() {
        static MAP : Lazy<HashMap<u32, &'static str>> = Lazy::new(|| {
            let mut map = HashMap::new();
            map.insert(1, "one");
            map.insert(2, "two");
            map
        });

        assert_eq!(MAP.get(&1), Some(&"one"));
        assert_eq!(MAP.len(), 2);
    }

    #[test]
    fn initializes_once() {
        const NUM_THREADS : usize = 8;
        static CALLS : AtomicU32 = AtomicU32::new(0);

        let lazy = Arc::new(Lazy::<u32, _>::new(|| {
            CALLS.fetch_add(1, Ordering::Relaxed);
            92
        }));
        assert_eq!(Lazy::get(&*lazy), None);

        let barrier = Arc::new(Barrier::new(NUM_THREADS));
        let handles = (0..NUM_THREADS).map(|_| {
            let lazy = lazy.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                assert_eq!(**lazy, 92);
            })
        }).collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(CALLS.load(Ordering::Relaxed), 1);
        assert_eq!(Lazy::get(&*lazy), Some(&92));
    }

    #[test]
    fn drops_value() {
        static DROPS : AtomicU32 = AtomicU32::new(0);
        struct Dropper;
        impl Drop for Dropper {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::Relaxed);
            }
        }

        let lazy = Lazy::<Dropper>::new(|| Dropper);
        drop(lazy);
        assert_eq!(DROPS.load(Ordering::Relaxed), 0);

        let lazy = Lazy::<Dropper>::new(|| Dropper);
        Lazy::force(&lazy);
        drop(lazy);
        assert_eq!(DROPS.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn poisoned_after_panic() {
        let lazy = Lazy::<u32, _>::new(|| -> u32 { panic!("init failed") });
        assert!(panic::catch_unwind(panic::AssertUnwindSafe(|| *lazy)).is_err());

        let res = panic::catch_unwind(panic::AssertUnwindSafe(|| *lazy));
        let err = res.unwrap_err();
        assert_eq!(err.downcast_ref::<&str>(), Some(&"Lazy instance has previously been poisoned"));
    }
}
