use std::{
    cell::UnsafeCell,
    sync::{
        atomic::{AtomicU32, AtomicUsize, Ordering},
        Arc, Barrier,
    },
    thread,
    time::Duration,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use kiln_sync::{Gate, Lazy, Mutex, OnceGate, ThreadEvent, UnfairLock};

const NUM_THREADS : usize = 8;

// Counter that is only safe to touch while holding the lock next to it
struct Protected {
    lock  : UnfairLock,
    value : UnsafeCell<usize>,
}

unsafe impl Sync for Protected {}

#[test]
fn unfair_lock_counter() {
    const NUM_ITERS : usize = 100_000;

    let shared = Arc::new(Protected { lock: UnfairLock::new(), value: UnsafeCell::new(0) });
    let handles = (0..NUM_THREADS).map(|_| {
        let shared = shared.clone();
        thread::spawn(move || {
            for _ in 0..NUM_ITERS {
                shared.lock.lock();
                unsafe { *shared.value.get() += 1 };
                shared.lock.unlock();
            }
        })
    }).collect::<Vec<_>>();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(unsafe { *shared.value.get() }, NUM_THREADS * NUM_ITERS);
}

#[test]
fn mutex_with_random_hold_times() {
    const NUM_ITERS : usize = 2_000;

    let mutex = Arc::new(Mutex::new(Vec::new()));
    let inside = Arc::new(AtomicU32::new(0));

    let handles = (0..NUM_THREADS).map(|idx| {
        let mutex = mutex.clone();
        let inside = inside.clone();
        thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(idx as u64);
            for i in 0..NUM_ITERS {
                let mut guard = mutex.lock();
                assert_eq!(inside.fetch_add(1, Ordering::Relaxed), 0);
                guard.push((idx, i));
                for _ in 0..rng.gen_range(0..64) {
                    std::hint::spin_loop();
                }
                inside.fetch_sub(1, Ordering::Relaxed);
                drop(guard);

                if rng.gen_ratio(1, 256) {
                    thread::sleep(Duration::from_micros(rng.gen_range(1..200)));
                }
            }
        })
    }).collect::<Vec<_>>();

    for handle in handles {
        handle.join().unwrap();
    }

    let entries = mutex.lock();
    assert_eq!(entries.len(), NUM_THREADS * NUM_ITERS);
    // Entries of a single thread stay in order
    for idx in 0..NUM_THREADS {
        let own = entries.iter().filter(|(thread, _)| *thread == idx).map(|(_, i)| *i).collect::<Vec<_>>();
        assert!(own.windows(2).all(|pair| pair[0] < pair[1]));
    }
}

#[test]
fn try_lock_never_succeeds_while_held() {
    const NUM_ITERS : usize = 20_000;

    let lock = Arc::new(UnfairLock::new());
    let inside = Arc::new(AtomicU32::new(0));
    let acquired = Arc::new(AtomicUsize::new(0));

    let handles = (0..NUM_THREADS).map(|idx| {
        let lock = lock.clone();
        let inside = inside.clone();
        let acquired = acquired.clone();
        thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(0x5eed + idx as u64);
            for _ in 0..NUM_ITERS {
                let locked = if rng.gen_bool(0.5) {
                    lock.lock();
                    true
                } else {
                    match lock.try_lock_with_owner() {
                        Ok(()) => true,
                        Err(owner) => {
                            assert_ne!(owner, kiln_sync::ThreadId::current());
                            false
                        },
                    }
                };

                if locked {
                    assert_eq!(inside.fetch_add(1, Ordering::Relaxed), 0);
                    acquired.fetch_add(1, Ordering::Relaxed);
                    inside.fetch_sub(1, Ordering::Relaxed);
                    lock.unlock();
                }
            }
        })
    }).collect::<Vec<_>>();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(acquired.load(Ordering::Relaxed) >= NUM_THREADS * NUM_ITERS / 2);
    assert!(!lock.is_locked());
}

#[test]
fn repeated_gate_cycles() {
    const NUM_CYCLES : usize = 200;

    for _ in 0..NUM_CYCLES {
        let gate = Arc::new(Gate::new());
        let barrier = Arc::new(Barrier::new(NUM_THREADS));
        let passed = Arc::new(AtomicU32::new(0));
        let entered = Arc::new(AtomicU32::new(0));

        let handles = (0..NUM_THREADS).map(|_| {
            let gate = gate.clone();
            let barrier = barrier.clone();
            let passed = passed.clone();
            let entered = entered.clone();
            thread::spawn(move || {
                barrier.wait();
                if gate.try_enter() {
                    entered.fetch_add(1, Ordering::Relaxed);
                    thread::yield_now();
                    gate.broadcast();
                } else {
                    gate.wait();
                }
                passed.fetch_add(1, Ordering::Relaxed);
            })
        }).collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(passed.load(Ordering::Relaxed), NUM_THREADS as u32);
        assert!(entered.load(Ordering::Relaxed) >= 1);
        assert!(!gate.is_entered());
    }
}

#[test]
fn once_gate_many_instances() {
    const NUM_GATES : usize = 500;

    let gates = Arc::new((0..NUM_GATES).map(|_| (OnceGate::<kiln_sync::Direct>::new(), AtomicU32::new(0))).collect::<Vec<_>>());
    let handles = (0..NUM_THREADS).map(|idx| {
        let gates = gates.clone();
        thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(idx as u64);
            for _ in 0..NUM_GATES * 4 {
                let (gate, runs) = &gates[rng.gen_range(0..NUM_GATES)];
                gate.call_once(|| {
                    runs.fetch_add(1, Ordering::Relaxed);
                });
                assert_eq!(runs.load(Ordering::Relaxed), 1);
            }
        })
    }).collect::<Vec<_>>();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(gates.iter().all(|(gate, runs)| !gate.is_done() || runs.load(Ordering::Relaxed) == 1));
}

#[test]
fn lazy_shared_between_threads() {
    static TABLE : Lazy<Vec<u32>> = Lazy::new(|| (0..1024).map(|x| x * x).collect());

    let handles = (0..NUM_THREADS).map(|idx| {
        thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(idx as u64);
            for _ in 0..1000 {
                let i = rng.gen_range(0..1024u32);
                assert_eq!(TABLE[i as usize], i * i);
            }
        })
    }).collect::<Vec<_>>();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn thread_events_with_random_order() {
    const NUM_EVENTS : usize = 2_000;

    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..NUM_EVENTS {
        let event = Arc::new(ThreadEvent::new());
        let delay_signal = rng.gen_bool(0.5);
        let spins = rng.gen_range(0..2000);

        let signaller = {
            let event = event.clone();
            thread::spawn(move || {
                if delay_signal {
                    for _ in 0..spins {
                        std::hint::spin_loop();
                    }
                }
                event.signal();
            })
        };

        if !delay_signal {
            for _ in 0..spins {
                std::hint::spin_loop();
            }
        }
        event.wait();
        signaller.join().unwrap();
    }
}
