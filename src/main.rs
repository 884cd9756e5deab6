use std::{
    env,
    process,
    sync::Arc,
    thread,
    time::Instant,
};
use kiln_logging::{log_error, log_info, set_logger, LogCategory, LogLevel, Logger};
use kiln_sync::{
    quiescence,
    Lazy, Mutex, OnceGate, Quiescent, ThreadEvent,
};

pub const LOG_CAT : LogCategory = LogCategory::new("Main");

static LOGGER : Logger = Logger::new();

// Shared configuration, published through the quiescence counter, so the workers read it with a relaxed load once it settled.
// SAFETY: only accessed by the workers of `once_stress`, which are registered before they're spawned
static CONFIG : Lazy<Vec<u64>, fn() -> Vec<u64>, Quiescent> = unsafe { Lazy::new_quiescent(|| (1..=8).collect()) };

struct Settings {
    num_threads : usize,
    num_iters   : usize,
}

fn parse_settings() -> Settings {
    let mut args = env::args().skip(1);
    // Every worker registers with the quiescence counter
    let num_threads = args.next().and_then(|arg| arg.parse::<usize>().ok()).unwrap_or(8).clamp(1, quiescence::MAX_CONTEXTS);
    let num_iters = args.next().and_then(|arg| arg.parse().ok()).unwrap_or(100_000);
    Settings { num_threads, num_iters }
}

fn mutex_stress(settings: &Settings) -> bool {
    let counter = Arc::new(Mutex::new(0usize));
    let start = Instant::now();

    let handles = (0..settings.num_threads).map(|_| {
        let counter = counter.clone();
        let num_iters = settings.num_iters;
        thread::spawn(move || {
            for _ in 0..num_iters {
                *counter.lock() += 1;
            }
        })
    }).collect::<Vec<_>>();

    let mut ok = true;
    for handle in handles {
        ok &= handle.join().is_ok();
    }

    let expected = settings.num_threads * settings.num_iters;
    let total = *counter.lock();
    log_info!(LOG_CAT, "mutex: {} threads x {} increments = {} in {:?}", settings.num_threads, settings.num_iters, total, start.elapsed());
    if total != expected {
        log_error!(LOG_CAT, mutex_stress, "mutex: expected {}, got {}", expected, total);
        ok = false;
    }
    ok
}

fn once_stress(settings: &Settings) -> bool {
    // SAFETY: every worker touching the gate is registered before it's spawned, and quiesces until it's done with the gate
    let once = Arc::new(unsafe { OnceGate::new_quiescent() });
    let runs = Arc::new(Mutex::new(0u32));
    let start = Instant::now();

    let counter = quiescence::global();
    let contexts = (0..settings.num_threads).map(|_| counter.register()).collect::<Vec<_>>();
    let handles = contexts.into_iter().map(|ctx| {
        let once = once.clone();
        let runs = runs.clone();
        let num_iters = settings.num_iters;
        thread::spawn(move || {
            let mut sum = 0;
            for _ in 0..num_iters {
                once.call_once(|| *runs.lock() += 1);
                sum += CONFIG.iter().sum::<u64>();
                counter.quiesce(&ctx);
            }
            counter.unregister(ctx);
            sum
        })
    }).collect::<Vec<_>>();

    let mut ok = true;
    for handle in handles {
        match handle.join() {
            Ok(sum) => ok &= sum == 36 * settings.num_iters as u64,
            Err(_) => ok = false,
        }
    }

    let runs = *runs.lock();
    log_info!(LOG_CAT, "once: body ran {} time(s), state {:?}, generation {} in {:?}", runs, once.state(), quiescence::global().generation(), start.elapsed());
    if runs != 1 {
        log_error!(LOG_CAT, once_stress, "once: body ran {} times", runs);
        ok = false;
    }
    ok
}

fn event_ping_pong(settings: &Settings) -> bool {
    let start = Instant::now();
    let num_rounds = settings.num_iters / 100;

    for _ in 0..num_rounds {
        let ping = Arc::new(ThreadEvent::new());
        let pong = Arc::new(ThreadEvent::new());

        let handle = {
            let ping = ping.clone();
            let pong = pong.clone();
            thread::spawn(move || {
                ping.wait();
                pong.signal();
            })
        };

        ping.signal();
        pong.wait();
        if handle.join().is_err() {
            log_error!(LOG_CAT, event_ping_pong, "thread event: ping-pong thread panicked");
            return false;
        }
    }

    log_info!(LOG_CAT, "thread event: {} round trips in {:?}", num_rounds, start.elapsed());
    true
}

fn main() {
    set_logger(&LOGGER);
    LOGGER.set_max_level(LogLevel::Verbose);

    let settings = parse_settings();
    let mut ok = true;
    ok &= mutex_stress(&settings);
    ok &= once_stress(&settings);
    ok &= event_ping_pong(&settings);

    LOGGER.flush();
    if !ok {
        process::exit(1);
    }
}
