// Portions of the project have been copied from parking_lot and is copyrighted by Amanieu d'Antra under the MIT license (located in: '3rd-party-licenses/parking_lot')
use core::hint::spin_loop;
use std::thread;

// Wastes some CPU time for the given number or iterations, using a hint to indicate to the CPU that we are spinning
#[inline]
fn cpu_relax(iterations: u32) {
    for _ in 0..iterations {
        spin_loop()
    }
}

/// A counter used to perform exponential backoff in spin loops
#[derive(Default)]
pub struct SpinWait {
    counter: u32,
}

impl SpinWait {
    /// Number of spins after which `spin` stops spinning.
    const SLEEP_THRESHOLD : u32 = 10;

    /// Creates a new `SpinWait`
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spins until the sleep threshold has been reached.
    ///
    /// This function returns wether the sleep threshold has been reached, at which point further spinning has diminishing returns and the thread should block in the kernel instead.
    ///
    /// The spin strategy will initially use a CPU-bound loop, but will fall back to yielding he CPU to the OS after a few iterations.
    #[inline]
    pub fn spin(&mut self) -> bool {
        if self.counter >= Self::SLEEP_THRESHOLD {
            return false;
        }

        self.counter += 1;
        if self.counter <= 3 {
            cpu_relax(1 << self.counter);
        } else {
            thread::yield_now();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::SpinWait;

    #[test]
    fn reaches_threshold() {
        let mut spin_wait = SpinWait::new();
        let mut spins = 0;
        while spin_wait.spin() {
            spins += 1;
        }
        assert_eq!(spins, 10);
        assert!(!spin_wait.spin());
    }
}
