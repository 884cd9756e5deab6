use core::fmt;
use std::time::{Duration, Instant};

/// Error returned by a wait with a deadline
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum WaitError {
    /// The deadline passed before the wait was satisfied, nothing was changed by the wait
    Timeout,
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitError::Timeout => f.write_str("wait timed out"),
        }
    }
}

impl std::error::Error for WaitError {}

pub type WaitResult = Result<(), WaitError>;

/// Time left until `deadline`, `None` if it already passed.
#[inline]
pub(crate) fn time_until(deadline: Instant) -> Option<Duration> {
    let now = Instant::now();
    if deadline <= now {
        None
    } else {
        Some(deadline - now)
    }
}

/// Convert a duration into whole milliseconds, rounding up, for OS calls taking a millisecond timeout.
///
/// Durations which can't be represented are clamped to `u32::MAX - 1`, `u32::MAX` generally means 'infinite'.
#[inline]
pub(crate) fn duration_to_millis(dur: Duration) -> u32 {
    dur.as_secs()
        .checked_mul(1000)
        .and_then(|x| x.checked_add((dur.subsec_nanos() as u64 + 999_999) / 1_000_000))
        .map_or(u32::MAX - 1, |ms| ms.min(u32::MAX as u64 - 1) as u32)
}
