// Thin wrappers around the kiln_logging macros, so the `logging` feature can compile all diagnostics out.

#[cfg(feature = "logging")]
pub(crate) const LOG_CAT : kiln_logging::LogCategory = kiln_logging::LogCategory::new("Sync");

macro_rules! sync_severe {
    ($sub:expr, $func:expr, $($arg:expr),+) => {
        #[cfg(feature = "logging")]
        { kiln_logging::log_severe!($crate::macros::LOG_CAT.with_sub($sub), $func, $($arg),+); }
    };
}

macro_rules! sync_verbose {
    ($sub:expr, $($arg:expr),+) => {
        #[cfg(feature = "logging")]
        { kiln_logging::log_verbose!($crate::macros::LOG_CAT.with_sub($sub), $($arg),+); }
    };
}

macro_rules! sync_debug {
    ($sub:expr, $func:expr, $($arg:expr),+) => {
        #[cfg(feature = "logging")]
        { kiln_logging::log_debug!($crate::macros::LOG_CAT.with_sub($sub), $func, $($arg),+); }
    };
}

/// Report a client contract violation.
///
/// These are never recoverable: the message is logged as severe and the calling thread panics.
macro_rules! client_crash {
    ($sub:expr, $func:expr, $msg:literal) => {{
        $crate::macros::sync_severe!($sub, $func, $msg);
        panic!($msg)
    }};
    ($sub:expr, $func:expr, $msg:literal, $value:expr) => {{
        let value = $value;
        $crate::macros::sync_severe!($sub, $func, "{} (value: {:#x})", $msg, value);
        panic!("{} (value: {:#x})", $msg, value)
    }};
}

pub(crate) use {sync_severe, sync_verbose, sync_debug, client_crash};
