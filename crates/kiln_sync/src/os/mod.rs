//! OS abstractions.
//!
//! Direct OS implementations aren't meant to be used on their own, the usable functionality is exposed by the `wait` and `semaphore` modules.

use cfg_if::cfg_if;

cfg_if!{
    if #[cfg(windows)] {
        pub mod windows;
    } else if #[cfg(any(target_os = "linux", target_os = "android"))] {
        pub mod linux;
        pub mod unix;
    } else if #[cfg(unix)] {
        pub mod unix;
    }
}
