use cfg_if::cfg_if;

cfg_if!{
    // Apple platforms never implemented unnamed POSIX semaphores, `sem_init` always fails there
    if #[cfg(not(target_vendor = "apple"))] {
        mod semaphore;
        pub use semaphore::PosixSemaphore;
    }
}

/// Get the last OS error of the calling thread
pub(crate) fn errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}
