use windows::Win32::Foundation::GetLastError;

pub mod wait_on_address;

mod semaphore;
pub use semaphore::Win32Semaphore;

/// Get the last OS error of the calling thread
pub(crate) fn errno() -> u32 {
    unsafe { GetLastError().0 }
}
