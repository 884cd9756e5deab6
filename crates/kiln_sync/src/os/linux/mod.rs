//! Linux specific backends, everything shared with the other unix-likes lives in `os::unix`.

pub mod futex;
