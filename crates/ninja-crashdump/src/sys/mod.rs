//! Platform layer.
//!
//! Both backends expose the same set of free functions so the dump sequence
//! in [`crate::writer`] is written once. Windows talks to kernel32 through
//! `windows-sys`; Unix goes through `libc` and the dynamic loader.

use std::ffi::c_void;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub(crate) use self::unix::*;
#[cfg(unix)]
pub use self::unix::NativeChar;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub(crate) use self::windows::*;
#[cfg(windows)]
pub use self::windows::NativeChar;

/// OS handle as passed to the dump writer.
///
/// A `HANDLE` on Windows. On Unix the file descriptor is stored in the
/// pointer value and the process handle is null.
pub type RawHandle = *mut c_void;

/// Open dump file. Closed on drop.
pub(crate) struct DumpFile {
    raw: RawHandle,
}

impl DumpFile {
    pub(crate) fn raw(&self) -> RawHandle {
        self.raw
    }
}

impl Drop for DumpFile {
    fn drop(&mut self) {
        close_file(self.raw);
    }
}
