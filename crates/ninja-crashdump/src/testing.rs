//! Test doubles for hosts exercising their crash path.
//!
//! - [`RecordingLog`] captures what the writer reports.
//! - [`fake_write_dump`] / [`failing_write_dump`] stand in for
//!   `MiniDumpWriteDump` through [`crate::Capability::Linked`] and record
//!   the arguments they were called with.
//!
//! The recorded call is process-global; tests that inspect it take
//! [`serial`] first.

use crate::context::DumpRequest;
use crate::log::DumpLog;
use crate::sys::RawHandle;
use std::ffi::c_void;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard};

/// `MINIDUMP_SIGNATURE`, "MDMP" little-endian.
pub const MINIDUMP_SIGNATURE: u32 = 0x504d_444d;
/// `MINIDUMP_VERSION` in the low word of the header version field.
pub const MINIDUMP_VERSION: u32 = 0xa793;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Log sink that keeps every message.
#[derive(Debug, Default)]
pub struct RecordingLog {
    entries: Mutex<Vec<(Severity, String)>>,
}

impl RecordingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Severity, String)> {
        self.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.with_severity(Severity::Error)
    }

    pub fn warnings(&self) -> Vec<String> {
        self.with_severity(Severity::Warning)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn with_severity(&self, severity: Severity) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, m)| m.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(Severity, String)>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DumpLog for RecordingLog {
    fn error(&self, message: fmt::Arguments<'_>) {
        self.lock().push((Severity::Error, message.to_string()));
    }

    fn warning(&self, message: fmt::Arguments<'_>) {
        self.lock().push((Severity::Warning, message.to_string()));
    }
}

/// Arguments seen by the last fake writer call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedCall {
    pub process_id: u32,
    pub dump_type: u32,
    /// `(thread_id, exception_pointers, client_pointers)` when a request was passed.
    pub request: Option<(u32, usize, i32)>,
    pub user_stream_is_null: bool,
    pub callback_is_null: bool,
}

static SERIAL: Mutex<()> = Mutex::new(());
static LAST_CALL: Mutex<Option<RecordedCall>> = Mutex::new(None);

/// Serialize tests that share the recorded call.
pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

/// Take the call recorded by the last fake writer, if any.
pub fn take_last_call() -> Option<RecordedCall> {
    LAST_CALL.lock().unwrap_or_else(|e| e.into_inner()).take()
}

/// 32-byte `MINIDUMP_HEADER` with no streams.
pub fn minidump_header(dump_type: u32) -> [u8; 32] {
    let mut header = [0u8; 32];
    header[0..4].copy_from_slice(&MINIDUMP_SIGNATURE.to_le_bytes());
    header[4..8].copy_from_slice(&MINIDUMP_VERSION.to_le_bytes());
    // NumberOfStreams = 0, StreamDirectoryRva = end of header
    header[12..16].copy_from_slice(&32u32.to_le_bytes());
    header[24..32].copy_from_slice(&u64::from(dump_type).to_le_bytes());
    header
}

unsafe fn record(
    process_id: u32,
    dump_type: u32,
    exception: *const DumpRequest,
    user_stream: *const c_void,
    callback: *const c_void,
) {
    let request = if exception.is_null() {
        None
    } else {
        let r = std::ptr::read_unaligned(exception);
        Some((r.thread_id, r.exception_pointers as usize, r.client_pointers))
    };
    *LAST_CALL.lock().unwrap_or_else(|e| e.into_inner()) = Some(RecordedCall {
        process_id,
        dump_type,
        request,
        user_stream_is_null: user_stream.is_null(),
        callback_is_null: callback.is_null(),
    });
}

/// Write `bytes` to a handle the writer owns, without closing it.
unsafe fn write_to_handle(file: RawHandle, bytes: &[u8]) -> bool {
    #[cfg(unix)]
    let file = {
        use std::os::unix::io::FromRawFd;
        ManuallyDrop::new(File::from_raw_fd(file as isize as i32))
    };
    #[cfg(windows)]
    let file = {
        use std::os::windows::io::FromRawHandle;
        ManuallyDrop::new(File::from_raw_handle(file))
    };
    (&*file).write_all(bytes).is_ok()
}

/// Stand-in for `MiniDumpWriteDump` that writes a bare header.
///
/// # Safety
/// `file` must be an open, writable handle.
pub unsafe extern "system" fn fake_write_dump(
    _process: RawHandle,
    process_id: u32,
    file: RawHandle,
    dump_type: u32,
    exception: *const DumpRequest,
    user_stream: *const c_void,
    callback: *const c_void,
) -> i32 {
    record(process_id, dump_type, exception, user_stream, callback);
    write_to_handle(file, &minidump_header(dump_type)) as i32
}

/// Stand-in that writes a truncated header and reports failure.
///
/// # Safety
/// `file` must be an open, writable handle.
pub unsafe extern "system" fn failing_write_dump(
    _process: RawHandle,
    process_id: u32,
    file: RawHandle,
    dump_type: u32,
    exception: *const DumpRequest,
    user_stream: *const c_void,
    callback: *const c_void,
) -> i32 {
    record(process_id, dump_type, exception, user_stream, callback);
    write_to_handle(file, &minidump_header(dump_type)[..8]);
    0
}
