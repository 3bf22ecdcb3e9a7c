use crate::buffer::StackWriter;
use crate::path::PathDisplay;
use crate::sys;
use std::fmt;

/// Capacity of the text captured with an [`OsError`].
pub const OS_ERROR_TEXT_CAPACITY: usize = 256;

/// OS error code plus its message, captured at the point of failure.
///
/// The text is rendered into an inline buffer so that neither capturing nor
/// displaying the error allocates.
#[derive(Clone, Copy)]
pub struct OsError {
    code: i32,
    text: [u8; OS_ERROR_TEXT_CAPACITY],
    len: usize,
}

impl OsError {
    /// The calling thread's last OS error (`GetLastError` / `errno`).
    pub fn last() -> Self {
        Self::from_code(sys::last_error_code())
    }

    pub fn from_code(code: i32) -> Self {
        Self::with_text(code, |w| sys::describe_error(code, w))
    }

    /// Error carrying loader-provided text rather than a system message.
    pub(crate) fn with_text(code: i32, render: impl FnOnce(&mut StackWriter<'_>)) -> Self {
        let mut text = [0u8; OS_ERROR_TEXT_CAPACITY];
        let len = {
            let mut writer = StackWriter::new(&mut text);
            render(&mut writer);
            writer.len()
        };
        Self { code, text, len }
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.text[..self.len]).unwrap_or("")
    }

    /// The target did not exist.
    pub fn is_not_found(&self) -> bool {
        self.code == sys::ERROR_NOT_FOUND
    }
}

impl fmt::Display for OsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len == 0 {
            return write!(f, "os error {}", self.code);
        }
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for OsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OsError")
            .field("code", &self.code)
            .field("message", &self.as_str())
            .finish()
    }
}

impl std::error::Error for OsError {}

/// Why a dump was not produced.
///
/// Every variant is terminal for the call that hit it. Names and paths are
/// borrowed from the writer and its path buffer, so rendering the message
/// does not allocate.
#[derive(Debug, thiserror::Error)]
pub enum DumpError<'a> {
    #[error("failed to create minidump: resolve temp directory: {source}")]
    TempDir { source: OsError },

    #[error("failed to create minidump: dump path does not fit in {capacity} characters")]
    PathTooLong { capacity: usize },

    #[error("failed to create minidump: dump directory contains a NUL character")]
    InvalidPath,

    #[error("failed to create minidump: load module '{module}': {source}")]
    LoadModule { module: &'a str, source: OsError },

    #[error("failed to create minidump: resolve '{entry_point}': {source}")]
    ResolveEntryPoint { entry_point: &'a str, source: OsError },

    #[error("failed to create minidump: create file '{path}': {source}")]
    CreateFile { path: PathDisplay<'a>, source: OsError },

    #[error("{writer} failed: {source}")]
    WriteDump { writer: &'a str, source: OsError },
}

impl DumpError<'_> {
    /// The dump capability could not be obtained (module or export missing).
    pub fn is_capability_unavailable(&self) -> bool {
        matches!(
            self,
            DumpError::LoadModule { .. } | DumpError::ResolveEntryPoint { .. }
        )
    }
}
