//! Dump file path construction in a fixed-capacity native buffer.
//!
//! The path is built as `<dir><sep>ninja_crash_dump_<pid>.dmp` directly in
//! the OS's native encoding (UTF-16 on Windows, bytes on Unix) and kept
//! NUL-terminated so it can be handed to the OS without conversion.

use crate::error::DumpError;
use crate::sys::{self, NativeChar};
use std::ffi::OsStr;
use std::fmt;
use std::path::PathBuf;

/// Capacity of [`DumpPath`] in native characters, terminator included.
pub const DUMP_PATH_CAPACITY: usize = sys::PATH_CAPACITY;

pub const DUMP_FILE_PREFIX: &str = "ninja_crash_dump_";
pub const DUMP_FILE_EXTENSION: &str = ".dmp";

/// Dump file location, stored inline.
#[derive(Clone)]
pub struct DumpPath {
    buf: [NativeChar; DUMP_PATH_CAPACITY],
    len: usize,
    overflowed: bool,
    interior_nul: bool,
}

impl DumpPath {
    fn empty() -> Self {
        Self {
            buf: [0; DUMP_PATH_CAPACITY],
            len: 0,
            overflowed: false,
            interior_nul: false,
        }
    }

    /// Path of the dump for `pid` inside `directory`, or inside the system
    /// temp directory when `directory` is `None`.
    pub fn build(directory: Option<&OsStr>, pid: u32) -> Result<Self, DumpError<'static>> {
        let mut path = Self::empty();
        match directory {
            Some(dir) => path.push_units(sys::encode_os_str(dir)),
            None => sys::temp_dir(&mut path).map_err(|source| DumpError::TempDir { source })?,
        }

        if path.len > 0 && !sys::is_separator(path.buf[path.len - 1]) {
            path.push_units(std::iter::once(sys::SEPARATOR));
        }
        let _ = fmt::Write::write_fmt(
            &mut path,
            format_args!("{DUMP_FILE_PREFIX}{pid}{DUMP_FILE_EXTENSION}"),
        );

        // The OS would stop reading at the first NUL and act on a different file.
        if path.interior_nul {
            return Err(DumpError::InvalidPath);
        }
        if path.overflowed {
            return Err(DumpError::PathTooLong {
                capacity: DUMP_PATH_CAPACITY - 1,
            });
        }
        Ok(path)
    }

    /// Append native units, keeping one slot free for the terminator.
    ///
    /// Stops at the first NUL unit and marks the path invalid.
    pub(crate) fn push_units(&mut self, units: impl IntoIterator<Item = NativeChar>) {
        for unit in units {
            if unit == 0 {
                self.interior_nul = true;
                return;
            }
            if self.len + 1 >= DUMP_PATH_CAPACITY {
                self.overflowed = true;
                return;
            }
            self.buf[self.len] = unit;
            self.len += 1;
        }
    }

    /// Native units without the terminator.
    pub fn as_native(&self) -> &[NativeChar] {
        &self.buf[..self.len]
    }

    /// NUL-terminated native string for OS calls.
    pub(crate) fn as_nul_ptr(&self) -> *const NativeChar {
        debug_assert_eq!(self.buf[self.len], 0);
        self.buf.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Lossy, allocation-free display adapter.
    pub fn display(&self) -> PathDisplay<'_> {
        PathDisplay(self.as_native())
    }

    /// Owned copy of the path. Allocates; not for use while handling a fault.
    pub fn to_path_buf(&self) -> PathBuf {
        sys::decode_path(self.as_native())
    }
}

impl fmt::Write for DumpPath {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_units(sys::encode_str(s));
        if self.overflowed || self.interior_nul {
            return Err(fmt::Error);
        }
        Ok(())
    }
}

impl fmt::Debug for DumpPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DumpPath({:?})", self.display())
    }
}

/// Borrowed view of a native path that renders it as text.
#[derive(Clone, Copy)]
pub struct PathDisplay<'a>(&'a [NativeChar]);

impl fmt::Display for PathDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        sys::write_native(self.0, f)
    }
}

impl fmt::Debug for PathDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn names_file_after_pid() {
        let dir = std::env::temp_dir();
        let path = DumpPath::build(Some(dir.as_os_str()), 4242).unwrap();
        assert_eq!(path.to_path_buf(), dir.join("ninja_crash_dump_4242.dmp"));
    }

    #[test]
    fn same_pid_gives_same_path() {
        let a = DumpPath::build(None, 17).unwrap();
        let b = DumpPath::build(None, 17).unwrap();
        assert_eq!(a.as_native(), b.as_native());
    }

    #[test]
    fn system_temp_dir_is_used_by_default() {
        let path = DumpPath::build(None, 9).unwrap().to_path_buf();
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("ninja_crash_dump_9.dmp")
        );
        assert!(path.is_absolute());
    }

    #[test]
    fn existing_separator_is_not_doubled() {
        let mut dir = std::env::temp_dir().into_os_string();
        dir.push(std::path::MAIN_SEPARATOR_STR);
        let path = DumpPath::build(Some(&dir), 1).unwrap();
        let text = path.display().to_string();
        let doubled = format!(
            "{sep}{sep}ninja_crash_dump_1.dmp",
            sep = std::path::MAIN_SEPARATOR
        );
        assert!(!text.ends_with(&doubled), "{text}");
        assert!(text.ends_with("ninja_crash_dump_1.dmp"));
    }

    #[test]
    fn overlong_directory_is_rejected() {
        let long = "d".repeat(DUMP_PATH_CAPACITY);
        let err = DumpPath::build(Some(OsStr::new(&long)), 1).unwrap_err();
        assert!(matches!(err, DumpError::PathTooLong { .. }));
    }

    #[test]
    fn directory_that_only_just_fits_is_rejected_without_room_for_name() {
        let fill = "d".repeat(DUMP_PATH_CAPACITY - 8);
        assert!(DumpPath::build(Some(OsStr::new(&fill)), 1).is_err());
    }

    #[test]
    fn nul_in_directory_is_rejected() {
        let err = DumpPath::build(Some(OsStr::new("victim\0dumps")), 1).unwrap_err();
        assert!(matches!(err, DumpError::InvalidPath));
        assert!(err.to_string().contains("NUL"));
    }

    #[test]
    fn trailing_nul_is_rejected_too() {
        assert!(matches!(
            DumpPath::build(Some(OsStr::new("dumps\0")), 1),
            Err(DumpError::InvalidPath)
        ));
    }

    #[test]
    fn display_matches_path_buf() {
        let path = DumpPath::build(Some(OsStr::new("dumps")), 3).unwrap();
        assert_eq!(
            Path::new(&path.display().to_string()),
            path.to_path_buf().as_path()
        );
        assert_eq!(path.len(), path.as_native().len());
        assert!(!path.is_empty());
    }
}
