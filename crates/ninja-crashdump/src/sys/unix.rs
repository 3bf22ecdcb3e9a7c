use super::{DumpFile, RawHandle};
use crate::buffer::StackWriter;
use crate::error::OsError;
use crate::path::DumpPath;
use std::ffi::{c_void, CStr, OsStr};
use std::fmt::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use std::ptr::NonNull;

/// Unit of a native path string.
pub type NativeChar = u8;

pub(crate) const PATH_CAPACITY: usize = libc::PATH_MAX as usize;
pub(crate) const SEPARATOR: NativeChar = b'/';
pub(crate) const ERROR_NOT_FOUND: i32 = libc::ENOENT;

/// Longest module or symbol name accepted, terminator included.
const NAME_CAPACITY: usize = 256;
const DEFAULT_TEMP_DIR: &[u8] = b"/tmp";

pub(crate) fn is_separator(unit: NativeChar) -> bool {
    unit == SEPARATOR
}

pub(crate) fn encode_str(s: &str) -> impl Iterator<Item = NativeChar> + '_ {
    s.bytes()
}

pub(crate) fn encode_os_str(s: &OsStr) -> impl Iterator<Item = NativeChar> + '_ {
    s.as_bytes().iter().copied()
}

pub(crate) fn decode_path(units: &[NativeChar]) -> PathBuf {
    PathBuf::from(OsStr::from_bytes(units))
}

pub(crate) fn write_native(units: &[NativeChar], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write_lossy(units, f)
}

fn write_lossy(bytes: &[u8], w: &mut impl Write) -> fmt::Result {
    for chunk in bytes.utf8_chunks() {
        w.write_str(chunk.valid())?;
        if !chunk.invalid().is_empty() {
            w.write_char(char::REPLACEMENT_CHARACTER)?;
        }
    }
    Ok(())
}

/// `$TMPDIR`, falling back to `/tmp`. Read in place; nothing is copied out
/// of the environment block.
pub(crate) fn temp_dir(path: &mut DumpPath) -> Result<(), OsError> {
    let value = unsafe { libc::getenv(c"TMPDIR".as_ptr()) };
    let dir = if value.is_null() {
        DEFAULT_TEMP_DIR
    } else {
        match unsafe { CStr::from_ptr(value) }.to_bytes() {
            [] => DEFAULT_TEMP_DIR,
            bytes => bytes,
        }
    };
    path.push_units(dir.iter().copied());
    Ok(())
}

pub(crate) fn current_process() -> RawHandle {
    std::ptr::null_mut()
}

pub(crate) fn current_process_id() -> u32 {
    std::process::id()
}

#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) fn current_thread_id() -> u32 {
    unsafe { libc::syscall(libc::SYS_gettid) as u32 }
}

#[cfg(target_os = "macos")]
pub(crate) fn current_thread_id() -> u32 {
    let mut tid: u64 = 0;
    unsafe {
        libc::pthread_threadid_np(0, &mut tid);
    }
    tid as u32
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "macos")))]
pub(crate) fn current_thread_id() -> u32 {
    unsafe { libc::pthread_self() as usize as u32 }
}

pub(crate) fn last_error_code() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

pub(crate) fn describe_error(code: i32, w: &mut StackWriter<'_>) {
    let mut buf = [0 as libc::c_char; 256];
    let rc = unsafe { libc::strerror_r(code, buf.as_mut_ptr(), buf.len()) };
    if rc == 0 {
        let text = unsafe { CStr::from_ptr(buf.as_ptr()) };
        let _ = write_lossy(text.to_bytes(), w);
        let _ = write!(w, " (os error {code})");
    } else {
        let _ = write!(w, "os error {code}");
    }
}

pub(crate) fn delete_file(path: &DumpPath) -> Result<(), OsError> {
    let rc = unsafe { libc::unlink(path.as_nul_ptr().cast()) };
    if rc != 0 {
        return Err(OsError::last());
    }
    Ok(())
}

pub(crate) fn create_file(path: &DumpPath) -> Result<DumpFile, OsError> {
    let fd = unsafe {
        libc::open(
            path.as_nul_ptr().cast(),
            libc::O_RDWR | libc::O_CREAT | libc::O_TRUNC | libc::O_CLOEXEC,
            0o600 as libc::c_uint,
        )
    };
    if fd < 0 {
        return Err(OsError::last());
    }
    Ok(DumpFile {
        raw: fd as isize as RawHandle,
    })
}

pub(crate) fn close_file(raw: RawHandle) {
    unsafe {
        libc::close(raw as isize as libc::c_int);
    }
}

/// Copy `name` into `buf` as a C string.
fn c_name<'b>(name: &str, buf: &'b mut [u8; NAME_CAPACITY]) -> Result<&'b CStr, OsError> {
    let bytes = name.as_bytes();
    if bytes.len() >= NAME_CAPACITY {
        return Err(OsError::from_code(libc::ENAMETOOLONG));
    }
    buf[..bytes.len()].copy_from_slice(bytes);
    buf[bytes.len()] = 0;
    CStr::from_bytes_with_nul(&buf[..=bytes.len()]).map_err(|_| OsError::from_code(libc::EINVAL))
}

fn loader_error(fallback: &str) -> OsError {
    let msg = unsafe { libc::dlerror() };
    OsError::with_text(0, |w| {
        if msg.is_null() {
            let _ = w.write_str(fallback);
        } else {
            let _ = write_lossy(unsafe { CStr::from_ptr(msg) }.to_bytes(), w);
        }
    })
}

pub(crate) fn load_module(name: &str) -> Result<NonNull<c_void>, OsError> {
    let mut buf = [0u8; NAME_CAPACITY];
    let c_name = c_name(name, &mut buf)?;
    let handle = unsafe { libc::dlopen(c_name.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
    NonNull::new(handle).ok_or_else(|| loader_error("module not found"))
}

pub(crate) fn resolve_symbol(module: NonNull<c_void>, name: &str) -> Result<NonNull<c_void>, OsError> {
    let mut buf = [0u8; NAME_CAPACITY];
    let c_name = c_name(name, &mut buf)?;
    unsafe {
        // Clear any stale loader error so a null result is attributed correctly.
        libc::dlerror();
        let sym = libc::dlsym(module.as_ptr(), c_name.as_ptr());
        NonNull::new(sym).ok_or_else(|| loader_error("symbol not found"))
    }
}

pub(crate) fn unload_module(module: NonNull<c_void>) {
    unsafe {
        libc::dlclose(module.as_ptr());
    }
}
