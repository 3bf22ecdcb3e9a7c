use super::{DumpFile, RawHandle};
use crate::buffer::StackWriter;
use crate::error::OsError;
use crate::path::DumpPath;
use std::ffi::{c_void, OsStr, OsString};
use std::fmt::{self, Write};
use std::os::windows::ffi::{OsStrExt, OsStringExt};
use std::path::PathBuf;
use std::ptr::{self, NonNull};
use windows_sys::Win32::Foundation::{
    CloseHandle, FreeLibrary, GetLastError, ERROR_FILENAME_EXCED_RANGE, ERROR_FILE_NOT_FOUND,
    ERROR_INVALID_NAME, GENERIC_READ, GENERIC_WRITE, INVALID_HANDLE_VALUE, MAX_PATH,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, DeleteFileW, GetTempPathW, CREATE_ALWAYS, FILE_ATTRIBUTE_NORMAL,
};
use windows_sys::Win32::System::Diagnostics::Debug::{
    FormatMessageW, FORMAT_MESSAGE_FROM_SYSTEM, FORMAT_MESSAGE_IGNORE_INSERTS,
};
use windows_sys::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};
use windows_sys::Win32::System::Threading::{
    GetCurrentProcess, GetCurrentProcessId, GetCurrentThreadId,
};

/// Unit of a native path string.
pub type NativeChar = u16;

pub(crate) const PATH_CAPACITY: usize = MAX_PATH as usize;
pub(crate) const SEPARATOR: NativeChar = b'\\' as u16;
pub(crate) const ERROR_NOT_FOUND: i32 = ERROR_FILE_NOT_FOUND as i32;

/// Longest module or symbol name accepted, terminator included.
const NAME_CAPACITY: usize = 256;

pub(crate) fn is_separator(unit: NativeChar) -> bool {
    unit == SEPARATOR || unit == b'/' as u16
}

pub(crate) fn encode_str(s: &str) -> impl Iterator<Item = NativeChar> + '_ {
    s.encode_utf16()
}

pub(crate) fn encode_os_str(s: &OsStr) -> impl Iterator<Item = NativeChar> + '_ {
    s.encode_wide()
}

pub(crate) fn decode_path(units: &[NativeChar]) -> PathBuf {
    PathBuf::from(OsString::from_wide(units))
}

pub(crate) fn write_native(units: &[NativeChar], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write_wide_lossy(units, f)
}

fn write_wide_lossy(units: &[u16], w: &mut impl Write) -> fmt::Result {
    for c in char::decode_utf16(units.iter().copied()) {
        w.write_char(c.unwrap_or(char::REPLACEMENT_CHARACTER))?;
    }
    Ok(())
}

/// `GetTempPathW`, which already ends in a separator.
pub(crate) fn temp_dir(path: &mut DumpPath) -> Result<(), OsError> {
    let mut buf = [0u16; PATH_CAPACITY + 1];
    let len = unsafe { GetTempPathW(buf.len() as u32, buf.as_mut_ptr()) } as usize;
    if len == 0 {
        return Err(OsError::last());
    }
    if len > buf.len() {
        // The return value is the size that would have been needed.
        return Err(OsError::from_code(ERROR_FILENAME_EXCED_RANGE as i32));
    }
    path.push_units(buf[..len].iter().copied());
    Ok(())
}

pub(crate) fn current_process() -> RawHandle {
    unsafe { GetCurrentProcess() }
}

pub(crate) fn current_process_id() -> u32 {
    unsafe { GetCurrentProcessId() }
}

pub(crate) fn current_thread_id() -> u32 {
    unsafe { GetCurrentThreadId() }
}

pub(crate) fn last_error_code() -> i32 {
    unsafe { GetLastError() as i32 }
}

pub(crate) fn describe_error(code: i32, w: &mut StackWriter<'_>) {
    let mut buf = [0u16; 256];
    let len = unsafe {
        FormatMessageW(
            FORMAT_MESSAGE_FROM_SYSTEM | FORMAT_MESSAGE_IGNORE_INSERTS,
            ptr::null(),
            code as u32,
            0,
            buf.as_mut_ptr(),
            buf.len() as u32,
            ptr::null(),
        )
    } as usize;

    // System messages end in ".\r\n".
    let mut text = &buf[..len.min(buf.len())];
    while let [rest @ .., last] = text {
        if matches!(*last, 0x0d | 0x0a | 0x20 | 0x2e) {
            text = rest;
        } else {
            break;
        }
    }

    if text.is_empty() {
        let _ = write!(w, "os error {code}");
    } else {
        let _ = write_wide_lossy(text, w);
        let _ = write!(w, " (os error {code})");
    }
}

pub(crate) fn delete_file(path: &DumpPath) -> Result<(), OsError> {
    if unsafe { DeleteFileW(path.as_nul_ptr()) } == 0 {
        return Err(OsError::last());
    }
    Ok(())
}

/// Exclusive (share mode 0), always truncated.
pub(crate) fn create_file(path: &DumpPath) -> Result<DumpFile, OsError> {
    let handle = unsafe {
        CreateFileW(
            path.as_nul_ptr(),
            GENERIC_READ | GENERIC_WRITE,
            0,
            ptr::null(),
            CREATE_ALWAYS,
            FILE_ATTRIBUTE_NORMAL,
            ptr::null_mut(),
        )
    };
    if handle == INVALID_HANDLE_VALUE || handle.is_null() {
        return Err(OsError::last());
    }
    Ok(DumpFile { raw: handle })
}

pub(crate) fn close_file(raw: RawHandle) {
    unsafe {
        CloseHandle(raw);
    }
}

pub(crate) fn load_module(name: &str) -> Result<NonNull<c_void>, OsError> {
    let mut buf = [0u16; NAME_CAPACITY];
    let mut len = 0;
    for unit in name.encode_utf16() {
        if unit == 0 {
            return Err(OsError::from_code(ERROR_INVALID_NAME as i32));
        }
        if len + 1 >= NAME_CAPACITY {
            return Err(OsError::from_code(ERROR_FILENAME_EXCED_RANGE as i32));
        }
        buf[len] = unit;
        len += 1;
    }
    let handle = unsafe { LoadLibraryW(buf.as_ptr()) };
    NonNull::new(handle).ok_or_else(OsError::last)
}

pub(crate) fn resolve_symbol(module: NonNull<c_void>, name: &str) -> Result<NonNull<c_void>, OsError> {
    let bytes = name.as_bytes();
    if bytes.contains(&0) {
        return Err(OsError::from_code(ERROR_INVALID_NAME as i32));
    }
    if bytes.len() >= NAME_CAPACITY {
        return Err(OsError::from_code(ERROR_FILENAME_EXCED_RANGE as i32));
    }
    let mut buf = [0u8; NAME_CAPACITY];
    buf[..bytes.len()].copy_from_slice(bytes);

    let proc = unsafe { GetProcAddress(module.as_ptr(), buf.as_ptr()) };
    match proc {
        Some(f) => NonNull::new(f as *mut c_void).ok_or_else(OsError::last),
        None => Err(OsError::last()),
    }
}

pub(crate) fn unload_module(module: NonNull<c_void>) {
    unsafe {
        FreeLibrary(module.as_ptr());
    }
}
