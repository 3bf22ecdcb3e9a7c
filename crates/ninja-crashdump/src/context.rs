//! Exception context plumbing between the host's fault hook and the dump
//! writer.

use crate::sys;
use std::ffi::c_void;
use std::marker::PhantomData;
use std::ptr::NonNull;

/// Include data sections of all loaded modules.
pub const MINIDUMP_WITH_DATA_SEGS: u32 = 0x0000_0001;
/// Include the process handle table.
pub const MINIDUMP_WITH_HANDLE_DATA: u32 = 0x0000_0004;

/// Sections requested for every dump. Fixed; no full memory, no user streams.
pub const DUMP_TYPE: u32 = MINIDUMP_WITH_DATA_SEGS | MINIDUMP_WITH_HANDLE_DATA;

/// Fault record supplied by the host's exception hook.
///
/// On Windows this is the `EXCEPTION_POINTERS*` handed to an unhandled
/// exception filter. It is only borrowed: the lifetime ties it to the fault
/// that produced it and the writer never keeps it past the call.
#[derive(Clone, Copy, Debug)]
pub struct ExceptionContext<'a> {
    pointers: NonNull<c_void>,
    _fault: PhantomData<&'a c_void>,
}

impl<'a> ExceptionContext<'a> {
    /// Wrap a raw exception record pointer. Null yields `None`.
    ///
    /// # Safety
    /// `pointers` must reference a valid exception record for `'a`.
    pub unsafe fn from_raw(pointers: *const c_void) -> Option<Self> {
        NonNull::new(pointers as *mut c_void).map(|pointers| Self {
            pointers,
            _fault: PhantomData,
        })
    }

    /// # Safety
    /// `pointers` must be the record handed to the exception filter, valid
    /// for `'a`.
    #[cfg(windows)]
    pub unsafe fn from_exception_pointers(
        pointers: *const windows_sys::Win32::System::Diagnostics::Debug::EXCEPTION_POINTERS,
    ) -> Option<Self> {
        Self::from_raw(pointers.cast())
    }

    pub fn as_ptr(&self) -> *const c_void {
        self.pointers.as_ptr()
    }
}

/// Parameter block for the dump writer, laid out as
/// `MINIDUMP_EXCEPTION_INFORMATION` (4-byte packed).
#[repr(C, packed(4))]
#[derive(Clone, Copy)]
pub struct DumpRequest {
    pub thread_id: u32,
    pub exception_pointers: *const c_void,
    /// Non-zero when the pointers live in another process.
    pub client_pointers: i32,
}

impl DumpRequest {
    /// Request for a fault on the calling thread, pointers in this process.
    pub fn for_current_thread(context: &ExceptionContext<'_>) -> Self {
        Self {
            thread_id: sys::current_thread_id(),
            exception_pointers: context.as_ptr(),
            client_pointers: 0,
        }
    }
}

#[cfg(windows)]
pub use self::capture::CapturedContext;

#[cfg(windows)]
mod capture {
    use super::ExceptionContext;
    use std::marker::PhantomData;
    use std::mem::MaybeUninit;
    use std::ptr::NonNull;
    use windows_sys::Win32::Foundation::STATUS_NONCONTINUABLE_EXCEPTION;
    use windows_sys::Win32::System::Diagnostics::Debug::{
        RtlCaptureContext, CONTEXT, EXCEPTION_POINTERS, EXCEPTION_RECORD,
    };

    /// Exception record and register state of the calling thread, for
    /// snapshots taken outside a real fault.
    pub struct CapturedContext {
        record: EXCEPTION_RECORD,
        context: CONTEXT,
    }

    impl CapturedContext {
        /// Capture the current thread, tagging the record with
        /// `STATUS_NONCONTINUABLE_EXCEPTION`.
        pub fn capture() -> Self {
            Self::capture_with_code(STATUS_NONCONTINUABLE_EXCEPTION)
        }

        pub fn capture_with_code(exception_code: i32) -> Self {
            unsafe {
                let mut record: EXCEPTION_RECORD = std::mem::zeroed();
                record.ExceptionCode = exception_code;

                let mut context = MaybeUninit::<CONTEXT>::zeroed();
                RtlCaptureContext(context.as_mut_ptr());

                Self {
                    record,
                    context: context.assume_init(),
                }
            }
        }

        pub fn exception_code(&self) -> i32 {
            self.record.ExceptionCode
        }

        /// Run `f` with an [`ExceptionContext`] pointing at this capture.
        pub fn with_context<R>(&mut self, f: impl FnOnce(&ExceptionContext<'_>) -> R) -> R {
            let pointers = EXCEPTION_POINTERS {
                ExceptionRecord: &mut self.record,
                ContextRecord: &mut self.context,
            };
            let context = ExceptionContext {
                pointers: NonNull::from(&pointers).cast(),
                _fault: PhantomData,
            };
            f(&context)
        }
    }
}
