//! # ninja-crashdump
//!
//! Crash-time minidump writer. When the host process hits a fatal
//! exception, [`create_mini_dump`] writes
//! `<temp>/ninja_crash_dump_<pid>.dmp` using the OS dump facility
//! (`MiniDumpWriteDump` from `dbghelp.dll`), resolved at runtime so a
//! missing module is reported instead of preventing the program from
//! starting.
//!
//! # Fault-path rules
//!
//! This code runs while the process may be corrupted:
//! - no heap allocation: paths, names and messages use fixed stack buffers
//! - no panics, no error propagation: every failure is logged and the call
//!   returns
//! - no locks, no recursion, no calls back into host code
//!
//! Configuration ([`DumpOptions`], [`DumpWriter::from_config`]) is read when
//! the handler is installed, never inside the handler.
//!
//! ```ignore
//! // inside an unhandled-exception filter
//! let context = unsafe { ExceptionContext::from_exception_pointers(info) };
//! ninja_crashdump::create_mini_dump(context.as_ref());
//! ```

pub mod buffer;
pub mod capability;
pub mod context;
pub mod error;
pub mod log;
pub mod path;
mod sys;
pub mod testing;
pub mod writer;

pub use capability::{Capability, DumpCapability, Module, WriteDumpFn};
#[cfg(windows)]
pub use context::CapturedContext;
pub use context::{DumpRequest, ExceptionContext, DUMP_TYPE};
pub use error::{DumpError, OsError};
pub use log::{DumpLog, TracingLog};
pub use path::{DumpPath, PathDisplay};
pub use sys::{NativeChar, RawHandle};
pub use writer::{DumpOptions, DumpWriter};

/// Write a minidump with the default capability (`dbghelp.dll`) into the
/// system temp directory, reporting through `tracing`.
pub fn create_mini_dump(context: Option<&ExceptionContext<'_>>) {
    DumpWriter::default().create_mini_dump(context);
}
