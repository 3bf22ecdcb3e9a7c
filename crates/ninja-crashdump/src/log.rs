//! Reporting sink for the dump writer.

use crate::buffer::StackWriter;
use ninja_crashdump_config::{log_dump_error, log_dump_warn};
use std::fmt;

/// Size of the buffer messages are rendered into before reaching `tracing`.
pub const MESSAGE_CAPACITY: usize = 1024;

/// Where the writer reports its outcome. One call per dump: `error` for the
/// first failed step, `warning` for a written dump.
pub trait DumpLog {
    fn error(&self, message: fmt::Arguments<'_>);
    fn warning(&self, message: fmt::Arguments<'_>);
}

/// Forwards to `tracing` with `component = "MINIDUMP"`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl DumpLog for TracingLog {
    fn error(&self, message: fmt::Arguments<'_>) {
        let mut buf = [0u8; MESSAGE_CAPACITY];
        let mut detail = StackWriter::new(&mut buf);
        let _ = fmt::Write::write_fmt(&mut detail, message);
        log_dump_error!(
            "minidump not written",
            detail = detail.as_str(),
            truncated = detail.is_truncated()
        );
    }

    fn warning(&self, message: fmt::Arguments<'_>) {
        let mut buf = [0u8; MESSAGE_CAPACITY];
        let mut detail = StackWriter::new(&mut buf);
        let _ = fmt::Write::write_fmt(&mut detail, message);
        log_dump_warn!(
            "minidump written",
            detail = detail.as_str(),
            truncated = detail.is_truncated()
        );
    }
}

impl<L: DumpLog + ?Sized> DumpLog for &L {
    fn error(&self, message: fmt::Arguments<'_>) {
        (**self).error(message)
    }

    fn warning(&self, message: fmt::Arguments<'_>) {
        (**self).warning(message)
    }
}
