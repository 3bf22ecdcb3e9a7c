//! Fixed-capacity formatting.
//!
//! Everything rendered on the dump path (messages, OS error text) goes
//! through [`StackWriter`] so that no heap allocation happens while the
//! process is handling a fault.

use std::fmt;

/// `fmt::Write` sink over a caller-provided byte buffer.
///
/// Output that does not fit is cut at the last whole character and the
/// writer is marked truncated; the write that overflowed reports
/// `fmt::Error` so `write!` stops early.
pub struct StackWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
    truncated: bool,
}

impl<'a> StackWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            truncated: false,
        }
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.buf[..self.pos]).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl fmt::Write for StackWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let remaining = self.buf.len() - self.pos;
        let mut to_copy = s.len().min(remaining);
        while !s.is_char_boundary(to_copy) {
            to_copy -= 1;
        }
        self.buf[self.pos..self.pos + to_copy].copy_from_slice(&s.as_bytes()[..to_copy]);
        self.pos += to_copy;
        if to_copy < s.len() {
            self.truncated = true;
            return Err(fmt::Error);
        }
        Ok(())
    }
}
