//! Append-only text accumulator reused across collection cycles.

use std::fmt::{self, Write};

/// Extra bytes reserved on every growth so following appends rarely reallocate.
pub const GROWTH_HEADROOM: usize = 1024;

/// Growable output buffer.
///
/// Storage is never released: [`assign`](Self::assign) resets the content and
/// keeps the capacity, so a buffer sized by the first few cycles serves all
/// later ones without reallocating. When growing fails the buffer keeps its
/// previous content and capacity and the append is dropped.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    text: String,
}

impl OutputBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            text: String::with_capacity(capacity),
        }
    }

    /// Replaces the content with `text`.
    pub fn assign(&mut self, text: &str) -> fmt::Result {
        self.text.clear();
        self.append(text)
    }

    /// Appends `text`, growing with headroom when needed.
    pub fn append(&mut self, text: &str) -> fmt::Result {
        self.ensure_room(text.len())?;
        self.text.push_str(text);
        Ok(())
    }

    /// Appends formatted output; use with `format_args!`.
    pub fn append_fmt(&mut self, args: fmt::Arguments<'_>) -> fmt::Result {
        self.write_fmt(args)
    }

    /// Drops everything after the first `len` bytes. Used to roll back a
    /// section that failed half way; `len` must be a length seen earlier.
    pub fn truncate(&mut self, len: usize) {
        if self.text.is_char_boundary(len) {
            self.text.truncate(len);
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.text.capacity()
    }

    fn ensure_room(&mut self, additional: usize) -> fmt::Result {
        let free = self.text.capacity() - self.text.len();
        if additional <= free {
            return Ok(());
        }
        self.text
            .try_reserve_exact(additional + GROWTH_HEADROOM)
            .map_err(|e| {
                tracing::warn!("output buffer growth failed: {}", e);
                fmt::Error
            })
    }
}

impl Write for OutputBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.append(s)
    }
}

impl AsRef<str> for OutputBuffer {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_resets_content() {
        let mut buf = OutputBuffer::with_capacity(16);
        buf.append("stale").unwrap();
        buf.assign("{").unwrap();
        assert_eq!(buf.as_str(), "{");
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn test_append_fmt() {
        let mut buf = OutputBuffer::default();
        buf.append_fmt(format_args!("\"{}\":{}", "pid", 42)).unwrap();
        assert_eq!(buf.as_str(), "\"pid\":42");
    }

    #[test]
    fn test_growth_adds_headroom() {
        let mut buf = OutputBuffer::with_capacity(4);
        buf.append("0123456789").unwrap();
        assert!(buf.capacity() >= 10 + GROWTH_HEADROOM);
    }

    #[test]
    fn test_assign_reuses_storage() {
        let mut buf = OutputBuffer::default();
        buf.append(&"x".repeat(4000)).unwrap();
        let capacity = buf.capacity();
        let ptr = buf.as_str().as_ptr();

        buf.assign("{").unwrap();
        buf.append(&"y".repeat(3000)).unwrap();

        assert_eq!(buf.capacity(), capacity);
        assert_eq!(buf.as_str().as_ptr(), ptr);
    }

    #[test]
    fn test_truncate_keeps_capacity() {
        let mut buf = OutputBuffer::default();
        buf.append("{\"cpu\":").unwrap();
        let mark = buf.len();
        buf.append("{\"partial").unwrap();
        let capacity = buf.capacity();

        buf.truncate(mark);
        assert_eq!(buf.as_str(), "{\"cpu\":");
        assert_eq!(buf.capacity(), capacity);
    }

    #[test]
    fn test_embedded_nul_is_length_tracked() {
        let mut buf = OutputBuffer::default();
        buf.append("a\0b").unwrap();
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.as_str(), "a\0b");
    }
}
