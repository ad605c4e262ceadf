//! # Append Buffer
//!
//! A growable byte sink used to stage one full screen refresh before writing it to the terminal in
//! a single syscall. Building the whole frame in memory first (rather than issuing one `write` per
//! row) is what avoids visible flicker during a refresh.

/// Accumulates the bytes of one screen refresh.
///
/// Backed by `Vec<u8>` rather than `String`: rows carry arbitrary bytes (the editor does not
/// assume UTF-8), so a single byte appended via [`AppendBuffer::append_byte`] may not be valid
/// UTF-8 on its own.
#[derive(Default)]
pub struct AppendBuffer {
    buf: Vec<u8>,
}

impl AppendBuffer {
    /// Create a new, empty buffer.
    pub fn new() -> Self { Self::default() }

    /// Append a string slice (an escape sequence or other known-ASCII text) to the buffer.
    pub fn append(&mut self, s: &str) { self.buf.extend_from_slice(s.as_bytes()); }

    /// Append a single raw byte to the buffer.
    pub fn append_byte(&mut self, b: u8) { self.buf.push(b); }

    /// Consume the buffer, releasing its contents as a single byte vector ready to be written in
    /// one operation.
    pub fn free(self) -> Vec<u8> { self.buf }
}

impl std::fmt::Write for AppendBuffer {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_free() {
        let mut buf = AppendBuffer::new();
        buf.append("hello");
        buf.append_byte(b' ');
        buf.append("world");
        assert_eq!(buf.free(), b"hello world");
    }

    #[test]
    fn append_byte_preserves_non_utf8_bytes() {
        let mut buf = AppendBuffer::new();
        buf.append_byte(0xff);
        buf.append_byte(0x00);
        assert_eq!(buf.free(), vec![0xff, 0x00]);
    }

    #[test]
    fn write_macro_support() {
        use std::fmt::Write as _;
        let mut buf = AppendBuffer::new();
        write!(buf, "{}-{}", 1, 2).unwrap();
        assert_eq!(buf.free(), b"1-2");
    }
}
