//! Byte-level sink and source for the wire format.
//!
//! `WireWriter` is the growable sink every `serialize` call writes into.
//! `WireReader` is a cursor over a borrowed source buffer. Positions are
//! absolute offsets into that buffer, so buffer-backed fields can record
//! `(offset, len)` pairs that stay valid for the buffer's lifetime `'a`.
//!
//! Nested length-delimited regions werden über `push_limit`/`pop_limit`
//! begrenzt: jede Lese-Operation prüft gegen das aktuelle Limit, nicht gegen
//! das Buffer-Ende.

use std::io::Write;

use crate::{Error, Result};

/// Growable output buffer for encoded messages.
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    /// Creates a new empty `WireWriter`.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Creates a writer with pre-allocated capacity (e.g. `compute_size()` bytes).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    #[inline(always)]
    pub fn write_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of bytes written so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the bytes written so far.
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Schreibt alle Bytes in den Writer und leert den Buffer.
    pub fn drain_to(&mut self, writer: &mut impl Write) -> std::io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        writer.write_all(&self.buf)?;
        self.buf.clear();
        Ok(())
    }

    /// Finalises the writer and returns the buffer.
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for WireWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Cursor over a borrowed source buffer with a movable read limit.
#[derive(Clone, Copy, Debug)]
pub struct WireReader<'a> {
    data: &'a [u8],
    /// Nächstes ungelesenes Byte in data.
    pos: usize,
    /// Exklusive Obergrenze für Lesezugriffe (<= data.len()).
    limit: usize,
}

impl<'a> WireReader<'a> {
    /// Creates a reader over the whole slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            limit: data.len(),
        }
    }

    /// The complete source buffer this reader borrows.
    #[inline]
    pub fn buffer(&self) -> &'a [u8] {
        self.data
    }

    /// Absolute offset of the next unread byte.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left before the current limit.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.pos)
    }

    #[inline]
    pub fn is_at_limit(&self) -> bool {
        self.pos >= self.limit
    }

    #[inline(always)]
    pub fn read_byte(&mut self) -> Result<u8> {
        if self.pos >= self.limit {
            return Err(Error::PrematureEndOfStream);
        }
        let b = self.data[self.pos];
        self.pos += 1;
        Ok(b)
    }

    /// Reads `len` bytes without copying.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(Error::PrematureEndOfStream)?;
        if end > self.limit {
            return Err(Error::PrematureEndOfStream);
        }
        let start = self.pos;
        self.pos = end;
        Ok(&self.data[start..end])
    }

    /// Reads exactly `N` bytes into an array (fixed-width values).
    #[inline]
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut arr = [0u8; N];
        arr.copy_from_slice(bytes);
        Ok(arr)
    }

    /// Advances the cursor by `len` bytes.
    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.read_bytes(len).map(|_| ())
    }

    /// Restricts reads to the next `len` bytes; returns the previous limit.
    ///
    /// Ein Limit, das über das aktuelle hinausreicht, ist ein abgeschnittener
    /// Stream und kein gültiger Sub-Bereich.
    pub fn push_limit(&mut self, len: usize) -> Result<usize> {
        let new_limit = self.pos.checked_add(len).ok_or(Error::PrematureEndOfStream)?;
        if new_limit > self.limit {
            return Err(Error::PrematureEndOfStream);
        }
        let old = self.limit;
        self.limit = new_limit;
        Ok(old)
    }

    /// Restores a limit returned by [`push_limit`](Self::push_limit).
    pub fn pop_limit(&mut self, old_limit: usize) {
        debug_assert!(old_limit >= self.limit, "pop_limit: Limit darf nur wachsen");
        self.limit = old_limit;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_default() {
        let w = WireWriter::default();
        assert_eq!(w.position(), 0);
        assert_eq!(w.into_vec(), Vec::<u8>::new());
    }

    #[test]
    fn writer_collects_bytes() {
        let mut w = WireWriter::with_capacity(4);
        w.write_byte(0x08);
        w.write_bytes(&[0x96, 0x01]);
        assert_eq!(w.position(), 3);
        assert_eq!(w.bytes(), &[0x08, 0x96, 0x01]);
    }

    #[test]
    fn writer_drain_to_clears() {
        let mut w = WireWriter::new();
        w.write_bytes(b"abc");
        let mut out = Vec::new();
        w.drain_to(&mut out).unwrap();
        assert_eq!(out, b"abc");
        assert_eq!(w.position(), 0);
    }

    #[test]
    fn reader_reads_and_tracks_position() {
        let data = [1u8, 2, 3, 4, 5];
        let mut r = WireReader::new(&data);
        assert_eq!(r.read_byte().unwrap(), 1);
        assert_eq!(r.read_bytes(2).unwrap(), &[2, 3]);
        assert_eq!(r.position(), 3);
        assert_eq!(r.remaining(), 2);
        r.skip(2).unwrap();
        assert!(r.is_at_limit());
        assert_eq!(r.read_byte().unwrap_err(), Error::PrematureEndOfStream);
    }

    #[test]
    fn reader_read_array() {
        let data = [0xAA, 0xBB, 0xCC, 0xDD];
        let mut r = WireReader::new(&data);
        assert_eq!(r.read_array::<4>().unwrap(), [0xAA, 0xBB, 0xCC, 0xDD]);
        assert!(r.read_array::<1>().is_err());
    }

    #[test]
    fn limit_bounds_reads() {
        let data = [1u8, 2, 3, 4, 5, 6];
        let mut r = WireReader::new(&data);
        r.read_byte().unwrap();
        let old = r.push_limit(2).unwrap();
        assert_eq!(r.remaining(), 2);
        assert_eq!(r.read_bytes(2).unwrap(), &[2, 3]);
        assert_eq!(r.read_byte().unwrap_err(), Error::PrematureEndOfStream);
        r.pop_limit(old);
        assert_eq!(r.read_byte().unwrap(), 4);
    }

    #[test]
    fn limit_beyond_current_limit_is_rejected() {
        let data = [1u8, 2, 3];
        let mut r = WireReader::new(&data);
        assert_eq!(r.push_limit(4).unwrap_err(), Error::PrematureEndOfStream);
        let old = r.push_limit(2).unwrap();
        assert_eq!(r.push_limit(3).unwrap_err(), Error::PrematureEndOfStream);
        r.pop_limit(old);
    }

    #[test]
    fn buffer_returns_whole_source() {
        let data = [9u8, 8, 7];
        let mut r = WireReader::new(&data);
        r.skip(2).unwrap();
        assert_eq!(r.buffer(), &data);
    }
}
