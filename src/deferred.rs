//! Buffer-backed deferred values and the positional slot list.
//!
//! Strings und Bytes werden beim Parsen nicht kopiert: der Holder merkt sich
//! nur `(offset, len)` im Quell-Buffer der Message. Erst der erste lesende
//! Zugriff materialisiert den Wert (bei Strings inkl. UTF-8 Prüfung) und legt
//! ihn im Cache ab. Beim Serialisieren eines noch nicht materialisierten
//! Holders werden die Bytes direkt aus dem Quell-Buffer kopiert.
//!
//! The holder itself never owns or borrows the buffer; the owning message
//! passes its single retained `source` into every call that needs it.

use std::cell::OnceCell;

use crate::bytestream::WireWriter;
use crate::{Error, Result};

/// A value type that can live in a [`Deferred`] holder.
pub trait DeferredValue: Clone {
    /// Short type name for error messages.
    const KIND: &'static str;

    /// Builds an owned value from raw payload bytes; `None` if the bytes are invalid.
    fn materialize(bytes: &[u8]) -> Option<Self>;

    /// The payload bytes as written on the wire.
    fn as_bytes(&self) -> &[u8];
}

impl DeferredValue for String {
    const KIND: &'static str = "string";

    fn materialize(bytes: &[u8]) -> Option<Self> {
        core::str::from_utf8(bytes).ok().map(str::to_owned)
    }

    fn as_bytes(&self) -> &[u8] {
        self.as_str().as_bytes()
    }
}

impl DeferredValue for Vec<u8> {
    const KIND: &'static str = "bytes";

    fn materialize(bytes: &[u8]) -> Option<Self> {
        Some(bytes.to_vec())
    }

    fn as_bytes(&self) -> &[u8] {
        self
    }
}

/// Holder for a string or bytes value: empty, a buffer reference, or owned.
#[derive(Debug, Clone)]
pub enum Deferred<T> {
    Empty,
    /// Region of the message's source buffer plus the lazily filled cache.
    Borrowed {
        offset: usize,
        len: usize,
        cache: OnceCell<T>,
    },
    Owned(T),
}

impl<T> Default for Deferred<T> {
    fn default() -> Self {
        Self::Empty
    }
}

impl<T: DeferredValue> Deferred<T> {
    pub fn borrowed(offset: usize, len: usize) -> Self {
        Self::Borrowed {
            offset,
            len,
            cache: OnceCell::new(),
        }
    }

    pub fn owned(value: T) -> Self {
        Self::Owned(value)
    }

    pub fn is_empty_holder(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Ob ein Buffer-Holder bereits materialisiert wurde (Owned zählt als ja).
    pub fn is_materialized(&self) -> bool {
        match self {
            Self::Empty => false,
            Self::Borrowed { cache, .. } => cache.get().is_some(),
            Self::Owned(_) => true,
        }
    }

    /// Encoded payload length (without the length prefix).
    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Borrowed { len, .. } => *len,
            Self::Owned(value) => value.as_bytes().len(),
        }
    }

    /// Raw payload bytes, straight from the source buffer when not yet materialized.
    pub fn raw<'s>(&'s self, source: Option<&'s [u8]>) -> Result<&'s [u8]> {
        match self {
            Self::Empty => Ok(&[]),
            Self::Borrowed { offset, len, cache } => match cache.get() {
                Some(value) => Ok(value.as_bytes()),
                None => region(source, *offset, *len),
            },
            Self::Owned(value) => Ok(value.as_bytes()),
        }
    }

    /// Materialized value; the first read of a buffer reference fills the cache.
    ///
    /// `field` only names the field in an `InvalidUtf8` error.
    pub fn value<'s>(&'s self, source: Option<&[u8]>, field: &str) -> Result<Option<&'s T>> {
        match self {
            Self::Empty => Ok(None),
            Self::Owned(value) => Ok(Some(value)),
            Self::Borrowed { offset, len, cache } => {
                if let Some(value) = cache.get() {
                    return Ok(Some(value));
                }
                let bytes = region(source, *offset, *len)?;
                let value = T::materialize(bytes)
                    .ok_or_else(|| Error::InvalidUtf8(field.to_string().into()))?;
                Ok(Some(cache.get_or_init(|| value)))
            }
        }
    }

    /// Owned copy that no longer depends on any source buffer.
    pub fn to_owned_holder(&self, source: Option<&[u8]>, field: &str) -> Result<Self> {
        Ok(match self.value(source, field)? {
            Some(value) => Self::Owned(value.clone()),
            None => Self::Empty,
        })
    }

    /// Writes the payload bytes (no tag, no length prefix).
    pub fn write_to(&self, writer: &mut WireWriter, source: Option<&[u8]>) -> Result<()> {
        match self {
            Self::Empty => {}
            // Zero-Copy: direkt aus dem Quell-Buffer, Cache wird ignoriert
            Self::Borrowed { offset, len, .. } => writer.write_bytes(region(source, *offset, *len)?),
            Self::Owned(value) => writer.write_bytes(value.as_bytes()),
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = Self::Empty;
    }
}

fn region(source: Option<&[u8]>, offset: usize, len: usize) -> Result<&[u8]> {
    let source = source.ok_or(Error::MissingSourceBuffer)?;
    let end = offset.checked_add(len).ok_or(Error::PrematureEndOfStream)?;
    source.get(offset..end).ok_or(Error::PrematureEndOfStream)
}

/// Positional slot list: allocated slots are kept across `clear` and reused
/// by the next `push_slot`, so `len()` (logical count) and `allocated()`
/// are tracked separately.
#[derive(Debug, Clone)]
pub struct SlotList<T> {
    slots: Vec<T>,
    count: usize,
}

impl<T> Default for SlotList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SlotList<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            count: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Slots ever allocated for this list.
    pub fn allocated(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.live().get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots[..self.count].get_mut(index)
    }

    /// Live elements `[0, len)`.
    pub fn live(&self) -> &[T] {
        &self.slots[..self.count]
    }

    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.live().iter()
    }

    /// Appends a logical element, reusing the next allocated slot if there is one.
    ///
    /// Wiederverwendete Slots werden so zurückgegeben, wie `clear_with` sie
    /// hinterlassen hat; `make` läuft nur bei echtem Wachstum.
    pub fn push_slot(&mut self, make: impl FnOnce() -> T) -> &mut T {
        if self.count == self.slots.len() {
            self.slots.push(make());
        }
        self.count += 1;
        &mut self.slots[self.count - 1]
    }

    /// Appends `value`, overwriting a reusable slot when available.
    pub fn push(&mut self, value: T) {
        if self.count < self.slots.len() {
            self.slots[self.count] = value;
            self.count += 1;
        } else {
            self.slots.push(value);
            self.count += 1;
        }
    }

    /// Resets every live slot with `reset` and sets the count to zero.
    pub fn clear_with(&mut self, mut reset: impl FnMut(&mut T)) {
        for slot in &mut self.slots[..self.count] {
            reset(slot);
        }
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &[u8] = b"\x12\x05hello\x12\x02\xff\xfe";

    #[test]
    fn empty_holder() {
        let h: Deferred<String> = Deferred::default();
        assert!(h.is_empty_holder());
        assert_eq!(h.len(), 0);
        assert_eq!(h.value(None, "f").unwrap(), None);
        assert_eq!(h.raw(None).unwrap(), b"");
    }

    #[test]
    fn borrowed_string_materializes_once() {
        let h: Deferred<String> = Deferred::borrowed(2, 5);
        assert!(!h.is_materialized());
        assert_eq!(h.len(), 5);
        assert_eq!(h.raw(Some(SRC)).unwrap(), b"hello");
        assert!(!h.is_materialized());
        assert_eq!(h.value(Some(SRC), "f").unwrap().map(String::as_str), Some("hello"));
        assert!(h.is_materialized());
        // Cache bleibt gültig, auch ohne Buffer
        assert_eq!(h.value(None, "f").unwrap().map(String::as_str), Some("hello"));
    }

    #[test]
    fn borrowed_without_source_fails() {
        let h: Deferred<Vec<u8>> = Deferred::borrowed(0, 1);
        assert_eq!(h.raw(None).unwrap_err(), Error::MissingSourceBuffer);
        let mut w = WireWriter::new();
        assert_eq!(h.write_to(&mut w, None).unwrap_err(), Error::MissingSourceBuffer);
    }

    #[test]
    fn invalid_utf8_is_reported_on_read() {
        let h: Deferred<String> = Deferred::borrowed(9, 2);
        assert_eq!(
            h.value(Some(SRC), "name").unwrap_err(),
            Error::InvalidUtf8("name".into())
        );
        // Bytes-Sicht funktioniert weiterhin
        assert_eq!(h.raw(Some(SRC)).unwrap(), &[0xff, 0xfe]);
    }

    #[test]
    fn write_borrowed_copies_from_source() {
        let h: Deferred<Vec<u8>> = Deferred::borrowed(2, 5);
        let mut w = WireWriter::new();
        h.write_to(&mut w, Some(SRC)).unwrap();
        assert_eq!(w.bytes(), b"hello");
    }

    #[test]
    fn write_materialized_still_reads_source() {
        let h: Deferred<Vec<u8>> = Deferred::borrowed(2, 5);
        assert_eq!(h.value(Some(SRC), "f").unwrap().map(Vec::as_slice), Some(&b"hello"[..]));
        assert!(h.is_materialized());

        // Gleiche Länge, anderer Inhalt: geschrieben wird aus dem Quell-Buffer, nicht aus dem Cache
        let other: &[u8] = b"\x12\x05HELLO";
        let mut w = WireWriter::new();
        h.write_to(&mut w, Some(other)).unwrap();
        assert_eq!(w.bytes(), b"HELLO");

        // Ohne Buffer gibt es keinen Rückfall auf den Cache
        let mut w = WireWriter::new();
        assert_eq!(h.write_to(&mut w, None).unwrap_err(), Error::MissingSourceBuffer);
    }

    #[test]
    fn owned_holder() {
        let h = Deferred::owned("abc".to_string());
        assert_eq!(h.len(), 3);
        assert!(h.is_materialized());
        let mut w = WireWriter::new();
        h.write_to(&mut w, None).unwrap();
        assert_eq!(w.bytes(), b"abc");
    }

    #[test]
    fn to_owned_detaches_from_source() {
        let h: Deferred<String> = Deferred::borrowed(2, 5);
        let owned = h.to_owned_holder(Some(SRC), "f").unwrap();
        assert!(matches!(owned, Deferred::Owned(ref s) if s == "hello"));
        // Nach der Materialisierung reicht der Cache
        assert!(h.to_owned_holder(None, "f").is_ok());

        let fresh: Deferred<String> = Deferred::borrowed(2, 5);
        assert_eq!(fresh.to_owned_holder(None, "f").unwrap_err(), Error::MissingSourceBuffer);
    }

    #[test]
    fn reset_returns_to_empty() {
        let mut h = Deferred::owned(vec![1u8, 2]);
        h.reset();
        assert!(h.is_empty_holder());
    }

    #[test]
    fn region_out_of_bounds() {
        let h: Deferred<Vec<u8>> = Deferred::borrowed(10, 5);
        assert_eq!(h.raw(Some(SRC)).unwrap_err(), Error::PrematureEndOfStream);
    }

    #[test]
    fn slot_list_reuses_after_clear() {
        let mut list: SlotList<Vec<u8>> = SlotList::new();
        list.push(vec![1]);
        list.push(vec![2]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.allocated(), 2);
        list.clear_with(Vec::clear);
        assert!(list.is_empty());
        assert_eq!(list.allocated(), 2);
        assert_eq!(list.get(0), None);

        let mut made = 0;
        list.push_slot(|| {
            made += 1;
            Vec::new()
        })
        .push(7);
        assert_eq!(made, 0);
        assert_eq!(list.live(), &[vec![7]]);

        list.push_slot(Vec::new);
        list.push_slot(Vec::new);
        assert_eq!(list.len(), 3);
        assert_eq!(list.allocated(), 3);
    }

    #[test]
    fn slot_list_get_mut_respects_count() {
        let mut list = SlotList::new();
        list.push(1u32);
        list.push(2);
        list.clear_with(|_| {});
        list.push(3);
        assert_eq!(list.get_mut(1), None);
        *list.get_mut(0).unwrap() += 1;
        assert_eq!(list.iter().copied().collect::<Vec<_>>(), vec![4]);
    }
}
