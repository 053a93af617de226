// Decoded target bytes.
//
// Append-only for writers, randomly readable for COPY instructions that
// refer back into already-decoded output (VCD_TARGET segments and
// self-referential copies within a window).

use std::ops::Range;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TargetBuffer {
    bytes: Vec<u8>,
}

impl TargetBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    /// Bytes emitted so far; also the absolute position of the next write.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Borrow `len` already-written bytes starting at `offset`.
    #[inline]
    pub fn read(&self, offset: usize, len: usize) -> Option<&[u8]> {
        self.bytes.get(offset..offset.checked_add(len)?)
    }

    #[inline]
    pub fn append(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    #[inline]
    pub fn append_repeated(&mut self, byte: u8, count: usize) {
        self.bytes.resize(self.bytes.len() + count, byte);
    }

    /// Append a copy of an already-written range.  The range must end at
    /// or before the current length.
    #[inline]
    pub(crate) fn append_from_within(&mut self, range: Range<usize>) {
        self.bytes.extend_from_within(range);
    }

    pub fn reserve(&mut self, additional: usize) {
        self.bytes.reserve(additional);
    }

    /// Drop everything past `len`; used to discard a failed window.
    pub fn truncate(&mut self, len: usize) {
        self.bytes.truncate(len);
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.bytes
    }
}

impl From<Vec<u8>> for TargetBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl AsRef<[u8]> for TargetBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_only_written_bytes() {
        let mut t = TargetBuffer::new();
        t.append(b"abcdef");
        assert_eq!(t.read(2, 3), Some(&b"cde"[..]));
        assert_eq!(t.read(4, 3), None);
        assert_eq!(t.read(usize::MAX, 2), None);
        assert_eq!(t.read(6, 0), Some(&b""[..]));
    }

    #[test]
    fn append_variants() {
        let mut t = TargetBuffer::with_capacity(8);
        t.append(b"xy");
        t.append_repeated(b'z', 3);
        t.append_from_within(0..2);
        assert_eq!(t.as_slice(), b"xyzzzxy");
        t.truncate(2);
        assert_eq!(t.into_inner(), b"xy");
    }
}
