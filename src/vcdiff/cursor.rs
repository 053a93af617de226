// Forward-only cursor over one window section.
//
// Every read either succeeds and advances, or fails with an error that
// names the section and the offset at which it ran dry.

use super::error::{Section, WindowError};
use super::varint::{self, VarIntError};

#[derive(Debug, Clone)]
pub struct SectionCursor<'a> {
    section: Section,
    data: &'a [u8],
    pos: usize,
}

impl<'a> SectionCursor<'a> {
    pub fn new(section: Section, data: &'a [u8]) -> Self {
        Self {
            section,
            data,
            pos: 0,
        }
    }

    #[inline]
    pub fn section(&self) -> Section {
        self.section
    }

    /// Bytes consumed so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn truncated(&self) -> WindowError {
        WindowError::TruncatedStream {
            section: self.section,
            offset: self.pos,
        }
    }

    fn overflow(&self) -> WindowError {
        WindowError::SizeOverflow {
            section: self.section,
            offset: self.pos,
        }
    }

    #[inline]
    pub fn read_byte(&mut self) -> Result<u8, WindowError> {
        let byte = *self.data.get(self.pos).ok_or_else(|| self.truncated())?;
        self.pos += 1;
        Ok(byte)
    }

    /// Borrow the next `len` bytes and advance past them.
    #[inline]
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], WindowError> {
        if len > self.remaining() {
            return Err(self.truncated());
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_u64(&mut self) -> Result<u64, WindowError> {
        match varint::read_u64(&self.data[self.pos..]) {
            Ok((val, consumed)) => {
                self.pos += consumed;
                Ok(val)
            }
            Err(VarIntError::Underflow) => Err(WindowError::TruncatedStream {
                section: self.section,
                offset: self.data.len(),
            }),
            Err(VarIntError::Overflow) => Err(self.overflow()),
        }
    }

    /// Read a varint that must fit in `usize` (instruction sizes).
    pub fn read_usize(&mut self) -> Result<usize, WindowError> {
        let start = self.pos;
        let val = self.read_u64()?;
        usize::try_from(val).map_err(|_| WindowError::SizeOverflow {
            section: self.section,
            offset: start,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_advance_position() {
        let data = [7u8, 0x82, 0x2C, b'a', b'b'];
        let mut c = SectionCursor::new(Section::Inst, &data);
        assert_eq!(c.read_byte(), Ok(7));
        assert_eq!(c.read_u64(), Ok(300));
        assert_eq!(c.position(), 3);
        assert_eq!(c.read_bytes(2), Ok(&b"ab"[..]));
        assert!(c.is_empty());
    }

    #[test]
    fn short_read_reports_offset() {
        let data = [1u8, 2, 3];
        let mut c = SectionCursor::new(Section::Data, &data);
        c.read_byte().unwrap();
        assert_eq!(
            c.read_bytes(5),
            Err(WindowError::TruncatedStream {
                section: Section::Data,
                offset: 1
            })
        );
        // A failed read does not consume anything.
        assert_eq!(c.remaining(), 2);
    }

    #[test]
    fn unterminated_varint_is_truncation() {
        let data = [0x80u8, 0x80];
        let mut c = SectionCursor::new(Section::Addr, &data);
        assert!(matches!(
            c.read_u64(),
            Err(WindowError::TruncatedStream {
                section: Section::Addr,
                ..
            })
        ));
    }

    #[test]
    fn oversized_varint_is_overflow() {
        let data = [0xFFu8; 12];
        let mut c = SectionCursor::new(Section::Inst, &data);
        assert_eq!(
            c.read_u64(),
            Err(WindowError::SizeOverflow {
                section: Section::Inst,
                offset: 0
            })
        );
    }
}
