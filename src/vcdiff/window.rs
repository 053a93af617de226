// One decoding unit: the descriptor handed over by the envelope layer and
// cursors over the window's three sections.

use super::cursor::SectionCursor;
use super::error::{Section, WindowError};

/// Borrowed DATA/INST/ADDR section triplet for one window.
#[derive(Clone, Copy, Debug, Default)]
pub struct WindowSections<'a> {
    pub data: &'a [u8],
    pub inst: &'a [u8],
    pub addr: &'a [u8],
}

/// Bounds and flags for one window, as parsed from its header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowDescriptor {
    /// Start of the copy segment within its backing region.
    pub source_segment_offset: u64,
    /// Length of the copy segment; addresses below this hit the segment.
    pub source_segment_length: u64,
    /// The segment lives in previously decoded output, not the source.
    pub source_is_target: bool,
    /// Absolute output offset of this window's first byte.
    pub target_window_offset: u64,
    /// Exact number of bytes this window must emit.
    pub window_length: u64,
    /// Clear the address cache before the first instruction.
    pub reset_addresses_cache: bool,
    /// Adler-32 of the window's output, when the encoder recorded one.
    pub checksum: Option<u32>,
}

impl Default for WindowDescriptor {
    fn default() -> Self {
        Self {
            source_segment_offset: 0,
            source_segment_length: 0,
            source_is_target: false,
            target_window_offset: 0,
            window_length: 0,
            reset_addresses_cache: true,
            checksum: None,
        }
    }
}

impl WindowDescriptor {
    /// Size of the region the segment indexes into, given the source and
    /// the output length at window start.
    pub fn backing_len(&self, source_len: usize) -> u64 {
        if self.source_is_target {
            self.target_window_offset
        } else {
            source_len as u64
        }
    }

    /// Check the segment fits its backing region.
    pub fn validate_segment(&self, source_len: usize) -> Result<(), WindowError> {
        let available = self.backing_len(source_len);
        let end = self
            .source_segment_offset
            .checked_add(self.source_segment_length);
        match end {
            Some(end) if end <= available => Ok(()),
            _ => Err(WindowError::SourceSegmentOutOfRange {
                offset: self.source_segment_offset,
                length: self.source_segment_length,
                available,
            }),
        }
    }
}

/// A window ready to be replayed: descriptor plus section cursors.
#[derive(Debug, Clone)]
pub struct Window<'a> {
    pub descriptor: WindowDescriptor,
    pub(crate) opcodes: SectionCursor<'a>,
    pub(crate) literals: SectionCursor<'a>,
    pub(crate) addresses: SectionCursor<'a>,
}

impl<'a> Window<'a> {
    pub fn new(descriptor: WindowDescriptor, sections: WindowSections<'a>) -> Self {
        Self {
            descriptor,
            opcodes: SectionCursor::new(Section::Inst, sections.inst),
            literals: SectionCursor::new(Section::Data, sections.data),
            addresses: SectionCursor::new(Section::Addr, sections.addr),
        }
    }

    /// `(data, inst, addr)` bytes still unread.
    pub fn unread(&self) -> (usize, usize, usize) {
        (
            self.literals.remaining(),
            self.opcodes.remaining(),
            self.addresses.remaining(),
        )
    }
}
