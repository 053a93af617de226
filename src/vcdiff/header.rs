// VCDIFF file header and per-window header parsing (RFC 3284, Section 4).
//
// Produces the code table / cache sizes for a session and one
// `WindowDescriptor` plus section lengths per window.  Section bytes are
// left on the reader for the caller.

use std::borrow::Cow;
use std::io::{self, Read};

use bitflags::bitflags;

use super::address_cache::{DEFAULT_NEAR_SIZE, DEFAULT_SAME_SIZE};
use super::code_table::{CodeTable, default_code_table};
use super::decoder::StreamDecoder;
use super::error::DecodeError;
use super::target::TargetBuffer;
use super::varint;
use super::window::WindowDescriptor;

pub const VCDIFF_MAGIC: [u8; 4] = [0xD6, 0xC3, 0xC4, 0x00];

/// Upper bound on an application header or embedded code table delta.
const MAX_HEADER_PAYLOAD: u64 = 1 << 20;

bitflags! {
    /// Header indicator (`Hdr_Indicator`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HeaderIndicator: u8 {
        const SECONDARY = 1 << 0;
        const CODETABLE = 1 << 1;
        const APPHEADER = 1 << 2;
    }
}

bitflags! {
    /// Window indicator (`Win_Indicator`).  ADLER32 is the xdelta3
    /// extension carrying a checksum of the target window.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WindowIndicator: u8 {
        const SOURCE = 1 << 0;
        const TARGET = 1 << 1;
        const ADLER32 = 1 << 2;
    }
}

bitflags! {
    /// Delta indicator: which sections use secondary compression.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DeltaIndicator: u8 {
        const DATACOMP = 1 << 0;
        const INSTCOMP = 1 << 1;
        const ADDRCOMP = 1 << 2;
    }
}

fn invalid(msg: impl Into<String>) -> DecodeError {
    DecodeError::InvalidHeader(msg.into())
}

fn read_u8<R: Read>(r: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read exactly `len` bytes without trusting `len` for the allocation.
pub(crate) fn read_payload<R: Read>(r: &mut R, len: u64, buf: &mut Vec<u8>) -> io::Result<()> {
    buf.clear();
    let n = r.by_ref().take(len).read_to_end(buf)?;
    if (n as u64) < len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("section truncated: expected {len} bytes, got {n}"),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// File header
// ---------------------------------------------------------------------------

/// An application-defined code table and the cache it was built for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomCodeTable {
    pub near_size: u8,
    pub same_size: u8,
    pub table: CodeTable,
}

/// Parsed VCDIFF file header.
#[derive(Debug, Clone, Default)]
pub struct FileHeader {
    pub indicator: HeaderIndicator,
    /// Secondary compressor ID (if SECONDARY is set).
    pub secondary_id: Option<u8>,
    /// Replacement code table (if CODETABLE is set).
    pub code_table: Option<CustomCodeTable>,
    /// Application-defined header data (if APPHEADER is set).
    pub app_header: Option<Vec<u8>>,
}

impl FileHeader {
    /// Cache sizes for this session.
    pub fn cache_sizes(&self) -> (u8, u8) {
        match &self.code_table {
            Some(c) => (c.near_size, c.same_size),
            None => (DEFAULT_NEAR_SIZE, DEFAULT_SAME_SIZE),
        }
    }

    /// The code table instructions in this file are encoded with.
    pub fn table(&self) -> Cow<'static, CodeTable> {
        match &self.code_table {
            Some(c) => Cow::Owned(c.table.clone()),
            None => Cow::Borrowed(default_code_table()),
        }
    }

    /// Header size in bytes as it appeared on the wire, excluding any
    /// embedded code table delta.
    pub fn app_header_size(&self) -> usize {
        self.app_header
            .as_ref()
            .map_or(0, |d| varint::sizeof_u64(d.len() as u64) + d.len())
    }

    /// Decode a VCDIFF file header from a reader.
    pub fn decode<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
        Self::decode_inner(r, true)
    }

    pub(crate) fn decode_inner<R: Read>(
        r: &mut R,
        allow_code_table: bool,
    ) -> Result<Self, DecodeError> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic[..3] != VCDIFF_MAGIC[..3] {
            return Err(invalid(format!(
                "bad magic: expected {:02X} {:02X} {:02X}, got {:02X} {:02X} {:02X}",
                VCDIFF_MAGIC[0], VCDIFF_MAGIC[1], VCDIFF_MAGIC[2], magic[0], magic[1], magic[2]
            )));
        }
        if magic[3] != 0x00 {
            return Err(DecodeError::Unsupported(format!(
                "VCDIFF version {:#04X}",
                magic[3]
            )));
        }

        let raw = read_u8(r)?;
        let indicator = HeaderIndicator::from_bits(raw)
            .ok_or_else(|| invalid(format!("invalid header indicator bits: {raw:#04X}")))?;

        let secondary_id = if indicator.contains(HeaderIndicator::SECONDARY) {
            Some(read_u8(r)?)
        } else {
            None
        };

        let code_table = if indicator.contains(HeaderIndicator::CODETABLE) {
            if !allow_code_table {
                return Err(invalid("nested application-defined code table"));
            }
            Some(read_code_table(r)?)
        } else {
            None
        };

        let app_header = if indicator.contains(HeaderIndicator::APPHEADER) {
            let len = varint::stream_read_u64(r)?;
            if len > MAX_HEADER_PAYLOAD {
                return Err(invalid(format!("application header of {len} bytes")));
            }
            let mut data = Vec::new();
            read_payload(r, len, &mut data)?;
            Some(data)
        } else {
            None
        };

        Ok(Self {
            indicator,
            secondary_id,
            code_table,
            app_header,
        })
    }
}

/// Read the code table length, `near`, `same` and the delta-compressed
/// code table string. The length covers the two cache size bytes.
///
/// The table is itself a VCDIFF stream whose source is the default
/// table's string form (RFC 3284 Section 7).
fn read_code_table<R: Read>(r: &mut R) -> Result<CustomCodeTable, DecodeError> {
    let len = varint::stream_read_u64(r)?;
    if len < 2 {
        return Err(invalid(format!("code table data of {len} bytes")));
    }
    if len - 2 > MAX_HEADER_PAYLOAD {
        return Err(invalid(format!("code table delta of {} bytes", len - 2)));
    }

    let near_size = read_u8(r)?;
    let same_size = read_u8(r)?;
    let mode_count = 2 + usize::from(near_size) + usize::from(same_size);
    if mode_count > 256 {
        return Err(invalid(format!(
            "cache sizes near={near_size} same={same_size} exceed 256 modes"
        )));
    }

    let mut delta = Vec::new();
    read_payload(r, len - 2, &mut delta)?;

    let default_string = default_code_table().to_bytes();
    let mut nested = StreamDecoder::nested(io::Cursor::new(&delta));
    let mut table_string = TargetBuffer::new();
    nested.decode_all(&default_string, &mut table_string)?;

    let table = CodeTable::from_bytes(table_string.as_slice(), mode_count)
        .map_err(|e| invalid(format!("code table: {e}")))?;
    log::debug!("application-defined code table: near={near_size} same={same_size}");
    Ok(CustomCodeTable {
        near_size,
        same_size,
        table,
    })
}

// ---------------------------------------------------------------------------
// Per-window header
// ---------------------------------------------------------------------------

/// Parsed VCDIFF per-window header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowHeader {
    pub indicator: WindowIndicator,
    /// Length of the source/target copy segment.
    pub copy_window_len: u64,
    /// Offset of the copy segment in its backing region.
    pub copy_window_offset: u64,
    /// Length of the delta encoding (redundancy check field).
    pub enc_len: u64,
    /// Length of the target window to reconstruct.
    pub target_window_len: u64,
    pub delta_indicator: DeltaIndicator,
    pub data_len: u64,
    pub inst_len: u64,
    pub addr_len: u64,
    /// Adler-32 of the target window (if ADLER32).
    pub adler32: Option<u32>,
}

impl WindowHeader {
    #[inline]
    pub fn has_copy_segment(&self) -> bool {
        self.indicator
            .intersects(WindowIndicator::SOURCE | WindowIndicator::TARGET)
    }

    /// Expected `enc_len`: everything after the field itself.
    pub fn compute_enc_len(&self) -> u64 {
        let mut len = varint::sizeof_u64(self.target_window_len) as u64
            + 1
            + varint::sizeof_u64(self.data_len) as u64
            + varint::sizeof_u64(self.inst_len) as u64
            + varint::sizeof_u64(self.addr_len) as u64;
        len = len
            .saturating_add(self.data_len)
            .saturating_add(self.inst_len)
            .saturating_add(self.addr_len);
        if self.indicator.contains(WindowIndicator::ADLER32) {
            len = len.saturating_add(4);
        }
        len
    }

    /// The engine's view of this window, placed at `target_window_offset`.
    pub fn descriptor(&self, target_window_offset: u64) -> WindowDescriptor {
        WindowDescriptor {
            source_segment_offset: self.copy_window_offset,
            source_segment_length: self.copy_window_len,
            source_is_target: self.indicator.contains(WindowIndicator::TARGET),
            target_window_offset,
            window_length: self.target_window_len,
            reset_addresses_cache: true,
            checksum: self.adler32,
        }
    }

    /// Decode a per-window header.  Returns `None` on clean EOF.
    pub fn decode<R: Read>(r: &mut R) -> Result<Option<Self>, DecodeError> {
        let mut buf1 = [0u8; 1];
        match r.read_exact(&mut buf1) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let indicator = WindowIndicator::from_bits(buf1[0])
            .ok_or_else(|| invalid(format!("invalid window indicator bits: {:#04X}", buf1[0])))?;
        if indicator.contains(WindowIndicator::SOURCE | WindowIndicator::TARGET) {
            return Err(invalid("VCD_SOURCE and VCD_TARGET are mutually exclusive"));
        }

        let (copy_window_len, copy_window_offset) =
            if indicator.intersects(WindowIndicator::SOURCE | WindowIndicator::TARGET) {
                (varint::stream_read_u64(r)?, varint::stream_read_u64(r)?)
            } else {
                (0, 0)
            };

        let enc_len = varint::stream_read_u64(r)?;
        let target_window_len = varint::stream_read_u64(r)?;

        let raw = read_u8(r)?;
        let delta_indicator = DeltaIndicator::from_bits(raw)
            .ok_or_else(|| invalid(format!("invalid delta indicator bits: {raw:#04X}")))?;

        let data_len = varint::stream_read_u64(r)?;
        let inst_len = varint::stream_read_u64(r)?;
        let addr_len = varint::stream_read_u64(r)?;

        let adler32 = if indicator.contains(WindowIndicator::ADLER32) {
            let mut cksum = [0u8; 4];
            r.read_exact(&mut cksum)?;
            Some(u32::from_be_bytes(cksum))
        } else {
            None
        };

        let hdr = WindowHeader {
            indicator,
            copy_window_len,
            copy_window_offset,
            enc_len,
            target_window_len,
            delta_indicator,
            data_len,
            inst_len,
            addr_len,
            adler32,
        };

        let expected = hdr.compute_enc_len();
        if enc_len != expected {
            return Err(invalid(format!(
                "delta encoding length {enc_len} disagrees with computed {expected}"
            )));
        }
        Ok(Some(hdr))
    }
}
