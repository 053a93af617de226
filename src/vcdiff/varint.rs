// VCDIFF variable-length integers (RFC 3284, Section 2).
//
// Base-128, big-endian: most-significant group first.  Every byte except
// the last has bit 7 set.  Shared by the window header parser, the
// instruction loop (explicit sizes) and the address cache.

use std::io::{self, Read};

use thiserror::Error;

/// Longest legal encoding of a 64-bit value (ceil(64/7)).
pub const MAX_VARINT_LEN: usize = 10;

/// If any of these bits are set before a shift, the next `<< 7` overflows.
const U64_OVERFLOW_MASK: u64 = 0xFE00_0000_0000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VarIntError {
    /// Input ended before the terminating byte.
    #[error("varint underflow (truncated input)")]
    Underflow,
    /// Value does not fit the target integer type.
    #[error("varint overflow")]
    Overflow,
}

impl From<VarIntError> for io::Error {
    fn from(e: VarIntError) -> io::Error {
        let kind = match e {
            VarIntError::Underflow => io::ErrorKind::UnexpectedEof,
            VarIntError::Overflow => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, e)
    }
}

// ---------------------------------------------------------------------------
// Slice decoding
// ---------------------------------------------------------------------------

/// Decode a `u64` from the front of `data`.
/// Returns `(value, bytes_consumed)`.
pub fn read_u64(data: &[u8]) -> Result<(u64, usize), VarIntError> {
    let mut val: u64 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if val & U64_OVERFLOW_MASK != 0 {
            return Err(VarIntError::Overflow);
        }
        val = (val << 7) | u64::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok((val, i + 1));
        }
    }
    Err(VarIntError::Underflow)
}

// ---------------------------------------------------------------------------
// Streaming decoding (headers)
// ---------------------------------------------------------------------------

/// Read a `u64` varint from a streaming source.
pub fn stream_read_u64<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut val: u64 = 0;
    let mut buf = [0u8; 1];
    loop {
        r.read_exact(&mut buf)?;
        let byte = buf[0];
        if val & U64_OVERFLOW_MASK != 0 {
            return Err(VarIntError::Overflow.into());
        }
        val = (val << 7) | u64::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok(val);
        }
    }
}

/// Encoded byte length of `num`; used for the window header's
/// delta-encoding-length redundancy check.
#[inline]
pub fn sizeof_u64(num: u64) -> usize {
    let bits = 64 - num.leading_zeros();
    (bits.max(1).div_ceil(7) as usize).min(MAX_VARINT_LEN)
}

/// Encode `num` for hand-built sections in unit tests.
#[cfg(test)]
pub(crate) fn encode(mut num: u64) -> Vec<u8> {
    let mut out = vec![(num & 0x7F) as u8];
    num >>= 7;
    while num != 0 {
        out.push((num & 0x7F) as u8 | 0x80);
        num >>= 7;
    }
    out.reverse();
    out
}
