// Delta instructions: ADD, RUN and COPY.
//
// An instruction is built from one code-table half by resolving its
// operands (explicit size, RUN byte, COPY address), then executed once
// against the source and the target buffer.

use std::cmp;
use std::fmt;

use super::address_cache::AddressCache;
use super::code_table::{HalfInstruction, InstructionKind};
use super::error::{Section, WindowError};
use super::target::TargetBuffer;
use super::window::Window;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Emit `size` literal bytes from the data section.
    Add { size: usize },
    /// Emit `byte` `size` times.
    Run { size: usize, byte: u8 },
    /// Copy `size` bytes from `address` in the combined segment + target
    /// address space.
    Copy { size: usize, address: u64, mode: u8 },
}

impl Instruction {
    /// Number of target bytes this instruction produces.
    #[inline]
    pub fn size(&self) -> usize {
        match *self {
            Self::Add { size } | Self::Run { size, .. } | Self::Copy { size, .. } => size,
        }
    }

    /// Resolve the operands of one half-instruction.
    ///
    /// `here` is the current size of the addressable region.  Returns
    /// `Ok(None)` for NOOP halves.
    pub(crate) fn decode(
        half: HalfInstruction,
        window: &mut Window<'_>,
        cache: &mut AddressCache,
        here: u64,
    ) -> Result<Option<Self>, WindowError> {
        if half.is_noop() {
            return Ok(None);
        }
        let size = if half.size == 0 {
            window.opcodes.read_usize()?
        } else {
            usize::from(half.size)
        };
        let inst = match half.kind {
            InstructionKind::Noop => return Ok(None),
            InstructionKind::Add => Self::Add { size },
            InstructionKind::Run => Self::Run {
                size,
                byte: window.literals.read_byte()?,
            },
            InstructionKind::Copy => Self::Copy {
                size,
                address: cache.resolve(here, half.mode, &mut window.addresses)?,
                mode: half.mode,
            },
        };
        Ok(Some(inst))
    }

    /// Emit this instruction's bytes onto `output`.
    pub(crate) fn execute(
        &self,
        window: &mut Window<'_>,
        source: &[u8],
        output: &mut TargetBuffer,
    ) -> Result<(), WindowError> {
        match *self {
            Self::Add { size } => {
                output.append(window.literals.read_bytes(size)?);
            }
            Self::Run { size, byte } => output.append_repeated(byte, size),
            Self::Copy { size, address, .. } => copy(window, size, address, source, output)?,
        }
        Ok(())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Add { size } => write!(f, "ADD  {size}"),
            Self::Run { size, byte } => write!(f, "RUN  {size} {byte:#04X}"),
            Self::Copy {
                size,
                address,
                mode,
            } => write!(f, "CPY_{mode} {size} @{address}"),
        }
    }
}

fn to_index(value: u64, window: &Window<'_>) -> Result<usize, WindowError> {
    usize::try_from(value).map_err(|_| WindowError::SizeOverflow {
        section: Section::Addr,
        offset: window.addresses.position(),
    })
}

/// Execute a COPY, splitting it at the segment/target boundary.
///
/// The first part (if any) reads from the copy segment, which is never
/// written during the window.  The rest reads from this window's own
/// output and may overlap the bytes it is producing.
fn copy(
    window: &Window<'_>,
    size: usize,
    address: u64,
    source: &[u8],
    output: &mut TargetBuffer,
) -> Result<(), WindowError> {
    let d = &window.descriptor;
    let segment_len = d.source_segment_length;
    let mut remaining = size;

    if address < segment_len {
        let n = cmp::min(size as u64, segment_len - address) as usize;
        let start = to_index(d.source_segment_offset + address, window)?;
        if d.source_is_target {
            // Segment lies wholly before target_window_offset.
            if output.read(start, n).is_none() {
                return Err(WindowError::InvalidAddress {
                    address,
                    limit: segment_len,
                });
            }
            output.append_from_within(start..start + n);
        } else {
            let bytes = source
                .get(start..start + n)
                .ok_or(WindowError::InvalidAddress {
                    address,
                    limit: segment_len,
                })?;
            output.append(bytes);
        }
        remaining -= n;
    }

    if remaining > 0 {
        let window_relative = address.max(segment_len) - segment_len;
        let from = to_index(d.target_window_offset + window_relative, window)?;
        copy_within_target(output, from, remaining).map_err(|limit| {
            WindowError::InvalidAddress {
                address,
                limit: segment_len + limit,
            }
        })?;
    }
    Ok(())
}

/// Append `len` bytes read from `from` in the output itself.
///
/// When the read range runs past the current end, the copy is done in
/// chunks of `end - from` bytes: each chunk only reads bytes that already
/// exist, and the pattern of that period repeats.  On a read position at
/// or past the end, returns the window-relative limit for error reporting.
fn copy_within_target(output: &mut TargetBuffer, from: usize, len: usize) -> Result<(), u64> {
    let end = output.len();
    if from >= end {
        return Err(end as u64);
    }
    if len <= end - from {
        output.append_from_within(from..from + len);
        return Ok(());
    }

    let period = end - from;
    let (mut from, mut remaining) = (from, len);
    while remaining > 0 {
        let n = remaining.min(period);
        output.append_from_within(from..from + n);
        from += n;
        remaining -= n;
    }
    Ok(())
}
