// Decoder error types.
//
// `WindowError` is what the engine raises while replaying one window; it
// is cheap to clone and compare so tests can match on it directly.
// `DecodeError` is the session-level error: envelope problems, I/O, and
// engine errors tagged with the window they came from.

use std::fmt;
use std::io;

use thiserror::Error;

/// One of the three per-window sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    /// Literal bytes for ADD and RUN.
    Data,
    /// Opcodes and explicit instruction sizes.
    Inst,
    /// Encoded COPY addresses.
    Addr,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Section::Data => "data",
            Section::Inst => "instruction",
            Section::Addr => "address",
        })
    }
}

/// Corrupt-stream conditions detected while decoding a single window.
///
/// None of these are retryable: they describe fixed input bytes that are
/// inconsistent with the window they belong to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("{section} section truncated at offset {offset}")]
    TruncatedStream { section: Section, offset: usize },

    #[error("invalid COPY address {address} (addressable region is {limit} bytes)")]
    InvalidAddress { address: u64, limit: u64 },

    #[error("window length mismatch: declared {expected}, instructions produce {actual}")]
    WindowLengthMismatch { expected: u64, actual: u64 },

    #[error("opcode {0:#04X} does not encode an instruction")]
    UnknownOpcode(u8),

    #[error("unknown COPY address mode {0}")]
    UnknownMode(u8),

    #[error("{section} section value at offset {offset} overflows")]
    SizeOverflow { section: Section, offset: usize },

    #[error("source segment {offset}+{length} exceeds the {available} bytes available")]
    SourceSegmentOutOfRange {
        offset: u64,
        length: u64,
        available: u64,
    },

    #[error("window starts at target offset {expected} but {actual} bytes were decoded")]
    TargetOffsetMismatch { expected: u64, actual: u64 },

    #[error("checksum mismatch: expected {expected:#010X}, got {actual:#010X}")]
    ChecksumMismatch { expected: u32, actual: u32 },
}

/// Errors surfaced by a decode session.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("window {index} (target offset {target_offset}): {source}")]
    Window {
        index: u64,
        target_offset: u64,
        #[source]
        source: WindowError,
    },
}

impl DecodeError {
    /// The engine error behind this failure, if it came from a window.
    pub fn window_error(&self) -> Option<&WindowError> {
        match self {
            Self::Window { source, .. } => Some(source),
            _ => None,
        }
    }
}
