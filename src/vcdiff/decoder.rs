// VCDIFF decoder: window replay and stream driving.
//
// `WindowDecoder` is the engine: it owns the session's address cache and
// code table and replays one window's instructions onto a `TargetBuffer`.
// `StreamDecoder` parses the envelope around it and feeds it windows in
// stream order.
//
// Performance notes:
//   - Section buffers (data/inst/addr) are reused across windows
//   - Non-overlapping COPYs are a single bulk append
//   - Output is reserved up front for each window's declared length

use std::borrow::Cow;
use std::io::Read;

use log::{debug, trace, warn};

use super::address_cache::AddressCache;
use super::code_table::{CodeTable, default_code_table};
use super::error::{DecodeError, Section, WindowError};
use super::header::{self, DeltaIndicator, FileHeader, WindowHeader};
use super::instruction::Instruction;
use super::target::TargetBuffer;
use super::window::{Window, WindowSections};

/// Maximum decoded window size (matches xdelta3 XD3_HARDMAXWINSIZE).
pub const HARD_MAX_WINSIZE: u64 = 1 << 24;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Tunables for a decode session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Verify Adler-32 window checksums when present.
    pub verify_checksum: bool,
    /// Reject windows that declare more target bytes than this.
    pub max_window_size: u64,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            verify_checksum: true,
            max_window_size: HARD_MAX_WINSIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// Window decoder
// ---------------------------------------------------------------------------

/// Replays windows against a source buffer and a growing target.
///
/// One instance is one decode session: the address cache persists across
/// windows unless a window asks for it to be reset.
#[derive(Debug, Clone)]
pub struct WindowDecoder {
    cache: AddressCache,
    code_table: Cow<'static, CodeTable>,
    verify_checksum: bool,
}

impl WindowDecoder {
    /// Default code table and cache sizes.
    pub fn new() -> Self {
        Self {
            cache: AddressCache::new(),
            code_table: Cow::Borrowed(default_code_table()),
            verify_checksum: true,
        }
    }

    /// Engine configured by a file header.
    pub fn for_header(header: &FileHeader) -> Self {
        let (near, same) = header.cache_sizes();
        Self {
            cache: AddressCache::with_sizes(near, same),
            code_table: header.table(),
            verify_checksum: true,
        }
    }

    pub fn verify_checksum(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }

    pub fn code_table(&self) -> &CodeTable {
        &self.code_table
    }

    /// Decode one window, appending exactly `window_length` bytes to
    /// `output`.
    ///
    /// On error, `output` is truncated back to where the window started.
    pub fn decode_window(
        &mut self,
        window: &mut Window<'_>,
        source: &[u8],
        output: &mut TargetBuffer,
    ) -> Result<(), WindowError> {
        let start = output.len();
        let result = self.replay(window, source, output);
        if result.is_err() {
            output.truncate(start);
        }
        result
    }

    fn replay(
        &mut self,
        window: &mut Window<'_>,
        source: &[u8],
        output: &mut TargetBuffer,
    ) -> Result<(), WindowError> {
        let d = window.descriptor;
        let start = output.len();
        if start as u64 != d.target_window_offset {
            return Err(WindowError::TargetOffsetMismatch {
                expected: d.target_window_offset,
                actual: start as u64,
            });
        }
        d.validate_segment(source.len())?;
        let window_len = usize::try_from(d.window_length).map_err(|_| WindowError::SizeOverflow {
            section: Section::Inst,
            offset: 0,
        })?;

        if d.reset_addresses_cache {
            self.cache.reset();
        }
        output.reserve(window_len.min(HARD_MAX_WINSIZE as usize));

        while !window.opcodes.is_empty() {
            let opcode = window.opcodes.read_byte()?;
            let entry = *self.code_table.get(opcode);
            if entry.first.is_noop() && entry.second.is_noop() {
                return Err(WindowError::UnknownOpcode(opcode));
            }

            for half in entry.halves() {
                let written = (output.len() - start) as u64;
                let here = d.source_segment_length + written;
                let Some(inst) = Instruction::decode(half, window, &mut self.cache, here)? else {
                    continue;
                };

                let produced = written.saturating_add(inst.size() as u64);
                if produced > d.window_length {
                    return Err(WindowError::WindowLengthMismatch {
                        expected: d.window_length,
                        actual: produced,
                    });
                }
                trace!("{:>8} {inst}", d.target_window_offset + written);
                inst.execute(window, source, output)?;
            }
        }

        let actual = (output.len() - start) as u64;
        if actual != d.window_length {
            return Err(WindowError::WindowLengthMismatch {
                expected: d.window_length,
                actual,
            });
        }

        let (data_left, _, addr_left) = window.unread();
        if data_left != 0 || addr_left != 0 {
            warn!(
                "window at {}: {data_left} data and {addr_left} address bytes left unread",
                d.target_window_offset
            );
        }

        if let Some(expected) = d.checksum
            && self.verify_checksum
        {
            let actual = compute_adler32(&output.as_slice()[start..]);
            if actual != expected {
                return Err(WindowError::ChecksumMismatch { expected, actual });
            }
        }
        Ok(())
    }

    /// List a window's instructions without executing them.
    ///
    /// Uses a private copy of the address cache, reset per the window's
    /// descriptor, so the session state is untouched.
    pub fn instructions<'s, 'a>(&'s self, window: Window<'a>) -> InstructionIterator<'s, 'a> {
        let mut cache = self.cache.clone();
        if window.descriptor.reset_addresses_cache {
            cache.reset();
        }
        InstructionIterator {
            window,
            cache,
            code_table: &self.code_table,
            emitted: 0,
            pending: None,
            done: false,
        }
    }
}

impl Default for WindowDecoder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Stream decoder
// ---------------------------------------------------------------------------

/// Decodes a complete VCDIFF stream (file header + all windows).
///
/// Section buffers grow to the largest section seen and are reused.
pub struct StreamDecoder<R: Read> {
    reader: R,
    options: DecodeOptions,
    allow_code_table: bool,
    file_header: Option<FileHeader>,
    engine: Option<WindowDecoder>,
    data_buf: Vec<u8>,
    inst_buf: Vec<u8>,
    addr_buf: Vec<u8>,
    windows_decoded: u64,
    bytes_decoded: u64,
}

impl<R: Read> StreamDecoder<R> {
    pub fn new(reader: R, options: DecodeOptions) -> Self {
        Self {
            reader,
            options,
            allow_code_table: true,
            file_header: None,
            engine: None,
            data_buf: Vec::new(),
            inst_buf: Vec::new(),
            addr_buf: Vec::new(),
            windows_decoded: 0,
            bytes_decoded: 0,
        }
    }

    /// Decoder for the code table delta embedded in a file header.
    pub(crate) fn nested(reader: R) -> Self {
        Self {
            allow_code_table: false,
            ..Self::new(reader, DecodeOptions::default())
        }
    }

    /// Read (once) and return the file header.
    pub fn read_header(&mut self) -> Result<&FileHeader, DecodeError> {
        let hdr = match self.file_header.take() {
            Some(hdr) => hdr,
            None => {
                let hdr = FileHeader::decode_inner(&mut self.reader, self.allow_code_table)?;
                debug!(
                    "file header: indicator={:?} secondary={:?} app_header={} bytes",
                    hdr.indicator,
                    hdr.secondary_id,
                    hdr.app_header_size()
                );
                self.engine = Some(
                    WindowDecoder::for_header(&hdr).verify_checksum(self.options.verify_checksum),
                );
                hdr
            }
        };
        Ok(self.file_header.insert(hdr))
    }

    pub fn file_header(&self) -> Option<&FileHeader> {
        self.file_header.as_ref()
    }

    pub fn windows_decoded(&self) -> u64 {
        self.windows_decoded
    }

    pub fn bytes_decoded(&self) -> u64 {
        self.bytes_decoded
    }

    /// Decode the next window, appending to `output`.
    ///
    /// `output` must hold exactly the bytes decoded by earlier calls.
    /// Returns `Ok(false)` when there are no more windows.
    pub fn decode_window(
        &mut self,
        source: &[u8],
        output: &mut TargetBuffer,
    ) -> Result<bool, DecodeError> {
        self.read_header()?;

        let Some(wh) = WindowHeader::decode(&mut self.reader)? else {
            return Ok(false);
        };
        let index = self.windows_decoded;
        let target_offset = self.bytes_decoded;

        if wh.delta_indicator != DeltaIndicator::empty() {
            return Err(DecodeError::Unsupported(format!(
                "window {index}: secondary compression ({:?})",
                wh.delta_indicator
            )));
        }
        if wh.target_window_len > self.options.max_window_size {
            return Err(DecodeError::InvalidHeader(format!(
                "window {index}: target window of {} bytes exceeds max {}",
                wh.target_window_len, self.options.max_window_size
            )));
        }
        let section_limit = self.options.max_window_size.saturating_mul(4);
        for (name, len) in [("data", wh.data_len), ("inst", wh.inst_len), ("addr", wh.addr_len)] {
            if len > section_limit {
                return Err(DecodeError::InvalidHeader(format!(
                    "window {index}: {name} section of {len} bytes"
                )));
            }
        }

        header::read_payload(&mut self.reader, wh.data_len, &mut self.data_buf)?;
        header::read_payload(&mut self.reader, wh.inst_len, &mut self.inst_buf)?;
        header::read_payload(&mut self.reader, wh.addr_len, &mut self.addr_buf)?;

        let descriptor = wh.descriptor(target_offset);
        debug!(
            "window {index}: {} bytes at {target_offset}, {} segment {}+{}",
            wh.target_window_len,
            if descriptor.source_is_target { "target" } else { "source" },
            descriptor.source_segment_offset,
            descriptor.source_segment_length,
        );

        let mut window = Window::new(
            descriptor,
            WindowSections {
                data: &self.data_buf,
                inst: &self.inst_buf,
                addr: &self.addr_buf,
            },
        );
        let engine = self.engine.get_or_insert_with(WindowDecoder::new);
        engine
            .decode_window(&mut window, source, output)
            .map_err(|err| DecodeError::Window {
                index,
                target_offset,
                source: err,
            })?;

        self.windows_decoded += 1;
        self.bytes_decoded += wh.target_window_len;
        Ok(true)
    }

    /// Decode all remaining windows, appending to `output`.
    pub fn decode_all(
        &mut self,
        source: &[u8],
        output: &mut TargetBuffer,
    ) -> Result<(), DecodeError> {
        while self.decode_window(source, output)? {}
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// High-level convenience: decode in memory
// ---------------------------------------------------------------------------

/// Decode a VCDIFF delta held in memory.
///
/// `source` is the dictionary the delta was made against (may be empty).
pub fn decode_memory(delta: &[u8], source: &[u8]) -> Result<Vec<u8>, DecodeError> {
    decode_memory_with(delta, source, DecodeOptions::default())
}

pub fn decode_memory_with(
    delta: &[u8],
    source: &[u8],
    options: DecodeOptions,
) -> Result<Vec<u8>, DecodeError> {
    let mut decoder = StreamDecoder::new(std::io::Cursor::new(delta), options);
    let mut output = TargetBuffer::new();
    decoder.decode_all(source, &mut output)?;
    Ok(output.into_inner())
}

// ---------------------------------------------------------------------------
// Adler-32
// ---------------------------------------------------------------------------

pub fn compute_adler32(data: &[u8]) -> u32 {
    #[cfg(feature = "adler32")]
    {
        let mut hasher = simd_adler32::Adler32::new();
        hasher.write(data);
        hasher.finish()
    }
    #[cfg(not(feature = "adler32"))]
    {
        const MOD_ADLER: u32 = 65521;
        let mut a: u32 = 1;
        let mut b: u32 = 0;
        for &byte in data {
            a = (a + u32::from(byte)) % MOD_ADLER;
            b = (b + a) % MOD_ADLER;
        }
        (b << 16) | a
    }
}

// ---------------------------------------------------------------------------
// Instruction iterator (for inspection/debugging)
// ---------------------------------------------------------------------------

/// Iterate over a window's decoded instructions without producing output.
///
/// Stops after the first error.
pub struct InstructionIterator<'s, 'a> {
    window: Window<'a>,
    cache: AddressCache,
    code_table: &'s CodeTable,
    emitted: u64,
    pending: Option<super::code_table::HalfInstruction>,
    done: bool,
}

impl InstructionIterator<'_, '_> {
    fn step(&mut self) -> Result<Option<Instruction>, WindowError> {
        loop {
            let half = match self.pending.take() {
                Some(half) => half,
                None => {
                    if self.window.opcodes.is_empty() {
                        return Ok(None);
                    }
                    let opcode = self.window.opcodes.read_byte()?;
                    let entry = *self.code_table.get(opcode);
                    if entry.first.is_noop() && entry.second.is_noop() {
                        return Err(WindowError::UnknownOpcode(opcode));
                    }
                    if !entry.second.is_noop() {
                        self.pending = Some(entry.second);
                    }
                    entry.first
                }
            };

            let here = self.window.descriptor.source_segment_length + self.emitted;
            let Some(inst) = Instruction::decode(half, &mut self.window, &mut self.cache, here)?
            else {
                continue;
            };
            if let Instruction::Add { size } = inst {
                self.window.literals.read_bytes(size)?;
            }
            self.emitted += inst.size() as u64;
            return Ok(Some(inst));
        }
    }
}

impl Iterator for InstructionIterator<'_, '_> {
    type Item = Result<Instruction, WindowError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(inst)) => Some(Ok(inst)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
