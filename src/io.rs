// File-level and writer-level decoding helpers.
//
// `DeltaDecoder` drives a `StreamDecoder` and forwards each committed
// window to any `Write`.  `decode_file()` wires it up with buffered file
// I/O and, behind the `file-io` feature, a streaming SHA-256 of the output.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::vcdiff::decoder::{DecodeOptions, StreamDecoder};
use crate::vcdiff::error::DecodeError;
use crate::vcdiff::header::FileHeader;
use crate::vcdiff::target::TargetBuffer;

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

// ---------------------------------------------------------------------------
// DeltaDecoder
// ---------------------------------------------------------------------------

/// Window-by-window decoder writing to a `Write` sink.
///
/// This is not a bounded-memory streaming writer: every decoded byte stays
/// in an internal `TargetBuffer` for the decoder's whole lifetime, even
/// after it has been written out, because VCD_TARGET windows may copy
/// from any earlier output.  Memory therefore grows with the total output
/// size (see [`DeltaDecoder::retained_len`]).  A window reaches the writer
/// only once it has fully decoded (and its checksum, if any, matched).
pub struct DeltaDecoder<R: Read> {
    inner: StreamDecoder<R>,
    target: TargetBuffer,
}

impl<R: Read> DeltaDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self::with_options(reader, DecodeOptions::default())
    }

    pub fn with_options(reader: R, options: DecodeOptions) -> Self {
        Self {
            inner: StreamDecoder::new(reader, options),
            target: TargetBuffer::new(),
        }
    }

    pub fn read_header(&mut self) -> Result<&FileHeader, DecodeError> {
        self.inner.read_header()
    }

    /// Bytes of decoded output currently held in memory.
    pub fn retained_len(&self) -> usize {
        self.target.len()
    }

    /// Decode all windows into `writer`.  Returns total bytes written.
    pub fn decode_to<W: Write>(&mut self, source: &[u8], writer: &mut W) -> Result<u64, DecodeError> {
        while self.decode_window_to(source, writer)?.is_some() {}
        Ok(self.bytes_decoded())
    }

    /// Decode the next window into `writer`.
    ///
    /// Returns `Some(window_size)`, or `None` when the stream is exhausted.
    pub fn decode_window_to<W: Write>(
        &mut self,
        source: &[u8],
        writer: &mut W,
    ) -> Result<Option<u64>, DecodeError> {
        let start = self.target.len();
        if !self.inner.decode_window(source, &mut self.target)? {
            return Ok(None);
        }
        let window = &self.target.as_slice()[start..];
        writer.write_all(window)?;
        Ok(Some(window.len() as u64))
    }

    pub fn bytes_decoded(&self) -> u64 {
        self.inner.bytes_decoded()
    }

    pub fn windows_decoded(&self) -> u64 {
        self.inner.windows_decoded()
    }
}

// ---------------------------------------------------------------------------
// decode_file
// ---------------------------------------------------------------------------

/// Statistics returned by `decode_file()`.
#[derive(Debug, Clone)]
pub struct DecodeStats {
    pub source_size: u64,
    pub delta_size: u64,
    pub output_size: u64,
    pub windows: u64,
    /// SHA-256 of the reconstructed output (`file-io` feature only).
    pub output_sha256: Option<[u8; 32]>,
}

/// Where `decode_file()` sends its output.
pub enum Output<'a> {
    /// Write to a path, creating or truncating it.
    Path(&'a Path),
    /// Write to stdout.
    Stdout,
    /// Decode and verify only.
    Discard,
}

/// Decode `delta_path` against an optional source file.
///
/// The source is read fully into memory; the delta is streamed.
pub fn decode_file(
    source_path: Option<&Path>,
    delta_path: &Path,
    output: Output<'_>,
    options: DecodeOptions,
) -> Result<DecodeStats, IoError> {
    let source = match source_path {
        Some(p) => std::fs::read(p)?,
        None => Vec::new(),
    };
    let delta_file = File::open(delta_path)?;
    let delta_size = delta_file.metadata()?.len();
    let delta_reader = BufReader::with_capacity(BUF_SIZE, delta_file);

    let sink: Box<dyn Write> = match output {
        Output::Path(p) => Box::new(File::create(p)?),
        Output::Stdout => Box::new(io::stdout().lock()),
        Output::Discard => Box::new(io::sink()),
    };
    let mut writer = BufWriter::with_capacity(BUF_SIZE, sink);

    let mut decoder = DeltaDecoder::with_options(delta_reader, options);

    #[cfg(feature = "file-io")]
    let mut hasher = sha2::Sha256::new();

    #[cfg(feature = "file-io")]
    let output_size = decoder.decode_to(
        &source,
        &mut HashingWriter {
            inner: &mut writer,
            hasher: &mut hasher,
        },
    )?;
    #[cfg(not(feature = "file-io"))]
    let output_size = decoder.decode_to(&source, &mut writer)?;

    writer.flush()?;

    #[cfg(feature = "file-io")]
    let output_sha256 = Some(hasher.finalize().into());
    #[cfg(not(feature = "file-io"))]
    let output_sha256: Option<[u8; 32]> = None;

    Ok(DecodeStats {
        source_size: source.len() as u64,
        delta_size,
        output_size,
        windows: decoder.windows_decoded(),
        output_sha256,
    })
}

#[cfg(feature = "file-io")]
struct HashingWriter<'a, W: Write> {
    inner: &'a mut W,
    hasher: &'a mut sha2::Sha256,
}

#[cfg(feature = "file-io")]
impl<W: Write> Write for HashingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
