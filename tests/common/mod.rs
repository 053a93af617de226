// Hand-assembled VCDIFF streams for integration tests.
//
// Opcodes are from the default code table: RUN size 0 is opcode 0, ADD
// size 0 is opcode 1, COPY size 0 in mode m is opcode 19 + 16m.  Every
// instruction here carries an explicit varint size.

#![allow(dead_code)]

pub const MAGIC: [u8; 4] = [0xD6, 0xC3, 0xC4, 0x00];

pub const VCD_SOURCE: u8 = 0x01;
pub const VCD_TARGET: u8 = 0x02;
pub const VCD_ADLER32: u8 = 0x04;

pub fn varint(mut v: u64) -> Vec<u8> {
    let mut out = vec![(v & 0x7F) as u8];
    v >>= 7;
    while v > 0 {
        out.push(0x80 | (v & 0x7F) as u8);
        v >>= 7;
    }
    out.reverse();
    out
}

#[derive(Debug, Clone, Default)]
pub struct WindowBuilder {
    indicator: u8,
    segment: (u64, u64),
    target_len: Option<u64>,
    produced: u64,
    delta_indicator: u8,
    adler32: Option<u32>,
    pub data: Vec<u8>,
    pub inst: Vec<u8>,
    pub addr: Vec<u8>,
}

impl WindowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy segment `[offset, offset + len)` of the source.
    pub fn source(mut self, offset: u64, len: u64) -> Self {
        self.indicator |= VCD_SOURCE;
        self.segment = (offset, len);
        self
    }

    /// Copy segment `[offset, offset + len)` of earlier output.
    pub fn target_segment(mut self, offset: u64, len: u64) -> Self {
        self.indicator |= VCD_TARGET;
        self.segment = (offset, len);
        self
    }

    /// Declare a window length other than what the instructions produce.
    pub fn target_len(mut self, len: u64) -> Self {
        self.target_len = Some(len);
        self
    }

    /// Mark sections as secondary-compressed (VCD_DATACOMP etc.).
    pub fn delta_indicator(mut self, bits: u8) -> Self {
        self.delta_indicator = bits;
        self
    }

    pub fn adler32(mut self, checksum: u32) -> Self {
        self.indicator |= VCD_ADLER32;
        self.adler32 = Some(checksum);
        self
    }

    pub fn add(mut self, bytes: &[u8]) -> Self {
        self.inst.push(1);
        self.inst.extend(varint(bytes.len() as u64));
        self.data.extend_from_slice(bytes);
        self.produced += bytes.len() as u64;
        self
    }

    pub fn run(mut self, size: u64, byte: u8) -> Self {
        self.inst.push(0);
        self.inst.extend(varint(size));
        self.data.push(byte);
        self.produced += size;
        self
    }

    /// COPY with mode 0 (absolute address).
    pub fn copy_self(self, size: u64, address: u64) -> Self {
        self.copy(size, 0, &varint(address))
    }

    /// COPY with mode 1 (distance back from `here`).
    pub fn copy_here(self, size: u64, distance: u64) -> Self {
        self.copy(size, 1, &varint(distance))
    }

    /// COPY with an arbitrary mode and pre-encoded address bytes.
    pub fn copy(mut self, size: u64, mode: u8, address: &[u8]) -> Self {
        self.inst.push(19 + 16 * mode);
        self.inst.extend(varint(size));
        self.addr.extend_from_slice(address);
        self.produced += size;
        self
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let target_len = self.target_len.unwrap_or(self.produced);
        out.push(self.indicator);
        if self.indicator & (VCD_SOURCE | VCD_TARGET) != 0 {
            out.extend(varint(self.segment.1));
            out.extend(varint(self.segment.0));
        }

        let mut body = varint(target_len);
        body.push(self.delta_indicator);
        body.extend(varint(self.data.len() as u64));
        body.extend(varint(self.inst.len() as u64));
        body.extend(varint(self.addr.len() as u64));
        if let Some(cksum) = self.adler32 {
            body.extend_from_slice(&cksum.to_be_bytes());
        }
        body.extend_from_slice(&self.data);
        body.extend_from_slice(&self.inst);
        body.extend_from_slice(&self.addr);

        out.extend(varint(body.len() as u64));
        out.extend(body);
    }
}

/// File header with no optional parts.
pub fn plain_header() -> Vec<u8> {
    let mut out = MAGIC.to_vec();
    out.push(0);
    out
}

pub fn delta(windows: &[WindowBuilder]) -> Vec<u8> {
    let mut out = plain_header();
    for w in windows {
        w.encode_into(&mut out);
    }
    out
}

/// Reference Adler-32 for building checksummed windows.
pub fn adler32(data: &[u8]) -> u32 {
    let (mut a, mut b) = (1u32, 0u32);
    for &byte in data {
        a = (a + u32::from(byte)) % 65521;
        b = (b + a) % 65521;
    }
    (b << 16) | a
}
