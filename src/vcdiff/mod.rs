// VCDIFF decoding (RFC 3284), compatible with xdelta3 output.
//
// Layers, bottom up:
//
// - `varint`        base-128 big-endian integers
// - `cursor`        bounds-checked reads over one window section
// - `address_cache` NEAR/SAME cache that decodes COPY addresses
// - `code_table`    opcode -> instruction pair table (default or custom)
// - `target`        append-only, randomly readable decoded output
// - `window`        one window's descriptor and section cursors
// - `instruction`   ADD/RUN/COPY decoding and execution
// - `header`        file and window headers
// - `decoder`       window replay and whole-stream driving

pub mod address_cache;
pub mod code_table;
pub mod cursor;
pub mod decoder;
pub mod error;
pub mod header;
pub mod instruction;
pub mod target;
pub mod varint;
pub mod window;

pub use address_cache::AddressCache;
pub use code_table::{CodeTable, CodeTableEntry, HalfInstruction, InstructionKind};
pub use decoder::{
    DecodeOptions, InstructionIterator, StreamDecoder, WindowDecoder, decode_memory,
    decode_memory_with,
};
pub use error::{DecodeError, Section, WindowError};
pub use header::{FileHeader, VCDIFF_MAGIC, WindowHeader};
pub use instruction::Instruction;
pub use target::TargetBuffer;
pub use window::{Window, WindowDescriptor, WindowSections};
