//! vcdecode: VCDIFF (RFC 3284) delta decoding in Rust.
//!
//! The crate provides:
//! - The VCDIFF decode engine and stream parser (`vcdiff`)
//! - Writer- and file-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use vcdecode::vcdiff::decode_memory;
//!
//! let source = std::fs::read("old.bin").unwrap();
//! let delta = std::fs::read("patch.vcdiff").unwrap();
//! let target = decode_memory(&delta, &source).unwrap();
//! std::fs::write("new.bin", target).unwrap();
//! ```
//!
//! Lower-level callers that already hold a window's sections can drive
//! [`vcdiff::WindowDecoder`] directly.

pub mod io;
pub mod vcdiff;

#[cfg(feature = "cli")]
pub mod cli;
