//! Oxipuff: bidirectional DEFLATE <-> puff transcoding.
//!
//! Puff is a byte-aligned, easily-diffable restatement of a DEFLATE bit
//! stream. Expanding two compressed artifacts into puff before diffing them
//! (and huffing patched puff back afterwards) makes binary patches between
//! them dramatically smaller, while the transcoder's bit-exact round trip
//! keeps the reconstructed DEFLATE bytes identical to the originals.
//!
//! The crate provides:
//! - The core transcoder (`deflate`, `puff`, `engine`)
//! - Deflate-region discovery in gzip/zlib/zip containers (`locator`)
//! - A seekable puff-space view of a container (`stream`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! // A DEFLATE stream: one fixed-Huffman block containing 'A'.
//! let deflate = [0x73, 0x04, 0x00];
//!
//! let puffed = oxipuff::puff_to_vec(&deflate).unwrap();
//! let huffed = oxipuff::huff_to_vec(&puffed).unwrap();
//! assert_eq!(huffed, deflate);
//! ```

pub mod deflate;
pub mod engine;
pub mod error;
pub mod io;
pub mod locator;
pub mod puff;
pub mod stream;

#[cfg(feature = "cli")]
pub mod cli;

pub use engine::{deflate_size, huff, huff_to_vec, puff, puff_size, puff_to_vec};
pub use error::{Error, Result};
