// File-level helpers for puffing and huffing.
//
// `puff_file()` and `huff_file()` wrap the in-memory transcoder with
// buffered file I/O and return stats about what was transcoded. When the
// `file-io` feature is enabled, SHA-256 digests of input and output are
// computed as well.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::engine;
use crate::error::Error;
use crate::locator;

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `puff_file()`.
#[derive(Debug, Clone)]
pub struct PuffStats {
    /// DEFLATE input size in bytes.
    pub input_size: u64,
    /// Puff output size in bytes.
    pub output_size: u64,
    /// Number of DEFLATE blocks transcoded.
    pub blocks: u64,
    /// Number of DEFLATE streams (final-block sequences) in the input.
    pub streams: u64,
    /// SHA-256 of the input (if the `file-io` feature is enabled).
    pub input_sha256: Option<[u8; 32]>,
    /// SHA-256 of the output (if the `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

/// Statistics returned by `huff_file()`.
#[derive(Debug, Clone)]
pub struct HuffStats {
    /// Puff input size in bytes.
    pub input_size: u64,
    /// DEFLATE output size in bytes.
    pub output_size: u64,
    /// SHA-256 of the output (if the `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file-level operations.
#[derive(Debug)]
pub enum IoError {
    /// I/O error (file open, read, write).
    Io(io::Error),
    /// Transcoding error.
    Puffin(Error),
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Puffin(e) => write!(f, "transcode error: {e}"),
        }
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Puffin(e) => Some(e),
        }
    }
}

impl From<io::Error> for IoError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<Error> for IoError {
    fn from(e: Error) -> Self {
        Self::Puffin(e)
    }
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

#[cfg(feature = "file-io")]
fn sha256(data: &[u8]) -> Option<[u8; 32]> {
    use sha2::Digest;
    let mut hasher = sha2::Sha256::new();
    hasher.update(data);
    Some(hasher.finalize().into())
}

#[cfg(not(feature = "file-io"))]
fn sha256(_data: &[u8]) -> Option<[u8; 32]> {
    None
}

// ---------------------------------------------------------------------------
// Buffered output
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

fn write_output(path: &Path, data: &[u8]) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::with_capacity(BUF_SIZE, file);
    writer.write_all(data)?;
    writer.flush()
}

// ---------------------------------------------------------------------------
// puff_file / huff_file
// ---------------------------------------------------------------------------

/// Puff a raw DEFLATE file into a puff file.
///
/// The input is read fully into memory; the transcoder works on in-memory
/// buffers (DEFLATE streams cannot be split at arbitrary byte boundaries).
pub fn puff_file(input_path: &Path, output_path: &Path) -> Result<PuffStats, IoError> {
    let deflate = std::fs::read(input_path)?;

    let blocks = locator::locate_deflate_blocks(&deflate)?;
    let streams = blocks.iter().filter(|b| b.final_block).count() as u64;
    let puffed = engine::puff_to_vec(&deflate)?;
    write_output(output_path, &puffed)?;

    Ok(PuffStats {
        input_size: deflate.len() as u64,
        output_size: puffed.len() as u64,
        blocks: blocks.len() as u64,
        streams,
        input_sha256: sha256(&deflate),
        output_sha256: sha256(&puffed),
    })
}

/// Huff a puff file back into a raw DEFLATE file.
pub fn huff_file(input_path: &Path, output_path: &Path) -> Result<HuffStats, IoError> {
    let puff = std::fs::read(input_path)?;
    let deflate = engine::huff_to_vec(&puff)?;
    write_output(output_path, &deflate)?;

    Ok(HuffStats {
        input_size: puff.len() as u64,
        output_size: deflate.len() as u64,
        output_sha256: sha256(&deflate),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
