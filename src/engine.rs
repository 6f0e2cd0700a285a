// High-level transcoding entry points.
//
// Ties the DEFLATE-side state machines to the puff format:
//
//   puff(deflate, out) / huff(puff, out)   caller-owned output buffers
//   puff_size / deflate_size               sizing passes (no output)
//   puff_to_vec / huff_to_vec              exact-size allocation via sizing
//   puff_stream / huff_stream              Read/Write convenience wrappers
//
// An input may contain several DEFLATE streams back to back (each ending
// with a final block and byte-aligned); they transcode to consecutive
// block-marker sequences in the same puff buffer.

use std::io::{Read, Write};

use crate::deflate::{BitReader, BitWriter, Huffer, Puffer};
use crate::error::Result;
use crate::puff::{PuffReader, PuffWriter};

/// Transcode DEFLATE bytes into `out`, returning the size written.
pub fn puff(deflate: &[u8], out: &mut [u8]) -> Result<usize> {
    let mut pw = PuffWriter::new(out);
    puff_into(deflate, &mut pw)
}

/// Compute the puff size of `deflate` without producing output.
pub fn puff_size(deflate: &[u8]) -> Result<usize> {
    let mut pw = PuffWriter::sizing();
    puff_into(deflate, &mut pw)
}

fn puff_into(deflate: &[u8], pw: &mut PuffWriter<'_>) -> Result<usize> {
    let mut puffer = Puffer::new();
    let mut br = BitReader::new(deflate);
    while !br.is_exhausted() {
        puffer.puff_deflate(&mut br, pw)?;
    }
    pw.finish()
}

/// Transcode a puff buffer back into DEFLATE bytes, returning the size
/// written. `huff(puff(d)) == d` for every accepted DEFLATE input.
pub fn huff(puff: &[u8], out: &mut [u8]) -> Result<usize> {
    let mut bw = BitWriter::new(out);
    let mut huffer = Huffer::new();
    huffer.huff_deflate(&mut PuffReader::new(puff), &mut bw)?;
    Ok(bw.size_written())
}

/// Compute the DEFLATE size of a puff buffer without producing output.
pub fn deflate_size(puff: &[u8]) -> Result<usize> {
    let mut bw = BitWriter::sizing();
    let mut huffer = Huffer::new();
    huffer.huff_deflate(&mut PuffReader::new(puff), &mut bw)?;
    Ok(bw.size_written())
}

/// Puff into a freshly allocated, exactly-sized buffer.
pub fn puff_to_vec(deflate: &[u8]) -> Result<Vec<u8>> {
    let size = puff_size(deflate)?;
    let mut out = vec![0u8; size];
    puff(deflate, &mut out)?;
    Ok(out)
}

/// Huff into a freshly allocated, exactly-sized buffer.
pub fn huff_to_vec(puff: &[u8]) -> Result<Vec<u8>> {
    let size = deflate_size(puff)?;
    let mut out = vec![0u8; size];
    huff(puff, &mut out)?;
    Ok(out)
}

/// Read all of `src`, puff it, and write the result to `dst`.
/// Returns (input bytes, output bytes).
pub fn puff_stream<R: Read, W: Write>(src: &mut R, dst: &mut W) -> std::io::Result<(u64, u64)> {
    let mut deflate = Vec::new();
    src.read_to_end(&mut deflate)?;
    let out = puff_to_vec(&deflate)?;
    dst.write_all(&out)?;
    Ok((deflate.len() as u64, out.len() as u64))
}

/// Read all of `src`, huff it, and write the result to `dst`.
/// Returns (input bytes, output bytes).
pub fn huff_stream<R: Read, W: Write>(src: &mut R, dst: &mut W) -> std::io::Result<(u64, u64)> {
    let mut puff_buf = Vec::new();
    src.read_to_end(&mut puff_buf)?;
    let out = huff_to_vec(&puff_buf)?;
    dst.write_all(&out)?;
    Ok((puff_buf.len() as u64, out.len() as u64))
}
