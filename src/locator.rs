// DEFLATE-region discovery inside container formats.
//
// Finds the byte extents of raw DEFLATE streams in gzip members, zlib
// wrappers and ZIP archives, plus a per-block locator over a bare stream.
// Discovery never guesses: a member whose deflate payload does not parse
// fails the whole container, and unsupported shapes (zip64, preset
// dictionaries) are skipped or rejected explicitly.
//
// The stream length of a deflate payload is found the only reliable way:
// by running the Puffer over it with a sizing writer and taking the byte
// offset where the final block's padding ends.

use crate::deflate::{BitReader, DeflateBlock, Puffer};
use crate::error::{Error, Result};
use crate::puff::PuffWriter;

/// A byte range inside a container or stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteExtent {
    pub offset: u64,
    pub length: u64,
}

impl ByteExtent {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }
}

// ---------------------------------------------------------------------------
// gzip (RFC 1952)
// ---------------------------------------------------------------------------

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

const FHCRC: u8 = 1 << 1;
const FEXTRA: u8 = 1 << 2;
const FNAME: u8 = 1 << 3;
const FCOMMENT: u8 = 1 << 4;
/// Mask of reserved gzip flag bits.
const FRESERVED: u8 = 0xE0;

/// Locate the deflate extent of every member in a gzip file.
pub fn locate_deflates_in_gzip(data: &[u8]) -> Result<Vec<ByteExtent>> {
    if data.is_empty() {
        return Err(Error::invalid(0, "not a gzip stream"));
    }

    let mut extents = Vec::new();
    let mut pos = 0usize;
    while pos < data.len() {
        pos = skip_gzip_header(data, pos)?;
        let size = deflate_stream_size(&data[pos..])?;
        extents.push(ByteExtent::new(pos as u64, size as u64));
        pos += size;
        // CRC-32 and ISIZE trailer.
        if data.len() - pos < 8 {
            return Err(Error::InsufficientInput {
                offset: data.len() as u64,
            });
        }
        pos += 8;
    }
    Ok(extents)
}

fn skip_gzip_header(data: &[u8], start: usize) -> Result<usize> {
    let at = |p: usize| p as u64;
    if data.len() - start < 10 {
        return Err(Error::InsufficientInput {
            offset: at(data.len()),
        });
    }
    if data[start..start + 2] != GZIP_MAGIC {
        return Err(Error::invalid(at(start), "bad gzip magic"));
    }
    if data[start + 2] != 8 {
        return Err(Error::invalid(at(start + 2), "gzip member is not deflate"));
    }
    let flags = data[start + 3];
    if flags & FRESERVED != 0 {
        return Err(Error::invalid(at(start + 3), "reserved gzip flag bits set"));
    }

    let mut pos = start + 10;
    if flags & FEXTRA != 0 {
        let xlen = read_u16_le(data, pos)? as usize;
        pos += 2 + xlen;
    }
    if flags & FNAME != 0 {
        pos = skip_zero_terminated(data, pos)?;
    }
    if flags & FCOMMENT != 0 {
        pos = skip_zero_terminated(data, pos)?;
    }
    if flags & FHCRC != 0 {
        pos += 2;
    }
    if pos > data.len() {
        return Err(Error::InsufficientInput {
            offset: at(data.len()),
        });
    }
    Ok(pos)
}

fn skip_zero_terminated(data: &[u8], start: usize) -> Result<usize> {
    match data[start.min(data.len())..].iter().position(|&b| b == 0) {
        Some(idx) => Ok(start + idx + 1),
        None => Err(Error::InsufficientInput {
            offset: data.len() as u64,
        }),
    }
}

// ---------------------------------------------------------------------------
// zlib (RFC 1950)
// ---------------------------------------------------------------------------

/// Locate the deflate extent of a zlib-wrapped stream.
pub fn locate_deflates_in_zlib(data: &[u8]) -> Result<Vec<ByteExtent>> {
    if data.len() < 2 {
        return Err(Error::InsufficientInput {
            offset: data.len() as u64,
        });
    }
    let cmf = data[0];
    let flg = data[1];
    if cmf & 0x0F != 8 {
        return Err(Error::invalid(0, "zlib stream is not deflate"));
    }
    if (u16::from(cmf) * 256 + u16::from(flg)) % 31 != 0 {
        return Err(Error::invalid(0, "zlib header check failed"));
    }
    if flg & 0x20 != 0 {
        return Err(Error::invalid(1, "preset dictionaries are not supported"));
    }

    let size = deflate_stream_size(&data[2..])?;
    // Adler-32 trailer.
    if data.len() - 2 - size < 4 {
        return Err(Error::InsufficientInput {
            offset: data.len() as u64,
        });
    }
    Ok(vec![ByteExtent::new(2, size as u64)])
}

// ---------------------------------------------------------------------------
// ZIP
// ---------------------------------------------------------------------------

const EOCD_SIG: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];
const CENTRAL_SIG: [u8; 4] = [0x50, 0x4B, 0x01, 0x02];
const LOCAL_SIG: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

const EOCD_LEN: usize = 22;
const CENTRAL_LEN: usize = 46;
const LOCAL_LEN: usize = 30;

const METHOD_DEFLATE: u16 = 8;

/// Locate the deflate extents of method-8 members in a ZIP archive, in
/// file order. Members the archive stores with other methods (or zip64
/// sizes) are skipped; the caller treats those regions opaquely.
pub fn locate_deflates_in_zip(data: &[u8]) -> Result<Vec<ByteExtent>> {
    let eocd = find_eocd(data)?;
    let entries = read_u16_le(data, eocd + 10)? as usize;
    let cd_offset = read_u32_le(data, eocd + 16)? as usize;

    let mut extents = Vec::new();
    let mut pos = cd_offset;
    for _ in 0..entries {
        if data.len() - pos < CENTRAL_LEN || data[pos..pos + 4] != CENTRAL_SIG {
            return Err(Error::invalid(pos as u64, "bad central directory entry"));
        }
        let method = read_u16_le(data, pos + 10)?;
        let compressed_size = read_u32_le(data, pos + 20)? as u64;
        let name_len = read_u16_le(data, pos + 28)? as usize;
        let extra_len = read_u16_le(data, pos + 30)? as usize;
        let comment_len = read_u16_le(data, pos + 32)? as usize;
        let local_offset = read_u32_le(data, pos + 42)? as usize;
        pos += CENTRAL_LEN + name_len + extra_len + comment_len;

        if method != METHOD_DEFLATE || compressed_size == 0 || compressed_size == 0xFFFF_FFFF {
            continue;
        }

        if data.len() - local_offset < LOCAL_LEN || data[local_offset..local_offset + 4] != LOCAL_SIG
        {
            return Err(Error::invalid(local_offset as u64, "bad local file header"));
        }
        let lname = read_u16_le(data, local_offset + 26)? as usize;
        let lextra = read_u16_le(data, local_offset + 28)? as usize;
        let start = local_offset + LOCAL_LEN + lname + lextra;
        if start as u64 + compressed_size > data.len() as u64 {
            return Err(Error::InsufficientInput {
                offset: data.len() as u64,
            });
        }
        extents.push(ByteExtent::new(start as u64, compressed_size));
    }

    extents.sort_by_key(|e| e.offset);
    Ok(extents)
}

fn find_eocd(data: &[u8]) -> Result<usize> {
    if data.len() < EOCD_LEN {
        return Err(Error::InsufficientInput {
            offset: data.len() as u64,
        });
    }
    // The EOCD sits in the last 64 KiB + 22 bytes (comment can pad it out).
    let scan_start = data.len().saturating_sub(EOCD_LEN + u16::MAX as usize);
    (scan_start..=data.len() - EOCD_LEN)
        .rev()
        .find(|&i| data[i..i + 4] == EOCD_SIG)
        .ok_or_else(|| Error::invalid(data.len() as u64, "end of central directory not found"))
}

// ---------------------------------------------------------------------------
// Bare deflate streams
// ---------------------------------------------------------------------------

/// Split a bare DEFLATE buffer (one or more adjacent streams) into its
/// blocks, with bit-granular extents.
pub fn locate_deflate_blocks(deflate: &[u8]) -> Result<Vec<DeflateBlock>> {
    let mut puffer = Puffer::new();
    let mut blocks = Vec::new();
    let mut pw = PuffWriter::sizing();
    let mut br = BitReader::new(deflate);
    while !br.is_exhausted() {
        puffer.puff_deflate_with_blocks(&mut br, &mut pw, Some(&mut blocks))?;
    }
    Ok(blocks)
}

/// Byte length of the single DEFLATE stream starting at `data[0]`,
/// including its final padding.
fn deflate_stream_size(data: &[u8]) -> Result<usize> {
    let mut puffer = Puffer::new();
    let mut pw = PuffWriter::sizing();
    let mut br = BitReader::new(data);
    puffer.puff_deflate(&mut br, &mut pw)?;
    Ok(br.offset())
}

// ---------------------------------------------------------------------------
// Little-endian field readers
// ---------------------------------------------------------------------------

fn read_u16_le(data: &[u8], pos: usize) -> Result<u16> {
    if data.len() < pos + 2 {
        return Err(Error::InsufficientInput {
            offset: data.len() as u64,
        });
    }
    Ok(u16::from_le_bytes([data[pos], data[pos + 1]]))
}

fn read_u32_le(data: &[u8], pos: usize) -> Result<u32> {
    if data.len() < pos + 4 {
        return Err(Error::InsufficientInput {
            offset: data.len() as u64,
        });
    }
    Ok(u32::from_le_bytes([
        data[pos],
        data[pos + 1],
        data[pos + 2],
        data[pos + 3],
    ]))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
