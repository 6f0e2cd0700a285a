// PuffinStream: the puff-space view of a container.
//
// Given the extent mappings of the deflate regions inside a stream, this
// presents the "puffed" rendition of the whole stream (raw bytes outside
// the regions, puff bytes inside them) as a seekable `Read`, and the
// symmetric sequential `Write` that huffs each completed puff region back
// into byte-identical deflate.
//
// Reading puffs regions on demand and keeps recently used ones in a small
// LRU cache bounded by a byte budget. Writing buffers at most one region's
// puff bytes at a time.

use std::collections::VecDeque;
use std::io::{self, Read, Seek, SeekFrom, Write};

use rayon::prelude::*;

use crate::deflate::{BitReader, Huffer, Puffer};
use crate::engine;
use crate::locator::ByteExtent;
use crate::puff::{PuffReader, PuffWriter};

/// Default byte budget for the read-side region cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 8 * 1024 * 1024; // 8 MiB

/// One deflate region and its location in puff space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtentMapping {
    pub deflate_offset: u64,
    pub deflate_length: u64,
    pub puff_offset: u64,
    pub puff_length: u64,
}

/// Compute the extent mappings (and the total puff-space size) for the
/// deflate regions of a stream. Region puff sizes are computed in parallel;
/// each region is an independent transcode.
pub fn find_puff_locations<S: Read + Seek>(
    source: &mut S,
    deflates: &[ByteExtent],
) -> io::Result<(Vec<ExtentMapping>, u64)> {
    let stream_size = source.seek(SeekFrom::End(0))?;

    let mut regions = Vec::with_capacity(deflates.len());
    for extent in deflates {
        source.seek(SeekFrom::Start(extent.offset))?;
        let mut data = vec![0u8; extent.length as usize];
        source.read_exact(&mut data)?;
        regions.push(data);
    }

    let sizes = regions
        .par_iter()
        .map(|data| engine::puff_size(data))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io::Error::from)?;

    let mut mappings = Vec::with_capacity(deflates.len());
    let mut delta = 0i64;
    for (extent, puff_len) in deflates.iter().zip(&sizes) {
        mappings.push(ExtentMapping {
            deflate_offset: extent.offset,
            deflate_length: extent.length,
            puff_offset: (extent.offset as i64 + delta) as u64,
            puff_length: *puff_len as u64,
        });
        delta += *puff_len as i64 - extent.length as i64;
    }
    let puff_size = (stream_size as i64 + delta) as u64;
    validate_mappings(&mappings, stream_size)?;
    Ok((mappings, puff_size))
}

/// Check ordering, bounds and offset consistency; returns the puff size.
fn validate_mappings(mappings: &[ExtentMapping], stream_size: u64) -> io::Result<u64> {
    let mut deflate_end = 0u64;
    let mut puff_end = 0u64;
    for m in mappings {
        let consistent = m.deflate_offset >= deflate_end
            && m.deflate_length > 0
            && m.puff_length > 0
            && m.deflate_offset + m.deflate_length <= stream_size
            && m.puff_offset == puff_end + (m.deflate_offset - deflate_end);
        if !consistent {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("inconsistent extent mapping: {m:?}"),
            ));
        }
        puff_end = m.puff_offset + m.puff_length;
        deflate_end = m.deflate_offset + m.deflate_length;
    }
    Ok(puff_end + (stream_size - deflate_end))
}

// ---------------------------------------------------------------------------
// Region cache (read side)
// ---------------------------------------------------------------------------

struct RegionCache {
    /// (mapping index, puffed bytes), most recently used at the back.
    entries: VecDeque<(usize, Vec<u8>)>,
    capacity: usize,
    used: usize,
}

impl RegionCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
            used: 0,
        }
    }

    fn touch(&mut self, index: usize) -> bool {
        if let Some(pos) = self.entries.iter().position(|(i, _)| *i == index) {
            let entry = self.entries.remove(pos).unwrap();
            self.entries.push_back(entry);
            true
        } else {
            false
        }
    }

    fn insert(&mut self, index: usize, data: Vec<u8>) {
        self.used += data.len();
        self.entries.push_back((index, data));
        // The newest region always stays resident, even over budget.
        while self.entries.len() > 1 && self.used > self.capacity {
            let (_, evicted) = self.entries.pop_front().unwrap();
            self.used -= evicted.len();
        }
    }

    fn back(&self) -> &[u8] {
        &self.entries.back().unwrap().1
    }
}

// ---------------------------------------------------------------------------
// PuffinStream
// ---------------------------------------------------------------------------

/// Where the puff-space cursor currently sits.
enum Section {
    /// Inside mapping `index`, `offset` bytes into its puff bytes.
    Region { index: usize, offset: u64 },
    /// In raw bytes: `deflate_pos` on the stream side, `len` bytes left
    /// until the next region (or the end).
    Raw { deflate_pos: u64, len: u64 },
    End,
}

pub struct PuffinStream<S> {
    source: S,
    mappings: Vec<ExtentMapping>,
    stream_size: u64,
    puff_size: u64,
    /// Cursor in puff space.
    pos: u64,

    // Read side.
    puffer: Puffer,
    cache: RegionCache,
    region_buf: Vec<u8>,

    // Write side.
    huffer: Huffer,
    pending: Vec<u8>,
}

impl<S> PuffinStream<S> {
    fn init(source: S, stream_size: u64, mappings: Vec<ExtentMapping>, cache: usize) -> io::Result<Self> {
        let puff_size = validate_mappings(&mappings, stream_size)?;
        Ok(Self {
            source,
            mappings,
            stream_size,
            puff_size,
            pos: 0,
            puffer: Puffer::new(),
            cache: RegionCache::new(cache),
            region_buf: Vec::new(),
            huffer: Huffer::new(),
            pending: Vec::new(),
        })
    }

    /// Total size of the puff-space view.
    pub fn puff_size(&self) -> u64 {
        self.puff_size
    }

    /// Size of the underlying (deflate-side) stream.
    pub fn stream_size(&self) -> u64 {
        self.stream_size
    }

    fn section_at(&self, pos: u64) -> Section {
        if pos >= self.puff_size {
            return Section::End;
        }
        // First mapping that does not end at or before `pos`.
        let idx = self
            .mappings
            .partition_point(|m| m.puff_offset + m.puff_length <= pos);
        if idx < self.mappings.len() && pos >= self.mappings[idx].puff_offset {
            return Section::Region {
                index: idx,
                offset: pos - self.mappings[idx].puff_offset,
            };
        }
        // Raw gap between mapping idx-1 (if any) and mapping idx (if any).
        let shift = if idx == 0 {
            0
        } else {
            let prev = &self.mappings[idx - 1];
            (prev.puff_offset + prev.puff_length) as i64
                - (prev.deflate_offset + prev.deflate_length) as i64
        };
        let gap_end = self
            .mappings
            .get(idx)
            .map_or(self.puff_size, |m| m.puff_offset);
        Section::Raw {
            deflate_pos: (pos as i64 - shift) as u64,
            len: gap_end - pos,
        }
    }
}

impl<S: Read + Seek> PuffinStream<S> {
    /// A seekable reader over the puffed rendition of `source`.
    pub fn for_reading(
        source: S,
        mappings: Vec<ExtentMapping>,
        cache_capacity: usize,
    ) -> io::Result<Self> {
        let mut source = source;
        let stream_size = source.seek(SeekFrom::End(0))?;
        Self::init(source, stream_size, mappings, cache_capacity)
    }

    /// Puff region `index` (or fetch it from the cache) and return its bytes.
    fn region_bytes(&mut self, index: usize) -> io::Result<&[u8]> {
        if self.cache.touch(index) {
            return Ok(self.cache.back());
        }
        let m = self.mappings[index];
        self.region_buf.resize(m.deflate_length as usize, 0);
        self.source.seek(SeekFrom::Start(m.deflate_offset))?;
        self.source.read_exact(&mut self.region_buf)?;

        let mut puffed = vec![0u8; m.puff_length as usize];
        {
            let mut pw = PuffWriter::new(&mut puffed);
            let mut br = BitReader::new(&self.region_buf);
            while !br.is_exhausted() {
                self.puffer.puff_deflate(&mut br, &mut pw)?;
            }
            let written = pw.finish()?;
            if written as u64 != m.puff_length {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "puff size mismatch for region {index}: mapping says {}, got {written}",
                        m.puff_length
                    ),
                ));
            }
        }
        self.cache.insert(index, puffed);
        Ok(self.cache.back())
    }
}

impl<S: Read + Seek> Read for PuffinStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.section_at(self.pos) {
                Section::End => break,
                Section::Region { index, offset } => {
                    let data = self.region_bytes(index)?;
                    let available = &data[offset as usize..];
                    let n = available.len().min(buf.len() - filled);
                    buf[filled..filled + n].copy_from_slice(&available[..n]);
                    filled += n;
                    self.pos += n as u64;
                }
                Section::Raw { deflate_pos, len } => {
                    let n = (len.min((buf.len() - filled) as u64)) as usize;
                    self.source.seek(SeekFrom::Start(deflate_pos))?;
                    self.source.read_exact(&mut buf[filled..filled + n])?;
                    filled += n;
                    self.pos += n as u64;
                }
            }
        }
        Ok(filled)
    }
}

impl<S: Read + Seek> Seek for PuffinStream<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::End(delta) => self.puff_size as i64 + delta,
            SeekFrom::Current(delta) => self.pos as i64 + delta,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of puff stream",
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

impl<S: Write> PuffinStream<S> {
    /// A sequential writer that reconstructs the original stream from its
    /// puffed rendition. `stream_size` is the deflate-side size to rebuild.
    pub fn for_writing(sink: S, stream_size: u64, mappings: Vec<ExtentMapping>) -> io::Result<Self> {
        Self::init(sink, stream_size, mappings, 0)
    }

    /// Verify the whole puff space was written and return the sink.
    pub fn finish(self) -> io::Result<S> {
        if self.pos != self.puff_size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "puffin stream incomplete: wrote {} of {} puff bytes",
                    self.pos, self.puff_size
                ),
            ));
        }
        Ok(self.source)
    }

    /// Huff the completed puff region in `pending` back to deflate bytes.
    fn flush_region(&mut self, index: usize) -> io::Result<()> {
        let m = self.mappings[index];
        let mut deflate = vec![0u8; m.deflate_length as usize];
        let mut bw = crate::deflate::BitWriter::new(&mut deflate);
        self.huffer
            .huff_deflate(&mut PuffReader::new(&self.pending), &mut bw)?;
        if bw.size_written() as u64 != m.deflate_length {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "huff size mismatch for region {index}: mapping says {}, got {}",
                    m.deflate_length,
                    bw.size_written()
                ),
            ));
        }
        self.source.write_all(&deflate)?;
        self.pending.clear();
        Ok(())
    }
}

impl<S: Write> Write for PuffinStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut consumed = 0usize;
        while consumed < buf.len() {
            match self.section_at(self.pos) {
                Section::End => {
                    if consumed == 0 {
                        return Err(io::Error::new(
                            io::ErrorKind::WriteZero,
                            "write past end of puff stream",
                        ));
                    }
                    break;
                }
                Section::Region { index, offset } => {
                    debug_assert_eq!(offset as usize, self.pending.len());
                    let m = self.mappings[index];
                    let need = (m.puff_length - offset) as usize;
                    let n = need.min(buf.len() - consumed);
                    self.pending.extend_from_slice(&buf[consumed..consumed + n]);
                    consumed += n;
                    self.pos += n as u64;
                    if self.pending.len() as u64 == m.puff_length {
                        self.flush_region(index)?;
                    }
                }
                Section::Raw { len, .. } => {
                    let n = (len.min((buf.len() - consumed) as u64)) as usize;
                    self.source.write_all(&buf[consumed..consumed + n])?;
                    consumed += n;
                    self.pos += n as u64;
                }
            }
        }
        Ok(consumed)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.source.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// final fixed-Huffman block containing 'A' + EOB
    const FIXED_A: [u8; 3] = [0x73, 0x04, 0x00];
    /// final stored block "abc"
    const STORED_ABC: [u8; 8] = [0x01, 0x03, 0x00, 0xFC, 0xFF, b'a', b'b', b'c'];

    /// raw | FIXED_A | raw | STORED_ABC | raw
    fn container() -> (Vec<u8>, Vec<ByteExtent>) {
        let mut data = Vec::new();
        data.extend_from_slice(b"HEAD");
        let first = ByteExtent::new(data.len() as u64, FIXED_A.len() as u64);
        data.extend_from_slice(&FIXED_A);
        data.extend_from_slice(b"MIDDLE");
        let second = ByteExtent::new(data.len() as u64, STORED_ABC.len() as u64);
        data.extend_from_slice(&STORED_ABC);
        data.extend_from_slice(b"TAIL");
        (data, vec![first, second])
    }

    fn expected_puffed(data: &[u8], extents: &[ByteExtent]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut pos = 0usize;
        for e in extents {
            out.extend_from_slice(&data[pos..e.offset as usize]);
            out.extend(
                crate::engine::puff_to_vec(&data[e.offset as usize..(e.offset + e.length) as usize])
                    .unwrap(),
            );
            pos = (e.offset + e.length) as usize;
        }
        out.extend_from_slice(&data[pos..]);
        out
    }

    #[test]
    fn mappings_are_offset_consistent() {
        let (data, extents) = container();
        let (mappings, puff_size) =
            find_puff_locations(&mut Cursor::new(&data), &extents).unwrap();
        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings[0].deflate_offset, 4);
        assert_eq!(mappings[0].puff_offset, 4);
        // Second region shifts by the first region's size change.
        let delta = mappings[0].puff_length as i64 - mappings[0].deflate_length as i64;
        assert_eq!(
            mappings[1].puff_offset as i64,
            mappings[1].deflate_offset as i64 + delta
        );
        assert_eq!(
            puff_size,
            expected_puffed(&data, &extents).len() as u64
        );
    }

    #[test]
    fn read_whole_stream() {
        let (data, extents) = container();
        let (mappings, _) = find_puff_locations(&mut Cursor::new(&data), &extents).unwrap();
        let mut stream =
            PuffinStream::for_reading(Cursor::new(&data), mappings, DEFAULT_CACHE_CAPACITY)
                .unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(out, expected_puffed(&data, &extents));
    }

    #[test]
    fn seek_and_partial_reads() {
        let (data, extents) = container();
        let expected = expected_puffed(&data, &extents);
        let (mappings, _) = find_puff_locations(&mut Cursor::new(&data), &extents).unwrap();
        let mut stream =
            PuffinStream::for_reading(Cursor::new(&data), mappings, DEFAULT_CACHE_CAPACITY)
                .unwrap();

        // Read 5 bytes from an offset inside the first puff region.
        stream.seek(SeekFrom::Start(5)).unwrap();
        let mut buf = [0u8; 5];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, &expected[5..10]);

        // Read across the tail boundary.
        let tail_start = expected.len() - 6;
        stream.seek(SeekFrom::Start(tail_start as u64)).unwrap();
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, &expected[tail_start..]);
    }

    #[test]
    fn tiny_cache_still_reads_correctly() {
        let (data, extents) = container();
        let expected = expected_puffed(&data, &extents);
        let (mappings, _) = find_puff_locations(&mut Cursor::new(&data), &extents).unwrap();
        // Capacity 1 byte: every region read re-puffs.
        let mut stream = PuffinStream::for_reading(Cursor::new(&data), mappings, 1).unwrap();
        for _ in 0..3 {
            stream.seek(SeekFrom::Start(0)).unwrap();
            let mut out = Vec::new();
            stream.read_to_end(&mut out).unwrap();
            assert_eq!(out, expected);
        }
    }

    #[test]
    fn write_side_reconstructs_original() {
        let (data, extents) = container();
        let expected = expected_puffed(&data, &extents);
        let (mappings, _) = find_puff_locations(&mut Cursor::new(&data), &extents).unwrap();

        let mut writer =
            PuffinStream::for_writing(Vec::new(), data.len() as u64, mappings).unwrap();
        // Dribble the puffed bytes in small chunks to exercise buffering.
        for chunk in expected.chunks(3) {
            writer.write_all(chunk).unwrap();
        }
        let sink = writer.finish().unwrap();
        assert_eq!(sink, data);
    }

    #[test]
    fn finish_rejects_incomplete_write() {
        let (data, extents) = container();
        let expected = expected_puffed(&data, &extents);
        let (mappings, _) = find_puff_locations(&mut Cursor::new(&data), &extents).unwrap();
        let mut writer =
            PuffinStream::for_writing(Vec::new(), data.len() as u64, mappings).unwrap();
        writer.write_all(&expected[..expected.len() / 2]).unwrap();
        assert!(writer.finish().is_err());
    }

    #[test]
    fn rejects_inconsistent_mappings() {
        let bad = vec![ExtentMapping {
            deflate_offset: 4,
            deflate_length: 3,
            puff_offset: 9, // should be 4
            puff_length: 5,
        }];
        assert!(validate_mappings(&bad, 100).is_err());
    }

    #[test]
    fn no_regions_is_pass_through() {
        let data = b"just raw bytes".to_vec();
        let mut stream =
            PuffinStream::for_reading(Cursor::new(&data), Vec::new(), 0).unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }
}
