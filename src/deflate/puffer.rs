// DEFLATE -> puff.
//
// A streaming state machine over one DEFLATE stream: parse the block
// header, transcode the block (raw bytes, or Huffman-decoded symbols), and
// stop after the final block's trailing padding. The caller loops for
// back-to-back streams.
//
// The transcoder never guesses: reserved block types, invalid symbols,
// LEN/NLEN mismatches and non-zero padding bits all fail the stream.

use crate::deflate::bit_reader::BitReader;
use crate::deflate::constants::{
    DISTANCE_BASES, DISTANCE_EXTRA_BITS, END_OF_BLOCK, LENGTH_BASES, LENGTH_EXTRA_BITS,
};
use crate::deflate::huffman::HuffmanTable;
use crate::deflate::BlockType;
use crate::error::{Error, Result};
use crate::puff::{LENGTH_258_ALT, PuffWriter};

/// Location and shape of one DEFLATE block, recorded by
/// `puff_deflate_with_blocks` for locators and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeflateBlock {
    /// Bit offset of the block's first header bit.
    pub bit_offset: u64,
    /// Bits from the header to the end of the block (excluding any
    /// final-stream padding).
    pub bit_length: u64,
    pub block_type: BlockType,
    pub final_block: bool,
    /// Bytes the block inflates to.
    pub uncompressed_size: u64,
}

pub struct Puffer {
    fixed: HuffmanTable,
    dynamic: HuffmanTable,
    /// Reusable scratch for the puff encoding of dynamic headers.
    header_buf: Vec<u8>,
}

impl Default for Puffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Puffer {
    pub fn new() -> Self {
        Self {
            fixed: HuffmanTable::new(),
            dynamic: HuffmanTable::new(),
            header_buf: Vec::new(),
        }
    }

    /// Transcode exactly one DEFLATE stream, through its final block and
    /// the zero padding that byte-aligns it, leaving the reader positioned
    /// after the stream.
    pub fn puff_deflate(&mut self, br: &mut BitReader<'_>, pw: &mut PuffWriter<'_>) -> Result<()> {
        self.puff_deflate_with_blocks(br, pw, None)
    }

    /// Like `puff_deflate`, also appending one `DeflateBlock` per block.
    pub fn puff_deflate_with_blocks(
        &mut self,
        br: &mut BitReader<'_>,
        pw: &mut PuffWriter<'_>,
        mut blocks: Option<&mut Vec<DeflateBlock>>,
    ) -> Result<()> {
        loop {
            let block_start = br.bit_offset();
            br.cache_bits(3)?;
            let final_block = br.read_bits(1) != 0;
            br.drop_bits(1);
            let type_bits = br.read_bits(2) as u8;
            br.drop_bits(2);
            let block_type = BlockType::from_bits(type_bits)
                .ok_or_else(|| Error::invalid(block_start + 1, "reserved block type 3"))?;

            let uncompressed_size = match block_type {
                BlockType::Uncompressed => self.puff_uncompressed_block(final_block, br, pw)?,
                BlockType::Fixed => {
                    self.fixed.build_fixed()?;
                    pw.begin_fixed_block(final_block)?;
                    puff_block_body(&self.fixed, br, pw)?
                }
                BlockType::Dynamic => {
                    self.header_buf.clear();
                    self.dynamic.build_dynamic_from_bits(br, &mut self.header_buf)?;
                    pw.begin_dynamic_block(final_block, &self.header_buf)?;
                    puff_block_body(&self.dynamic, br, pw)?
                }
            };

            if let Some(blocks) = blocks.as_deref_mut() {
                blocks.push(DeflateBlock {
                    bit_offset: block_start,
                    bit_length: br.bit_offset() - block_start,
                    block_type,
                    final_block,
                    uncompressed_size,
                });
            }

            if final_block {
                let pad = br.read_boundary_bits();
                if pad != 0 {
                    return Err(Error::invalid(br.bit_offset(), "non-zero stream padding bits"));
                }
                br.skip_boundary_bits();
                return Ok(());
            }
        }
    }

    fn puff_uncompressed_block(
        &mut self,
        final_block: bool,
        br: &mut BitReader<'_>,
        pw: &mut PuffWriter<'_>,
    ) -> Result<u64> {
        let pad = br.read_boundary_bits();
        if pad != 0 {
            return Err(Error::invalid(br.bit_offset(), "non-zero block padding bits"));
        }
        br.skip_boundary_bits();

        br.cache_bits(32)?;
        let len = br.read_bits(16) as u16;
        br.drop_bits(16);
        let nlen = br.read_bits(16) as u16;
        br.drop_bits(16);
        if len != !nlen {
            return Err(Error::invalid(br.bit_offset(), "LEN/NLEN mismatch"));
        }

        pw.begin_uncompressed_block(final_block, len)?;
        if len > 0 {
            // LEN/NLEN drained the cache exactly, so the raw payload can be
            // borrowed straight from the input buffer.
            let data = br.take_slice(len as usize)?;
            pw.literals(data)?;
        }
        Ok(u64::from(len))
    }
}

/// Decode one compressed block's symbols into puff tokens; returns the
/// block's uncompressed size.
fn puff_block_body(
    table: &HuffmanTable,
    br: &mut BitReader<'_>,
    pw: &mut PuffWriter<'_>,
) -> Result<u64> {
    let mut out_bytes = 0u64;
    loop {
        let at = br.bit_offset();
        let (symbol, nbits) = decode_symbol(
            br,
            table.lit_len_max_bits(),
            |bits| table.lit_len_alphabet(bits),
            "invalid literal/length code",
        )?;
        br.drop_bits(nbits);

        if symbol < 256 {
            pw.literal(symbol as u8)?;
            out_bytes += 1;
            continue;
        }
        if symbol == END_OF_BLOCK {
            pw.end_of_block()?;
            return Ok(out_bytes);
        }
        if symbol > 285 {
            return Err(Error::invalid(at, "reserved literal/length symbol"));
        }

        // Length code 257..=285: base + extra bits.
        let idx = (symbol - 257) as usize;
        let ebits = u32::from(LENGTH_EXTRA_BITS[idx]);
        br.cache_bits(ebits)?;
        let extra = br.read_bits(ebits) as u16;
        br.drop_bits(ebits);
        // Length 258 has two encodings; keep 284+31 distinguishable from 285.
        let length = if symbol == 284 && extra == 31 {
            LENGTH_258_ALT
        } else {
            LENGTH_BASES[idx] + extra
        };

        let dat = br.bit_offset();
        let (dsymbol, dnbits) = decode_symbol(
            br,
            table.distance_max_bits(),
            |bits| table.distance_alphabet(bits),
            "invalid distance code",
        )?;
        br.drop_bits(dnbits);
        if dsymbol > 29 {
            return Err(Error::invalid(dat, "reserved distance symbol"));
        }

        let debits = u32::from(DISTANCE_EXTRA_BITS[dsymbol as usize]);
        br.cache_bits(debits)?;
        let dextra = br.read_bits(debits) as u16;
        br.drop_bits(debits);
        let distance = DISTANCE_BASES[dsymbol as usize] + dextra;

        pw.len_dist(length, distance)?;
        out_bytes += u64::from(if length == LENGTH_258_ALT { 258 } else { length });
    }
}

/// Peek up to `max_bits` (clamped near end of input), resolve one symbol,
/// and verify the code fit in what was actually available. Does not drop.
#[inline]
fn decode_symbol(
    br: &mut BitReader<'_>,
    max_bits: usize,
    lookup: impl Fn(u32) -> Option<(u16, usize)>,
    invalid_msg: &'static str,
) -> Result<(u16, u32)> {
    let at = br.bit_offset();
    if br.bits_remaining() == 0 {
        return Err(Error::InsufficientInput { offset: at });
    }
    let avail = br.bits_remaining().min(max_bits as u64) as u32;
    br.cache_bits(avail)?;
    let bits = br.read_bits(avail);
    let (symbol, nbits) = lookup(bits).ok_or_else(|| Error::invalid(at, invalid_msg))?;
    if nbits as u64 > u64::from(avail) {
        return Err(Error::InsufficientInput { offset: at });
    }
    Ok((symbol, nbits as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puff::{PuffData, PuffReader};

    fn puff_all(deflate: &[u8]) -> Result<Vec<u8>> {
        let mut puffer = Puffer::new();
        let mut sizing = PuffWriter::sizing();
        {
            let mut br = BitReader::new(deflate);
            while !br.is_exhausted() {
                puffer.puff_deflate(&mut br, &mut sizing)?;
            }
        }
        let mut out = vec![0u8; sizing.finish()?];
        let mut pw = PuffWriter::new(&mut out);
        let mut br = BitReader::new(deflate);
        while !br.is_exhausted() {
            puffer.puff_deflate(&mut br, &mut pw)?;
        }
        pw.finish()?;
        Ok(out)
    }

    fn tokens(puff: &[u8]) -> Vec<String> {
        let mut pr = PuffReader::new(puff);
        let mut out = Vec::new();
        while let Some(t) = pr.next().unwrap() {
            out.push(match t {
                PuffData::BlockMarker {
                    final_block,
                    block_type,
                    ..
                } => format!("marker({block_type:?}, final={final_block})"),
                PuffData::Literals(d) => format!("lit({})", String::from_utf8_lossy(d)),
                PuffData::LenDist { length, distance } => format!("copy({length},{distance})"),
                PuffData::EndOfBlock => "eob".into(),
            });
        }
        out
    }

    #[test]
    fn stored_block() {
        // final stored block, LEN=3, NLEN=!3, "abc"
        let deflate = [0x01, 0x03, 0x00, 0xFC, 0xFF, b'a', b'b', b'c'];
        let puff = puff_all(&deflate).unwrap();
        assert_eq!(puff, [0x01, 0x03, 0x00, b'a', b'b', b'c']);
    }

    #[test]
    fn fixed_block_single_literal() {
        // Fixed-Huffman block: literal 'A' then end-of-block.
        let deflate = [0x73, 0x04, 0x00];
        let puff = puff_all(&deflate).unwrap();
        assert_eq!(
            tokens(&puff),
            vec!["marker(Fixed, final=true)", "lit(A)", "eob"]
        );
    }

    #[test]
    fn fixed_block_with_copy() {
        // "aaaa": literal 'a' then a length-3 distance-1 copy.
        // lit 'a' = code 0x91, copy len 3 = symbol 257 (7-bit code 0000001),
        // dist 1 = symbol 0 (5-bit code 00000), then EOB.
        let mut bits = vec![0u8; 8];
        let mut bw = crate::deflate::BitWriter::new(&mut bits);
        bw.write_bits(1, 1).unwrap(); // final
        bw.write_bits(2, 1).unwrap(); // fixed
        bw.write_bits(8, 0x89).unwrap(); // 'a' (0x91 bit-reversed)
        bw.write_bits(7, 0b1000000).unwrap(); // symbol 257 (0000001 reversed)
        bw.write_bits(5, 0).unwrap(); // distance symbol 0
        bw.write_bits(7, 0).unwrap(); // EOB
        bw.write_boundary_bits(0).unwrap();
        let n = bw.size_written();

        let puff = puff_all(&bits[..n]).unwrap();
        assert_eq!(
            tokens(&puff),
            vec!["marker(Fixed, final=true)", "lit(a)", "copy(3,1)", "eob"]
        );
    }

    #[test]
    fn rejects_reserved_block_type() {
        // header bits: final=1, type=3
        let deflate = [0b0000_0111];
        let err = puff_all(&deflate).unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[test]
    fn rejects_len_nlen_mismatch() {
        let deflate = [0x01, 0x03, 0x00, 0x00, 0x00, b'a', b'b', b'c'];
        let err = puff_all(&deflate).unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[test]
    fn rejects_nonzero_block_padding() {
        // final stored block but with a 1 in the padding bits
        let deflate = [0x01 | 0b0010_0000, 0x00, 0x00, 0xFF, 0xFF];
        let err = puff_all(&deflate).unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[test]
    fn rejects_truncated_stream() {
        let deflate = [0x01, 0x03]; // stored header cut short
        let err = puff_all(&deflate).unwrap_err();
        assert!(matches!(err, Error::InsufficientInput { .. }));
    }

    #[test]
    fn empty_non_final_then_final_stored_block() {
        // non-final stored LEN=0, then final stored LEN=1 "x"
        let deflate = [
            0x00, 0x00, 0x00, 0xFF, 0xFF, // non-final, empty
            0x01, 0x01, 0x00, 0xFE, 0xFF, b'x',
        ];
        let puff = puff_all(&deflate).unwrap();
        assert_eq!(puff, [0x00, 0x00, 0x00, 0x01, 0x01, 0x00, b'x']);
    }

    #[test]
    fn records_block_extents() {
        let deflate = [0x01, 0x03, 0x00, 0xFC, 0xFF, b'a', b'b', b'c'];
        let mut puffer = Puffer::new();
        let mut pw = PuffWriter::sizing();
        let mut br = BitReader::new(&deflate);
        let mut blocks = Vec::new();
        puffer
            .puff_deflate_with_blocks(&mut br, &mut pw, Some(&mut blocks))
            .unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].bit_offset, 0);
        assert_eq!(blocks[0].bit_length, 8 * 8); // whole stream is one block
        assert_eq!(blocks[0].block_type, BlockType::Uncompressed);
        assert!(blocks[0].final_block);
        assert_eq!(blocks[0].uncompressed_size, 3);
    }

    #[test]
    fn two_adjacent_streams() {
        let deflate = [
            0x01, 0x01, 0x00, 0xFE, 0xFF, b'p', // stream 1
            0x01, 0x01, 0x00, 0xFE, 0xFF, b'q', // stream 2
        ];
        let puff = puff_all(&deflate).unwrap();
        assert_eq!(puff, [0x01, 0x01, 0x00, b'p', 0x01, 0x01, 0x00, b'q']);
    }
}
