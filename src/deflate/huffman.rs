// Huffman code tables for DEFLATE blocks.
//
// A `HuffmanTable` owns the three per-block alphabets (19-entry code-length
// meta alphabet, 288-entry literal/length, 30-entry distance) and builds two
// representations from per-symbol bit lengths:
//
//   - forward tables `hcodes[1 << max_bits]`: indexed by `max_bits` input
//     bits, each entry stores the decoded symbol in bits 0..14 and a
//     valid flag at bit 15, so decode is one table load;
//   - reverse tables `rcodes[num_symbols]`: indexed by symbol, storing the
//     canonical code bit-reversed for LSB-first emission.
//
// The same object also transcodes the dynamic-block header between its two
// forms: the RFC 1951 bit encoding and the byte-aligned puff encoding
// (HLIT/HDIST/HCLEN triplet, nibble-packed meta lengths, and code-length
// sequences with the run markers 16/17/18 expanded to 16..19 / 20..27 /
// 28..155 so their extra bits survive the round trip).
//
// Storage is resident across blocks: vectors grow to their high-water mark
// once and are reused, so steady-state decoding does not allocate.

use crate::deflate::bit_reader::BitReader;
use crate::deflate::bit_writer::BitWriter;
use crate::deflate::constants::PERMUTATIONS;
use crate::error::{Error, Result};

/// Longest Huffman code DEFLATE permits.
pub const MAX_HUFFMAN_BITS: usize = 15;

/// Valid-entry flag in forward tables.
const VALID: u16 = 0x8000;

/// One assigned canonical code, already bit-reversed.
#[derive(Clone, Copy)]
struct CodeIndexPair {
    code: u16,
    index: u16,
}

pub struct HuffmanTable {
    code_lens: Vec<u8>,
    code_hcodes: Vec<u16>,
    code_rcodes: Vec<u16>,
    code_max_bits: usize,

    lit_len_lens: Vec<u8>,
    lit_len_hcodes: Vec<u16>,
    lit_len_rcodes: Vec<u16>,
    lit_len_max_bits: usize,

    distance_lens: Vec<u8>,
    distance_hcodes: Vec<u16>,
    distance_rcodes: Vec<u16>,
    distance_max_bits: usize,

    /// Scratch shared by the table builders.
    pairs: Vec<CodeIndexPair>,
    fixed_built: bool,
}

impl Default for HuffmanTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HuffmanTable {
    pub fn new() -> Self {
        Self {
            code_lens: Vec::new(),
            code_hcodes: Vec::new(),
            code_rcodes: Vec::new(),
            code_max_bits: 0,
            lit_len_lens: Vec::new(),
            lit_len_hcodes: Vec::new(),
            lit_len_rcodes: Vec::new(),
            lit_len_max_bits: 0,
            distance_lens: Vec::new(),
            distance_hcodes: Vec::new(),
            distance_rcodes: Vec::new(),
            distance_max_bits: 0,
            pairs: Vec::with_capacity(288),
            fixed_built: false,
        }
    }

    // -----------------------------------------------------------------------
    // Fixed tables (RFC 1951 section 3.2.6)
    // -----------------------------------------------------------------------

    /// Build the fixed literal/length and distance tables, both directions.
    /// Idempotent; an instance used for fixed blocks must not be reused for
    /// dynamic ones.
    pub fn build_fixed(&mut self) -> Result<()> {
        if self.fixed_built {
            return Ok(());
        }

        self.lit_len_lens.clear();
        self.lit_len_lens.resize(144, 8);
        self.lit_len_lens.resize(256, 9);
        self.lit_len_lens.resize(280, 7);
        self.lit_len_lens.resize(288, 8);

        self.distance_lens.clear();
        self.distance_lens.resize(30, 5);

        self.lit_len_max_bits = build_huffman_codes(
            &self.lit_len_lens,
            &mut self.lit_len_hcodes,
            &mut self.pairs,
            0,
        )?;
        self.distance_max_bits = build_huffman_codes(
            &self.distance_lens,
            &mut self.distance_hcodes,
            &mut self.pairs,
            0,
        )?;
        build_huffman_reverse_codes(&self.lit_len_lens, &mut self.lit_len_rcodes, &mut self.pairs, 0)?;
        build_huffman_reverse_codes(
            &self.distance_lens,
            &mut self.distance_rcodes,
            &mut self.pairs,
            0,
        )?;

        self.fixed_built = true;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Dynamic header: bits -> puff bytes (decode side)
    // -----------------------------------------------------------------------

    /// Parse a dynamic-block header from the bit stream, append its puff
    /// encoding to `out`, and build the forward decode tables.
    pub fn build_dynamic_from_bits(&mut self, br: &mut BitReader<'_>, out: &mut Vec<u8>) -> Result<()> {
        br.cache_bits(14)?;
        let hlit = br.read_bits(5);
        br.drop_bits(5);
        let hdist = br.read_bits(5);
        br.drop_bits(5);
        let hclen = br.read_bits(4);
        br.drop_bits(4);

        out.push(hlit as u8);
        out.push(hdist as u8);
        out.push(hclen as u8);

        let num_lit_len = hlit as usize + 257;
        let num_distance = hdist as usize + 1;
        let num_codes = hclen as usize + 4;
        check_alphabet_sizes(num_lit_len, num_distance, num_codes, br.bit_offset())?;

        // Meta-code lengths, transmitted in permuted order; puff packs two
        // 3-bit lengths per byte, high nibble first.
        self.code_lens.clear();
        self.code_lens.resize(19, 0);
        for idx in 0..num_codes {
            br.cache_bits(3)?;
            let len = br.read_bits(3) as u8;
            self.code_lens[PERMUTATIONS[idx] as usize] = len;
            if idx % 2 == 0 {
                out.push(len << 4);
            } else {
                *out.last_mut().unwrap() |= len;
            }
            br.drop_bits(3);
        }

        self.code_max_bits =
            build_huffman_codes(&self.code_lens, &mut self.code_hcodes, &mut self.pairs, br.bit_offset())?;

        decode_code_lengths(
            br,
            &self.code_hcodes,
            &self.code_lens,
            self.code_max_bits,
            num_lit_len,
            &mut self.lit_len_lens,
            out,
        )?;
        self.lit_len_max_bits = build_huffman_codes(
            &self.lit_len_lens,
            &mut self.lit_len_hcodes,
            &mut self.pairs,
            br.bit_offset(),
        )?;

        decode_code_lengths(
            br,
            &self.code_hcodes,
            &self.code_lens,
            self.code_max_bits,
            num_distance,
            &mut self.distance_lens,
            out,
        )?;
        self.distance_max_bits = build_huffman_codes(
            &self.distance_lens,
            &mut self.distance_hcodes,
            &mut self.pairs,
            br.bit_offset(),
        )?;

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Dynamic header: puff bytes -> bits (encode side)
    // -----------------------------------------------------------------------

    /// Re-emit a dynamic-block header from its puff encoding and build the
    /// reverse encode tables. `header` must be exactly one header;
    /// `header_offset` is its position in the puff stream, for errors.
    pub fn build_dynamic_from_puff(
        &mut self,
        header: &[u8],
        header_offset: u64,
        bw: &mut BitWriter<'_>,
    ) -> Result<()> {
        if header.len() < 3 {
            return Err(Error::InsufficientInput {
                offset: header_offset + header.len() as u64,
            });
        }

        let hlit = header[0];
        let hdist = header[1];
        let hclen = header[2];
        bw.write_bits(5, u32::from(hlit))?;
        bw.write_bits(5, u32::from(hdist))?;
        bw.write_bits(4, u32::from(hclen))?;

        let num_lit_len = hlit as usize + 257;
        let num_distance = hdist as usize + 1;
        let num_codes = hclen as usize + 4;
        check_alphabet_sizes(num_lit_len, num_distance, num_codes, header_offset)?;

        let mut index = 3;
        if header.len() - index < num_codes.div_ceil(2) {
            return Err(Error::InsufficientInput {
                offset: header_offset + header.len() as u64,
            });
        }
        self.code_lens.clear();
        self.code_lens.resize(19, 0);
        for idx in 0..num_codes {
            let byte = header[index + idx / 2];
            let len = if idx % 2 == 0 { byte >> 4 } else { byte & 0x0F };
            self.code_lens[PERMUTATIONS[idx] as usize] = len;
            bw.write_bits(3, u32::from(len))?;
        }
        index += num_codes.div_ceil(2);

        self.code_max_bits = build_huffman_reverse_codes(
            &self.code_lens,
            &mut self.code_rcodes,
            &mut self.pairs,
            header_offset,
        )?;

        index += encode_code_lengths(
            &header[index..],
            header_offset + index as u64,
            &self.code_rcodes,
            &self.code_lens,
            num_lit_len,
            &mut self.lit_len_lens,
            bw,
        )?;
        self.lit_len_max_bits = build_huffman_reverse_codes(
            &self.lit_len_lens,
            &mut self.lit_len_rcodes,
            &mut self.pairs,
            header_offset,
        )?;

        index += encode_code_lengths(
            &header[index..],
            header_offset + index as u64,
            &self.code_rcodes,
            &self.code_lens,
            num_distance,
            &mut self.distance_lens,
            bw,
        )?;
        self.distance_max_bits = build_huffman_reverse_codes(
            &self.distance_lens,
            &mut self.distance_rcodes,
            &mut self.pairs,
            header_offset,
        )?;

        if index != header.len() {
            return Err(Error::invalid(
                header_offset + index as u64,
                "trailing bytes in dynamic block header",
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Symbol lookups
    // -----------------------------------------------------------------------

    /// Decode a meta (code-length) symbol from `bits` input bits.
    #[inline]
    pub fn code_alphabet(&self, bits: u32) -> Option<(u16, usize)> {
        forward_lookup(&self.code_hcodes, &self.code_lens, bits)
    }

    /// Decode a literal/length symbol from `bits` input bits.
    #[inline]
    pub fn lit_len_alphabet(&self, bits: u32) -> Option<(u16, usize)> {
        forward_lookup(&self.lit_len_hcodes, &self.lit_len_lens, bits)
    }

    /// Decode a distance symbol from `bits` input bits.
    #[inline]
    pub fn distance_alphabet(&self, bits: u32) -> Option<(u16, usize)> {
        forward_lookup(&self.distance_hcodes, &self.distance_lens, bits)
    }

    /// Reverse-code for a literal/length symbol.
    #[inline]
    pub fn lit_len_huffman(&self, symbol: u16) -> Option<(u16, usize)> {
        reverse_lookup(&self.lit_len_rcodes, &self.lit_len_lens, symbol)
    }

    /// Reverse-code for a distance symbol.
    #[inline]
    pub fn distance_huffman(&self, symbol: u16) -> Option<(u16, usize)> {
        reverse_lookup(&self.distance_rcodes, &self.distance_lens, symbol)
    }

    #[inline]
    pub fn lit_len_max_bits(&self) -> usize {
        self.lit_len_max_bits
    }

    #[inline]
    pub fn distance_max_bits(&self) -> usize {
        self.distance_max_bits
    }
}

#[inline]
fn forward_lookup(hcodes: &[u16], lens: &[u8], bits: u32) -> Option<(u16, usize)> {
    let entry = *hcodes.get(bits as usize)?;
    if entry & VALID == 0 {
        return None;
    }
    let symbol = entry & !VALID;
    Some((symbol, lens[symbol as usize] as usize))
}

#[inline]
fn reverse_lookup(rcodes: &[u16], lens: &[u8], symbol: u16) -> Option<(u16, usize)> {
    let len = *lens.get(symbol as usize)?;
    if len == 0 {
        return None;
    }
    Some((rcodes[symbol as usize], len as usize))
}

// ---------------------------------------------------------------------------
// Canonical code construction
// ---------------------------------------------------------------------------

/// Assign canonical codes for `lens`, bit-reversed per symbol, into `pairs`.
/// Returns the largest code length (0 when no symbol has a code, which is
/// legal: a block may have no distance codes at all).
fn init_huffman_codes(lens: &[u8], pairs: &mut Vec<CodeIndexPair>, at: u64) -> Result<usize> {
    let mut len_count = [0u32; MAX_HUFFMAN_BITS + 1];
    for &len in lens {
        debug_assert!((len as usize) <= MAX_HUFFMAN_BITS);
        len_count[len as usize] += 1;
    }

    let mut max_bits = MAX_HUFFMAN_BITS;
    while max_bits >= 1 && len_count[max_bits] == 0 {
        max_bits -= 1;
    }

    // Not invalid: a block can have no length/distance codes at all
    // (all literals), but it is unusual enough to be worth flagging.
    if len_count[0] as usize == lens.len() {
        log::warn!("Huffman code length array has no non-zero entries");
    }

    // A code of length L can cover at most 2^L symbols.
    for bits in 1..=max_bits {
        if len_count[bits] > (1u32 << bits) {
            return Err(Error::invalid(at, "oversubscribed Huffman code lengths"));
        }
    }

    // First canonical code of each length.
    let mut next_code = [0u32; MAX_HUFFMAN_BITS + 1];
    let mut code = 0u32;
    len_count[0] = 0;
    for bits in 1..=MAX_HUFFMAN_BITS {
        code = (code + len_count[bits - 1]) << 1;
        next_code[bits] = code;
    }

    pairs.clear();
    for (index, &len) in lens.iter().enumerate() {
        if len == 0 {
            continue;
        }
        let len = len as usize;
        // Canonical codes are defined MSB-first but the stream is packed
        // LSB-first; reverse each code within its own length.
        let mut reversed = 0u16;
        let mut tmp = next_code[len];
        for _ in 0..len {
            reversed = (reversed << 1) | (tmp & 1) as u16;
            tmp >>= 1;
        }
        pairs.push(CodeIndexPair {
            code: reversed,
            index: index as u16,
        });
        next_code[len] += 1;
    }
    Ok(max_bits)
}

/// Build the forward (decode) table: every `max_bits`-wide index whose low
/// bits match a code maps to that code's symbol. Pairs are filled in
/// descending length order so shorter codes override the unclaimed
/// extensions of longer ones.
fn build_huffman_codes(
    lens: &[u8],
    hcodes: &mut Vec<u16>,
    pairs: &mut Vec<CodeIndexPair>,
    at: u64,
) -> Result<usize> {
    let max_bits = init_huffman_codes(lens, pairs, at)?;
    pairs.sort_by(|a, b| lens[b.index as usize].cmp(&lens[a.index as usize]));

    hcodes.clear();
    hcodes.resize(1 << max_bits, 0);
    for pair in pairs.iter() {
        let len = lens[pair.index as usize] as usize;
        let entry = pair.index | VALID;
        hcodes[pair.code as usize] = entry;
        for fill in 1..(1usize << (max_bits - len)) {
            let location = (fill << len) | pair.code as usize;
            if hcodes[location] & VALID == 0 {
                hcodes[location] = entry;
            }
        }
    }
    Ok(max_bits)
}

/// Build the reverse (encode) table: `rcodes[symbol]` is the bit-reversed
/// canonical code, 0 for absent symbols.
fn build_huffman_reverse_codes(
    lens: &[u8],
    rcodes: &mut Vec<u16>,
    pairs: &mut Vec<CodeIndexPair>,
    at: u64,
) -> Result<usize> {
    let max_bits = init_huffman_codes(lens, pairs, at)?;
    rcodes.clear();
    rcodes.resize(lens.len(), 0);
    for pair in pairs.iter() {
        rcodes[pair.index as usize] = pair.code;
    }
    Ok(max_bits)
}

// ---------------------------------------------------------------------------
// Code-length sequences (shared by both header directions)
// ---------------------------------------------------------------------------

fn check_alphabet_sizes(
    num_lit_len: usize,
    num_distance: usize,
    num_codes: usize,
    at: u64,
) -> Result<()> {
    if num_lit_len > 286 || num_distance > 30 || num_codes > 19 {
        return Err(Error::invalid(at, "dynamic header alphabet counts out of range"));
    }
    Ok(())
}

/// Decode `num_codes` code lengths from the bit stream via the meta table,
/// collecting them in `lens` and appending the expanded puff encoding
/// (values 0..15, run markers biased to 16..19 / 20..27 / 28..155) to `out`.
fn decode_code_lengths(
    br: &mut BitReader<'_>,
    code_hcodes: &[u16],
    code_lens: &[u8],
    code_max_bits: usize,
    num_codes: usize,
    lens: &mut Vec<u8>,
    out: &mut Vec<u8>,
) -> Result<()> {
    lens.clear();
    let mut idx = 0usize;
    while idx < num_codes {
        if br.bits_remaining() == 0 {
            return Err(Error::InsufficientInput {
                offset: br.bit_offset(),
            });
        }
        // Near the end of the stream fewer than max_bits may remain; the
        // table still resolves any code short enough to fit.
        let avail = br.bits_remaining().min(code_max_bits as u64) as u32;
        br.cache_bits(avail)?;
        let bits = br.read_bits(avail);
        let (code, nbits) = code_alphabet_checked(code_hcodes, code_lens, bits, br.bit_offset())?;
        if nbits > avail as usize {
            return Err(Error::InsufficientInput {
                offset: br.bit_offset(),
            });
        }
        br.drop_bits(nbits as u32);

        if code < 16 {
            out.push(code as u8);
            lens.push(code as u8);
            idx += 1;
            continue;
        }

        let (copy_num, copy_val) = match code {
            16 => {
                if idx == 0 {
                    return Err(Error::invalid(
                        br.bit_offset(),
                        "repeat marker with no previous code length",
                    ));
                }
                br.cache_bits(2)?;
                let extra = br.read_bits(2);
                out.push(16 + extra as u8); // repeats 3..6
                br.drop_bits(2);
                (3 + extra as usize, lens[idx - 1])
            }
            17 => {
                br.cache_bits(3)?;
                let extra = br.read_bits(3);
                out.push(20 + extra as u8); // zero-runs 3..10
                br.drop_bits(3);
                (3 + extra as usize, 0)
            }
            18 => {
                br.cache_bits(7)?;
                let extra = br.read_bits(7);
                out.push(28 + extra as u8); // zero-runs 11..138
                br.drop_bits(7);
                (11 + extra as usize, 0)
            }
            _ => {
                return Err(Error::invalid(br.bit_offset(), "invalid code-length symbol"));
            }
        };
        idx += copy_num;
        lens.extend(std::iter::repeat_n(copy_val, copy_num));
    }
    Ok(())
}

#[inline]
fn code_alphabet_checked(
    hcodes: &[u16],
    lens: &[u8],
    bits: u32,
    at: u64,
) -> Result<(u16, usize)> {
    forward_lookup(hcodes, lens, bits)
        .ok_or_else(|| Error::invalid(at, "invalid code-length Huffman code"))
}

/// The strict inverse of `decode_code_lengths`: read the expanded puff
/// encoding from `buf`, re-emit the meta codes and their extra bits, and
/// collect the decoded lengths. Returns the number of puff bytes consumed.
fn encode_code_lengths(
    buf: &[u8],
    at: u64,
    code_rcodes: &[u16],
    code_lens: &[u8],
    num_codes: usize,
    lens: &mut Vec<u8>,
    bw: &mut BitWriter<'_>,
) -> Result<usize> {
    lens.clear();
    let mut index = 0usize;
    let mut idx = 0usize;
    while idx < num_codes {
        if index == buf.len() {
            return Err(Error::InsufficientInput {
                offset: at + index as u64,
            });
        }
        let pcode = buf[index];
        index += 1;
        if pcode > 155 {
            return Err(Error::invalid(
                at + index as u64 - 1,
                "code-length value out of range",
            ));
        }

        let code = match pcode {
            0..=15 => pcode,
            16..=19 => 16,
            20..=27 => 17,
            _ => 18,
        };
        let (hcode, nbits) = reverse_lookup(code_rcodes, code_lens, u16::from(code))
            .ok_or_else(|| {
                Error::invalid(at + index as u64 - 1, "code-length symbol has no Huffman code")
            })?;
        bw.write_bits(nbits as u32, u32::from(hcode))?;

        if code < 16 {
            lens.push(code);
            idx += 1;
            continue;
        }

        let (copy_num, copy_val) = match code {
            16 => {
                if idx == 0 {
                    return Err(Error::invalid(
                        at + index as u64 - 1,
                        "repeat marker with no previous code length",
                    ));
                }
                bw.write_bits(2, u32::from(pcode - 16))?;
                (3 + (pcode - 16) as usize, lens[idx - 1])
            }
            17 => {
                bw.write_bits(3, u32::from(pcode - 20))?;
                (3 + (pcode - 20) as usize, 0)
            }
            _ => {
                bw.write_bits(7, u32::from(pcode - 28))?;
                (11 + (pcode - 28) as usize, 0)
            }
        };
        idx += copy_num;
        lens.extend(std::iter::repeat_n(copy_val, copy_num));
    }
    Ok(index)
}

/// Measure one self-delimiting dynamic header at the start of `data`.
/// Walks the same loops as the transcoders so the extent always agrees.
pub fn dynamic_header_size(data: &[u8], at: u64) -> Result<usize> {
    if data.len() < 3 {
        return Err(Error::InsufficientInput {
            offset: at + data.len() as u64,
        });
    }
    let num_lit_len = data[0] as usize + 257;
    let num_distance = data[1] as usize + 1;
    let num_codes = data[2] as usize + 4;
    check_alphabet_sizes(num_lit_len, num_distance, num_codes, at)?;

    let mut index = 3 + num_codes.div_ceil(2);
    if index > data.len() {
        return Err(Error::InsufficientInput {
            offset: at + data.len() as u64,
        });
    }
    index = walk_code_lengths(data, index, num_lit_len, at)?;
    index = walk_code_lengths(data, index, num_distance, at)?;
    Ok(index)
}

fn walk_code_lengths(data: &[u8], start: usize, num_codes: usize, at: u64) -> Result<usize> {
    let mut index = start;
    let mut idx = 0usize;
    while idx < num_codes {
        if index == data.len() {
            return Err(Error::InsufficientInput {
                offset: at + index as u64,
            });
        }
        let pcode = data[index];
        index += 1;
        match pcode {
            0..=15 => idx += 1,
            16..=19 => {
                if idx == 0 {
                    return Err(Error::invalid(
                        at + index as u64 - 1,
                        "repeat marker with no previous code length",
                    ));
                }
                idx += 3 + (pcode - 16) as usize;
            }
            20..=27 => idx += 3 + (pcode - 20) as usize,
            28..=155 => idx += 11 + (pcode - 28) as usize,
            _ => {
                return Err(Error::invalid(
                    at + index as u64 - 1,
                    "code-length value out of range",
                ));
            }
        }
    }
    Ok(index)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
