// puff -> DEFLATE.
//
// Token-driven inverse of the Puffer. Every choice the original encoder
// made is reproduced from the puff stream: the dynamic header is re-emitted
// bit for bit, copies pick their codes by base-array search (with the
// length-259 pseudo-value restoring the 284-coded form of 258), and each
// final block is padded to a byte boundary with zeros.

use crate::deflate::bit_writer::BitWriter;
use crate::deflate::constants::{
    DISTANCE_EXTRA_BITS, END_OF_BLOCK, LENGTH_EXTRA_BITS, distance_to_code, length_to_code,
};
use crate::deflate::huffman::HuffmanTable;
use crate::deflate::BlockType;
use crate::error::{Error, Result};
use crate::puff::{LENGTH_258_ALT, PuffData, PuffReader};

/// Which table the current compressed block uses.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Tables {
    Fixed,
    Dynamic,
}

pub struct Huffer {
    fixed: HuffmanTable,
    dynamic: HuffmanTable,
}

impl Default for Huffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Huffer {
    pub fn new() -> Self {
        Self {
            fixed: HuffmanTable::new(),
            dynamic: HuffmanTable::new(),
        }
    }

    /// Re-emit the DEFLATE bits for an entire puff buffer (one or more
    /// back-to-back streams).
    pub fn huff_deflate(&mut self, pr: &mut PuffReader<'_>, bw: &mut BitWriter<'_>) -> Result<()> {
        // State across tokens: inside a compressed block, between blocks,
        // or expecting an uncompressed payload of a known size.
        let mut tables: Option<Tables> = None;
        let mut raw_pending = false;
        let mut final_block = false;

        while let Some(token) = pr.next()? {
            let at = pr.offset() as u64;
            match token {
                PuffData::BlockMarker {
                    final_block: fin,
                    block_type,
                    header,
                } => {
                    if tables.is_some() || raw_pending {
                        return Err(Error::invalid(at, "block marker inside an open block"));
                    }
                    final_block = fin;
                    bw.write_bits(1, u32::from(fin))?;
                    bw.write_bits(2, u32::from(block_type.to_bits()))?;
                    match block_type {
                        BlockType::Uncompressed => {
                            bw.write_boundary_bits(0)?;
                            let len = u16::from_le_bytes(header.try_into().map_err(|_| {
                                Error::invalid(at, "malformed uncompressed block header")
                            })?);
                            bw.write_bits(16, u32::from(len))?;
                            bw.write_bits(16, u32::from(!len))?;
                            raw_pending = len > 0;
                        }
                        BlockType::Fixed => {
                            self.fixed.build_fixed()?;
                            tables = Some(Tables::Fixed);
                        }
                        BlockType::Dynamic => {
                            let header_offset = at - header.len() as u64;
                            self.dynamic.build_dynamic_from_puff(header, header_offset, bw)?;
                            tables = Some(Tables::Dynamic);
                        }
                    }
                }

                PuffData::Literals(data) => {
                    if raw_pending {
                        bw.write_bytes(data)?;
                        raw_pending = false;
                    } else {
                        let table = self.current(tables, at)?;
                        for &byte in data {
                            let (code, nbits) =
                                table.lit_len_huffman(u16::from(byte)).ok_or_else(|| {
                                    Error::invalid(at, "literal has no Huffman code")
                                })?;
                            bw.write_bits(nbits as u32, u32::from(code))?;
                        }
                    }
                }

                PuffData::LenDist { length, distance } => {
                    let table = self.current(tables, at)?;
                    if length == LENGTH_258_ALT {
                        // Length 258 in its 284 + 5-extra-bits form.
                        let (code, nbits) = table
                            .lit_len_huffman(284)
                            .ok_or_else(|| Error::invalid(at, "length symbol has no Huffman code"))?;
                        bw.write_bits(nbits as u32, u32::from(code))?;
                        bw.write_bits(5, 31)?;
                    } else {
                        let (idx, extra) = length_to_code(length)
                            .ok_or_else(|| Error::invalid(at, "copy length out of range"))?;
                        let (code, nbits) = table
                            .lit_len_huffman(257 + idx as u16)
                            .ok_or_else(|| Error::invalid(at, "length symbol has no Huffman code"))?;
                        bw.write_bits(nbits as u32, u32::from(code))?;
                        bw.write_bits(u32::from(LENGTH_EXTRA_BITS[idx]), u32::from(extra))?;
                    }

                    let (didx, dextra) = distance_to_code(distance)
                        .ok_or_else(|| Error::invalid(at, "copy distance out of range"))?;
                    let (dcode, dnbits) = table
                        .distance_huffman(didx as u16)
                        .ok_or_else(|| Error::invalid(at, "distance symbol has no Huffman code"))?;
                    bw.write_bits(dnbits as u32, u32::from(dcode))?;
                    bw.write_bits(u32::from(DISTANCE_EXTRA_BITS[didx]), u32::from(dextra))?;
                }

                PuffData::EndOfBlock => {
                    let table = self.current(tables, at)?;
                    let (code, nbits) = table
                        .lit_len_huffman(END_OF_BLOCK)
                        .ok_or_else(|| Error::invalid(at, "no end-of-block Huffman code"))?;
                    bw.write_bits(nbits as u32, u32::from(code))?;
                    tables = None;
                }
            }

            // A final block that just completed ends its stream: pad to the
            // byte boundary the way every DEFLATE encoder does.
            if final_block && tables.is_none() && !raw_pending {
                bw.write_boundary_bits(0)?;
            }
        }

        if tables.is_some() || raw_pending {
            return Err(Error::invalid(pr.offset() as u64, "puff stream ends mid-block"));
        }
        if !final_block && pr.offset() != 0 {
            return Err(Error::invalid(
                pr.offset() as u64,
                "puff stream ends without a final block",
            ));
        }
        Ok(())
    }

    fn current(&self, tables: Option<Tables>, at: u64) -> Result<&HuffmanTable> {
        match tables {
            Some(Tables::Fixed) => Ok(&self.fixed),
            Some(Tables::Dynamic) => Ok(&self.dynamic),
            None => Err(Error::invalid(at, "symbol outside a compressed block")),
        }
    }
}
