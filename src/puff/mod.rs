// The puff byte format.
//
// Puff is the byte-aligned, diff-friendly restatement of a DEFLATE stream.
// It is not a storage format: it carries no version field and is only
// meaningful between a matched puff/huff pair.
//
// A puff buffer is a sequence of blocks:
//
//   marker byte      bit 0 = final flag, bits 1-2 = block type
//                    (0 uncompressed, 1 fixed, 2 dynamic; >5 invalid)
//   uncompressed     2-byte LE length, then that many raw bytes
//   dynamic          self-delimiting header: HLIT/HDIST/HCLEN bytes,
//                    nibble-packed meta-code lengths, expanded code-length
//                    sequences (see `deflate::huffman`)
//   fixed            nothing further
//
// Fixed and dynamic blocks are followed by a tagged symbol stream:
//
//   0x00..=0x7F      literal run of tag+1 bytes (1..=128), raw bytes follow
//   0x80..=0xFE      copy, length = (tag & 0x7F) + 3 (3..=129),
//                    then 2-byte LE (distance - 1)
//   0xFF 0x00..=0x81 copy, length = ext + 130 (130..=259),
//                    then 2-byte LE (distance - 1)
//   0xFF 0xFF        end of block
//
// Length 259 is not a real DEFLATE length: it records length 258 encoded
// with symbol 284 + 5 extra bits (rather than symbol 285), so the huffer
// can reproduce the original encoder's choice bit-exactly.

pub mod reader;
pub mod writer;

pub use reader::PuffReader;
pub use writer::PuffWriter;

use crate::deflate::BlockType;

/// Longest literal run one tag byte can describe.
pub const MAX_LITERAL_RUN: usize = 128;

/// Longest copy the short (single-tag) form can describe.
pub const MAX_SHORT_COPY: u16 = 129;

/// Base length of the extended copy form.
pub const LONG_COPY_BASE: u16 = 130;

/// Pseudo-length recording 258-via-symbol-284 (see module docs).
pub const LENGTH_258_ALT: u16 = 259;

/// Extension byte marking the end of a compressed block.
pub const END_OF_BLOCK_EXT: u8 = 0xFF;

/// One token of the puff stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PuffData<'a> {
    /// Start of a DEFLATE block. `header` is the re-encodable block header
    /// payload: the 2-byte LE length for uncompressed blocks, the dynamic
    /// header for dynamic blocks, empty for fixed blocks.
    BlockMarker {
        final_block: bool,
        block_type: BlockType,
        header: &'a [u8],
    },
    /// Literal bytes: a run of 1..=128 inside a compressed block, or the
    /// whole payload of an uncompressed block.
    Literals(&'a [u8]),
    /// A length/distance copy. `length` is 3..=259 (259 per module docs),
    /// `distance` 1..=32768.
    LenDist { length: u16, distance: u16 },
    /// End of a compressed block (the huffer emits symbol 256 here).
    EndOfBlock,
}
