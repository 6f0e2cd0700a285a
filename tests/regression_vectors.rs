// Fixed vectors: hand-assembled DEFLATE streams with their expected puff
// forms, plus the concrete rejection cases a conforming transcoder must
// fail on. The hex pairs live in tests/vectors/manifest.tsv.

use oxipuff::deflate::BitWriter;
use oxipuff::{Error, huff_to_vec, puff_to_vec};

#[derive(Debug)]
struct Vector {
    name: String,
    deflate: Vec<u8>,
    puff: Vec<u8>,
}

fn hex_to_bytes(s: &str) -> Vec<u8> {
    let s = s.trim();
    assert!(s.len().is_multiple_of(2), "hex string must have even length");
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}

fn load_vectors() -> Vec<Vector> {
    let manifest = include_str!("vectors/manifest.tsv");
    manifest
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .map(|line| {
            let parts: Vec<_> = line.split('|').collect();
            assert_eq!(parts.len(), 3, "invalid vector row: {line}");
            Vector {
                name: parts[0].to_string(),
                deflate: hex_to_bytes(parts[1]),
                puff: hex_to_bytes(parts[2]),
            }
        })
        .collect()
}

#[test]
fn vector_database_is_non_empty() {
    assert!(!load_vectors().is_empty());
}

#[test]
fn puff_matches_expected_form() {
    for v in load_vectors() {
        let puffed = puff_to_vec(&v.deflate).unwrap_or_else(|e| panic!("{}: {e}", v.name));
        assert_eq!(puffed, v.puff, "vector {}", v.name);
    }
}

#[test]
fn huff_reproduces_original_bits() {
    for v in load_vectors() {
        let huffed = huff_to_vec(&v.puff).unwrap_or_else(|e| panic!("{}: {e}", v.name));
        assert_eq!(huffed, v.deflate, "vector {}", v.name);
    }
}

#[test]
fn vectors_roundtrip_both_ways() {
    for v in load_vectors() {
        let puffed = puff_to_vec(&v.deflate).unwrap();
        assert_eq!(huff_to_vec(&puffed).unwrap(), v.deflate, "vector {}", v.name);
        assert_eq!(puff_to_vec(&v.deflate).unwrap(), puffed, "vector {}", v.name);
    }
}

#[test]
fn gzip_of_hello_world_reassembles_byte_exact() {
    use flate2::{Compression, write::GzEncoder};
    use std::io::Write;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(b"Hello, World!\n").unwrap();
    let gzip = encoder.finish().unwrap();

    let extents = oxipuff::locator::locate_deflates_in_gzip(&gzip).unwrap();
    let e = extents[0];
    let deflate = &gzip[e.offset as usize..(e.offset + e.length) as usize];

    let huffed = huff_to_vec(&puff_to_vec(deflate).unwrap()).unwrap();
    let mut reassembled = gzip[..e.offset as usize].to_vec();
    reassembled.extend_from_slice(&huffed);
    reassembled.extend_from_slice(&gzip[(e.offset + e.length) as usize..]);
    assert_eq!(reassembled, gzip);
}

/// Build a dynamic-block bit stream from a closure that writes the header
/// fields, and return the padded bytes.
fn dynamic_block_bits(write_rest: impl FnOnce(&mut BitWriter<'_>)) -> Vec<u8> {
    let mut buf = vec![0u8; 64];
    let mut bw = BitWriter::new(&mut buf);
    bw.write_bits(1, 1).unwrap(); // final
    bw.write_bits(2, 2).unwrap(); // dynamic
    write_rest(&mut bw);
    bw.write_boundary_bits(0).unwrap();
    let n = bw.size_written();
    buf.truncate(n);
    buf
}

#[test]
fn oversubscribed_meta_table_is_rejected() {
    // HCLEN=0 transmits four 3-bit lengths (symbols 16, 17, 18, 0);
    // giving three of them length 1 oversubscribes the 1-bit space.
    let deflate = dynamic_block_bits(|bw| {
        bw.write_bits(5, 0).unwrap(); // HLIT
        bw.write_bits(5, 0).unwrap(); // HDIST
        bw.write_bits(4, 0).unwrap(); // HCLEN
        for len in [1, 1, 1, 0] {
            bw.write_bits(3, len).unwrap();
        }
    });
    let err = puff_to_vec(&deflate).unwrap_err();
    assert!(matches!(err, Error::InvalidInput { .. }), "{err}");
}

#[test]
fn leading_copy_previous_marker_is_rejected() {
    // Meta alphabet: symbol 16 and symbol 0 both 1 bit; the first
    // literal/length code-length symbol is 16 (copy previous) with nothing
    // before it.
    let deflate = dynamic_block_bits(|bw| {
        bw.write_bits(5, 0).unwrap();
        bw.write_bits(5, 0).unwrap();
        bw.write_bits(4, 0).unwrap();
        for len in [1, 0, 0, 1] {
            bw.write_bits(3, len).unwrap();
        }
        // Canonical 1-bit codes: symbol 0 -> 0, symbol 16 -> 1.
        bw.write_bits(1, 1).unwrap(); // symbol 16 at index 0
    });
    let err = puff_to_vec(&deflate).unwrap_err();
    assert!(matches!(err, Error::InvalidInput { .. }), "{err}");
}

#[test]
fn reserved_block_type_is_rejected() {
    // final flag + block type 3
    let err = puff_to_vec(&[0b0000_0111]).unwrap_err();
    assert!(matches!(err, Error::InvalidInput { .. }));
}

#[test]
fn len_nlen_mismatch_is_rejected() {
    let err = puff_to_vec(&[0x01, 0x03, 0x00, 0x00, 0x00, b'a', b'b', b'c']).unwrap_err();
    assert!(matches!(err, Error::InvalidInput { .. }));
}

#[test]
fn truncated_input_reports_insufficient_input() {
    let err = puff_to_vec(&[0x01, 0x03]).unwrap_err();
    assert!(matches!(err, Error::InsufficientInput { .. }));
}
