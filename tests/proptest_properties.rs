use std::io::Write;

use flate2::Compression;
use flate2::write::DeflateEncoder;
use proptest::prelude::*;

use oxipuff::{huff_to_vec, puff_size, puff_to_vec};

fn deflate_compress(data: &[u8], level: u32) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

proptest! {
    #[test]
    fn prop_real_deflate_roundtrips(
        data in proptest::collection::vec(any::<u8>(), 0..8192),
        level in 0u32..=9u32
    ) {
        let deflate = deflate_compress(&data, level);
        let puffed = puff_to_vec(&deflate).unwrap();
        let huffed = huff_to_vec(&puffed).unwrap();
        prop_assert_eq!(&huffed, &deflate);
        // The puff form is a fixed point of huff-then-puff.
        prop_assert_eq!(puff_to_vec(&huffed).unwrap(), puffed);
    }

    #[test]
    fn prop_compressible_deflate_roundtrips(
        word in proptest::collection::vec(any::<u8>(), 1..32),
        repeats in 1usize..512,
        level in 1u32..=9u32
    ) {
        // Repetitive inputs drive the encoder into long matches and
        // dynamic tables.
        let data: Vec<u8> = word.iter().cycle().take(word.len() * repeats).copied().collect();
        let deflate = deflate_compress(&data, level);
        let puffed = puff_to_vec(&deflate).unwrap();
        prop_assert_eq!(huff_to_vec(&puffed).unwrap(), deflate);
    }

    #[test]
    fn prop_arbitrary_bytes_never_panic(
        data in proptest::collection::vec(any::<u8>(), 0..2048)
    ) {
        // Garbage is rejected or transcoded; accepted inputs must
        // round-trip exactly.
        if let Ok(puffed) = puff_to_vec(&data) {
            prop_assert_eq!(huff_to_vec(&puffed).unwrap(), data.clone());
        }
        let _ = huff_to_vec(&data);
    }

    #[test]
    fn prop_sizing_pass_matches_real_pass(
        data in proptest::collection::vec(any::<u8>(), 0..4096),
        level in 0u32..=9u32
    ) {
        let deflate = deflate_compress(&data, level);
        let size = puff_size(&deflate).unwrap();
        prop_assert_eq!(puff_to_vec(&deflate).unwrap().len(), size);
    }
}
