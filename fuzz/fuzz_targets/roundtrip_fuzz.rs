#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Any input the puffer accepts must round-trip byte-exactly, and the
    // puff buffer itself must be a fixed point of huff-then-puff.
    if let Ok(puffed) = oxipuff::puff_to_vec(data) {
        let huffed = oxipuff::huff_to_vec(&puffed).expect("accepted puff failed to huff");
        assert_eq!(huffed, data, "deflate -> puff -> deflate is not the identity");
        let repuffed = oxipuff::puff_to_vec(&huffed).expect("huffed output failed to re-puff");
        assert_eq!(repuffed, puffed, "puff -> deflate -> puff is not the identity");
    }
});
