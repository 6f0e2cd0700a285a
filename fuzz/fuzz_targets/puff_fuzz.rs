#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes through both directions: the transcoder must never
    // panic, only return errors.
    let _ = oxipuff::puff_to_vec(data);
    let _ = oxipuff::huff_to_vec(data);
    let _ = oxipuff::locator::locate_deflates_in_gzip(data);
    let _ = oxipuff::locator::locate_deflates_in_zip(data);
});
