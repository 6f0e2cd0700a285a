// Walkthrough: find the deflate stream inside a gzip blob, puff it, and
// huff it back to the identical bytes.
//
//   cargo run --example gzip_transcode

use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let text = b"Hello, World! Hello, World! Hello, World!\n";
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text)?;
    let gzip = encoder.finish()?;

    // Locate the raw deflate bytes inside the gzip member.
    let extents = oxipuff::locator::locate_deflates_in_gzip(&gzip)?;
    let extent = extents[0];
    let deflate = &gzip[extent.offset as usize..(extent.offset + extent.length) as usize];

    // Expand to puff and reconstruct.
    let puffed = oxipuff::puff_to_vec(deflate)?;
    let huffed = oxipuff::huff_to_vec(&puffed)?;
    assert_eq!(huffed, deflate);

    println!(
        "gzip {} bytes -> deflate {} bytes at offset {} -> puff {} bytes -> identical deflate",
        gzip.len(),
        deflate.len(),
        extent.offset,
        puffed.len()
    );
    Ok(())
}
