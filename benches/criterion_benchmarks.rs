use std::io::Write;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use flate2::Compression;
use flate2::write::DeflateEncoder;

fn gen_data(size: usize, seed: u64) -> Vec<u8> {
    let mut s = seed;
    let mut out = Vec::with_capacity(size);
    for _ in 0..size {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        out.push((s >> 33) as u8);
    }
    out
}

/// Mix of compressible text and pseudo-random spans, the shape real
/// artifacts tend to have.
fn mixed_data(size: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(size);
    let mut seed = 1u64;
    while out.len() < size {
        out.extend_from_slice(b"a moderately compressible phrase, repeated with small changes; ");
        let noise = gen_data(64, seed);
        out.extend_from_slice(&noise);
        seed += 1;
    }
    out.truncate(size);
    out
}

fn deflate_compress(data: &[u8], level: u32) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn bench_puff(c: &mut Criterion) {
    let mut group = c.benchmark_group("puff");
    for size in [64 * 1024, 1024 * 1024, 4 * 1024 * 1024] {
        let deflate = deflate_compress(&mixed_data(size), 6);
        group.throughput(Throughput::Bytes(deflate.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(size),
            &deflate,
            |b, deflate| b.iter(|| oxipuff::puff_to_vec(std::hint::black_box(deflate)).unwrap()),
        );
    }
    group.finish();
}

fn bench_huff(c: &mut Criterion) {
    let mut group = c.benchmark_group("huff");
    for size in [64 * 1024, 1024 * 1024, 4 * 1024 * 1024] {
        let deflate = deflate_compress(&mixed_data(size), 6);
        let puffed = oxipuff::puff_to_vec(&deflate).unwrap();
        group.throughput(Throughput::Bytes(puffed.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &puffed, |b, puffed| {
            b.iter(|| oxipuff::huff_to_vec(std::hint::black_box(puffed)).unwrap())
        });
    }
    group.finish();
}

fn bench_stored_blocks(c: &mut Criterion) {
    let mut group = c.benchmark_group("puff_stored");
    let deflate = deflate_compress(&gen_data(1024 * 1024, 3), 0);
    group.throughput(Throughput::Bytes(deflate.len() as u64));
    group.bench_function("1MiB_level0", |b| {
        b.iter(|| oxipuff::puff_to_vec(std::hint::black_box(&deflate)).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_puff, bench_huff, bench_stored_blocks);
criterion_main!(benches);
