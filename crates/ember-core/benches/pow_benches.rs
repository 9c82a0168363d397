//! Benchmarks for proof-of-work mining and validation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use ember_core::block::{Block, BlockTemplate};
use ember_core::params::ChainParams;
use ember_core::pow::ProofOfWork;

fn template(bits: u32) -> BlockTemplate {
    BlockTemplate {
        timestamp: 1_700_000_000,
        data: vec![0xAB; 256],
        prev_hash: None,
        target_bits: bits,
        height: 0,
    }
}

fn bench_mine(c: &mut Criterion) {
    let mut group = c.benchmark_group("mine");
    for bits in [8u32, 12, 16] {
        group.bench_with_input(BenchmarkId::new("sequential", bits), &bits, |b, &bits| {
            b.iter(|| ProofOfWork::new().mine(black_box(template(bits))).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("threads_4", bits), &bits, |b, &bits| {
            b.iter(|| {
                ProofOfWork::new()
                    .with_threads(4)
                    .mine(black_box(template(bits)))
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_validate(c: &mut Criterion) {
    let params = ChainParams::default();
    let block = Block::new_genesis_at(vec![0xCD; 1024], 1_700_000_000, &params).unwrap();
    c.bench_function("validate", |b| b.iter(|| ProofOfWork::validate(black_box(&block))));
}

fn bench_codec(c: &mut Criterion) {
    let params = ChainParams::default();
    let block = Block::new_genesis_at(vec![0xEF; 4096], 1_700_000_000, &params).unwrap();
    let bytes = block.encode().unwrap();
    c.bench_function("encode", |b| b.iter(|| black_box(&block).encode().unwrap()));
    c.bench_function("decode", |b| b.iter(|| Block::decode(black_box(&bytes)).unwrap()));
}

criterion_group!(benches, bench_mine, bench_validate, bench_codec);
criterion_main!(benches);
