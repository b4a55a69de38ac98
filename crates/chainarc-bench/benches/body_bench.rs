//! Body allocation and sieve screening micro-benchmarks.

use chainarc_primitives::{Body, RowSize, sieve};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tempfile::TempDir;

fn bench_allocate(c: &mut Criterion) {
    let mut group = c.benchmark_group("body_allocate");

    group.bench_function("record", |b| {
        let dir = TempDir::new().unwrap();
        let body = Body::new(dir.path().join("r.dat"), RowSize::Record(64), 1 << 22, 50);
        body.create().unwrap();
        b.iter(|| black_box(body.allocate(1)));
    });

    group.bench_function("slab", |b| {
        let dir = TempDir::new().unwrap();
        let body = Body::new(dir.path().join("s.dat"), RowSize::Slab, 1 << 22, 50);
        body.create().unwrap();
        b.iter(|| black_box(body.allocate(48)));
    });

    group.finish();
}

fn bench_sieve(c: &mut Criterion) {
    let mut group = c.benchmark_group("sieve");

    // A partially populated word: four screens.
    let mut word = sieve::EMPTY;
    for fingerprint in [3u64, 0x5A5A, 0xDEAD_BEEF, 0x1234_5678_9ABC] {
        word = sieve::screen(word, fingerprint).0;
    }

    group.bench_function("screened_absent", |b| {
        let mut probe = 1u64;
        b.iter(|| {
            probe = probe.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(1);
            black_box(sieve::screened(word, probe));
        });
    });

    group.bench_function("screen_insert", |b| {
        let mut probe = 1u64;
        b.iter(|| {
            probe = probe.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(1);
            black_box(sieve::screen(sieve::EMPTY, probe));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_allocate, bench_sieve);
criterion_main!(benches);
