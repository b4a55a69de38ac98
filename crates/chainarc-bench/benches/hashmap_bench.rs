//! Hashmap put/find throughput, with and without the bucket sieve.

use chainarc_bench::{bench_key, bench_map};
use chainarc_primitives::{Codec, RecordReader, RecordWriter};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tempfile::TempDir;

#[derive(Clone, Copy)]
struct Payload {
    value: u64,
}

impl Codec for Payload {
    fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
        let value = source.read_u64_le();
        source.skip_bytes(20);
        source.is_ok().then_some(Self { value })
    }

    fn to_data(&self, sink: &mut RecordWriter<'_>) -> bool {
        sink.write_u64_le(self.value);
        sink.write_bytes(&[0u8; 20]);
        sink.is_ok()
    }
}

fn bench_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("hashmap_put");
    for sieve in [false, true] {
        let label = if sieve { "sieve" } else { "plain" };
        group.bench_function(label, |b| {
            let dir = TempDir::new().unwrap();
            let map = bench_map(dir.path(), 1 << 12, sieve);
            let mut index = 0u64;
            b.iter(|| {
                let key = bench_key(index);
                index += 1;
                black_box(map.put(&key, &Payload { value: index }));
            });
        });
    }
    group.finish();
}

fn bench_find(c: &mut Criterion) {
    let mut group = c.benchmark_group("hashmap_find");
    for sieve in [false, true] {
        let dir = TempDir::new().unwrap();
        let map = bench_map(dir.path(), 1 << 12, sieve);
        for index in 0..10_000u64 {
            map.put(&bench_key(index), &Payload { value: index }).unwrap();
        }

        let label = if sieve { "hit_sieve" } else { "hit_plain" };
        group.bench_function(label, |b| {
            let mut index = 0u64;
            b.iter(|| {
                let key = bench_key(index % 10_000);
                index += 1;
                black_box(map.find::<Payload>(&key).unwrap());
            });
        });

        // Negative lookups are where the sieve pays for itself.
        let label = if sieve { "miss_sieve" } else { "miss_plain" };
        group.bench_function(label, |b| {
            let mut index = 1_000_000u64;
            b.iter(|| {
                let key = bench_key(index);
                index += 1;
                black_box(map.first(&key).unwrap());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_put, bench_find);
criterion_main!(benches);
