//! Benchmark support for the chainarc primitives: shared fixtures used by
//! the criterion benches.

use chainarc_primitives::hashmap::TableOptions;
use chainarc_primitives::{Hashmap, RowSize};
use std::path::Path;

/// Row: next(4) + key(32) + payload(28) = 64 bytes.
pub const BENCH_ROW: u64 = 64;

/// A bench-sized hashmap in `dir`.
#[must_use]
pub fn bench_map(dir: &Path, buckets: u64, sieve: bool) -> Hashmap<4, 32> {
    let options = TableOptions { buckets, size: 1 << 22, rate: 50, sieve };
    let map = Hashmap::new(
        dir.join("bench.idx"),
        dir.join("bench.dat"),
        RowSize::Record(BENCH_ROW),
        &options,
    );
    map.create().expect("create bench table");
    map
}

/// Deterministic 32-byte keys with well-spread low bits.
#[must_use]
pub fn bench_key(index: u64) -> [u8; 32] {
    let mut key = [0u8; 32];
    let mixed = index.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    key[..8].copy_from_slice(&mixed.to_le_bytes());
    key[8..16].copy_from_slice(&index.to_le_bytes());
    key
}
