//! Concurrency contracts: parallel allocation never double-assigns,
//! parallel hashmap writers all publish, and readers block remap without
//! deadlocking growth.

use std::sync::Arc;
use std::thread;

use chainarc_primitives::hashmap::TableOptions;
use chainarc_primitives::{Body, Codec, Hashmap, RecordReader, RecordWriter, RowSize};
use tempfile::TempDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    value: u64,
}

impl Codec for Entry {
    fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
        let value = source.read_u64_le();
        source.is_ok().then_some(Self { value })
    }

    fn to_data(&self, sink: &mut RecordWriter<'_>) -> bool {
        sink.write_u64_le(self.value);
        sink.is_ok()
    }
}

fn key_for(thread: u64, index: u64) -> [u8; 8] {
    let mut key = [0u8; 8];
    key[..4].copy_from_slice(&(thread as u32).to_le_bytes());
    key[4..].copy_from_slice(&(index as u32).to_le_bytes());
    key
}

#[test]
fn parallel_allocation_is_unique_and_dense() {
    let dir = TempDir::new().unwrap();
    let body = Arc::new(Body::new(dir.path().join("alloc.dat"), RowSize::Record(16), 256, 50));
    body.create().unwrap();

    const THREADS: u64 = 8;
    const PER_THREAD: u64 = 500;

    let mut handles = Vec::new();
    for _ in 0..THREADS {
        let body = Arc::clone(&body);
        handles.push(thread::spawn(move || {
            let mut links = Vec::with_capacity(PER_THREAD as usize);
            for _ in 0..PER_THREAD {
                links.push(body.allocate(1).expect("allocate"));
            }
            links
        }));
    }

    let mut all: Vec<u64> = handles
        .into_iter()
        .flat_map(|handle| handle.join().expect("join"))
        .collect();
    all.sort_unstable();
    all.dedup();
    assert_eq!(all.len() as u64, THREADS * PER_THREAD);
    assert_eq!(body.count(), THREADS * PER_THREAD);
    assert_eq!(all.last().copied(), Some(THREADS * PER_THREAD - 1));
}

#[test]
fn parallel_writers_publish_every_record() {
    let dir = TempDir::new().unwrap();
    let options = TableOptions { buckets: 64, size: 4096, rate: 50, sieve: false };
    // Row: next(4) + key(8) + value(8).
    let map = Arc::new(Hashmap::<4, 8>::new(
        dir.path().join("c.idx"),
        dir.path().join("c.dat"),
        RowSize::Record(20),
        &options,
    ));
    map.create().unwrap();

    const THREADS: u64 = 8;
    const PER_THREAD: u64 = 250;

    let mut handles = Vec::new();
    for thread_id in 0..THREADS {
        let map = Arc::clone(&map);
        handles.push(thread::spawn(move || {
            for index in 0..PER_THREAD {
                let key = key_for(thread_id, index);
                map.put(&key, &Entry { value: thread_id * PER_THREAD + index })
                    .expect("put");
            }
        }));
    }
    for handle in handles {
        handle.join().expect("join");
    }

    assert_eq!(map.count(), THREADS * PER_THREAD);
    for thread_id in 0..THREADS {
        for index in 0..PER_THREAD {
            let key = key_for(thread_id, index);
            let entry = map.find::<Entry>(&key).unwrap().expect("present");
            assert_eq!(entry.value, thread_id * PER_THREAD + index);
        }
    }
}

#[test]
fn readers_release_and_growth_proceeds() {
    let dir = TempDir::new().unwrap();
    let body = Arc::new(Body::new(dir.path().join("grow.dat"), RowSize::Slab, 128, 50));
    body.create().unwrap();
    body.allocate(64).unwrap();

    let reader = {
        let body = Arc::clone(&body);
        thread::spawn(move || {
            // Hold a handle briefly, then drop it so growth can remap.
            let memory = body.get(0).unwrap();
            let first = memory.as_slice()[0];
            drop(memory);
            first
        })
    };
    reader.join().expect("join");

    // Forces a grow well past the current capacity.
    body.allocate(1 << 16).unwrap();
    assert_eq!(body.count(), 64 + (1 << 16));
}
