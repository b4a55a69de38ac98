//! # chainarc-primitives
//!
//! Memory-mapped file primitives for the chainarc blockchain archive store.
//!
//! Every table in the store is a pair of files: a fixed-size *head* holding
//! a persisted body count plus an array of links (hash buckets or a dense
//! integer index), and an append-only *body* holding the records those links
//! address. Three table flavors compose the pair:
//!
//! - [`Hashmap`]: chained hash table keyed by a byte prefix stored in each
//!   record, with an optional per-bucket sieve filter for negative lookups.
//! - [`Arraymap`]: direct integer-indexed array of links into the body.
//! - [`Nomap`]: unkeyed append-only body addressed by caller-retained links.
//!
//! Records become visible only when their link is published into the head
//! (release on publish, acquire on read). Bodies never shrink and records
//! never move, so links are stable for the life of the store.

pub mod arraymap;
pub mod body;
pub mod file;
pub mod hashmap;
pub mod head;
pub mod iterator;
pub mod keys;
pub mod link;
pub mod nomap;
pub mod reader;
pub mod sieve;
pub mod writer;

pub use arraymap::Arraymap;
pub use body::Body;
pub use file::{FaultCode, MapFile, Memory};
pub use hashmap::Hashmap;
pub use head::{Head, Sift};
pub use iterator::ChainIter;
pub use link::Link;
pub use nomap::Nomap;
pub use reader::RecordReader;
pub use writer::RecordWriter;

/// Body sizing mode: fixed-width records or byte-measured slabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSize {
    /// Every row spans exactly this many bytes; links are record indexes.
    Record(u64),
    /// Rows are variable; links are byte offsets.
    Slab,
}

impl RowSize {
    /// Bytes per body unit (1 for slabs).
    #[must_use]
    pub const fn unit_bytes(self) -> u64 {
        match self {
            RowSize::Record(size) => size,
            RowSize::Slab => 1,
        }
    }
}

/// Record codec: deserialize from a positioned reader, serialize into a
/// positioned writer. Readers are sticky-fault; a short read invalidates the
/// source and `from_data` returns `None`.
pub trait Codec: Sized {
    fn from_data(source: &mut RecordReader<'_>) -> Option<Self>;
    fn to_data(&self, sink: &mut RecordWriter<'_>) -> bool;

    /// Serialized extent in body units: rows for record tables (including
    /// any trailing group rows), bytes for slabs (including the row's
    /// next/key prefix where the table has one).
    fn count(&self) -> u64 {
        1
    }
}
