//! Point archive: the per-input prevout records, a record nomap.
//!
//! A tx's inputs form one contiguous group starting at the tx row's
//! first-point link. Row: `[prevout hash:32][prevout index:3][sequence:4]
//! [input:4][parent tx:4]`. The index field stores terminal for the null
//! prevout (coinbase input); the sequence is denormalized here so
//! confirmation never touches the input slab.

use std::path::Path;

use chainarc_primitives::{Codec, Link, Nomap, RecordReader, RecordWriter, RowSize};

use crate::schema::{HASH, INDEX, InputLink, NULL_INDEX, POINT, TxLink};
use crate::settings::TableSettings;

pub type PointMap = Nomap<POINT>;

pub const ROW: u64 = HASH as u64 + INDEX as u64 + 4 + 4 + 4;

#[must_use]
pub fn table(dir: &Path, settings: &TableSettings) -> PointMap {
    PointMap::new(
        dir.join("archive_point.idx"),
        dir.join("archive_point.dat"),
        RowSize::Record(ROW),
        settings.size,
        settings.rate,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub hash: [u8; HASH],
    pub index: u32,
    pub sequence: u32,
    pub input_fk: InputLink,
    pub parent_fk: TxLink,
}

impl Record {
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.index == NULL_INDEX
    }
}

impl Codec for Record {
    fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
        let hash = source.read_array::<HASH>();
        let stored = source.read_link::<INDEX>();
        let record = Self {
            hash,
            index: if stored.is_terminal() { NULL_INDEX } else { stored.value() as u32 },
            sequence: source.read_u32_le(),
            input_fk: source.read_link(),
            parent_fk: source.read_link(),
        };
        source.is_ok().then_some(record)
    }

    fn to_data(&self, sink: &mut RecordWriter<'_>) -> bool {
        sink.write_bytes(&self.hash);
        let stored = if self.index == NULL_INDEX {
            Link::<INDEX>::TERMINAL
        } else {
            Link::<INDEX>::new(u64::from(self.index))
        };
        sink.write_link(stored);
        sink.write_u32_le(self.sequence);
        sink.write_link(self.input_fk);
        sink.write_link(self.parent_fk);
        sink.is_ok()
    }
}
