//! Strong-tx index: a record hashmap keyed by tx hash.
//!
//! Row: `[next:4][tx hash:32][header:3][positive:1]`. A positive row
//! promotes the tx into the named block; reorganization reverses it by
//! prepending a negative row for the same key, never by deletion, so the
//! most recent row wins.

use std::path::Path;

use chainarc_primitives::hashmap::TableOptions;
use chainarc_primitives::{Codec, Hashmap, RecordReader, RecordWriter, RowSize};

use crate::schema::{BLOCK, BlockLink, HASH, TX};
use crate::settings::TableSettings;

pub type StrongTxMap = Hashmap<TX, HASH>;

pub const PAYLOAD: u64 = BLOCK as u64 + 1;
pub const ROW: u64 = (TX + HASH) as u64 + PAYLOAD;

#[must_use]
pub fn table(dir: &Path, settings: &TableSettings) -> StrongTxMap {
    StrongTxMap::new(
        dir.join("archive_strong_tx.idx"),
        dir.join("archive_strong_tx.dat"),
        RowSize::Record(ROW),
        &TableOptions {
            buckets: settings.buckets,
            size: settings.size,
            rate: settings.rate,
            sieve: false,
        },
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub header_fk: BlockLink,
    pub positive: bool,
}

impl Codec for Record {
    fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
        let header_fk = source.read_link();
        let positive = source.read_byte() != 0;
        source.is_ok().then_some(Self { header_fk, positive })
    }

    fn to_data(&self, sink: &mut RecordWriter<'_>) -> bool {
        sink.write_link(self.header_fk);
        sink.write_byte(u8::from(self.positive));
        sink.is_ok()
    }
}
