//! Tx validation cache: a slab multimap hashmap keyed by tx hash.
//!
//! Row: `[next:4][tx hash:32][context:12][state code:1][fee varint]
//! [sigops varint]`. A tx accrues one row per validation context; the
//! conflict chain is the verdict history, most recent first.

use std::path::Path;

use chainarc_primitives::hashmap::TableOptions;
use chainarc_primitives::writer::variable_size;
use chainarc_primitives::{Codec, Hashmap, RecordReader, RecordWriter, RowSize};

use crate::schema::{Context, HASH, TX};
use crate::settings::TableSettings;

pub type ValidatedTxMap = Hashmap<TX, HASH>;

/// Persisted tx verdict codes.
pub const TX_CONNECTED: u8 = 4;
pub const TX_DISCONNECTED: u8 = 5;

const PREFIX: u64 = (TX + HASH) as u64;

#[must_use]
pub fn table(dir: &Path, settings: &TableSettings) -> ValidatedTxMap {
    ValidatedTxMap::new(
        dir.join("archive_validated_tx.idx"),
        dir.join("archive_validated_tx.dat"),
        RowSize::Slab,
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
    pub ctx: Context,
    pub code: u8,
    pub fee: u64,
    pub sigops: u64,
}

impl Codec for Record {
    fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
        let record = Self {
            ctx: Context::from_data(source),
            code: source.read_byte(),
            fee: source.read_variable(),
            sigops: source.read_variable(),
        };
        source.is_ok().then_some(record)
    }

    fn to_data(&self, sink: &mut RecordWriter<'_>) -> bool {
        self.ctx.to_data(sink);
        sink.write_byte(self.code);
        sink.write_variable(self.fee);
        sink.write_variable(self.sigops);
        sink.is_ok()
    }

    /// Slab rows include the next/key prefix.
    fn count(&self) -> u64 {
        PREFIX
            + Context::SIZE as u64
            + 1
            + variable_size(self.fee)
            + variable_size(self.sigops)
    }
}
