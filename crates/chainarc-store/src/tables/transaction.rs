//! Transaction archive: a record hashmap keyed by tx hash, sieve enabled.
//!
//! Row: `[next:4][tx hash:32][coinbase:1][light:4][heavy:4][locktime:4]
//! [version:4][ins:3][outs:3][first point:4][outs block:4]`. `light` and
//! `heavy` are the serialized sizes without and with witness data. The
//! first-point link addresses the tx's contiguous input group in the
//! point body; the outs-block link addresses its output-link group in the
//! puts body.

use std::path::Path;

use chainarc_primitives::hashmap::TableOptions;
use chainarc_primitives::{Codec, Hashmap, RecordReader, RecordWriter, RowSize};

use crate::schema::{HASH, OutsLink, PointLink, TX};
use crate::settings::TableSettings;

pub type TxMap = Hashmap<TX, HASH>;

pub const PAYLOAD: u64 = 1 + 4 + 4 + 4 + 4 + 3 + 3 + 4 + 4;
pub const ROW: u64 = (TX + HASH) as u64 + PAYLOAD;

const SKIP_TO_COUNTS: usize = 1 + 4 + 4 + 4 + 4;

#[must_use]
pub fn table(dir: &Path, settings: &TableSettings) -> TxMap {
    TxMap::new(
        dir.join("archive_tx.idx"),
        dir.join("archive_tx.dat"),
        RowSize::Record(ROW),
        &TableOptions {
            buckets: settings.buckets,
            size: settings.size,
            rate: settings.rate,
            sieve: true,
        },
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Record {
    pub coinbase: bool,
    pub light: u32,
    pub heavy: u32,
    pub locktime: u32,
    pub version: u32,
    pub ins: u32,
    pub outs: u32,
    pub point_fk: PointLink,
    pub outs_fk: OutsLink,
}

impl Codec for Record {
    fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
        let record = Self {
            coinbase: source.read_byte() != 0,
            light: source.read_u32_le(),
            heavy: source.read_u32_le(),
            locktime: source.read_u32_le(),
            version: source.read_u32_le(),
            ins: source.read_le_bytes(3) as u32,
            outs: source.read_le_bytes(3) as u32,
            point_fk: source.read_link(),
            outs_fk: source.read_link(),
        };
        source.is_ok().then_some(record)
    }

    fn to_data(&self, sink: &mut RecordWriter<'_>) -> bool {
        sink.write_byte(u8::from(self.coinbase));
        sink.write_u32_le(self.light);
        sink.write_u32_le(self.heavy);
        sink.write_u32_le(self.locktime);
        sink.write_u32_le(self.version);
        sink.write_le_bytes(u64::from(self.ins), 3);
        sink.write_le_bytes(u64::from(self.outs), 3);
        sink.write_link(self.point_fk);
        sink.write_link(self.outs_fk);
        sink.is_ok()
    }
}

/// Input/output counts and group links, skipping the fixed front.
#[derive(Debug, Clone, Copy)]
pub struct GetPuts {
    pub ins: u32,
    pub outs: u32,
    pub point_fk: PointLink,
    pub outs_fk: OutsLink,
}

impl Codec for GetPuts {
    fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
        source.skip_bytes(SKIP_TO_COUNTS);
        let record = Self {
            ins: source.read_le_bytes(3) as u32,
            outs: source.read_le_bytes(3) as u32,
            point_fk: source.read_link(),
            outs_fk: source.read_link(),
        };
        source.is_ok().then_some(record)
    }

    fn to_data(&self, _sink: &mut RecordWriter<'_>) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GetCoinbase {
    pub coinbase: bool,
}

impl Codec for GetCoinbase {
    fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
        let coinbase = source.read_byte() != 0;
        source.is_ok().then_some(Self { coinbase })
    }

    fn to_data(&self, _sink: &mut RecordWriter<'_>) -> bool {
        false
    }
}
