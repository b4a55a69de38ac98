//! Txs index: the tx-per-block map, a slab arraymap keyed by header link.
//!
//! Row: `[tx count:3][flagged wire:4][tx link:4 x count]`, optionally
//! followed by a 32-byte merkle interval hash when the wire field's high
//! bit is set, and (for the genesis slot only, first tx link zero) a
//! trailing depth byte.

use std::path::Path;

use chainarc_primitives::{Arraymap, Codec, RecordReader, RecordWriter, RowSize};

use crate::schema::{HASH, TxLink};
use crate::settings::TableSettings;

/// Slab body: head slots hold four-byte byte offsets.
pub type TxsMap = Arraymap<4>;

/// High bit of the wire-size field flags a stored merkle interval.
pub const INTERVAL_FLAG: u32 = 1 << 31;

#[must_use]
pub fn table(dir: &Path, settings: &TableSettings) -> TxsMap {
    TxsMap::new(
        dir.join("archive_txs.idx"),
        dir.join("archive_txs.dat"),
        RowSize::Slab,
        settings.buckets,
        settings.size,
        settings.rate,
    )
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    /// Block serialized size on the wire (31 usable bits).
    pub wire: u32,
    /// Ordered tx links, coinbase first.
    pub tx_fks: Vec<TxLink>,
    /// Optional merkle interval hash.
    pub interval: Option<[u8; HASH]>,
    /// Genesis-only trailing byte.
    pub depth: u8,
}

impl Record {
    /// The genesis descriptor holds the zero tx link first.
    #[must_use]
    pub fn is_genesis(&self) -> bool {
        self.tx_fks.first().is_some_and(|fk| fk.value() == 0)
    }

    #[must_use]
    pub fn coinbase_fk(&self) -> Option<TxLink> {
        self.tx_fks.first().copied()
    }
}

impl Codec for Record {
    fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
        let number = source.read_le_bytes(3);
        let flagged = source.read_u32_le();
        let mut tx_fks = Vec::with_capacity(number as usize);
        for _ in 0..number {
            tx_fks.push(source.read_link());
        }
        let interval =
            (flagged & INTERVAL_FLAG != 0).then(|| source.read_array::<HASH>());
        let mut record =
            Self { wire: flagged & !INTERVAL_FLAG, tx_fks, interval, depth: 0 };
        if record.is_genesis() {
            record.depth = source.read_byte();
        }
        source.is_ok().then_some(record)
    }

    fn to_data(&self, sink: &mut RecordWriter<'_>) -> bool {
        debug_assert_eq!(self.wire & INTERVAL_FLAG, 0, "wire size overflow");
        let flagged =
            if self.interval.is_some() { self.wire | INTERVAL_FLAG } else { self.wire };
        sink.write_le_bytes(self.tx_fks.len() as u64, 3);
        sink.write_u32_le(flagged);
        for fk in &self.tx_fks {
            sink.write_link(*fk);
        }
        if let Some(interval) = &self.interval {
            sink.write_bytes(interval);
        }
        if self.is_genesis() {
            sink.write_byte(self.depth);
        }
        sink.is_ok()
    }

    fn count(&self) -> u64 {
        3 + 4
            + 4 * self.tx_fks.len() as u64
            + if self.interval.is_some() { HASH as u64 } else { 0 }
            + u64::from(self.is_genesis())
    }
}

/// Coinbase link and tx quantity without materializing the link vector.
#[derive(Debug, Clone, Copy)]
pub struct GetCoinbase {
    pub number: u64,
    pub coinbase_fk: TxLink,
}

impl Codec for GetCoinbase {
    fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
        let number = source.read_le_bytes(3);
        source.skip_bytes(4);
        if number == 0 {
            source.invalidate();
            return None;
        }
        let coinbase_fk = source.read_link();
        source.is_ok().then_some(Self { number, coinbase_fk })
    }

    fn to_data(&self, _sink: &mut RecordWriter<'_>) -> bool {
        false
    }
}

/// Wire size with the interval flag stripped.
#[derive(Debug, Clone, Copy)]
pub struct GetWire {
    pub wire: u32,
}

impl Codec for GetWire {
    fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
        source.skip_bytes(3);
        let flagged = source.read_u32_le();
        source.is_ok().then_some(Self { wire: flagged & !INTERVAL_FLAG })
    }

    fn to_data(&self, _sink: &mut RecordWriter<'_>) -> bool {
        false
    }
}
