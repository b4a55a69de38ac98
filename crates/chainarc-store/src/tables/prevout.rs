//! Prevout cache: per-block confirmation spends, a slab arraymap keyed by
//! header link.
//!
//! Row: `[conflict count varint][conflict tx:4 x count]` then one
//! `[flagged prev tx:4][sequence:4]` pair for every spending input of the
//! block (coinbase inputs excluded). The high bit of the flagged field
//! carries the prev tx's coinbase flag; the terminal value marks a
//! block-internal spend that needs no lookup. The spend count is not
//! stored (confirmation derives it from the block's tx rows), so reads
//! go through [`Record::read`] with the externally known count.

use std::path::Path;

use chainarc_primitives::writer::variable_size;
use chainarc_primitives::{Arraymap, Codec, RecordReader, RecordWriter, RowSize};

use crate::schema::TxLink;
use crate::settings::TableSettings;

pub type PrevoutMap = Arraymap<4>;

/// High bit of the flagged prev-tx field.
pub const COINBASE_FLAG: u32 = 1 << 31;

/// Block-internal spend sentinel.
pub const INTERNAL: u32 = u32::MAX;

#[must_use]
pub fn table(dir: &Path, settings: &TableSettings) -> PrevoutMap {
    PrevoutMap::new(
        dir.join("archive_prevout.idx"),
        dir.join("archive_prevout.dat"),
        RowSize::Slab,
        settings.buckets,
        settings.size,
        settings.rate,
    )
}

/// Merge a coinbase flag into a prev-tx link value.
#[must_use]
pub const fn merge(coinbase: bool, prev_tx: u32) -> u32 {
    debug_assert!(prev_tx & COINBASE_FLAG == 0, "prev tx overflow");
    if coinbase { prev_tx | COINBASE_FLAG } else { prev_tx }
}

#[must_use]
pub const fn is_coinbase(flagged: u32) -> bool {
    flagged != INTERNAL && flagged & COINBASE_FLAG != 0
}

/// Prev-tx link value with the flag stripped; internal spends stay
/// terminal.
#[must_use]
pub const fn prev_tx(flagged: u32) -> u32 {
    if flagged == INTERNAL { flagged } else { flagged & !COINBASE_FLAG }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    /// Links of txs whose hash duplicates one in the block's ancestry.
    pub conflicts: Vec<TxLink>,
    /// `(flagged prev tx, sequence)` per spending input, block order.
    pub spends: Vec<(u32, u32)>,
}

impl Record {
    /// Read with the externally derived spend count.
    pub fn read(source: &mut RecordReader<'_>, spend_count: usize) -> Option<Self> {
        let conflict_count = source.read_size(1 << 20);
        let mut conflicts = Vec::with_capacity(conflict_count);
        for _ in 0..conflict_count {
            conflicts.push(source.read_link());
        }
        let mut spends = Vec::with_capacity(spend_count);
        for _ in 0..spend_count {
            let flagged = source.read_u32_le();
            let sequence = source.read_u32_le();
            spends.push((flagged, sequence));
        }
        source.is_ok().then_some(Self { conflicts, spends })
    }
}

impl Codec for Record {
    /// The self-describing prefix only; spends require [`Record::read`].
    fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
        Self::read(source, 0)
    }

    fn to_data(&self, sink: &mut RecordWriter<'_>) -> bool {
        sink.write_variable(self.conflicts.len() as u64);
        for conflict in &self.conflicts {
            sink.write_link(*conflict);
        }
        for &(flagged, sequence) in &self.spends {
            sink.write_u32_le(flagged);
            sink.write_u32_le(sequence);
        }
        sink.is_ok()
    }

    fn count(&self) -> u64 {
        variable_size(self.conflicts.len() as u64)
            + 4 * self.conflicts.len() as u64
            + 8 * self.spends.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_with_external_count() {
        let record = Record {
            conflicts: vec![TxLink::new(3)],
            spends: vec![(merge(true, 17), 0xFFFF_FFFF), (INTERNAL, 1), (merge(false, 9), 2)],
        };
        let mut buffer = vec![0u8; record.count() as usize];
        let mut sink = RecordWriter::new(&mut buffer);
        assert!(record.to_data(&mut sink));
        assert_eq!(sink.position() as u64, record.count());

        let mut source = RecordReader::new(&buffer);
        assert_eq!(Record::read(&mut source, 3), Some(record));
    }

    #[test]
    fn flag_merging() {
        assert!(is_coinbase(merge(true, 5)));
        assert!(!is_coinbase(merge(false, 5)));
        assert_eq!(prev_tx(merge(true, 5)), 5);
        assert_eq!(prev_tx(INTERNAL), INTERNAL);
        assert!(!is_coinbase(INTERNAL));
    }
}
