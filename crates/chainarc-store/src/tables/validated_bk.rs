//! Block validation cache: a slab arraymap keyed by header link.
//!
//! Row: `[state code:1][fees varint]`. Verdicts are write-once per
//! revalidation; a new verdict prepends a new row via the head slot.

use std::path::Path;

use chainarc_primitives::writer::variable_size;
use chainarc_primitives::{Arraymap, Codec, RecordReader, RecordWriter, RowSize};

use crate::settings::TableSettings;

pub type ValidatedBkMap = Arraymap<4>;

/// Persisted block verdict codes.
pub const BLOCK_VALID: u8 = 1;
pub const BLOCK_CONFIRMABLE: u8 = 2;
pub const BLOCK_UNCONFIRMABLE: u8 = 3;

#[must_use]
pub fn table(dir: &Path, settings: &TableSettings) -> ValidatedBkMap {
    ValidatedBkMap::new(
        dir.join("archive_validated_bk.idx"),
        dir.join("archive_validated_bk.dat"),
        RowSize::Slab,
        settings.buckets,
        settings.size,
        settings.rate,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub code: u8,
    pub fees: u64,
}

impl Codec for Record {
    fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
        let code = source.read_byte();
        let fees = source.read_variable();
        source.is_ok().then_some(Self { code, fees })
    }

    fn to_data(&self, sink: &mut RecordWriter<'_>) -> bool {
        sink.write_byte(self.code);
        sink.write_variable(self.fees);
        sink.is_ok()
    }

    fn count(&self) -> u64 {
        1 + variable_size(self.fees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let record = Record { code: BLOCK_CONFIRMABLE, fees: 123_456_789 };
        let mut buffer = vec![0u8; record.count() as usize];
        let mut sink = RecordWriter::new(&mut buffer);
        assert!(record.to_data(&mut sink));
        assert_eq!(sink.position() as u64, record.count());

        let mut source = RecordReader::new(&buffer);
        assert_eq!(Record::from_data(&mut source), Some(record));
    }
}
