//! Input archive: script/witness slabs, a byte-measured nomap.
//!
//! Row: `[script length varint][script][witness length varint][witness]`.
//! Inputs are reached from point rows; nothing else indexes them.

use std::path::Path;

use chainarc_primitives::writer::variable_size;
use chainarc_primitives::{Codec, Nomap, RecordReader, RecordWriter, RowSize};

use crate::schema::INPUT;
use crate::settings::TableSettings;

pub type InputMap = Nomap<INPUT>;

/// Consensus cap applied when reading corrupt lengths.
const MAX_FIELD: usize = 1 << 24;

#[must_use]
pub fn table(dir: &Path, settings: &TableSettings) -> InputMap {
    InputMap::new(
        dir.join("archive_input.idx"),
        dir.join("archive_input.dat"),
        RowSize::Slab,
        settings.size,
        settings.rate,
    )
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub script: Vec<u8>,
    pub witness: Vec<u8>,
}

impl Codec for Record {
    fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
        let script_len = source.read_size(MAX_FIELD);
        let script = source.read_bytes(script_len);
        let witness_len = source.read_size(MAX_FIELD);
        let witness = source.read_bytes(witness_len);
        source.is_ok().then_some(Self { script, witness })
    }

    fn to_data(&self, sink: &mut RecordWriter<'_>) -> bool {
        sink.write_variable(self.script.len() as u64);
        sink.write_bytes(&self.script);
        sink.write_variable(self.witness.len() as u64);
        sink.write_bytes(&self.witness);
        sink.is_ok()
    }

    fn count(&self) -> u64 {
        variable_size(self.script.len() as u64)
            + self.script.len() as u64
            + variable_size(self.witness.len() as u64)
            + self.witness.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_with_witness() {
        let record = Record { script: vec![0x51, 0x52], witness: vec![0xAA; 300] };
        let mut buffer = vec![0u8; record.count() as usize];
        let mut sink = RecordWriter::new(&mut buffer);
        assert!(record.to_data(&mut sink));
        assert_eq!(sink.position() as u64, record.count());

        let mut source = RecordReader::new(&buffer);
        assert_eq!(Record::from_data(&mut source), Some(record));
    }

    #[test]
    fn empty_fields_encode_one_byte_each() {
        let record = Record::default();
        assert_eq!(record.count(), 2);
    }
}
