//! Output archive: value/script slabs, a byte-measured nomap.
//!
//! Row: `[parent tx:4][value varint][script length varint][script]`. The
//! parent link is the up reference used by the address index and spend
//! queries; outputs are located through the puts table's link groups.

use std::path::Path;

use chainarc_primitives::writer::variable_size;
use chainarc_primitives::{Codec, Nomap, RecordReader, RecordWriter, RowSize};

use crate::schema::{OUTPUT, TxLink};
use crate::settings::TableSettings;

pub type OutputMap = Nomap<OUTPUT>;

const MAX_SCRIPT: usize = 1 << 24;

#[must_use]
pub fn table(dir: &Path, settings: &TableSettings) -> OutputMap {
    OutputMap::new(
        dir.join("archive_output.idx"),
        dir.join("archive_output.dat"),
        RowSize::Slab,
        settings.size,
        settings.rate,
    )
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub parent_fk: TxLink,
    pub value: u64,
    pub script: Vec<u8>,
}

impl Codec for Record {
    fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
        let parent_fk = source.read_link();
        let value = source.read_variable();
        let script_len = source.read_size(MAX_SCRIPT);
        let script = source.read_bytes(script_len);
        source.is_ok().then_some(Self { parent_fk, value, script })
    }

    fn to_data(&self, sink: &mut RecordWriter<'_>) -> bool {
        sink.write_link(self.parent_fk);
        sink.write_variable(self.value);
        sink.write_variable(self.script.len() as u64);
        sink.write_bytes(&self.script);
        sink.is_ok()
    }

    fn count(&self) -> u64 {
        4 + variable_size(self.value)
            + variable_size(self.script.len() as u64)
            + self.script.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let record = Record {
            parent_fk: TxLink::new(33),
            value: 5_000_000_000,
            script: vec![0x76, 0xA9, 0x14],
        };
        let mut buffer = vec![0u8; record.count() as usize];
        let mut sink = RecordWriter::new(&mut buffer);
        assert!(record.to_data(&mut sink));
        assert_eq!(sink.position() as u64, record.count());

        let mut source = RecordReader::new(&buffer);
        assert_eq!(Record::from_data(&mut source), Some(record));
    }
}
