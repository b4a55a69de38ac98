//! Puts archive: per-tx output-link groups, a record nomap.
//!
//! Each tx owns one contiguous group of four-byte rows, one output link
//! per row, addressed by the tx row's outs-block link; the group length
//! is the tx's output count. Groups are written row by row into a single
//! allocation.

use std::path::Path;

use chainarc_primitives::{Codec, Nomap, RecordReader, RecordWriter, RowSize};

use crate::schema::{OUTS, OutputLink};
use crate::settings::TableSettings;

pub type PutsMap = Nomap<OUTS>;

pub const ROW: u64 = 4;

#[must_use]
pub fn table(dir: &Path, settings: &TableSettings) -> PutsMap {
    PutsMap::new(
        dir.join("archive_puts.idx"),
        dir.join("archive_puts.dat"),
        RowSize::Record(ROW),
        settings.size,
        settings.rate,
    )
}

/// One group row: a single output link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub out_fk: OutputLink,
}

impl Codec for Record {
    fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
        let out_fk = source.read_link();
        source.is_ok().then_some(Self { out_fk })
    }

    fn to_data(&self, sink: &mut RecordWriter<'_>) -> bool {
        sink.write_link(self.out_fk);
        sink.is_ok()
    }
}
