//! Height chains: candidate and confirmed, record arraymaps.
//!
//! Slot `h` of the head names the body row for height `h`; the body row
//! is the header link alone. The body count is therefore the chain's
//! top height plus one, and a pop is a slot clear plus a one-row
//! truncate. Candidate and confirmed share this shape and differ only in
//! file name.

use std::path::Path;

use chainarc_primitives::{Arraymap, Codec, RecordReader, RecordWriter, RowSize};

use crate::schema::{BLOCK, BlockLink};
use crate::settings::TableSettings;

pub type HeightMap = Arraymap<BLOCK>;

pub const ROW: u64 = BLOCK as u64;

#[must_use]
pub fn table(dir: &Path, name: &str, settings: &TableSettings) -> HeightMap {
    HeightMap::new(
        dir.join(format!("archive_{name}.idx")),
        dir.join(format!("archive_{name}.dat")),
        RowSize::Record(ROW),
        settings.buckets,
        settings.size,
        settings.rate,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub header_fk: BlockLink,
}

impl Codec for Record {
    fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
        let header_fk = source.read_link();
        source.is_ok().then_some(Self { header_fk })
    }

    fn to_data(&self, sink: &mut RecordWriter<'_>) -> bool {
        sink.write_link(self.header_fk);
        sink.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn push_top_pop() {
        let dir = TempDir::new().unwrap();
        let settings = TableSettings::new(8, 256, 50);
        let chain = table(dir.path(), "candidate", &settings);
        chain.create().unwrap();

        for height in 0..3u64 {
            chain.put(height, &Record { header_fk: BlockLink::new(height + 10) }).unwrap();
        }
        assert_eq!(chain.count(), 3);
        assert_eq!(chain.get::<Record>(2).unwrap().unwrap().header_fk.value(), 12);

        chain.clear(2).unwrap();
        chain.truncate(2);
        assert_eq!(chain.count(), 2);
        assert!(chain.at(2).unwrap().is_terminal());
    }
}
