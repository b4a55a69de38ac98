//! Header archive: a record hashmap keyed by block hash.
//!
//! Row: `[next:3][block hash:32][context:12][milestone:1][parent:3]
//! [version:4][timestamp:4][bits:4][nonce:4][merkle root:32]`.
//! The parent link points at the parent header's row, terminal for
//! genesis and headers stored without a connected parent.

use std::path::Path;

use chainarc_primitives::hashmap::TableOptions;
use chainarc_primitives::{Codec, Hashmap, RecordReader, RecordWriter, RowSize};

use crate::schema::{BLOCK, BlockLink, Context, HASH};
use crate::settings::TableSettings;

pub type HeaderMap = Hashmap<BLOCK, HASH>;

/// Payload bytes after the next/key prefix.
pub const PAYLOAD: u64 = Context::SIZE as u64 + 1 + BLOCK as u64 + 4 + 4 + 4 + 4 + HASH as u64;

/// Full row width.
pub const ROW: u64 = (BLOCK + HASH) as u64 + PAYLOAD;

#[must_use]
pub fn table(dir: &Path, settings: &TableSettings) -> HeaderMap {
    HeaderMap::new(
        dir.join("archive_header.idx"),
        dir.join("archive_header.dat"),
        RowSize::Record(ROW),
        &TableOptions {
            buckets: settings.buckets,
            size: settings.size,
            rate: settings.rate,
            sieve: false,
        },
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Record {
    pub ctx: Context,
    pub milestone: bool,
    pub parent_fk: BlockLink,
    pub version: u32,
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
    pub merkle_root: [u8; HASH],
}

impl Codec for Record {
    fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
        let record = Self {
            ctx: Context::from_data(source),
            milestone: source.read_byte() != 0,
            parent_fk: source.read_link::<BLOCK>(),
            version: source.read_u32_le(),
            timestamp: source.read_u32_le(),
            bits: source.read_u32_le(),
            nonce: source.read_u32_le(),
            merkle_root: source.read_array::<HASH>(),
        };
        source.is_ok().then_some(record)
    }

    fn to_data(&self, sink: &mut RecordWriter<'_>) -> bool {
        self.ctx.to_data(sink);
        sink.write_byte(u8::from(self.milestone));
        sink.write_link(self.parent_fk);
        sink.write_u32_le(self.version);
        sink.write_u32_le(self.timestamp);
        sink.write_u32_le(self.bits);
        sink.write_u32_le(self.nonce);
        sink.write_bytes(&self.merkle_root);
        sink.is_ok()
    }
}

/// Height component of the stored context.
#[derive(Debug, Clone, Copy)]
pub struct GetHeight {
    pub height: u32,
}

impl Codec for GetHeight {
    fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
        source.skip_bytes(4);
        let height = source.read_u32_le();
        source.is_ok().then_some(Self { height })
    }

    fn to_data(&self, _sink: &mut RecordWriter<'_>) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GetMilestone {
    pub milestone: bool,
}

impl Codec for GetMilestone {
    fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
        source.skip_bytes(Context::SIZE);
        let milestone = source.read_byte() != 0;
        source.is_ok().then_some(Self { milestone })
    }

    fn to_data(&self, _sink: &mut RecordWriter<'_>) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GetParent {
    pub parent_fk: BlockLink,
}

impl Codec for GetParent {
    fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
        source.skip_bytes(Context::SIZE + 1);
        let parent_fk = source.read_link::<BLOCK>();
        source.is_ok().then_some(Self { parent_fk })
    }

    fn to_data(&self, _sink: &mut RecordWriter<'_>) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        Record {
            ctx: Context { flags: 0x0102_0304, height: 0x11_1213, mtp: 0x2122_2324 },
            milestone: false,
            parent_fk: BlockLink::TERMINAL,
            version: 0x3132_3334,
            timestamp: 0x4142_4344,
            bits: 0x5152_5354,
            nonce: 0x6162_6364,
            merkle_root: [0x9E; HASH],
        }
    }

    #[test]
    fn row_width_is_fixed() {
        assert_eq!(ROW, 99);
        let mut buffer = [0u8; PAYLOAD as usize];
        let mut sink = RecordWriter::new(&mut buffer);
        assert!(sample().to_data(&mut sink));
        assert_eq!(sink.position() as u64, PAYLOAD);
    }

    #[test]
    fn round_trip() {
        let record = sample();
        let mut buffer = [0u8; PAYLOAD as usize];
        let mut sink = RecordWriter::new(&mut buffer);
        assert!(record.to_data(&mut sink));

        let mut source = RecordReader::new(&buffer);
        assert_eq!(Record::from_data(&mut source), Some(record));
    }

    #[test]
    fn partial_readers_agree_with_the_record() {
        let record = sample();
        let mut buffer = [0u8; PAYLOAD as usize];
        let mut sink = RecordWriter::new(&mut buffer);
        record.to_data(&mut sink);

        let mut source = RecordReader::new(&buffer);
        assert_eq!(GetHeight::from_data(&mut source).unwrap().height, record.ctx.height);
        let mut source = RecordReader::new(&buffer);
        assert!(!GetMilestone::from_data(&mut source).unwrap().milestone);
        let mut source = RecordReader::new(&buffer);
        assert!(GetParent::from_data(&mut source).unwrap().parent_fk.is_terminal());
    }

    #[test]
    fn short_row_is_rejected() {
        let mut source = RecordReader::new(&[0u8; 10]);
        assert!(Record::from_data(&mut source).is_none());
    }
}
