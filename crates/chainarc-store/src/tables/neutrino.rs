//! Neutrino filter cache: a slab hashmap keyed by header link.
//!
//! Row: `[next:4][header link key:3][filter head:32][length varint]
//! [filter bytes]`. The filter head is the running BIP-157 header hash;
//! the body is the compact filter itself.

use std::path::Path;

use chainarc_primitives::hashmap::TableOptions;
use chainarc_primitives::writer::variable_size;
use chainarc_primitives::{Codec, Hashmap, RecordReader, RecordWriter, RowSize};

use crate::schema::{BLOCK, BlockLink, HASH, TX};
use crate::settings::TableSettings;

pub type NeutrinoMap = Hashmap<TX, BLOCK>;

const PREFIX: u64 = (TX + BLOCK) as u64;
const MAX_FILTER: usize = 1 << 24;

#[must_use]
pub fn table(dir: &Path, settings: &TableSettings) -> NeutrinoMap {
    NeutrinoMap::new(
        dir.join("archive_neutrino.idx"),
        dir.join("archive_neutrino.dat"),
        RowSize::Slab,
        &TableOptions {
            buckets: settings.buckets,
            size: settings.size,
            rate: settings.rate,
            sieve: false,
        },
    )
}

/// The three-byte search key for a header link.
#[must_use]
pub fn filter_key(header_fk: BlockLink) -> [u8; BLOCK] {
    header_fk.to_bytes()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub filter_head: [u8; HASH],
    pub filter: Vec<u8>,
}

impl Codec for Record {
    fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
        let filter_head = source.read_array::<HASH>();
        let length = source.read_size(MAX_FILTER);
        let filter = source.read_bytes(length);
        source.is_ok().then_some(Self { filter_head, filter })
    }

    fn to_data(&self, sink: &mut RecordWriter<'_>) -> bool {
        sink.write_bytes(&self.filter_head);
        sink.write_variable(self.filter.len() as u64);
        sink.write_bytes(&self.filter);
        sink.is_ok()
    }

    fn count(&self) -> u64 {
        PREFIX
            + HASH as u64
            + variable_size(self.filter.len() as u64)
            + self.filter.len() as u64
    }
}
