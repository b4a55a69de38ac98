//! Address index: a record multimap hashmap keyed by output-script hash.
//!
//! Row: `[next:4][script sha256:32][output:4]`. A script accrues one row
//! per funding output; walking the conflict chain yields every output
//! paying the script, most recent first.

use std::path::Path;

use chainarc_primitives::hashmap::TableOptions;
use chainarc_primitives::{Codec, Hashmap, RecordReader, RecordWriter, RowSize};
use sha2::{Digest, Sha256};

use crate::schema::{HASH, HashKey, OutputLink, TX};
use crate::settings::TableSettings;

pub type AddressMap = Hashmap<TX, HASH>;

pub const PAYLOAD: u64 = 4;
pub const ROW: u64 = (TX + HASH) as u64 + PAYLOAD;

#[must_use]
pub fn table(dir: &Path, settings: &TableSettings) -> AddressMap {
    AddressMap::new(
        dir.join("archive_address.idx"),
        dir.join("archive_address.dat"),
        RowSize::Record(ROW),
        &TableOptions {
            buckets: settings.buckets,
            size: settings.size,
            rate: settings.rate,
            sieve: true,
        },
    )
}

/// Search key for an output script.
#[must_use]
pub fn script_key(script: &[u8]) -> HashKey {
    let mut hasher = Sha256::new();
    hasher.update(script);
    hasher.finalize().into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub output_fk: OutputLink,
}

impl Codec for Record {
    fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
        let output_fk = source.read_link();
        source.is_ok().then_some(Self { output_fk })
    }

    fn to_data(&self, sink: &mut RecordWriter<'_>) -> bool {
        sink.write_link(self.output_fk);
        sink.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_keys_are_stable_and_distinct() {
        let key = script_key(b"v0 p2wpkh");
        assert_eq!(key, script_key(b"v0 p2wpkh"));
        assert_ne!(key, script_key(b"v0 p2wsh"));
    }
}
