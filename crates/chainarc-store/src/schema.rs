//! Schema widths and shared record fragments.
//!
//! Link widths are fixed by the archive layout: block (header) links are
//! three bytes, tx/point/input/output/outs links four. Keys are 32-byte
//! hashes except the neutrino table, which is keyed by the three-byte
//! header link itself. All integer fields serialize little-endian.

use chainarc_primitives::{Link, RecordReader, RecordWriter};

/// Hash key width (block hash, tx hash, script hash).
pub const HASH: usize = 32;

/// Header (block) link width.
pub const BLOCK: usize = 3;

/// Tx link width.
pub const TX: usize = 4;

/// Point link width (record index into the point body).
pub const POINT: usize = 4;

/// Input slab link width (byte offset).
pub const INPUT: usize = 4;

/// Output slab link width (byte offset).
pub const OUTPUT: usize = 4;

/// Outs (puts) link width (record index).
pub const OUTS: usize = 4;

/// Prevout-index field width inside a point row.
pub const INDEX: usize = 3;

/// The terminal prevout index marks the null point (coinbase input).
pub const NULL_INDEX: u32 = u32::MAX;

pub type BlockLink = Link<BLOCK>;
pub type TxLink = Link<TX>;
pub type PointLink = Link<POINT>;
pub type InputLink = Link<INPUT>;
pub type OutputLink = Link<OUTPUT>;
pub type OutsLink = Link<OUTS>;

pub type HashKey = [u8; HASH];

/// Validation context carried by every header row: chain state at the
/// point the header was stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Context {
    pub flags: u32,
    pub height: u32,
    pub mtp: u32,
}

impl Context {
    pub const SIZE: usize = 12;

    pub fn from_data(source: &mut RecordReader<'_>) -> Self {
        Self {
            flags: source.read_u32_le(),
            height: source.read_u32_le(),
            mtp: source.read_u32_le(),
        }
    }

    pub fn to_data(&self, sink: &mut RecordWriter<'_>) {
        sink.write_u32_le(self.flags);
        sink.write_u32_le(self.height);
        sink.write_u32_le(self.mtp);
    }
}
