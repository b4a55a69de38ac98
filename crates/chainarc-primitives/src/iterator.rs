//! Conflict-chain iterator.
//!
//! Walks a bucket's chain through each record's next link, yielding the
//! links of records whose stored search key matches. The iterator holds a
//! whole-body memory handle for its lifetime, which blocks remap; do not
//! hold one across long-running operations.

use crate::RowSize;
use crate::file::Memory;
use crate::link::Link;

pub struct ChainIter<const LINK: usize, const KEY: usize> {
    memory: Memory,
    row: RowSize,
    key: [u8; KEY],
    current: Link<LINK>,
    bound: u64,
}

impl<const LINK: usize, const KEY: usize> ChainIter<LINK, KEY> {
    /// Iterate matches of `key` starting from a bucket's top link.
    /// `bound` caps the walk at the body's record count.
    #[must_use]
    pub fn new(memory: Memory, row: RowSize, key: [u8; KEY], top: Link<LINK>, bound: u64) -> Self {
        Self { memory, row, key, current: top, bound }
    }

    fn row_bytes(&self, link: Link<LINK>) -> &[u8] {
        let offset = (link.value() * self.row.unit_bytes()) as usize;
        &self.memory.as_slice()[offset..]
    }

    /// The memory handle, for deserializing the current record in place.
    #[must_use]
    pub fn memory(&self) -> &Memory {
        &self.memory
    }
}

impl<const LINK: usize, const KEY: usize> Iterator for ChainIter<LINK, KEY> {
    type Item = Link<LINK>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.current.is_terminal() && self.bound > 0 {
            self.bound -= 1;
            let link = self.current;
            let row = self.row_bytes(link);
            if row.len() < LINK + KEY {
                return None;
            }
            let next = Link::read(row);
            let matched = row[LINK..LINK + KEY] == self.key;
            self.current = next;
            if matched {
                return Some(link);
            }
        }
        None
    }
}
