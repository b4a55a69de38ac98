//! Chained hash table over a head/body pair.
//!
//! Rows carry `[next : LINK][search key : KEY][payload]`. A put allocates
//! body space, serializes the row with a terminal next placeholder, then
//! publishes by pushing the row's link into the key's bucket; the push
//! returns the prior bucket top, which becomes the row's next pointer.
//! Publication is the single visibility point (release on the head write,
//! acquire on the bucket read).
//!
//! `put` is not idempotent: a repeated key prepends a new row, so the
//! table is an append-only multimap observed as a map by `find` (which
//! returns the most recent insertion). `put_if` checks existence first.

use std::path::PathBuf;

use crate::body::Body;
use crate::file::FaultCode;
use crate::head::{Head, HeadKind, Sift};
use crate::iterator::ChainIter;
use crate::keys;
use crate::link::Link;
use crate::reader::RecordReader;
use crate::writer::RecordWriter;
use crate::{Codec, RowSize};

pub struct Hashmap<const LINK: usize, const KEY: usize> {
    head: Head<LINK>,
    body: Body,
}

/// Table construction parameters shared by the store layer.
#[derive(Debug, Clone)]
pub struct TableOptions {
    pub buckets: u64,
    pub size: u64,
    pub rate: u64,
    pub sieve: bool,
}

impl<const LINK: usize, const KEY: usize> Hashmap<LINK, KEY> {
    /// Byte width of the next-link/key prefix of every row.
    pub const PREFIX: usize = LINK + KEY;

    /// `row` is the full fixed row size in bytes including the prefix, or
    /// `Slab` for variable rows.
    #[must_use]
    pub fn new(
        head_path: impl Into<PathBuf>,
        body_path: impl Into<PathBuf>,
        row: RowSize,
        options: &TableOptions,
    ) -> Self {
        Self {
            head: Head::new(head_path, HeadKind::Hash, options.buckets, options.sieve),
            body: Body::new(body_path, row, options.size, options.rate),
        }
    }

    /// Setup, not thread safe.
    /// -----------------------------------------------------------------

    pub fn create(&self) -> Result<(), FaultCode> {
        self.head.create()?;
        self.body.create()
    }

    pub fn open(&self) -> Result<(), FaultCode> {
        self.head.open()?;
        self.body.open()?;
        self.restore()
    }

    /// Persist the body count into the head (snapshot path).
    pub fn backup(&self) -> Result<(), FaultCode> {
        self.head.set_body_count(self.body.count())
    }

    /// Truncate the body back to the persisted count.
    pub fn restore(&self) -> Result<(), FaultCode> {
        self.body.set_count(self.head.get_body_count()?);
        Ok(())
    }

    pub fn verify(&self) -> Result<(), FaultCode> {
        self.head.verify()?;
        self.body.verify(self.head.get_body_count()?)
    }

    pub fn close(&self) -> Result<(), FaultCode> {
        if self.head.is_loaded() {
            self.head.set_body_count(self.body.count())?;
        }
        self.head.unload()?;
        self.body.unload()?;
        self.head.close()?;
        self.body.close()
    }

    pub fn flush(&self) -> Result<(), FaultCode> {
        self.body.flush()
    }

    /// Sizing and errors.
    /// -----------------------------------------------------------------

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.head.enabled()
    }

    #[must_use]
    pub fn buckets(&self) -> u64 {
        self.head.buckets()
    }

    /// Count of rows (records) or body bytes (slab).
    #[must_use]
    pub fn count(&self) -> u64 {
        self.body.count()
    }

    #[must_use]
    pub fn head(&self) -> &Head<LINK> {
        &self.head
    }

    #[must_use]
    pub fn get_fault(&self) -> Option<FaultCode> {
        self.body.get_fault()
    }

    #[must_use]
    pub fn get_space(&self) -> u64 {
        self.body.get_space()
    }

    pub fn reload(&self) -> Result<(), FaultCode> {
        self.body.reload()
    }

    /// Query interface.
    /// -----------------------------------------------------------------

    /// Bucket top for table scans.
    pub fn top(&self, bucket: u64) -> Result<Link<LINK>, FaultCode> {
        self.head.top(bucket)
    }

    /// Whole-body handle for batch processing; holds the remap lock.
    pub fn get_memory(&self) -> Result<crate::file::Memory, FaultCode> {
        self.body.get_all()
    }

    #[must_use]
    pub fn exists(&self, key: &[u8; KEY]) -> bool {
        matches!(self.first(key), Ok(link) if !link.is_terminal())
    }

    /// Link of the most recent row with `key`, terminal when absent.
    pub fn first(&self, key: &[u8; KEY]) -> Result<Link<LINK>, FaultCode> {
        let bucket = keys::bucket(key, self.head.mask());
        let top = self.head.top(bucket)?;
        if top.is_terminal() {
            return Ok(Link::TERMINAL);
        }
        if self.head.screened(bucket, keys::fingerprint(key))? == Sift::Absent {
            return Ok(Link::TERMINAL);
        }

        let memory = self.body.get_all()?;
        let row = self.body.row();
        let mut current = top;
        let mut remaining = self.body.count();
        while !current.is_terminal() && remaining > 0 {
            remaining -= 1;
            let offset = (current.value() * row.unit_bytes()) as usize;
            let bytes = &memory.as_slice()[offset..];
            if bytes.len() < Self::PREFIX {
                return Ok(Link::TERMINAL);
            }
            if &bytes[LINK..Self::PREFIX] == key {
                return Ok(current);
            }
            current = Link::read(bytes);
        }
        Ok(Link::TERMINAL)
    }

    /// Iterator over every row with `key`, most recent first.
    pub fn it(&self, key: [u8; KEY]) -> Result<ChainIter<LINK, KEY>, FaultCode> {
        let bucket = keys::bucket(&key, self.head.mask());
        let top = self.head.top(bucket)?;
        let memory = self.body.get_all()?;
        Ok(ChainIter::new(memory, self.body.row(), key, top, self.body.count()))
    }

    /// Search key stored at a row (default for terminal).
    pub fn get_key(&self, link: Link<LINK>) -> Result<[u8; KEY], FaultCode> {
        if link.is_terminal() {
            return Ok([0u8; KEY]);
        }
        let memory = self.body.get(link.value())?;
        let bytes = memory.as_slice();
        let mut key = [0u8; KEY];
        if bytes.len() >= Self::PREFIX {
            key.copy_from_slice(&bytes[LINK..Self::PREFIX]);
        }
        Ok(key)
    }

    /// Deserialize the payload of the most recent row with `key`.
    pub fn find<E: Codec>(&self, key: &[u8; KEY]) -> Result<Option<E>, FaultCode> {
        let link = self.first(key)?;
        if link.is_terminal() {
            return Ok(None);
        }
        self.get(link)
    }

    /// Deserialize the payload at `link`.
    pub fn get<E: Codec>(&self, link: Link<LINK>) -> Result<Option<E>, FaultCode> {
        if link.is_terminal() {
            return Ok(None);
        }
        let memory = self.body.get(link.value())?;
        let bytes = memory.as_slice();
        if bytes.len() < Self::PREFIX {
            return Ok(None);
        }
        let mut source = RecordReader::new(&bytes[Self::PREFIX..]);
        Ok(E::from_data(&mut source))
    }

    /// Write interface.
    /// -----------------------------------------------------------------

    /// Reserve body units for a row (follow with `set` and `commit`).
    pub fn allocate(&self, units: u64) -> Option<Link<LINK>> {
        self.body.allocate(units).map(Link::new)
    }

    /// Serialize a row into previously allocated space; the next field is
    /// a terminal placeholder until `commit` publishes the row.
    pub fn set<E: Codec>(&self, link: Link<LINK>, key: &[u8; KEY], element: &E) -> bool {
        let total = self.row_bytes(element);
        let Ok(memory) = self.body.get(link.value()) else {
            return false;
        };
        let bytes = unsafe { memory.write_slice(total as usize) };
        let mut sink = RecordWriter::new(bytes);
        sink.write_link(Link::<LINK>::TERMINAL);
        sink.write_bytes(key);
        element.to_data(&mut sink) && sink.is_ok() && sink.position() as u64 == total
    }

    /// Publish a set row: push its link into the key's bucket and thread
    /// the prior top into the row's next field.
    pub fn commit(&self, link: Link<LINK>, key: &[u8; KEY]) -> bool {
        let bucket = keys::bucket(key, self.head.mask());
        let Ok((previous, _)) = self.head.push(link, bucket, keys::fingerprint(key)) else {
            return false;
        };
        let Ok(memory) = self.body.get(link.value()) else {
            return false;
        };
        let bytes = unsafe { memory.write_slice(LINK) };
        bytes.copy_from_slice(&previous.to_bytes());
        true
    }

    /// Allocate, serialize and publish; returns the new row's link.
    pub fn put<E: Codec>(&self, key: &[u8; KEY], element: &E) -> Option<Link<LINK>> {
        let units = self.allocation_units(element);
        let link = self.allocate(units)?;
        if !self.set(link, key, element) {
            return None;
        }
        self.commit(link, key).then_some(link)
    }

    /// Idempotent put: return the existing row's link when the key is
    /// already present, without appending.
    pub fn put_if<E: Codec>(&self, key: &[u8; KEY], element: &E) -> Option<Link<LINK>> {
        match self.first(key) {
            Ok(link) if !link.is_terminal() => Some(link),
            Ok(_) => self.put(key, element),
            Err(_) => None,
        }
    }

    fn row_bytes<E: Codec>(&self, element: &E) -> u64 {
        match self.body.row() {
            RowSize::Record(size) => size * element.count(),
            RowSize::Slab => element.count(),
        }
    }

    fn allocation_units<E: Codec>(&self, element: &E) -> u64 {
        element.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Entry {
        value: u32,
    }

    impl Codec for Entry {
        fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
            let value = source.read_u32_le();
            source.is_ok().then_some(Self { value })
        }

        fn to_data(&self, sink: &mut RecordWriter<'_>) -> bool {
            sink.write_u32_le(self.value);
            sink.is_ok()
        }
    }

    // Row: next(4) + key(4) + value(4).
    const ROW: RowSize = RowSize::Record(12);

    fn table(sieve: bool) -> (TempDir, Hashmap<4, 4>) {
        let dir = TempDir::new().expect("tempdir");
        let options = TableOptions { buckets: 4, size: 256, rate: 50, sieve };
        let map = Hashmap::<4, 4>::new(
            dir.path().join("t.idx"),
            dir.path().join("t.dat"),
            ROW,
            &options,
        );
        map.create().expect("create");
        (dir, map)
    }

    #[test]
    fn empty_find_is_terminal() {
        let (_dir, map) = table(false);
        assert!(map.first(&[9, 9, 9, 9]).unwrap().is_terminal());
        assert!(!map.exists(&[9, 9, 9, 9]));
    }

    #[test]
    fn put_then_find() {
        let (_dir, map) = table(false);
        let key = [1, 2, 3, 4];
        let link = map.put(&key, &Entry { value: 77 }).unwrap();
        assert_eq!(link.value(), 0);
        assert_eq!(map.first(&key).unwrap(), link);
        assert_eq!(map.find::<Entry>(&key).unwrap(), Some(Entry { value: 77 }));
        assert_eq!(map.get_key(link).unwrap(), key);
        assert_eq!(map.count(), 1);
    }

    #[test]
    fn duplicate_keys_are_lifo() {
        let (_dir, map) = table(false);
        let key = [5, 0, 0, 0];
        let first = map.put(&key, &Entry { value: 1 }).unwrap();
        let second = map.put(&key, &Entry { value: 2 }).unwrap();

        assert_eq!(map.first(&key).unwrap(), second);
        assert_eq!(map.find::<Entry>(&key).unwrap(), Some(Entry { value: 2 }));

        let links: Vec<_> = map.it(key).unwrap().collect();
        assert_eq!(links, vec![second, first]);
    }

    #[test]
    fn colliding_keys_share_a_chain() {
        let (_dir, map) = table(false);
        // Same low bits under mask 3 -> same bucket.
        let k1 = [0x01, 0, 0, 0];
        let k2 = [0x05, 0, 0, 0];
        let l1 = map.put(&k1, &Entry { value: 10 }).unwrap();
        let l2 = map.put(&k2, &Entry { value: 20 }).unwrap();
        let l3 = map.put(&k1, &Entry { value: 11 }).unwrap();

        assert_eq!(map.top(1).unwrap(), l3);
        assert_eq!(map.first(&k1).unwrap(), l3);
        assert_eq!(map.first(&k2).unwrap(), l2);
        let chain: Vec<_> = map.it(k1).unwrap().collect();
        assert_eq!(chain, vec![l3, l1]);
    }

    #[test]
    fn put_if_is_idempotent() {
        let (_dir, map) = table(false);
        let key = [8, 8, 8, 8];
        let first = map.put_if(&key, &Entry { value: 1 }).unwrap();
        let second = map.put_if(&key, &Entry { value: 2 }).unwrap();
        assert_eq!(first, second);
        assert_eq!(map.count(), 1);
        assert_eq!(map.find::<Entry>(&key).unwrap(), Some(Entry { value: 1 }));
    }

    #[test]
    fn sieve_enabled_table_still_finds_everything() {
        let (_dir, map) = table(true);
        // All keys share bucket 2; more keys than screens.
        let keys: Vec<[u8; 4]> = (0u8..12).map(|i| [0x02, i, i, i]).collect();
        for (i, key) in keys.iter().enumerate() {
            map.put(key, &Entry { value: i as u32 }).unwrap();
        }
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(map.find::<Entry>(key).unwrap(), Some(Entry { value: i as u32 }));
        }
        // A missing key on the saturated bucket walks the chain to terminal.
        assert!(map.first(&[0x02, 0xEE, 0xEE, 0xEE]).unwrap().is_terminal());
    }

    #[test]
    fn survives_close_and_reopen() {
        let dir = TempDir::new().unwrap();
        let options = TableOptions { buckets: 4, size: 256, rate: 50, sieve: false };
        let key = [3, 1, 4, 1];
        {
            let map = Hashmap::<4, 4>::new(
                dir.path().join("p.idx"),
                dir.path().join("p.dat"),
                ROW,
                &options,
            );
            map.create().unwrap();
            map.put(&key, &Entry { value: 159 }).unwrap();
            map.close().unwrap();
        }
        let map = Hashmap::<4, 4>::new(
            dir.path().join("p.idx"),
            dir.path().join("p.dat"),
            ROW,
            &options,
        );
        map.open().unwrap();
        map.verify().unwrap();
        assert_eq!(map.find::<Entry>(&key).unwrap(), Some(Entry { value: 159 }));
    }
}
