//! Unkeyed append-only body.
//!
//! No index of its own: rows are located through links retained by other
//! tables (a tx row's first-point link, an outs descriptor's output
//! links). A minimal companion head persists only the body count so the
//! snapshot/restore protocol covers the body.

use std::path::PathBuf;

use crate::body::Body;
use crate::file::FaultCode;
use crate::head::{Head, HeadKind};
use crate::link::Link;
use crate::reader::RecordReader;
use crate::writer::RecordWriter;
use crate::{Codec, RowSize};

pub struct Nomap<const LINK: usize> {
    head: Head<LINK>,
    body: Body,
}

impl<const LINK: usize> Nomap<LINK> {
    #[must_use]
    pub fn new(
        head_path: impl Into<PathBuf>,
        body_path: impl Into<PathBuf>,
        row: RowSize,
        size: u64,
        rate: u64,
    ) -> Self {
        Self {
            head: Head::new(head_path, HeadKind::Array, 0, false),
            body: Body::new(body_path, row, size, rate),
        }
    }

    pub fn create(&self) -> Result<(), FaultCode> {
        self.head.create()?;
        self.body.create()
    }

    pub fn open(&self) -> Result<(), FaultCode> {
        self.head.open()?;
        self.body.open()?;
        self.restore()
    }

    pub fn backup(&self) -> Result<(), FaultCode> {
        self.head.set_body_count(self.body.count())
    }

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

    #[must_use]
    pub fn count(&self) -> u64 {
        self.body.count()
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

    /// Reserve body units (contiguous-group writers follow with `set`).
    pub fn allocate(&self, units: u64) -> Option<Link<LINK>> {
        self.body.allocate(units).map(Link::new)
    }

    /// Serialize a row into previously allocated space at `link`.
    pub fn set<E: Codec>(&self, link: Link<LINK>, element: &E) -> bool {
        let bytes_len = match self.body.row() {
            RowSize::Record(size) => size * element.count(),
            RowSize::Slab => element.count(),
        };
        let Ok(memory) = self.body.get(link.value()) else {
            return false;
        };
        let bytes = unsafe { memory.write_slice(bytes_len as usize) };
        let mut sink = RecordWriter::new(bytes);
        element.to_data(&mut sink) && sink.is_ok()
    }

    /// Allocate and serialize, returning the caller-retained link.
    pub fn put<E: Codec>(&self, element: &E) -> Option<Link<LINK>> {
        let link = self.allocate(element.count())?;
        self.set(link, element).then_some(link)
    }

    /// Memory handle positioned at `link` (parameterized reads).
    pub fn get_memory(&self, link: Link<LINK>) -> Result<crate::file::Memory, FaultCode> {
        self.body.get(link.value())
    }

    /// Deserialize the row at `link`.
    pub fn get<E: Codec>(&self, link: Link<LINK>) -> Result<Option<E>, FaultCode> {
        if link.is_terminal() {
            return Ok(None);
        }
        let memory = self.body.get(link.value())?;
        let mut source = RecordReader::new(memory.as_slice());
        Ok(E::from_data(&mut source))
    }

    pub fn truncate(&self, count: u64) {
        self.body.truncate(count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Blob {
        bytes: Vec<u8>,
    }

    impl Codec for Blob {
        fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
            let len = source.read_size(1024);
            let bytes = source.read_bytes(len);
            source.is_ok().then_some(Self { bytes })
        }

        fn to_data(&self, sink: &mut RecordWriter<'_>) -> bool {
            sink.write_variable(self.bytes.len() as u64);
            sink.write_bytes(&self.bytes);
            sink.is_ok()
        }

        fn count(&self) -> u64 {
            crate::writer::variable_size(self.bytes.len() as u64) + self.bytes.len() as u64
        }
    }

    #[test]
    fn slab_rows_round_trip_by_link() {
        let dir = TempDir::new().unwrap();
        let map = Nomap::<4>::new(
            dir.path().join("n.idx"),
            dir.path().join("n.dat"),
            RowSize::Slab,
            256,
            50,
        );
        map.create().unwrap();

        let first = map.put(&Blob { bytes: b"script".to_vec() }).unwrap();
        let second = map.put(&Blob { bytes: b"witness data".to_vec() }).unwrap();
        assert_eq!(first.value(), 0);
        assert_eq!(second.value(), 7);

        let blob = map.get::<Blob>(first).unwrap().unwrap();
        assert_eq!(blob.bytes, b"script");
        let blob = map.get::<Blob>(second).unwrap().unwrap();
        assert_eq!(blob.bytes, b"witness data");
    }

    #[test]
    fn contiguous_groups_are_addressable() {
        let dir = TempDir::new().unwrap();
        let map = Nomap::<4>::new(
            dir.path().join("g.idx"),
            dir.path().join("g.dat"),
            RowSize::Record(4),
            256,
            50,
        );
        map.create().unwrap();

        struct Entry(u32);
        impl Codec for Entry {
            fn from_data(source: &mut RecordReader<'_>) -> Option<Self> {
                let value = source.read_u32_le();
                source.is_ok().then_some(Self(value))
            }
            fn to_data(&self, sink: &mut RecordWriter<'_>) -> bool {
                sink.write_u32_le(self.0);
                sink.is_ok()
            }
        }

        // A three-row group allocated once, set row by row.
        let base = map.allocate(3).unwrap();
        for i in 0..3u32 {
            assert!(map.set(Link::new(base.value() + u64::from(i)), &Entry(100 + i)));
        }
        for i in 0..3u64 {
            let entry = map.get::<Entry>(Link::new(base.value() + i)).unwrap().unwrap();
            assert_eq!(u64::from(entry.0), 100 + i);
        }
        assert_eq!(map.count(), 3);
    }
}
