//! Integer-indexed array table.
//!
//! The head is a dense array: slot `i` holds the link of the body record
//! for key `i` (a height, or a header link). Keys map to slots by
//! identity, so there is no bucket math and no sieve. Writes append a
//! payload-only row to the body, then publish by pushing its link into
//! the head slot; reads resolve `index -> link -> row`.

use std::path::PathBuf;

use crate::body::Body;
use crate::file::FaultCode;
use crate::head::{Head, HeadKind};
use crate::link::Link;
use crate::reader::RecordReader;
use crate::writer::RecordWriter;
use crate::{Codec, RowSize};

pub struct Arraymap<const LINK: usize> {
    head: Head<LINK>,
    body: Body,
}

impl<const LINK: usize> Arraymap<LINK> {
    /// `slots` sizes the created head; the array expands past it on demand.
    #[must_use]
    pub fn new(
        head_path: impl Into<PathBuf>,
        body_path: impl Into<PathBuf>,
        row: RowSize,
        slots: u64,
        size: u64,
        rate: u64,
    ) -> Self {
        Self {
            head: Head::new(head_path, HeadKind::Array, slots, false),
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

    /// Body link stored at `index`, terminal when unset.
    pub fn at(&self, index: u64) -> Result<Link<LINK>, FaultCode> {
        self.head.top(index)
    }

    /// True when `index` holds a link.
    #[must_use]
    pub fn exists(&self, index: u64) -> bool {
        matches!(self.at(index), Ok(link) if !link.is_terminal())
    }

    /// Deserialize the row published at `index`.
    pub fn get<E: Codec>(&self, index: u64) -> Result<Option<E>, FaultCode> {
        let link = self.at(index)?;
        self.get_link(link)
    }

    /// Memory handle positioned at a body link (parameterized reads).
    pub fn get_memory(&self, link: Link<LINK>) -> Result<crate::file::Memory, FaultCode> {
        self.body.get(link.value())
    }

    /// Deserialize the row at a body link directly.
    pub fn get_link<E: Codec>(&self, link: Link<LINK>) -> Result<Option<E>, FaultCode> {
        if link.is_terminal() {
            return Ok(None);
        }
        let memory = self.body.get(link.value())?;
        let mut source = RecordReader::new(memory.as_slice());
        Ok(E::from_data(&mut source))
    }

    /// Append a row and publish it at `index`; the head push is the
    /// visibility point.
    pub fn put<E: Codec>(&self, index: u64, element: &E) -> Option<Link<LINK>> {
        let units = element.count();
        let link = Link::new(self.body.allocate(units)?);
        let bytes_len = match self.body.row() {
            RowSize::Record(size) => size * units,
            RowSize::Slab => units,
        };
        let Ok(memory) = self.body.get(link.value()) else {
            return None;
        };
        let bytes = unsafe { memory.write_slice(bytes_len as usize) };
        let mut sink = RecordWriter::new(bytes);
        if !element.to_data(&mut sink) || !sink.is_ok() {
            return None;
        }
        drop(memory);
        self.head.push(link, index, 0).ok().map(|_| link)
    }

    /// Clear the slot at `index` back to terminal (chain pop path).
    pub fn clear(&self, index: u64) -> Result<(), FaultCode> {
        self.head.push(Link::TERMINAL, index, 0).map(|_| ())
    }

    /// Drop the newest `units` body units (follow with `clear`).
    pub fn truncate(&self, count: u64) {
        self.body.truncate(count);
    }
}
