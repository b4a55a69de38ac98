//! Append-only body file with an atomic allocation counter.
//!
//! A body is measured in units: fixed-width records or raw bytes (slab).
//! `allocate` reserves units and returns the link of the first; reserved
//! space is invisible until a head publishes a link into it. `truncate`
//! only moves the counter (restore path); the file never shrinks.

use std::path::PathBuf;

use crate::RowSize;
use crate::file::{FaultCode, MapFile, Memory};

pub struct Body {
    file: MapFile,
    row: RowSize,
}

impl Body {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, row: RowSize, minimum: u64, rate: u64) -> Self {
        Self { file: MapFile::new(path, minimum, rate), row }
    }

    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        self.file.path()
    }

    #[must_use]
    pub const fn row(&self) -> RowSize {
        self.row
    }

    /// Create the backing file at its configured minimum capacity.
    pub fn create(&self) -> Result<(), FaultCode> {
        self.file.create(self.file.minimum())?;
        self.file.load()
    }

    pub fn open(&self) -> Result<(), FaultCode> {
        self.file.open()?;
        self.file.load()
    }

    pub fn unload(&self) -> Result<(), FaultCode> {
        self.file.unload()
    }

    pub fn close(&self) -> Result<(), FaultCode> {
        self.file.close()
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.file.is_loaded()
    }

    pub fn flush(&self) -> Result<(), FaultCode> {
        self.file.flush()
    }

    /// Allocation counter in body units.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.file.size() / self.row.unit_bytes()
    }

    /// Seed the counter from a persisted body count (open/restore).
    pub fn set_count(&self, count: u64) {
        self.file.set_size(count * self.row.unit_bytes());
    }

    /// Drop the counter to `count` units; the file is not shrunk.
    pub fn truncate(&self, count: u64) {
        debug_assert!(count <= self.count());
        self.set_count(count);
    }

    /// The persisted count is coherent when it fits the mapped file.
    pub fn verify(&self, persisted: u64) -> Result<(), FaultCode> {
        if persisted * self.row.unit_bytes() <= self.file.capacity() {
            Ok(())
        } else {
            Err(FaultCode::LoadFailure)
        }
    }

    /// Atomically reserve `units`, returning the link of the first.
    /// `None` with a latched disk-full fault when the file cannot grow.
    pub fn allocate(&self, units: u64) -> Option<u64> {
        let bytes = units * self.row.unit_bytes();
        let offset = self.file.allocate(bytes)?;
        Some(offset / self.row.unit_bytes())
    }

    /// Reserve capacity without allocating.
    pub fn expand(&self, units: u64) -> Result<(), FaultCode> {
        self.file.expand(units * self.row.unit_bytes())
    }

    /// Shared handle positioned at a link's first byte.
    pub fn get(&self, link: u64) -> Result<Memory, FaultCode> {
        self.file.get(link * self.row.unit_bytes())
    }

    /// Whole-file handle (chain walks, backups).
    pub fn get_all(&self) -> Result<Memory, FaultCode> {
        self.file.get(0)
    }

    #[must_use]
    pub fn get_fault(&self) -> Option<FaultCode> {
        self.file.get_fault()
    }

    #[must_use]
    pub fn get_space(&self) -> u64 {
        self.file.get_space()
    }

    pub fn reload(&self) -> Result<(), FaultCode> {
        self.file.reload()
    }
}
