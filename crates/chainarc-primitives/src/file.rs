//! Reference-counted growable memory-mapped file.
//!
//! A [`MapFile`] wraps one on-disk file in a read-write shared mapping. The
//! mapping is guarded by a `parking_lot::RwLock`: every outstanding
//! [`Memory`] handle holds the shared side, and growth (which must remap)
//! takes the exclusive side, so a grow blocks until all handles drop and no
//! handle can observe a stale base address.
//!
//! The logical size is an atomic byte counter advanced by `allocate`;
//! mapped bytes past it exist but are not part of the file's content until
//! a table publishes a link to them. OS failures are latched as a fault
//! code surfaced through `get_fault` and cleared by a successful `reload`.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use memmap2::MmapMut;
use parking_lot::{ArcRwLockReadGuard, Mutex, RawRwLock, RwLock};
use thiserror::Error;

/// Latched file fault conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FaultCode {
    #[error("disk full")]
    DiskFull,
    #[error("mmap failure")]
    MmapFailure,
    #[error("mremap failure")]
    MremapFailure,
    #[error("munmap failure")]
    MunmapFailure,
    #[error("fsync failure")]
    FsyncFailure,
    #[error("ftruncate failure")]
    FtruncateFailure,
    #[error("load failure")]
    LoadFailure,
    #[error("file not loaded")]
    UnloadedFile,
}

struct Mapping {
    file: Option<File>,
    map: Option<MmapMut>,
    base: *mut u8,
}

// The raw base pointer is only dereferenced while the owning RwLock guard
// is held and the map is populated; ranges handed to writers are disjoint
// by the allocation protocol.
unsafe impl Send for Mapping {}
unsafe impl Sync for Mapping {}

pub struct MapFile {
    path: PathBuf,
    minimum: u64,
    rate: u64,
    mapping: Arc<RwLock<Mapping>>,
    capacity: AtomicU64,
    logical: AtomicU64,
    fault: Mutex<Option<FaultCode>>,
    space: AtomicU64,
}

impl MapFile {
    /// A file that grows by `rate` percent, never below `minimum` bytes.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, minimum: u64, rate: u64) -> Self {
        Self {
            path: path.into(),
            minimum: minimum.max(1),
            rate,
            mapping: Arc::new(RwLock::new(Mapping { file: None, map: None, base: std::ptr::null_mut() })),
            capacity: AtomicU64::new(0),
            logical: AtomicU64::new(0),
            fault: Mutex::new(None),
            space: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configured minimum capacity in bytes.
    #[must_use]
    pub const fn minimum(&self) -> u64 {
        self.minimum
    }

    /// Create (or truncate) the backing file at `size` bytes, leaving it
    /// open but unloaded.
    pub fn create(&self, size: u64) -> Result<(), FaultCode> {
        let mut mapping = self.mapping.write();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|_| FaultCode::LoadFailure)?;
        file.set_len(size.max(1)).map_err(|_| FaultCode::FtruncateFailure)?;
        self.capacity.store(size.max(1), Ordering::Release);
        self.logical.store(0, Ordering::Release);
        mapping.file = Some(file);
        Ok(())
    }

    /// Open the existing backing file. Idempotent while already open.
    pub fn open(&self) -> Result<(), FaultCode> {
        let mut mapping = self.mapping.write();
        if mapping.file.is_some() {
            return Ok(());
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|_| FaultCode::LoadFailure)?;
        let len = file.metadata().map_err(|_| FaultCode::LoadFailure)?.len();
        self.capacity.store(len.max(1), Ordering::Release);
        mapping.file = Some(file);
        Ok(())
    }

    /// Map the open file into memory. Idempotent while already loaded.
    pub fn load(&self) -> Result<(), FaultCode> {
        let mut mapping = self.mapping.write();
        if mapping.map.is_some() {
            return Ok(());
        }
        let Some(file) = mapping.file.as_ref() else {
            return Err(FaultCode::UnloadedFile);
        };
        let len = file.metadata().map_err(|_| FaultCode::LoadFailure)?.len();
        if len == 0 {
            file.set_len(self.minimum).map_err(|_| FaultCode::FtruncateFailure)?;
        }
        let mut map = unsafe { MmapMut::map_mut(file) }.map_err(|_| FaultCode::MmapFailure)?;
        mapping.base = map.as_mut_ptr();
        self.capacity.store(map.len() as u64, Ordering::Release);
        mapping.map = Some(map);
        Ok(())
    }

    /// Flush and drop the mapping, blocking on outstanding handles.
    pub fn unload(&self) -> Result<(), FaultCode> {
        let mut mapping = self.mapping.write();
        if let Some(map) = mapping.map.take() {
            mapping.base = std::ptr::null_mut();
            map.flush().map_err(|_| FaultCode::FsyncFailure)?;
        }
        Ok(())
    }

    /// Close the descriptor. The file must be unloaded first.
    pub fn close(&self) -> Result<(), FaultCode> {
        let mut mapping = self.mapping.write();
        if mapping.map.is_some() {
            return Err(FaultCode::MunmapFailure);
        }
        mapping.file = None;
        Ok(())
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.mapping.read().map.is_some()
    }

    /// Logical content size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.logical.load(Ordering::Acquire)
    }

    /// Reset the logical size (restore/truncate path).
    pub fn set_size(&self, size: u64) {
        self.logical.store(size, Ordering::Release);
    }

    /// Mapped capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity.load(Ordering::Acquire)
    }

    /// Reserve `bytes` of logical space, growing the mapping if required.
    /// Returns the byte offset of the reservation, or `None` with a latched
    /// `DiskFull` fault when the file cannot grow.
    pub fn allocate(&self, bytes: u64) -> Option<u64> {
        if self.fault.lock().is_some() {
            return None;
        }
        let offset = self.logical.fetch_add(bytes, Ordering::AcqRel);
        let needed = offset + bytes;
        if needed <= self.capacity.load(Ordering::Acquire) {
            return Some(offset);
        }
        match self.grow(needed) {
            Ok(()) => Some(offset),
            Err(code) => {
                self.logical.fetch_sub(bytes, Ordering::AcqRel);
                self.set_fault(code);
                self.space.store(needed.saturating_sub(self.capacity()), Ordering::Release);
                None
            }
        }
    }

    /// Grow the backing file to cover at least `needed` bytes and remap.
    /// Blocks until all outstanding memory handles are released.
    fn grow(&self, needed: u64) -> Result<(), FaultCode> {
        let mut mapping = self.mapping.write();
        if needed <= self.capacity.load(Ordering::Acquire) {
            return Ok(());
        }
        if mapping.file.is_none() {
            return Err(FaultCode::UnloadedFile);
        }

        let current = self.capacity.load(Ordering::Acquire);
        let expanded = current + current * self.rate / 100;
        let target = needed.max(expanded).max(self.minimum);
        {
            let file = mapping.file.as_ref().ok_or(FaultCode::UnloadedFile)?;
            file.set_len(target).map_err(|_| FaultCode::DiskFull)?;
        }

        if mapping.map.is_some() {
            // Remap under the exclusive lock; no handle can hold the old base.
            mapping.map = None;
            mapping.base = std::ptr::null_mut();
            let file = mapping.file.as_ref().ok_or(FaultCode::UnloadedFile)?;
            let mut map =
                unsafe { MmapMut::map_mut(file) }.map_err(|_| FaultCode::MremapFailure)?;
            mapping.base = map.as_mut_ptr();
            mapping.map = Some(map);
        }
        self.capacity.store(target, Ordering::Release);
        Ok(())
    }

    /// Extend capacity without allocating logical space.
    pub fn expand(&self, bytes: u64) -> Result<(), FaultCode> {
        if bytes <= self.capacity() {
            return Ok(());
        }
        self.grow(bytes).inspect_err(|&code| self.set_fault(code))
    }

    /// Acquire a shared memory handle positioned at `offset`.
    pub fn get(&self, offset: u64) -> Result<Memory, FaultCode> {
        let guard = RwLock::read_arc(&self.mapping);
        if guard.map.is_none() {
            return Err(FaultCode::UnloadedFile);
        }
        if offset > self.capacity() {
            return Err(FaultCode::LoadFailure);
        }
        Ok(Memory { guard, offset: offset as usize })
    }

    /// Ask the OS to persist dirty pages.
    pub fn flush(&self) -> Result<(), FaultCode> {
        let mapping = self.mapping.read();
        let Some(map) = mapping.map.as_ref() else {
            return Err(FaultCode::UnloadedFile);
        };
        map.flush().map_err(|_| {
            self.set_fault(FaultCode::FsyncFailure);
            FaultCode::FsyncFailure
        })
    }

    /// Latched fault, if any.
    #[must_use]
    pub fn get_fault(&self) -> Option<FaultCode> {
        *self.fault.lock()
    }

    /// Bytes required to clear a disk-full fault.
    #[must_use]
    pub fn get_space(&self) -> u64 {
        self.space.load(Ordering::Acquire)
    }

    /// Retry the growth that latched a fault; clears it on success.
    pub fn reload(&self) -> Result<(), FaultCode> {
        let needed = self.size() + self.get_space();
        self.grow(needed)?;
        *self.fault.lock() = None;
        self.space.store(0, Ordering::Release);
        Ok(())
    }

    fn set_fault(&self, code: FaultCode) {
        let mut fault = self.fault.lock();
        if fault.is_none() {
            tracing::warn!(path = %self.path.display(), %code, "file fault");
            *fault = Some(code);
        }
    }
}

/// Shared handle into a loaded mapping. Holding one blocks remap (growth);
/// acquire, use, and drop promptly.
pub struct Memory {
    guard: ArcRwLockReadGuard<RawRwLock, Mapping>,
    offset: usize,
}

impl Memory {
    /// Bytes from the handle position to the end of the mapping.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        let map = self.guard.map.as_ref().expect("mapping checked at acquisition");
        &map[self.offset..]
    }

    /// Absolute position of this handle in the file.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Exclusive window over `[offset, offset + len)`.
    ///
    /// # Safety
    /// The caller must own the range, either via a body allocation that
    /// has not yet been published or under a lock that serializes all
    /// access to it; no other reference to those bytes may exist.
    #[must_use]
    pub unsafe fn write_slice(&self, len: usize) -> &mut [u8] {
        debug_assert!(!self.guard.base.is_null());
        unsafe { std::slice::from_raw_parts_mut(self.guard.base.add(self.offset), len) }
    }

    /// Word view for atomic head-slot access. `at` is an absolute byte
    /// offset and must be four-byte aligned.
    #[must_use]
    pub fn atomic_u32(&self, at: usize) -> &AtomicU32 {
        debug_assert!(at % 4 == 0, "unaligned atomic slot");
        debug_assert!(!self.guard.base.is_null());
        unsafe { &*(self.guard.base.add(at) as *const AtomicU32) }
    }
}
