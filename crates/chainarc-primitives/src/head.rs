//! Fixed-size head file: persisted body count plus a link array.
//!
//! The first `LINK` bytes persist the body count (written only during
//! snapshot and close, which is what makes crash recovery a truncation).
//! The remainder is either `bucket_count` hash-bucket slots or a dense
//! integer-indexed array of slots; every empty slot is `0xFF` (terminal).
//!
//! `push` is the conflict-list publish: it stores the new link into the
//! slot and returns the prior value, which the committer writes into the
//! record's next field. Four-byte links sit word-aligned and publish with
//! an atomic exchange (release); other widths serialize on the head's
//! lock. Sieve-enabled heads widen each slot to `[sieve:4][link:4]` and
//! fold the key fingerprint into the sieve before the link is published,
//! so a reader that observes the link is guaranteed to observe the screen.

use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use crate::file::{FaultCode, MapFile};
use crate::link::Link;
use crate::sieve;

pub use crate::sieve::Sift;

/// Head flavor: hash-bucket array or dense integer index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadKind {
    Hash,
    Array,
}

pub struct Head<const LINK: usize> {
    file: MapFile,
    kind: HeadKind,
    buckets: u64,
    sieve: bool,
    lock: RwLock<()>,
}

const SIEVE_BYTES: usize = 4;

impl<const LINK: usize> Head<LINK> {
    /// A head over `buckets` slots. `sieve` requires four-byte links.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, kind: HeadKind, buckets: u64, sieve: bool) -> Self {
        debug_assert!(!sieve || LINK == 4, "sieve slots require four-byte links");
        debug_assert!(
            kind == HeadKind::Array || buckets.is_power_of_two(),
            "hash bucket count must be a power of two"
        );
        let size = Self::size_for(buckets, sieve);
        Self { file: MapFile::new(path, size, 50), kind, buckets, sieve, lock: RwLock::new(()) }
    }

    const fn slot_width(sieve: bool) -> u64 {
        (LINK + if sieve { SIEVE_BYTES } else { 0 }) as u64
    }

    /// File size for a slot count: body-count prefix plus the slot array.
    #[must_use]
    pub const fn size_for(buckets: u64, sieve: bool) -> u64 {
        LINK as u64 + buckets * Self::slot_width(sieve)
    }

    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        self.file.path()
    }

    /// Configured bucket count (hash) or created slot count (array).
    #[must_use]
    pub const fn buckets(&self) -> u64 {
        self.buckets
    }

    /// Bucket mask for key hashing.
    #[must_use]
    pub const fn mask(&self) -> u64 {
        self.buckets - 1
    }

    /// More than one bucket: the table is enabled.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.buckets > 1
    }

    #[must_use]
    pub const fn sieve_enabled(&self) -> bool {
        self.sieve
    }

    /// Currently addressable slots (arrays grow past `buckets`).
    #[must_use]
    pub fn slots(&self) -> u64 {
        let size = self.file.size();
        (size.saturating_sub(LINK as u64)) / Self::slot_width(self.sieve)
    }

    /// Create the head file: zeroed body count, terminal-filled slots.
    pub fn create(&self) -> Result<(), FaultCode> {
        let size = Self::size_for(self.buckets, self.sieve);
        self.file.create(size)?;
        self.file.load()?;
        let memory = self.file.get(0)?;
        let bytes = unsafe { memory.write_slice(size as usize) };
        bytes[..LINK].fill(0);
        bytes[LINK..].fill(0xFF);
        drop(memory);
        self.file.set_size(size);
        Ok(())
    }

    /// Open and map an existing head file.
    pub fn open(&self) -> Result<(), FaultCode> {
        self.file.open()?;
        self.file.load()?;
        self.file.set_size(self.file.capacity());
        Ok(())
    }

    /// Check the file size against the configured slot count.
    pub fn verify(&self) -> Result<(), FaultCode> {
        let expected = Self::size_for(self.buckets, self.sieve);
        let actual = self.file.capacity();
        let valid = match self.kind {
            HeadKind::Hash => actual == expected,
            HeadKind::Array => {
                actual >= expected
                    && (actual - LINK as u64) % Self::slot_width(self.sieve) == 0
            }
        };
        if valid { Ok(()) } else { Err(FaultCode::LoadFailure) }
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

    /// Read the persisted body count.
    pub fn get_body_count(&self) -> Result<u64, FaultCode> {
        let memory = self.file.get(0)?;
        Ok(Link::<LINK>::read(self.head_bytes(&memory)).value())
    }

    /// Persist the body count (snapshot/close only).
    pub fn set_body_count(&self, count: u64) -> Result<(), FaultCode> {
        let memory = self.file.get(0)?;
        let bytes = unsafe { memory.write_slice(LINK) };
        bytes.copy_from_slice(&Link::<LINK>::new(count).to_bytes());
        Ok(())
    }

    fn head_bytes<'a>(&self, memory: &'a crate::file::Memory) -> &'a [u8] {
        &memory.as_slice()[..LINK]
    }

    const fn link_offset(&self, index: u64) -> u64 {
        LINK as u64
            + index * Self::slot_width(self.sieve)
            + if self.sieve { SIEVE_BYTES as u64 } else { 0 }
    }

    const fn sieve_offset(&self, index: u64) -> u64 {
        LINK as u64 + index * Self::slot_width(self.sieve)
    }

    const fn atomic_capable() -> bool {
        LINK == 4
    }

    /// Current link at a slot; terminal past the initialized extent.
    /// Lock order is head lock before mapping, matching `push`/`expand`.
    pub fn top(&self, index: u64) -> Result<Link<LINK>, FaultCode> {
        if index >= self.slots() {
            return Ok(Link::TERMINAL);
        }
        let offset = self.link_offset(index);
        if Self::atomic_capable() {
            let memory = self.file.get(0)?;
            let value = memory.atomic_u32(offset as usize).load(Ordering::Acquire);
            return Ok(Link::new(u64::from(value)));
        }
        let _guard = self.lock.read();
        let memory = self.file.get(offset)?;
        Ok(Link::read(memory.as_slice()))
    }

    /// Screen a key fingerprint against a slot's sieve. Call after an
    /// acquire read of the slot's link (see module docs); heads without a
    /// sieve always answer `Maybe`.
    pub fn screened(&self, index: u64, fingerprint: u64) -> Result<Sift, FaultCode> {
        if !self.sieve || index >= self.slots() {
            return Ok(Sift::Maybe);
        }
        let memory = self.file.get(0)?;
        let word = memory.atomic_u32(self.sieve_offset(index) as usize).load(Ordering::Acquire);
        Ok(sieve::screened(word, fingerprint))
    }

    /// Publish `link` at `index`, returning the prior slot value and, for
    /// sieve-enabled heads, whether the fingerprint was already screened.
    pub fn push(
        &self,
        link: Link<LINK>,
        index: u64,
        fingerprint: u64,
    ) -> Result<(Link<LINK>, bool), FaultCode> {
        if self.kind == HeadKind::Array && index >= self.slots() {
            self.expand(index)?;
        }
        debug_assert!(index < self.slots(), "bucket index out of range");

        let memory = self.file.get(0)?;
        if Self::atomic_capable() {
            let mut collision = false;
            if self.sieve {
                let word = memory.atomic_u32(self.sieve_offset(index) as usize);
                let mut current = word.load(Ordering::Acquire);
                loop {
                    let (updated, screened) = sieve::screen(current, fingerprint);
                    match word.compare_exchange_weak(
                        current,
                        updated,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => {
                            collision = screened;
                            break;
                        }
                        Err(observed) => current = observed,
                    }
                }
            }
            let slot = memory.atomic_u32(self.link_offset(index) as usize);
            let previous = slot.swap(link.value() as u32, Ordering::AcqRel);
            return Ok((Link::new(u64::from(previous)), collision));
        }

        drop(memory);
        let _guard = self.lock.write();
        let slot = self.file.get(self.link_offset(index))?;
        let previous = Link::read(slot.as_slice());
        let bytes = unsafe { slot.write_slice(LINK) };
        bytes.copy_from_slice(&link.to_bytes());
        Ok((previous, false))
    }

    /// Grow an array head to address `index`, terminal-filling new slots.
    fn expand(&self, index: u64) -> Result<(), FaultCode> {
        let _guard = self.lock.write();
        let current = self.slots();
        if index < current {
            return Ok(());
        }
        let target_slots = (index + 1).max(current * 2);
        let target = Self::size_for(target_slots, self.sieve);
        self.file.expand(target)?;

        let old_size = self.file.size();
        let memory = self.file.get(old_size)?;
        let fresh = unsafe { memory.write_slice((target - old_size) as usize) };
        fresh.fill(0xFF);
        drop(memory);
        self.file.set_size(target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn hash_head(sieve: bool) -> (TempDir, Head<4>) {
        let dir = TempDir::new().expect("tempdir");
        let head = Head::<4>::new(dir.path().join("head.idx"), HeadKind::Hash, 8, sieve);
        head.create().expect("create");
        (dir, head)
    }

    #[test]
    fn create_fills_terminal() {
        let (_dir, head) = hash_head(false);
        assert_eq!(head.get_body_count().unwrap(), 0);
        for bucket in 0..8 {
            assert!(head.top(bucket).unwrap().is_terminal());
        }
        head.verify().unwrap();
    }

    #[test]
    fn push_returns_previous() {
        let (_dir, head) = hash_head(false);
        let (previous, _) = head.push(Link::new(7), 3, 0).unwrap();
        assert!(previous.is_terminal());
        let (previous, _) = head.push(Link::new(9), 3, 0).unwrap();
        assert_eq!(previous.value(), 7);
        assert_eq!(head.top(3).unwrap().value(), 9);
    }

    #[test]
    fn body_count_round_trip() {
        let (_dir, head) = hash_head(false);
        head.set_body_count(0x0102_0304).unwrap();
        assert_eq!(head.get_body_count().unwrap(), 0x0102_0304);
    }

    #[test]
    fn sieve_screens_absent_until_pushed() {
        let (_dir, head) = hash_head(true);
        assert_eq!(head.screened(2, 0xABCD).unwrap(), Sift::Absent);
        let (_, collision) = head.push(Link::new(0), 2, 0xABCD).unwrap();
        assert!(!collision);
        assert_eq!(head.screened(2, 0xABCD).unwrap(), Sift::Maybe);

        let (_, collision) = head.push(Link::new(1), 2, 0xABCD).unwrap();
        assert!(collision, "same fingerprint screens as a collision");
    }

    #[test]
    fn narrow_links_use_the_locked_path() {
        let dir = TempDir::new().unwrap();
        let head = Head::<3>::new(dir.path().join("narrow.idx"), HeadKind::Hash, 4, false);
        head.create().unwrap();
        let (previous, _) = head.push(Link::new(0xABCDEF), 1, 0).unwrap();
        assert!(previous.is_terminal());
        assert_eq!(head.top(1).unwrap().value(), 0xABCDEF);
    }

    #[test]
    fn array_head_expands_with_terminal_fill() {
        let dir = TempDir::new().unwrap();
        let head = Head::<3>::new(dir.path().join("array.idx"), HeadKind::Array, 4, false);
        head.create().unwrap();
        assert!(head.top(100).unwrap().is_terminal());

        head.push(Link::new(42), 100, 0).unwrap();
        assert_eq!(head.top(100).unwrap().value(), 42);
        assert!(head.top(99).unwrap().is_terminal());
        assert!(head.top(101).unwrap().is_terminal());
        head.verify().unwrap();
    }
}
