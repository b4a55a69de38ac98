//! On-disk locks.
//!
//! The process lock is an advisory `flock` held for the store's lifetime:
//! one writer process per directory. The flush lock is a presence file
//! created at open and removed at clean close; finding it at startup
//! means the last run died with unflushed state and the caller should
//! restore from a snapshot.

use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// Exclusive advisory file lock (one process per store directory).
pub struct ProcessLock {
    path: PathBuf,
    file: Option<File>,
}

impl ProcessLock {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), file: None }
    }

    pub fn try_lock(&mut self) -> Result<(), StoreError> {
        if self.file.is_some() {
            return Ok(());
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|_| StoreError::ProcessLock)?;
        let status = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if status != 0 {
            return Err(StoreError::ProcessLock);
        }
        self.file = Some(file);
        Ok(())
    }

    pub fn try_unlock(&mut self) -> Result<(), StoreError> {
        if let Some(file) = self.file.take() {
            let status = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
            if status != 0 {
                return Err(StoreError::ProcessLock);
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.file.is_some()
    }
}

/// Presence file marking "writing in progress".
pub struct FlushLock {
    path: PathBuf,
    held: bool,
}

impl FlushLock {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), held: false }
    }

    /// True when a previous run left the lock behind (unclean shutdown).
    #[must_use]
    pub fn is_stale(&self) -> bool {
        !self.held && self.path.exists()
    }

    pub fn try_lock(&mut self) -> Result<(), StoreError> {
        if self.held {
            return Ok(());
        }
        if self.path.exists() {
            return Err(StoreError::FlushLock);
        }
        File::create(&self.path).map_err(|_| StoreError::FlushLock)?;
        self.held = true;
        Ok(())
    }

    pub fn try_unlock(&mut self) -> Result<(), StoreError> {
        if !self.held {
            return Ok(());
        }
        std::fs::remove_file(&self.path).map_err(|_| StoreError::FlushLock)?;
        self.held = false;
        Ok(())
    }

    /// Discard a stale lock during restore.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(|_| StoreError::FlushLock)?;
        }
        self.held = false;
        Ok(())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn process_lock_excludes_second_holder() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("process.lck");
        let mut first = ProcessLock::new(&path);
        first.try_lock().unwrap();

        let mut second = ProcessLock::new(&path);
        assert_eq!(second.try_lock(), Err(StoreError::ProcessLock));

        first.try_unlock().unwrap();
        second.try_lock().unwrap();
    }

    #[test]
    fn flush_lock_detects_stale() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flush.lck");
        {
            let mut lock = FlushLock::new(&path);
            lock.try_lock().unwrap();
            // Dropped without unlock: simulated crash.
        }
        let mut lock = FlushLock::new(&path);
        assert!(lock.is_stale());
        assert_eq!(lock.try_lock(), Err(StoreError::FlushLock));
        lock.clear().unwrap();
        lock.try_lock().unwrap();
        lock.try_unlock().unwrap();
        assert!(!path.exists());
    }
}
