//! Store orchestration: lifecycle, locks, transactor, snapshot/restore.
//!
//! The store owns fifteen head/body table pairs, an on-disk process lock
//! (one writer process per directory), an on-disk flush lock (presence
//! means unclean shutdown), and the transactor: a shared/exclusive lock
//! writers hold on the shared side for the span of every write, and
//! snapshot/close take exclusively.
//!
//! Crash consistency needs no WAL: body counts are persisted into heads
//! only at snapshot and close, so after a crash the heads name a
//! consistent prefix of each body, and restore truncates the bodies back
//! to it after recovering the head files from a backup slot.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::{RwLock, RwLockReadGuard};

use crate::error::StoreError;
use crate::event::{ErrorHandler, Event, EventHandler, Table};
use crate::locks::{FlushLock, ProcessLock};
use crate::settings::Settings;
use crate::tables::{
    address, header, height, input, neutrino, output, point, prevout, puts, strong_tx,
    transaction, txs, validated_bk, validated_tx,
};

/// Shared-side transactor guard: hold for the span of every write.
pub struct Transactor<'a> {
    _guard: RwLockReadGuard<'a, ()>,
}

pub struct Store {
    settings: Settings,

    /// Archives.
    pub header: header::HeaderMap,
    pub tx: transaction::TxMap,
    pub point: point::PointMap,
    pub input: input::InputMap,
    pub output: output::OutputMap,
    pub puts: puts::PutsMap,
    pub txs: txs::TxsMap,

    /// Indexes.
    pub candidate: height::HeightMap,
    pub confirmed: height::HeightMap,
    pub strong_tx: strong_tx::StrongTxMap,

    /// Caches.
    pub prevout: prevout::PrevoutMap,
    pub validated_bk: validated_bk::ValidatedBkMap,
    pub validated_tx: validated_tx::ValidatedTxMap,

    /// Optionals.
    pub address: address::AddressMap,
    pub neutrino: neutrino::NeutrinoMap,

    flush_lock: FlushLock,
    process_lock: ProcessLock,
    transactor: RwLock<()>,
}

/// Expand a block over every `(table field, table id)` pair, in the fixed
/// file order used by create/open/close.
macro_rules! each_table {
    ($self:ident, |$table:ident, $id:ident| $body:block) => {{
        {
            let $table = &$self.header;
            let $id = Table::Header;
            $body
        }
        {
            let $table = &$self.tx;
            let $id = Table::Tx;
            $body
        }
        {
            let $table = &$self.point;
            let $id = Table::Point;
            $body
        }
        {
            let $table = &$self.input;
            let $id = Table::Input;
            $body
        }
        {
            let $table = &$self.output;
            let $id = Table::Output;
            $body
        }
        {
            let $table = &$self.puts;
            let $id = Table::Puts;
            $body
        }
        {
            let $table = &$self.txs;
            let $id = Table::Txs;
            $body
        }
        {
            let $table = &$self.candidate;
            let $id = Table::Candidate;
            $body
        }
        {
            let $table = &$self.confirmed;
            let $id = Table::Confirmed;
            $body
        }
        {
            let $table = &$self.strong_tx;
            let $id = Table::StrongTx;
            $body
        }
        {
            let $table = &$self.prevout;
            let $id = Table::Prevout;
            $body
        }
        {
            let $table = &$self.validated_bk;
            let $id = Table::ValidatedBk;
            $body
        }
        {
            let $table = &$self.validated_tx;
            let $id = Table::ValidatedTx;
            $body
        }
        {
            let $table = &$self.address;
            let $id = Table::Address;
            $body
        }
        {
            let $table = &$self.neutrino;
            let $id = Table::Neutrino;
            $body
        }
    }};
}

impl Store {
    pub fn new(settings: Settings) -> Result<Self, StoreError> {
        settings.validate()?;
        let dir = settings.dir.clone();
        Ok(Self {
            header: header::table(&dir, &settings.header),
            tx: transaction::table(&dir, &settings.tx),
            point: point::table(&dir, &settings.point),
            input: input::table(&dir, &settings.input),
            output: output::table(&dir, &settings.output),
            puts: puts::table(&dir, &settings.puts),
            txs: txs::table(&dir, &settings.txs),
            candidate: height::table(&dir, "candidate", &settings.candidate),
            confirmed: height::table(&dir, "confirmed", &settings.confirmed),
            strong_tx: strong_tx::table(&dir, &settings.strong_tx),
            prevout: prevout::table(&dir, &settings.prevout),
            validated_bk: validated_bk::table(&dir, &settings.validated_bk),
            validated_tx: validated_tx::table(&dir, &settings.validated_tx),
            address: address::table(&dir, &settings.address),
            neutrino: neutrino::table(&dir, &settings.neutrino),
            flush_lock: FlushLock::new(dir.join("flush.lck")),
            process_lock: ProcessLock::new(dir.join("process.lck")),
            transactor: RwLock::new(()),
            settings,
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.settings.dir
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Create the set of empty table files; leaves the store closed.
    pub fn create(&mut self, handler: &EventHandler<'_>) -> Result<(), StoreError> {
        fs::create_dir_all(&self.settings.dir).map_err(|_| StoreError::CreateTable(Table::Header))?;
        let _exclusive =
            self.transactor.try_write().ok_or(StoreError::TransactorLock)?;
        self.process_lock.try_lock()?;
        self.flush_lock.clear()?;
        self.flush_lock.try_lock().inspect_err(|_| {
            let _ = self.process_lock.try_unlock();
        })?;

        Self::clear_archive(&self.settings.dir);

        let mut result = Ok(());
        each_table!(self, |table, id| {
            if result.is_ok() {
                handler(Event::CreateFile, id);
                result = table.create().map_err(|_| StoreError::CreateTable(id));
                if result.is_ok() {
                    result = table.close().map_err(|_| StoreError::CreateTable(id));
                }
            }
        });

        // Suppress unlock errors in favor of the first create code.
        let _ = self.flush_lock.try_unlock();
        let _ = self.process_lock.try_unlock();
        if result.is_err() {
            Self::clear_archive(&self.settings.dir);
        }
        result
    }

    /// Open, load and verify every table; leaves the store loaded.
    pub fn open(&mut self, handler: &EventHandler<'_>) -> Result<(), StoreError> {
        {
            let _exclusive =
                self.transactor.try_write().ok_or(StoreError::TransactorLock)?;
            self.process_lock.try_lock()?;
            if self.flush_lock.is_stale() {
                // Unclean shutdown: the caller should restore a snapshot.
                let _ = self.process_lock.try_unlock();
                return Err(StoreError::FlushLock);
            }
            self.flush_lock.try_lock().inspect_err(|_| {
                let _ = self.process_lock.try_unlock();
            })?;
        }

        let mut result = Ok(());
        each_table!(self, |table, id| {
            if result.is_ok() {
                handler(Event::OpenFile, id);
                result = table.open().map_err(StoreError::from);
                if result.is_ok() {
                    handler(Event::LoadFile, id);
                    result = table.verify().map_err(|_| StoreError::VerifyTable(id));
                }
            }
        });

        if let Err(code) = result {
            // Verification failed: leave closed with locks released.
            each_table!(self, |table, _id| {
                let _ = table.close();
            });
            let _ = self.flush_lock.try_unlock();
            let _ = self.process_lock.try_unlock();
            return Err(if matches!(code, StoreError::VerifyTable(_)) {
                StoreError::Integrity
            } else {
                code
            });
        }
        Ok(())
    }

    /// Flush bodies, persist body counts, and copy head files into the
    /// primary backup slot (rotating the previous primary to secondary).
    /// Blocks writers for its duration.
    pub fn snapshot(&self, handler: &EventHandler<'_>) -> Result<(), StoreError> {
        let _exclusive = self.lock_exclusive();

        let mut result = Ok(());
        each_table!(self, |table, id| {
            if result.is_ok() {
                handler(Event::BackupTable, id);
                result = table.backup().map_err(|_| StoreError::BackupTable(id));
                if result.is_ok() {
                    handler(Event::FlushTable, id);
                    result = table.flush().map_err(|_| StoreError::BackupTable(id));
                }
            }
        });
        result?;

        let primary = self.settings.dir.join("primary");
        let secondary = self.settings.dir.join("secondary");
        if primary.exists() {
            if secondary.exists() {
                fs::remove_dir_all(&secondary)
                    .map_err(|_| StoreError::BackupTable(Table::Header))?;
            }
            fs::rename(&primary, &secondary)
                .map_err(|_| StoreError::BackupTable(Table::Header))?;
        }
        fs::create_dir_all(&primary).map_err(|_| StoreError::BackupTable(Table::Header))?;

        let mut result = Ok(());
        each_table!(self, |_table, id| {
            if result.is_ok() {
                handler(Event::CopyHead, id);
                let name = format!("archive_{}.idx", id.name());
                result = fs::copy(self.settings.dir.join(&name), primary.join(&name))
                    .map(|_| ())
                    .map_err(|_| StoreError::BackupTable(id));
                if result.is_ok() {
                    handler(Event::ArchiveSnapshot, id);
                }
            }
        });

        // Suppress a half-written primary in favor of the copy error.
        if result.is_err() {
            let _ = fs::remove_dir_all(&primary);
        }
        result
    }

    /// Recover head files from the most recent backup slot, then open.
    /// The recovered body counts truncate the bodies on load.
    pub fn restore(&mut self, handler: &EventHandler<'_>) -> Result<(), StoreError> {
        {
            let _exclusive =
                self.transactor.try_write().ok_or(StoreError::TransactorLock)?;
            let primary = self.settings.dir.join("primary");
            let secondary = self.settings.dir.join("secondary");
            let slot = if primary.exists() {
                primary
            } else if secondary.exists() {
                secondary
            } else {
                return Err(StoreError::MissingSnapshot);
            };

            let mut result = Ok(());
            each_table!(self, |_table, id| {
                if result.is_ok() {
                    handler(Event::RestoreTable, id);
                    let name = format!("archive_{}.idx", id.name());
                    result = fs::rename(slot.join(&name), self.settings.dir.join(&name))
                        .map_err(|_| StoreError::RestoreTable(id));
                }
            });
            result?;
            let _ = fs::remove_dir_all(&slot);
            self.flush_lock.clear()?;
        }
        self.open(handler)
    }

    /// Retry body mappings after a disk-full condition.
    pub fn reload(&self, _handler: &EventHandler<'_>) -> Result<(), StoreError> {
        let mut result = Ok(());
        each_table!(self, |table, id| {
            if result.is_ok() && table.get_fault().is_some() {
                result = table.reload().map_err(|_| StoreError::RestoreTable(id));
            }
        });
        result
    }

    /// Persist body counts, unload and close every table, release locks.
    pub fn close(&mut self, handler: &EventHandler<'_>) -> Result<(), StoreError> {
        let mut result = Ok(());
        {
            let _exclusive = self.lock_exclusive();
            // Not short-circuiting: every table gets its close attempt.
            each_table!(self, |table, id| {
                handler(Event::UnloadFile, id);
                if table.close().is_err() {
                    result = Err(StoreError::CloseTable(id));
                }
                handler(Event::CloseFile, id);
            });
        }
        if self.process_lock.try_unlock().is_err() {
            result = Err(StoreError::ProcessLock);
        }
        if self.flush_lock.try_unlock().is_err() {
            result = Err(StoreError::FlushLock);
        }
        result
    }

    /// Shared transactor guard; hold for the duration of any write.
    #[must_use]
    pub fn get_transactor(&self) -> Transactor<'_> {
        Transactor { _guard: self.transactor.read() }
    }

    /// First latched table fault, if any.
    #[must_use]
    pub fn get_fault(&self) -> Option<StoreError> {
        let mut fault = None;
        each_table!(self, |table, _id| {
            if fault.is_none() {
                if let Some(code) = table.get_fault() {
                    fault = Some(StoreError::from(code));
                }
            }
        });
        fault
    }

    /// Bytes required to clear every disk-full condition.
    #[must_use]
    pub fn get_space(&self) -> u64 {
        let mut space = 0;
        each_table!(self, |table, _id| {
            space += table.get_space();
        });
        space
    }

    /// Walk per-table fault codes.
    pub fn report(&self, handler: &ErrorHandler<'_>) {
        each_table!(self, |table, id| {
            if let Some(code) = table.get_fault() {
                handler(StoreError::from(code), id);
            }
        });
    }

    /// Acquire the exclusive transactor, reporting a deadlock hint each
    /// second until outstanding writers release their guards.
    fn lock_exclusive(&self) -> parking_lot::RwLockWriteGuard<'_, ()> {
        loop {
            if let Some(guard) = self.transactor.try_write_for(Duration::from_secs(1)) {
                return guard;
            }
            tracing::warn!("transactor contention: waiting on outstanding writers");
        }
    }

    fn clear_archive(dir: &PathBuf) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("archive_") {
                let _ = fs::remove_file(&path);
            } else if name == "primary" || name == "secondary" {
                let _ = fs::remove_dir_all(&path);
            }
        }
    }
}
