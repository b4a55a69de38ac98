//! Store configuration.
//!
//! Every table takes a bucket count (hash tables: power of two; array
//! tables: created slot count), an initial body capacity and a growth
//! rate percent. Defaults are development-sized; production deployments
//! load a JSON settings file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::StoreError;
use crate::event::Table;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TableSettings {
    pub buckets: u64,
    pub size: u64,
    pub rate: u64,
}

impl TableSettings {
    #[must_use]
    pub const fn new(buckets: u64, size: u64, rate: u64) -> Self {
        Self { buckets, size, rate }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root directory for table files, lock files and backup slots.
    pub dir: PathBuf,

    pub header: TableSettings,
    pub tx: TableSettings,
    pub point: TableSettings,
    pub input: TableSettings,
    pub output: TableSettings,
    pub puts: TableSettings,
    pub txs: TableSettings,
    pub candidate: TableSettings,
    pub confirmed: TableSettings,
    pub strong_tx: TableSettings,
    pub prevout: TableSettings,
    pub validated_bk: TableSettings,
    pub validated_tx: TableSettings,
    pub address: TableSettings,
    pub neutrino: TableSettings,
}

impl Default for Settings {
    fn default() -> Self {
        let small = TableSettings::new(1 << 8, 1 << 16, 50);
        Self {
            dir: PathBuf::from("chainarc"),
            header: small,
            tx: TableSettings::new(1 << 10, 1 << 18, 50),
            point: TableSettings::new(1, 1 << 18, 50),
            input: TableSettings::new(1, 1 << 18, 50),
            output: TableSettings::new(1, 1 << 18, 50),
            puts: TableSettings::new(1, 1 << 16, 50),
            txs: TableSettings::new(1 << 8, 1 << 16, 50),
            candidate: TableSettings::new(1 << 8, 1 << 12, 50),
            confirmed: TableSettings::new(1 << 8, 1 << 12, 50),
            strong_tx: TableSettings::new(1 << 10, 1 << 16, 50),
            prevout: TableSettings::new(1 << 8, 1 << 16, 50),
            validated_bk: TableSettings::new(1 << 8, 1 << 14, 50),
            validated_tx: TableSettings::new(1 << 10, 1 << 16, 50),
            address: small,
            neutrino: small,
        }
    }
}

impl Settings {
    /// Defaults rooted at `dir` (test and tool fixtures).
    #[must_use]
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), ..Self::default() }
    }

    /// Load from a JSON settings file.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let text = fs::read_to_string(path).map_err(|_| StoreError::Integrity)?;
        let settings: Self = serde_json::from_str(&text).map_err(|_| StoreError::Integrity)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Hash-table bucket counts must be powers of two of at least two.
    pub fn validate(&self) -> Result<(), StoreError> {
        for (table, settings) in self.hash_tables() {
            if settings.buckets < 2 || !settings.buckets.is_power_of_two() {
                tracing::error!(table = table.name(), buckets = settings.buckets, "invalid bucket count");
                return Err(StoreError::VerifyTable(table));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn table(&self, table: Table) -> TableSettings {
        match table {
            Table::Header => self.header,
            Table::Tx => self.tx,
            Table::Point => self.point,
            Table::Input => self.input,
            Table::Output => self.output,
            Table::Puts => self.puts,
            Table::Txs => self.txs,
            Table::Candidate => self.candidate,
            Table::Confirmed => self.confirmed,
            Table::StrongTx => self.strong_tx,
            Table::Prevout => self.prevout,
            Table::ValidatedBk => self.validated_bk,
            Table::ValidatedTx => self.validated_tx,
            Table::Address => self.address,
            Table::Neutrino => self.neutrino,
        }
    }

    fn hash_tables(&self) -> [(Table, TableSettings); 6] {
        [
            (Table::Header, self.header),
            (Table::Tx, self.tx),
            (Table::StrongTx, self.strong_tx),
            (Table::ValidatedTx, self.validated_tx),
            (Table::Address, self.address),
            (Table::Neutrino, self.neutrino),
        ]
    }
}
