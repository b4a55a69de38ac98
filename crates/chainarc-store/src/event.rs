//! Lifecycle events and table identifiers.
//!
//! The store reports progress through a caller-supplied handler, one event
//! per file or table step, so long create/open/snapshot passes remain
//! observable. The same identifiers tag per-table errors.

/// Progress events emitted by store lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    CreateFile,
    OpenFile,
    LoadFile,
    FlushTable,
    UnloadFile,
    CloseFile,
    BackupTable,
    CopyHead,
    ArchiveSnapshot,
    RestoreTable,
}

impl Event {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Event::CreateFile => "create_file",
            Event::OpenFile => "open_file",
            Event::LoadFile => "load_file",
            Event::FlushTable => "flush_table",
            Event::UnloadFile => "unload_file",
            Event::CloseFile => "close_file",
            Event::BackupTable => "backup_table",
            Event::CopyHead => "copy_head",
            Event::ArchiveSnapshot => "archive_snapshot",
            Event::RestoreTable => "restore_table",
        }
    }
}

/// The fifteen store tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Header,
    Tx,
    Point,
    Input,
    Output,
    Puts,
    Txs,
    Candidate,
    Confirmed,
    StrongTx,
    Prevout,
    ValidatedBk,
    ValidatedTx,
    Address,
    Neutrino,
}

impl Table {
    pub const ALL: [Table; 15] = [
        Table::Header,
        Table::Tx,
        Table::Point,
        Table::Input,
        Table::Output,
        Table::Puts,
        Table::Txs,
        Table::Candidate,
        Table::Confirmed,
        Table::StrongTx,
        Table::Prevout,
        Table::ValidatedBk,
        Table::ValidatedTx,
        Table::Address,
        Table::Neutrino,
    ];

    /// File-name stem: `archive_<name>.idx` / `archive_<name>.dat`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Table::Header => "header",
            Table::Tx => "tx",
            Table::Point => "point",
            Table::Input => "input",
            Table::Output => "output",
            Table::Puts => "puts",
            Table::Txs => "txs",
            Table::Candidate => "candidate",
            Table::Confirmed => "confirmed",
            Table::StrongTx => "strong_tx",
            Table::Prevout => "prevout",
            Table::ValidatedBk => "validated_bk",
            Table::ValidatedTx => "validated_tx",
            Table::Address => "address",
            Table::Neutrino => "neutrino",
        }
    }
}

/// Progress handler: `(event, table)`.
pub type EventHandler<'a> = dyn Fn(Event, Table) + 'a;

/// Fault handler: `(error, table)`.
pub type ErrorHandler<'a> = dyn Fn(crate::error::StoreError, Table) + 'a;
