//! Store error taxonomy.
//!
//! One flat enum covers OS-level file faults, lock failures, per-table
//! lifecycle failures, persisted validation verdicts readable as codes,
//! and the information-absence codes that distinguish "no txs" from "txs
//! but no verdict".

use chainarc_primitives::FaultCode;
use thiserror::Error;

use crate::event::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("persisted state code does not match any known verdict")]
    UnknownState,
    #[error("table failed verification")]
    Integrity,
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
    #[error("transactor lock failure")]
    TransactorLock,
    #[error("process lock failure")]
    ProcessLock,
    #[error("flush lock failure")]
    FlushLock,
    #[error("no snapshot to restore")]
    MissingSnapshot,
    #[error("file not loaded")]
    UnloadedFile,
    #[error("create failed for table {0:?}")]
    CreateTable(Table),
    #[error("close failed for table {0:?}")]
    CloseTable(Table),
    #[error("backup failed for table {0:?}")]
    BackupTable(Table),
    #[error("restore failed for table {0:?}")]
    RestoreTable(Table),
    #[error("verify failed for table {0:?}")]
    VerifyTable(Table),
    #[error("block valid")]
    BlockValid,
    #[error("block confirmable")]
    BlockConfirmable,
    #[error("block unconfirmable")]
    BlockUnconfirmable,
    #[error("tx connected")]
    TxConnected,
    #[error("tx disconnected")]
    TxDisconnected,
    #[error("block has no associated txs")]
    Unassociated,
    #[error("block has txs but no verdict")]
    Unvalidated,
    #[error("query canceled")]
    QueryCanceled,
}

impl From<FaultCode> for StoreError {
    fn from(code: FaultCode) -> Self {
        match code {
            FaultCode::DiskFull => Self::DiskFull,
            FaultCode::MmapFailure => Self::MmapFailure,
            FaultCode::MremapFailure => Self::MremapFailure,
            FaultCode::MunmapFailure => Self::MunmapFailure,
            FaultCode::FsyncFailure => Self::FsyncFailure,
            FaultCode::FtruncateFailure => Self::FtruncateFailure,
            FaultCode::LoadFailure => Self::Integrity,
            FaultCode::UnloadedFile => Self::UnloadedFile,
        }
    }
}
