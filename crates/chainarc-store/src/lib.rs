//! # chainarc-store
//!
//! The blockchain archive schema over the chainarc primitives: fifteen
//! named tables (headers, txs, points, inputs, outputs, the tx-per-block
//! map, the candidate/confirmed height chains, strong-tx markers,
//! validation caches, and the optional address and neutrino indexes),
//! the store orchestrator that creates/opens/snapshots/restores them as a
//! unit, and the query layer that walks the foreign-key graph.
//!
//! ```no_run
//! use chainarc_store::{Query, Settings, Store};
//!
//! let mut store = Store::new(Settings::with_dir("/var/lib/chainarc"))?;
//! store.create(&|_, _| {})?;
//! store.open(&|_, _| {})?;
//! {
//!     let query = Query::new(&store);
//!     let link = query.to_header(&[0u8; 32])?;
//!     assert!(link.is_terminal());
//! }
//! store.close(&|_, _| {})?;
//! # Ok::<(), chainarc_store::StoreError>(())
//! ```

pub mod error;
pub mod event;
pub mod locks;
pub mod query;
pub mod schema;
pub mod settings;
pub mod store;
pub mod tables;

pub use error::StoreError;
pub use event::{Event, Table};
pub use query::{Query, TxBody, TxInput, TxOutput};
pub use settings::{Settings, TableSettings};
pub use store::{Store, Transactor};
