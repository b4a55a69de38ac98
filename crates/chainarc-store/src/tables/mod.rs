//! Table definitions: one module per archive/index/cache table.
//!
//! Each module pins a table's primitive flavor, link widths and row size,
//! provides the constructor used by the store, and defines the record
//! codecs: a full row record plus the partial readers the query layer
//! uses to avoid deserializing whole rows.

pub mod address;
pub mod header;
pub mod height;
pub mod input;
pub mod neutrino;
pub mod output;
pub mod point;
pub mod prevout;
pub mod puts;
pub mod strong_tx;
pub mod transaction;
pub mod txs;
pub mod validated_bk;
pub mod validated_tx;
