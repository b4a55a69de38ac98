//! Query traversal over the schema.
//!
//! Translate hashes to links, assemble objects from the foreign-key graph
//! (header -> txs -> tx -> points/inputs and puts/outputs), navigate the
//! candidate/confirmed height chains, and maintain the strong-tx and
//! validation-state indexes.
//!
//! Confirmation semantics: a tx belongs to block `H` iff its most recent
//! strong-tx row names `H` with the positive flag; a block is confirmed
//! iff the confirmed array at its height names it. Reorganization never
//! deletes; popping a confirmed block prepends a negative strong-tx row
//! for its coinbase and truncates the height slot.
//!
//! Write methods take the shared transactor for their span; snapshot and
//! close block behind outstanding guards.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};

use chainarc_primitives::RecordReader;

use crate::error::StoreError;
use crate::schema::{
    BlockLink, Context, HashKey, InputLink, OutputLink, OutsLink, PointLink, TxLink,
};
use crate::store::Store;
use crate::tables::{
    address, header, height, input, neutrino, output, point, prevout, puts, strong_tx,
    transaction, txs, validated_bk, validated_tx,
};

/// One input of a tx presented for archiving.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxInput {
    pub prevout_hash: HashKey,
    pub prevout_index: u32,
    pub sequence: u32,
    pub script: Vec<u8>,
    pub witness: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxOutput {
    pub value: u64,
    pub script: Vec<u8>,
}

/// A tx presented for archiving or reassembled from the archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxBody {
    pub coinbase: bool,
    pub light: u32,
    pub heavy: u32,
    pub locktime: u32,
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

pub struct Query<'a> {
    store: &'a Store,
}

impl<'a> Query<'a> {
    #[must_use]
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Translate.
    /// -----------------------------------------------------------------

    pub fn to_header(&self, hash: &HashKey) -> Result<BlockLink, StoreError> {
        Ok(self.store.header.first(hash)?)
    }

    pub fn to_tx(&self, hash: &HashKey) -> Result<TxLink, StoreError> {
        Ok(self.store.tx.first(hash)?)
    }

    pub fn to_candidate(&self, height: u64) -> Result<BlockLink, StoreError> {
        Ok(self
            .store
            .candidate
            .get::<height::Record>(height)?
            .map_or(BlockLink::TERMINAL, |record| record.header_fk))
    }

    pub fn to_confirmed(&self, height: u64) -> Result<BlockLink, StoreError> {
        Ok(self
            .store
            .confirmed
            .get::<height::Record>(height)?
            .map_or(BlockLink::TERMINAL, |record| record.header_fk))
    }

    /// Objects.
    /// -----------------------------------------------------------------

    pub fn get_header(&self, link: BlockLink) -> Result<Option<header::Record>, StoreError> {
        Ok(self.store.header.get(link)?)
    }

    pub fn get_header_key(&self, link: BlockLink) -> Result<HashKey, StoreError> {
        Ok(self.store.header.get_key(link)?)
    }

    /// Height component of a header's stored context.
    pub fn get_height(&self, link: BlockLink) -> Result<u64, StoreError> {
        self.store
            .header
            .get::<header::GetHeight>(link)?
            .map(|partial| u64::from(partial.height))
            .ok_or(StoreError::Integrity)
    }

    pub fn get_tx(&self, link: TxLink) -> Result<Option<transaction::Record>, StoreError> {
        Ok(self.store.tx.get(link)?)
    }

    pub fn get_tx_key(&self, link: TxLink) -> Result<HashKey, StoreError> {
        Ok(self.store.tx.get_key(link)?)
    }

    /// Reassemble a tx from its record, point group, input slabs and
    /// output group.
    pub fn get_tx_body(&self, link: TxLink) -> Result<Option<TxBody>, StoreError> {
        let Some(record) = self.store.tx.get::<transaction::Record>(link)? else {
            return Ok(None);
        };

        let mut inputs = Vec::with_capacity(record.ins as usize);
        for offset in 0..u64::from(record.ins) {
            let point_fk = PointLink::new(record.point_fk.value() + offset);
            let Some(point) = self.store.point.get::<point::Record>(point_fk)? else {
                return Ok(None);
            };
            let Some(slab) = self.store.input.get::<input::Record>(point.input_fk)? else {
                return Ok(None);
            };
            inputs.push(TxInput {
                prevout_hash: point.hash,
                prevout_index: point.index,
                sequence: point.sequence,
                script: slab.script,
                witness: slab.witness,
            });
        }

        let mut outputs = Vec::with_capacity(record.outs as usize);
        for offset in 0..u64::from(record.outs) {
            let puts_fk = OutsLink::new(record.outs_fk.value() + offset);
            let Some(row) = self.store.puts.get::<puts::Record>(puts_fk)? else {
                return Ok(None);
            };
            let Some(slab) = self.store.output.get::<output::Record>(row.out_fk)? else {
                return Ok(None);
            };
            outputs.push(TxOutput { value: slab.value, script: slab.script });
        }

        Ok(Some(TxBody {
            coinbase: record.coinbase,
            light: record.light,
            heavy: record.heavy,
            locktime: record.locktime,
            version: record.version,
            inputs,
            outputs,
        }))
    }

    /// Ordered tx links of a block, coinbase first.
    pub fn get_block_txs(&self, header_fk: BlockLink) -> Result<Vec<TxLink>, StoreError> {
        Ok(self
            .store
            .txs
            .get::<txs::Record>(header_fk.value())?
            .map_or_else(Vec::new, |record| record.tx_fks))
    }

    /// Archive writers.
    /// -----------------------------------------------------------------

    pub fn put_header(
        &self,
        key: &HashKey,
        record: &header::Record,
    ) -> Result<BlockLink, StoreError> {
        let _writer = self.store.get_transactor();
        self.store.header.put(key, record).ok_or(StoreError::DiskFull)
    }

    /// Archive a tx: input slabs, the contiguous point group, output
    /// slabs, the puts group, then the tx row itself (committed last, the
    /// single visibility point).
    pub fn put_tx(&self, key: &HashKey, tx: &TxBody) -> Result<TxLink, StoreError> {
        let _writer = self.store.get_transactor();

        let tx_fk = self.store.tx.allocate(1).ok_or(StoreError::DiskFull)?;

        let mut input_fks = Vec::with_capacity(tx.inputs.len());
        for item in &tx.inputs {
            let slab = input::Record { script: item.script.clone(), witness: item.witness.clone() };
            input_fks.push(self.store.input.put(&slab).ok_or(StoreError::DiskFull)?);
        }

        let point_fk =
            self.store.point.allocate(tx.inputs.len() as u64).ok_or(StoreError::DiskFull)?;
        for (offset, (item, input_fk)) in tx.inputs.iter().zip(&input_fks).enumerate() {
            let row = point::Record {
                hash: item.prevout_hash,
                index: item.prevout_index,
                sequence: item.sequence,
                input_fk: *input_fk,
                parent_fk: tx_fk,
            };
            let at = PointLink::new(point_fk.value() + offset as u64);
            if !self.store.point.set(at, &row) {
                return Err(StoreError::DiskFull);
            }
        }

        let outs_fk =
            self.store.puts.allocate(tx.outputs.len() as u64).ok_or(StoreError::DiskFull)?;
        for (offset, item) in tx.outputs.iter().enumerate() {
            let slab = output::Record {
                parent_fk: tx_fk,
                value: item.value,
                script: item.script.clone(),
            };
            let out_fk = self.store.output.put(&slab).ok_or(StoreError::DiskFull)?;
            let at = OutsLink::new(outs_fk.value() + offset as u64);
            if !self.store.puts.set(at, &puts::Record { out_fk }) {
                return Err(StoreError::DiskFull);
            }
        }

        let record = transaction::Record {
            coinbase: tx.coinbase,
            light: tx.light,
            heavy: tx.heavy,
            locktime: tx.locktime,
            version: tx.version,
            ins: tx.inputs.len() as u32,
            outs: tx.outputs.len() as u32,
            point_fk,
            outs_fk,
        };
        if !self.store.tx.set(tx_fk, key, &record) {
            return Err(StoreError::DiskFull);
        }
        if !self.store.tx.commit(tx_fk, key) {
            return Err(StoreError::DiskFull);
        }
        Ok(tx_fk)
    }

    /// Associate a block's ordered tx links (coinbase first).
    pub fn put_block_txs(
        &self,
        header_fk: BlockLink,
        wire: u32,
        tx_fks: Vec<TxLink>,
        interval: Option<HashKey>,
    ) -> Result<(), StoreError> {
        let _writer = self.store.get_transactor();
        let record = txs::Record { wire, tx_fks, interval, depth: 0 };
        self.store.txs.put(header_fk.value(), &record).ok_or(StoreError::DiskFull)?;
        Ok(())
    }

    /// Heights.
    /// -----------------------------------------------------------------

    /// Top height of the candidate chain.
    pub fn get_top_candidate(&self) -> Option<u64> {
        self.store.candidate.count().checked_sub(1)
    }

    pub fn get_top_confirmed(&self) -> Option<u64> {
        self.store.confirmed.count().checked_sub(1)
    }

    /// Greatest height where the candidate and confirmed arrays agree.
    pub fn get_fork_height(&self) -> Result<Option<u64>, StoreError> {
        let top = self.store.candidate.count().min(self.store.confirmed.count());
        for height in (0..top).rev() {
            let candidate = self.store.candidate.at(height)?;
            if !candidate.is_terminal() && candidate == self.store.confirmed.at(height)? {
                return Ok(Some(height));
            }
        }
        Ok(None)
    }

    /// Seed a fresh store: archive the genesis header and point both
    /// height chains at it.
    pub fn initialize(
        &self,
        key: &HashKey,
        record: &header::Record,
    ) -> Result<BlockLink, StoreError> {
        let _writer = self.store.get_transactor();
        let header_fk = self.store.header.put(key, record).ok_or(StoreError::DiskFull)?;
        let row = height::Record { header_fk };
        self.store.candidate.put(0, &row).ok_or(StoreError::DiskFull)?;
        self.store.confirmed.put(0, &row).ok_or(StoreError::DiskFull)?;
        Ok(header_fk)
    }

    /// Append a header to the candidate chain.
    pub fn push_candidate(&self, header_fk: BlockLink) -> Result<u64, StoreError> {
        let _writer = self.store.get_transactor();
        let height = self.store.candidate.count();
        self.store
            .candidate
            .put(height, &height::Record { header_fk })
            .ok_or(StoreError::DiskFull)?;
        Ok(height)
    }

    /// Drop the candidate top. The genesis entry cannot be popped.
    pub fn pop_candidate(&self) -> Result<(), StoreError> {
        let _writer = self.store.get_transactor();
        let top = self.store.candidate.count();
        if top <= 1 {
            return Err(StoreError::Integrity);
        }
        self.store.candidate.clear(top - 1)?;
        self.store.candidate.truncate(top - 1);
        Ok(())
    }

    /// Confirm a block: mark its coinbase strong for it, then publish the
    /// height slot. The strong row is written first so any reader that
    /// observes the slot observes the promotion.
    pub fn push_confirmed(&self, header_fk: BlockLink, strong: bool) -> Result<u64, StoreError> {
        let _writer = self.store.get_transactor();
        let height = self.store.confirmed.count();
        if strong {
            let coinbase = self
                .store
                .txs
                .get::<txs::GetCoinbase>(header_fk.value())?
                .ok_or(StoreError::Unassociated)?;
            self.set_strong_locked(coinbase.coinbase_fk, header_fk, true)?;
        }
        self.store
            .confirmed
            .put(height, &height::Record { header_fk })
            .ok_or(StoreError::DiskFull)?;
        Ok(height)
    }

    /// Reorganize the confirmed top out: demote its coinbase with a
    /// negative strong row (the positive row is never removed), then
    /// truncate the height slot. The genesis entry cannot be popped.
    pub fn pop_confirmed(&self) -> Result<(), StoreError> {
        let _writer = self.store.get_transactor();
        let top = self.store.confirmed.count();
        if top <= 1 {
            return Err(StoreError::Integrity);
        }
        let height = top - 1;
        let record = self
            .store
            .confirmed
            .get::<height::Record>(height)?
            .ok_or(StoreError::Integrity)?;

        let coinbase = self
            .store
            .txs
            .get::<txs::GetCoinbase>(record.header_fk.value())?
            .ok_or(StoreError::Unassociated)?;
        self.set_strong_locked(coinbase.coinbase_fk, record.header_fk, false)?;

        self.store.confirmed.clear(height)?;
        self.store.confirmed.truncate(height);
        Ok(())
    }

    /// The confirmed array at the block's own height names it.
    pub fn is_confirmed_block(&self, header_fk: BlockLink) -> Result<bool, StoreError> {
        let height = self.get_height(header_fk)?;
        Ok(self.store.confirmed.at(height)? == header_fk)
    }

    /// Strong-tx.
    /// -----------------------------------------------------------------

    /// Mark a tx strong (or reversed) for a block.
    pub fn set_strong(
        &self,
        tx_fk: TxLink,
        header_fk: BlockLink,
        positive: bool,
    ) -> Result<(), StoreError> {
        let _writer = self.store.get_transactor();
        self.set_strong_locked(tx_fk, header_fk, positive)
    }

    fn set_strong_locked(
        &self,
        tx_fk: TxLink,
        header_fk: BlockLink,
        positive: bool,
    ) -> Result<(), StoreError> {
        let key = self.store.tx.get_key(tx_fk)?;
        self.store
            .strong_tx
            .put(&key, &strong_tx::Record { header_fk, positive })
            .ok_or(StoreError::DiskFull)?;
        Ok(())
    }

    /// The block containing a tx: its most recent strong row's header
    /// link iff the positive flag is set, terminal otherwise.
    pub fn to_block(&self, tx_fk: TxLink) -> Result<BlockLink, StoreError> {
        let key = self.store.tx.get_key(tx_fk)?;
        Ok(self
            .store
            .strong_tx
            .find::<strong_tx::Record>(&key)?
            .filter(|record| record.positive)
            .map_or(BlockLink::TERMINAL, |record| record.header_fk))
    }

    /// First tx instance with this hash that resolves to a confirmed
    /// block (duplicate hashes exist in the wild).
    pub fn to_strong(&self, hash: &HashKey) -> Result<(TxLink, BlockLink), StoreError> {
        let links: Vec<TxLink> = self.store.tx.it(*hash)?.collect();
        for tx_fk in links {
            let header_fk = self.to_block(tx_fk)?;
            if !header_fk.is_terminal() && self.is_confirmed_block(header_fk)? {
                return Ok((tx_fk, header_fk));
            }
        }
        Ok((TxLink::TERMINAL, BlockLink::TERMINAL))
    }

    /// Prevout cache.
    /// -----------------------------------------------------------------

    pub fn set_prevouts(
        &self,
        header_fk: BlockLink,
        record: &prevout::Record,
    ) -> Result<(), StoreError> {
        let _writer = self.store.get_transactor();
        self.store.prevout.put(header_fk.value(), record).ok_or(StoreError::DiskFull)?;
        Ok(())
    }

    /// Read the per-block spend set; the spend count is derived by the
    /// caller from the block's tx rows.
    pub fn get_prevouts(
        &self,
        header_fk: BlockLink,
        spend_count: usize,
    ) -> Result<Option<prevout::Record>, StoreError> {
        let link = self.store.prevout.at(header_fk.value())?;
        if link.is_terminal() {
            return Ok(None);
        }
        let memory = self.store.prevout.get_memory(link)?;
        let mut source = RecordReader::new(memory.as_slice());
        Ok(prevout::Record::read(&mut source, spend_count))
    }

    /// Validation state.
    /// -----------------------------------------------------------------

    pub fn set_block_state(
        &self,
        header_fk: BlockLink,
        code: u8,
        fees: u64,
    ) -> Result<(), StoreError> {
        let _writer = self.store.get_transactor();
        self.store
            .validated_bk
            .put(header_fk.value(), &validated_bk::Record { code, fees })
            .ok_or(StoreError::DiskFull)?;
        Ok(())
    }

    /// Read a block's verdict as a code: a stored verdict, `Unassociated`
    /// (no txs), or `Unvalidated` (txs but no verdict).
    pub fn get_block_state(&self, header_fk: BlockLink) -> Result<StoreError, StoreError> {
        match self.store.validated_bk.get::<validated_bk::Record>(header_fk.value())? {
            Some(record) => Ok(match record.code {
                validated_bk::BLOCK_VALID => StoreError::BlockValid,
                validated_bk::BLOCK_CONFIRMABLE => StoreError::BlockConfirmable,
                validated_bk::BLOCK_UNCONFIRMABLE => StoreError::BlockUnconfirmable,
                _ => StoreError::UnknownState,
            }),
            None => {
                if self.store.txs.at(header_fk.value())?.is_terminal() {
                    Ok(StoreError::Unassociated)
                } else {
                    Ok(StoreError::Unvalidated)
                }
            }
        }
    }

    /// Block fees over a confirmed height range, checking the caller's
    /// cancellation flag between blocks.
    pub fn get_block_fees(
        &self,
        heights: Range<u64>,
        cancel: &AtomicBool,
    ) -> Result<u64, StoreError> {
        let mut total = 0u64;
        for height in heights {
            if cancel.load(Ordering::Relaxed) {
                return Err(StoreError::QueryCanceled);
            }
            let header_fk = self.to_confirmed(height)?;
            if header_fk.is_terminal() {
                return Err(StoreError::Unassociated);
            }
            let record = self
                .store
                .validated_bk
                .get::<validated_bk::Record>(header_fk.value())?
                .ok_or(StoreError::Unvalidated)?;
            total = total.saturating_add(record.fees);
        }
        Ok(total)
    }

    pub fn set_tx_state(
        &self,
        hash: &HashKey,
        record: &validated_tx::Record,
    ) -> Result<(), StoreError> {
        let _writer = self.store.get_transactor();
        self.store.validated_tx.put(hash, record).ok_or(StoreError::DiskFull)?;
        Ok(())
    }

    /// Read a tx's verdict for a validation context as a code.
    pub fn get_tx_state(
        &self,
        hash: &HashKey,
        ctx: &Context,
    ) -> Result<StoreError, StoreError> {
        let links: Vec<TxLink> = self.store.validated_tx.it(*hash)?.collect();
        for link in links {
            let Some(record) = self.store.validated_tx.get::<validated_tx::Record>(link)? else {
                continue;
            };
            if record.ctx == *ctx {
                return Ok(match record.code {
                    validated_tx::TX_CONNECTED => StoreError::TxConnected,
                    validated_tx::TX_DISCONNECTED => StoreError::TxDisconnected,
                    _ => StoreError::UnknownState,
                });
            }
        }
        Ok(StoreError::Unvalidated)
    }

    /// Address index.
    /// -----------------------------------------------------------------

    pub fn set_address_output(
        &self,
        script: &[u8],
        output_fk: OutputLink,
    ) -> Result<(), StoreError> {
        let _writer = self.store.get_transactor();
        let key = address::script_key(script);
        self.store
            .address
            .put(&key, &address::Record { output_fk })
            .ok_or(StoreError::DiskFull)?;
        Ok(())
    }

    /// Every output link paying a script, most recent first.
    pub fn to_address_outputs(&self, script: &[u8]) -> Result<Vec<OutputLink>, StoreError> {
        let key = address::script_key(script);
        let links: Vec<TxLink> = self.store.address.it(key)?.collect();
        let mut outputs = Vec::with_capacity(links.len());
        for link in links {
            if let Some(record) = self.store.address.get::<address::Record>(link)? {
                outputs.push(record.output_fk);
            }
        }
        Ok(outputs)
    }

    /// Neutrino filters.
    /// -----------------------------------------------------------------

    pub fn set_filter(
        &self,
        header_fk: BlockLink,
        filter_head: HashKey,
        filter: Vec<u8>,
    ) -> Result<(), StoreError> {
        let _writer = self.store.get_transactor();
        let key = neutrino::filter_key(header_fk);
        self.store
            .neutrino
            .put(&key, &neutrino::Record { filter_head, filter })
            .ok_or(StoreError::DiskFull)?;
        Ok(())
    }

    pub fn get_filter(
        &self,
        header_fk: BlockLink,
    ) -> Result<Option<neutrino::Record>, StoreError> {
        let key = neutrino::filter_key(header_fk);
        Ok(self.store.neutrino.find(&key)?)
    }

    /// Reassembled input for confirmation by point link (spend checks).
    pub fn get_point(&self, point_fk: PointLink) -> Result<Option<point::Record>, StoreError> {
        Ok(self.store.point.get(point_fk)?)
    }

    pub fn get_input(&self, input_fk: InputLink) -> Result<Option<input::Record>, StoreError> {
        Ok(self.store.input.get(input_fk)?)
    }

    pub fn get_output(&self, out_fk: OutputLink) -> Result<Option<output::Record>, StoreError> {
        Ok(self.store.output.get(out_fk)?)
    }
}
