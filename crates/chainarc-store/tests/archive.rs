//! Archive round trips: txs through the point/input/output/puts graph,
//! the address and neutrino indexes, validation state, and the prevout
//! cache with batch fee accumulation.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use chainarc_store::schema::{BlockLink, Context};
use chainarc_store::tables::{header, prevout, validated_bk, validated_tx};
use chainarc_store::{Event, Query, Settings, Store, StoreError, Table, TxBody, TxInput, TxOutput};

fn quiet() -> impl Fn(Event, Table) {
    |_, _| {}
}

fn created_store(dir: &Path) -> Store {
    let mut store = Store::new(Settings::with_dir(dir)).expect("settings");
    store.create(&quiet()).expect("create");
    store.open(&quiet()).expect("open");
    store
}

fn hash(seed: u8) -> [u8; 32] {
    let mut key = [seed; 32];
    key[1] = seed.wrapping_mul(7);
    key
}

fn header_record(height: u32) -> header::Record {
    header::Record {
        ctx: Context { flags: 0, height, mtp: 0 },
        milestone: height == 0,
        parent_fk: BlockLink::TERMINAL,
        version: 1,
        timestamp: 1_231_006_505,
        bits: 0x1d00_ffff,
        nonce: 2_083_236_893,
        merkle_root: hash(height as u8),
    }
}

fn spending_tx() -> TxBody {
    TxBody {
        coinbase: false,
        light: 225,
        heavy: 261,
        locktime: 101,
        version: 2,
        inputs: vec![
            TxInput {
                prevout_hash: hash(0x61),
                prevout_index: 1,
                sequence: 0xFFFF_FFFD,
                script: vec![0x47, 0x30, 0x44],
                witness: vec![0x02, 0x21],
            },
            TxInput {
                prevout_hash: hash(0x62),
                prevout_index: 0,
                sequence: u32::MAX,
                script: Vec::new(),
                witness: vec![0xAA; 72],
            },
        ],
        outputs: vec![
            TxOutput { value: 1_2345_6789, script: vec![0x76, 0xA9, 0x14] },
            TxOutput { value: 9_8765_4321, script: vec![0x00, 0x14] },
        ],
    }
}

#[test]
fn tx_round_trips_through_the_foreign_key_graph() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = created_store(dir.path());
    let query = Query::new(&store);

    let body = spending_tx();
    let tx_fk = query.put_tx(&hash(0x60), &body).unwrap();

    let record = query.get_tx(tx_fk).unwrap().unwrap();
    assert_eq!(record.ins, 2);
    assert_eq!(record.outs, 2);
    assert!(!record.coinbase);

    // Points are a contiguous group; each points back at the parent tx.
    let point = query
        .get_point(chainarc_store::schema::PointLink::new(record.point_fk.value()))
        .unwrap()
        .unwrap();
    assert_eq!(point.parent_fk, tx_fk);
    assert_eq!(point.hash, hash(0x61));
    assert!(!point.is_null());

    let reassembled = query.get_tx_body(tx_fk).unwrap().unwrap();
    assert_eq!(reassembled, body);
}

#[test]
fn coinbase_null_point_survives_the_index_sentinel() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = created_store(dir.path());
    let query = Query::new(&store);

    let body = TxBody {
        coinbase: true,
        light: 100,
        heavy: 100,
        locktime: 0,
        version: 1,
        inputs: vec![TxInput {
            prevout_hash: [0; 32],
            prevout_index: u32::MAX,
            sequence: u32::MAX,
            script: vec![0x03],
            witness: Vec::new(),
        }],
        outputs: vec![TxOutput { value: 50_0000_0000, script: vec![0x51] }],
    };
    let tx_fk = query.put_tx(&hash(0x70), &body).unwrap();

    let record = query.get_tx(tx_fk).unwrap().unwrap();
    let point = query.get_point(record.point_fk).unwrap().unwrap();
    assert!(point.is_null());
    assert_eq!(query.get_tx_body(tx_fk).unwrap().unwrap(), body);
}

#[test]
fn address_index_accumulates_outputs_per_script() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = created_store(dir.path());
    let query = Query::new(&store);

    let script = vec![0x76, 0xA9, 0x14, 0x01, 0x02];
    let other = vec![0x00, 0x20];

    query.set_address_output(&script, chainarc_store::schema::OutputLink::new(10)).unwrap();
    query.set_address_output(&other, chainarc_store::schema::OutputLink::new(11)).unwrap();
    query.set_address_output(&script, chainarc_store::schema::OutputLink::new(12)).unwrap();

    let outputs = query.to_address_outputs(&script).unwrap();
    let values: Vec<u64> = outputs.iter().map(|fk| fk.value()).collect();
    assert_eq!(values, vec![12, 10]);
    assert_eq!(query.to_address_outputs(&other).unwrap().len(), 1);
    assert!(query.to_address_outputs(b"unseen").unwrap().is_empty());
}

#[test]
fn neutrino_filter_round_trip() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = created_store(dir.path());
    let query = Query::new(&store);

    let header_fk = query.put_header(&hash(0x80), &header_record(3)).unwrap();
    assert!(query.get_filter(header_fk).unwrap().is_none());

    query.set_filter(header_fk, hash(0x81), vec![0x01, 0x9A, 0x20, 0x44]).unwrap();
    let record = query.get_filter(header_fk).unwrap().unwrap();
    assert_eq!(record.filter_head, hash(0x81));
    assert_eq!(record.filter, vec![0x01, 0x9A, 0x20, 0x44]);
}

#[test]
fn block_state_distinguishes_absence_kinds() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = created_store(dir.path());
    let query = Query::new(&store);

    let header_fk = query.put_header(&hash(0x90), &header_record(1)).unwrap();

    // No txs associated at all.
    assert_eq!(query.get_block_state(header_fk).unwrap(), StoreError::Unassociated);

    let tx_fk = query.put_tx(&hash(0x91), &spending_tx()).unwrap();
    query.put_block_txs(header_fk, 500, vec![tx_fk], None).unwrap();
    assert_eq!(query.get_block_state(header_fk).unwrap(), StoreError::Unvalidated);

    query.set_block_state(header_fk, validated_bk::BLOCK_CONFIRMABLE, 1500).unwrap();
    assert_eq!(query.get_block_state(header_fk).unwrap(), StoreError::BlockConfirmable);

    // An unknown persisted code surfaces as such.
    query.set_block_state(header_fk, 0xEE, 0).unwrap();
    assert_eq!(query.get_block_state(header_fk).unwrap(), StoreError::UnknownState);
}

#[test]
fn tx_state_is_matched_by_context() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = created_store(dir.path());
    let query = Query::new(&store);

    let tx_hash = hash(0xA1);
    query.put_tx(&tx_hash, &spending_tx()).unwrap();

    let early = Context { flags: 1, height: 100, mtp: 5000 };
    let late = Context { flags: 1, height: 200, mtp: 9000 };

    query
        .set_tx_state(
            &tx_hash,
            &validated_tx::Record {
                ctx: early,
                code: validated_tx::TX_CONNECTED,
                fee: 1000,
                sigops: 2,
            },
        )
        .unwrap();
    query
        .set_tx_state(
            &tx_hash,
            &validated_tx::Record {
                ctx: late,
                code: validated_tx::TX_DISCONNECTED,
                fee: 0,
                sigops: 2,
            },
        )
        .unwrap();

    assert_eq!(query.get_tx_state(&tx_hash, &early).unwrap(), StoreError::TxConnected);
    assert_eq!(query.get_tx_state(&tx_hash, &late).unwrap(), StoreError::TxDisconnected);
    let unseen = Context { flags: 9, height: 1, mtp: 1 };
    assert_eq!(query.get_tx_state(&tx_hash, &unseen).unwrap(), StoreError::Unvalidated);
}

#[test]
fn prevout_cache_round_trips_with_derived_spend_count() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = created_store(dir.path());
    let query = Query::new(&store);

    let header_fk = query.put_header(&hash(0xB0), &header_record(2)).unwrap();
    let record = prevout::Record {
        conflicts: vec![chainarc_store::schema::TxLink::new(4)],
        spends: vec![
            (prevout::merge(true, 17), 0xFFFF_FFFE),
            (prevout::INTERNAL, u32::MAX),
        ],
    };
    query.set_prevouts(header_fk, &record).unwrap();

    let decoded = query.get_prevouts(header_fk, 2).unwrap().unwrap();
    assert_eq!(decoded, record);
    assert!(prevout::is_coinbase(decoded.spends[0].0));
    assert_eq!(prevout::prev_tx(decoded.spends[1].0), prevout::INTERNAL);
}

#[test]
fn fee_accumulation_honors_cancellation() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = created_store(dir.path());
    let query = Query::new(&store);

    // Two confirmed blocks with verdicts.
    let genesis_fk = query.initialize(&hash(0xC0), &header_record(0)).unwrap();
    query.set_block_state(genesis_fk, validated_bk::BLOCK_VALID, 0).unwrap();

    let header_fk = query.put_header(&hash(0xC1), &header_record(1)).unwrap();
    let tx_fk = query.put_tx(&hash(0xC2), &spending_tx()).unwrap();
    query.put_block_txs(header_fk, 400, vec![tx_fk], None).unwrap();
    query.push_confirmed(header_fk, true).unwrap();
    query.set_block_state(header_fk, validated_bk::BLOCK_VALID, 2500).unwrap();

    let cancel = AtomicBool::new(false);
    assert_eq!(query.get_block_fees(0..2, &cancel).unwrap(), 2500);

    cancel.store(true, Ordering::Relaxed);
    assert_eq!(query.get_block_fees(0..2, &cancel), Err(StoreError::QueryCanceled));
}
