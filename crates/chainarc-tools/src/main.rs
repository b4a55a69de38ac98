//! chainarc-dbtool: create, verify and inspect a store directory.
//!
//! ```text
//! chainarc-dbtool create --dir /tmp/arc
//! chainarc-dbtool info --dir /tmp/arc
//! chainarc-dbtool verify --dir /tmp/arc
//! chainarc-dbtool header --dir /tmp/arc --hash <64 hex chars>
//! chainarc-dbtool tx --dir /tmp/arc --hash <64 hex chars>
//! chainarc-dbtool snapshot --dir /tmp/arc
//! chainarc-dbtool restore --dir /tmp/arc
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use chainarc_store::{Event, Query, Settings, Store, StoreError, Table};

#[derive(Parser)]
#[command(name = "chainarc-dbtool", about = "chainarc store inspection utility")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Emit per-table lifecycle events as they happen.
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Create a fresh store directory.
    Create {
        #[arg(long)]
        dir: PathBuf,
        /// Optional JSON settings file; table sizes default otherwise.
        #[arg(long)]
        settings: Option<PathBuf>,
    },
    /// Open, verify and report table counts.
    Info {
        #[arg(long)]
        dir: PathBuf,
    },
    /// Open and verify every table, reporting the first failure.
    Verify {
        #[arg(long)]
        dir: PathBuf,
    },
    /// Look up a header by block hash.
    Header {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        hash: String,
    },
    /// Look up a tx by hash.
    Tx {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        hash: String,
    },
    /// Snapshot the store's heads into the primary backup slot.
    Snapshot {
        #[arg(long)]
        dir: PathBuf,
    },
    /// Restore the most recent snapshot.
    Restore {
        #[arg(long)]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().compact().init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => {
            eprintln!("error: {code}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), StoreError> {
    let verbose = cli.verbose;
    let handler = move |event: Event, table: Table| {
        if verbose {
            eprintln!("{} {}", event.name(), table.name());
        }
    };

    match cli.command {
        Command::Create { dir, settings } => {
            let settings = match settings {
                Some(path) => {
                    let mut loaded = Settings::load(&path)?;
                    loaded.dir = dir;
                    loaded
                }
                None => Settings::with_dir(dir),
            };
            let mut store = Store::new(settings)?;
            store.create(&handler)?;
            println!("created");
            Ok(())
        }
        Command::Info { dir } => {
            let mut store = Store::new(Settings::with_dir(dir))?;
            store.open(&handler)?;
            print_info(&store);
            store.close(&handler)
        }
        Command::Verify { dir } => {
            let mut store = Store::new(Settings::with_dir(dir))?;
            store.open(&handler)?;
            println!("ok");
            store.close(&handler)
        }
        Command::Header { dir, hash } => {
            let key = parse_hash(&hash)?;
            let mut store = Store::new(Settings::with_dir(dir))?;
            store.open(&handler)?;
            let result = (|| {
                let query = Query::new(&store);
                let link = query.to_header(&key)?;
                if link.is_terminal() {
                    println!("not found");
                    return Ok(());
                }
                let record = query.get_header(link)?.ok_or(StoreError::Integrity)?;
                println!("link       {link}");
                println!("height     {}", record.ctx.height);
                println!("milestone  {}", record.milestone);
                println!("parent     {}", record.parent_fk);
                println!("version    {:#010x}", record.version);
                println!("timestamp  {}", record.timestamp);
                println!("bits       {:#010x}", record.bits);
                println!("nonce      {:#010x}", record.nonce);
                println!("merkle     {}", hex::encode(record.merkle_root));
                Ok(())
            })();
            let _ = store.close(&handler);
            result
        }
        Command::Tx { dir, hash } => {
            let key = parse_hash(&hash)?;
            let mut store = Store::new(Settings::with_dir(dir))?;
            store.open(&handler)?;
            let result = (|| {
                let query = Query::new(&store);
                let link = query.to_tx(&key)?;
                if link.is_terminal() {
                    println!("not found");
                    return Ok(());
                }
                let record = query.get_tx(link)?.ok_or(StoreError::Integrity)?;
                println!("link      {link}");
                println!("coinbase  {}", record.coinbase);
                println!("version   {}", record.version);
                println!("locktime  {}", record.locktime);
                println!("sizes     {} / {}", record.light, record.heavy);
                println!("inputs    {} @ {}", record.ins, record.point_fk);
                println!("outputs   {} @ {}", record.outs, record.outs_fk);
                let block = query.to_block(link)?;
                println!("block     {block}");
                Ok(())
            })();
            let _ = store.close(&handler);
            result
        }
        Command::Snapshot { dir } => {
            let mut store = Store::new(Settings::with_dir(dir))?;
            store.open(&handler)?;
            store.snapshot(&handler)?;
            println!("snapshot archived");
            store.close(&handler)
        }
        Command::Restore { dir } => {
            let mut store = Store::new(Settings::with_dir(dir))?;
            store.restore(&handler)?;
            println!("restored");
            store.close(&handler)
        }
    }
}

fn print_info(store: &Store) {
    let query = Query::new(store);
    println!("{:<14} {:>12}", "table", "count");
    println!("{:<14} {:>12}", "header", store.header.count());
    println!("{:<14} {:>12}", "tx", store.tx.count());
    println!("{:<14} {:>12}", "point", store.point.count());
    println!("{:<14} {:>12}", "input", store.input.count());
    println!("{:<14} {:>12}", "output", store.output.count());
    println!("{:<14} {:>12}", "puts", store.puts.count());
    println!("{:<14} {:>12}", "txs", store.txs.count());
    println!("{:<14} {:>12}", "candidate", store.candidate.count());
    println!("{:<14} {:>12}", "confirmed", store.confirmed.count());
    println!("{:<14} {:>12}", "strong_tx", store.strong_tx.count());
    println!("{:<14} {:>12}", "prevout", store.prevout.count());
    println!("{:<14} {:>12}", "validated_bk", store.validated_bk.count());
    println!("{:<14} {:>12}", "validated_tx", store.validated_tx.count());
    println!("{:<14} {:>12}", "address", store.address.count());
    println!("{:<14} {:>12}", "neutrino", store.neutrino.count());
    match (query.get_top_candidate(), query.get_top_confirmed()) {
        (Some(candidate), Some(confirmed)) => {
            println!("candidate top {candidate}, confirmed top {confirmed}");
        }
        _ => println!("height chains empty"),
    }
}

fn parse_hash(text: &str) -> Result<[u8; 32], StoreError> {
    let bytes = hex::decode(text).map_err(|_| StoreError::Integrity)?;
    bytes.try_into().map_err(|_| StoreError::Integrity)
}
