//! Example: follow an EVM chain behind a confirmation depth and store its headers.
//!
//! Runs the EthSynchronizer against a JSON-RPC node and logs every stored batch. With
//! `--db` the headers go to RocksDB and a restart resumes from the stored tip;
//! otherwise an in-memory store is used. Stops on Ctrl-C or on a fatal traversal error.
//!
//! Usage:
//!
//!   cargo run -p aggregator --example eth_sync -- --http-url <HTTP_URL>
//!   cargo run -p aggregator --features rocksdb --example eth_sync -- --http-url <HTTP_URL> --db ./data
//!
//! Options:
//!   --depth <K>        Confirmation depth. Default: 6.
//!   --batch <N>        Max headers per step. Default: 100.
//!   --start <HEIGHT>   First height to ingest. Default: genesis.
//!   --interval-ms <MS> Pause between steps once caught up. Default: 1000.
//!   --db <PATH>        RocksDB directory (needs the `rocksdb` feature).

use aggregator::{
    EthSynchronizer, HttpEthClient, KeyValueStore, MemoryStore, Storage, SynchronizerConfig,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn usage() -> &'static str {
    "Usage: eth_sync --http-url <HTTP_URL> [--depth K] [--batch N] [--start HEIGHT] [--interval-ms MS] [--db PATH]"
}

struct Args {
    config: SynchronizerConfig,
    db: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut config = SynchronizerConfig {
        http_url: String::new(),
        ..Default::default()
    };
    let mut db = None;
    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        i += 1;
        let value = || args.get(i).cloned().ok_or_else(|| format!("{} needs a value", flag));
        match flag {
            "--http-url" => config.http_url = value()?,
            "--depth" => config.confirmation_depth = value()?.parse().map_err(|e| format!("--depth: {}", e))?,
            "--batch" => config.max_batch_size = value()?.parse().map_err(|e| format!("--batch: {}", e))?,
            "--start" => config.start_height = Some(value()?.parse().map_err(|e| format!("--start: {}", e))?),
            "--interval-ms" => {
                config.loop_interval_ms = value()?.parse().map_err(|e| format!("--interval-ms: {}", e))?
            }
            "--db" => db = Some(PathBuf::from(value()?)),
            "--help" | "-h" => return Err(usage().to_string()),
            other => return Err(format!("unknown option {}\n{}", other, usage())),
        }
        i += 1;
    }
    if config.http_url.is_empty() {
        return Err(usage().to_string());
    }
    Ok(Args { config, db })
}

async fn sync<S: KeyValueStore>(
    client: HttpEthClient,
    storage: Storage<S>,
    config: SynchronizerConfig,
) -> anyhow::Result<()> {
    let mut sync = EthSynchronizer::new(client, storage, config).await?;
    let interrupted = tokio::select! {
        res = sync.run() => {
            res?;
            false
        }
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        tracing::info!(
            scanned = ?sync.storage().eth_scanned_height().ok().flatten(),
            "interrupted"
        );
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args: Vec<String> = std::env::args().collect();
    let Args { config, db } = match parse_args(&args) {
        Ok(a) => a,
        Err(msg) => {
            eprintln!("{}", msg);
            std::process::exit(1);
        }
    };

    let client = HttpEthClient::new(config.http_url.clone())?;
    let rt = tokio::runtime::Runtime::new()?;
    match db {
        #[cfg(feature = "rocksdb")]
        Some(path) => {
            let store = aggregator::RocksDbStore::open_default(&path)?;
            rt.block_on(sync(client, Storage::new(store), config))
        }
        #[cfg(not(feature = "rocksdb"))]
        Some(_) => anyhow::bail!("--db needs the `rocksdb` feature"),
        None => rt.block_on(sync(client, Storage::new(MemoryStore::new()), config)),
    }
}
