//! ember — command-line driver for a local Ember chain.
//!
//! Opens the on-disk chain under `--data-dir`, mines and appends blocks, and
//! prints or verifies what is stored.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ember_core::block::Block;
use ember_core::types::Hash256;
use ember_node_lib::{Chain, NodeConfig};
use serde::Serialize;
use tracing::info;

/// Ember: a single-node proof-of-work chain.
#[derive(Parser, Debug)]
#[command(name = "ember", version, about = "Mine and inspect a local proof-of-work chain")]
struct Cli {
    /// Data directory holding the index and block files
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON file with chain parameters
    #[arg(long, global = true)]
    params: Option<PathBuf>,

    /// Mining threads (overrides the params file)
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Mine the genesis block.
    Init {
        /// Genesis payload
        #[arg(default_value = "Genesis Block")]
        data: String,
    },
    /// Mine a block carrying DATA on top of the tip.
    Add {
        data: String,
    },
    /// Show the block with the given hex hash.
    Show {
        hash: String,
    },
    /// Show the tip block.
    Tip,
    /// Print every block from tip to genesis.
    Print {
        /// Emit one JSON object per line
        #[arg(long)]
        json: bool,
    },
    /// Re-validate the whole chain.
    Verify,
}

impl Cli {
    /// Convert CLI flags into a NodeConfig.
    fn config(&self) -> Result<NodeConfig> {
        let mut config = NodeConfig {
            log_level: self.log_level.clone(),
            ..NodeConfig::default()
        };
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(path) = &self.params {
            config.params = NodeConfig::load_params(path)?;
        }
        if let Some(threads) = self.threads {
            config.params = config.params.with_mining_threads(threads);
        }
        Ok(config)
    }
}

/// JSON view of a block.
#[derive(Serialize)]
struct BlockView {
    height: u64,
    hash: String,
    prev_hash: Option<String>,
    timestamp: i64,
    time: String,
    target_bits: u32,
    nonce: u64,
    data: String,
}

impl From<&Block> for BlockView {
    fn from(block: &Block) -> Self {
        let time = chrono::DateTime::from_timestamp(block.timestamp(), 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        Self {
            height: block.height(),
            hash: block.hash().to_string(),
            prev_hash: block.prev_hash().map(|h| h.to_string()),
            timestamp: block.timestamp(),
            time,
            target_bits: block.target_bits(),
            nonce: block.nonce(),
            data: String::from_utf8_lossy(block.data()).into_owned(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);

    let config = cli.config()?;
    info!(data_dir = %config.data_dir.display(), "ember v{}", env!("CARGO_PKG_VERSION"));

    let mut chain = Chain::open_default(&config)
        .with_context(|| format!("Failed to open chain at {}", config.data_dir.display()))?;

    let result = run(&mut chain, cli.command);
    chain.close().context("Failed to close chain")?;
    result
}

fn run(
    chain: &mut Chain<ember_node_lib::RocksMetadataStore, ember_node_lib::FsBlockStore>,
    command: Commands,
) -> Result<()> {
    match command {
        Commands::Init { data } => {
            let block = chain
                .create_genesis(data)
                .context("Failed to create genesis block")?;
            print_block(&block)
        }
        Commands::Add { data } => {
            if chain.is_empty()? {
                bail!("Chain has no genesis block; run `ember init` first");
            }
            let block = chain.append(data).context("Failed to append block")?;
            print_block(&block)
        }
        Commands::Show { hash } => {
            let hash: Hash256 = hash.parse().context("Invalid block hash")?;
            let block = chain
                .get_block(&hash)
                .with_context(|| format!("Failed to load block {hash}"))?;
            print_block(&block)
        }
        Commands::Tip => {
            let block = chain.tip_block().context("Failed to load tip block")?;
            print_block(&block)
        }
        Commands::Print { json } => {
            for block in chain.iter()? {
                let block = block.context("Failed to walk chain")?;
                if json {
                    println!("{}", serde_json::to_string(&BlockView::from(&block))?);
                } else {
                    println!(
                        "#{:<6} {} prev={} bits={} nonce={} data={:?}",
                        block.height(),
                        block.hash(),
                        block
                            .prev_hash()
                            .map(|h| h.to_string())
                            .unwrap_or_else(|| "-".into()),
                        block.target_bits(),
                        block.nonce(),
                        String::from_utf8_lossy(block.data()),
                    );
                }
            }
            Ok(())
        }
        Commands::Verify => {
            let count = chain.verify().context("Chain verification failed")?;
            println!("ok: {count} blocks verified");
            Ok(())
        }
    }
}

fn print_block(block: &Block) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&BlockView::from(block))?);
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output. Any other value
/// defaults to human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}
