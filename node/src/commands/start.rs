//! `paw-node start`: loads genesis into a fresh `MemoryStore`, builds
//! the `ExecutionMachine`, and drives it from the stub consensus feed
//! until interrupted. Grounded on the teacher's validator main loop
//! (`kernel/crates/node/src/bin/ioi-local.rs`)'s `tokio::select!` over
//! a shutdown signal and a ticking driver, stripped of every driver,
//! network, and VM concern this core doesn't carry.

use crate::config::NodeConfig;
use crate::consensus_feed::StubConsensusFeed;
use anyhow::{Context, Result};
use clap::Parser;
use paw_execution::{build_machine, Genesis};
use paw_storage::MemoryStore;
use paw_types::app::ChainId;
use paw_types::events::VecEventSink;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;

#[derive(Parser, Debug)]
pub struct StartArgs {
    #[clap(long, default_value = "node.toml")]
    pub config: PathBuf,
}

pub async fn run(args: StartArgs) -> Result<()> {
    let config_text = fs::read_to_string(&args.config)
        .with_context(|| format!("reading node config at {}", args.config.display()))?;
    let config: NodeConfig = toml::from_str(&config_text)?;

    crate::tracing_init::init(&config.log_level);

    let genesis_text = fs::read_to_string(&config.genesis_path)
        .with_context(|| format!("reading genesis file at {}", config.genesis_path.display()))?;
    let genesis: Genesis = toml::from_str(&genesis_text)?;

    let mut store = MemoryStore::new();
    genesis.apply(&mut store)?;

    let chain_id = ChainId(config.chain_id);
    let machine = build_machine(&genesis, chain_id);
    let events = VecEventSink::new();
    let mut feed = StubConsensusFeed::new(Duration::from_secs(config.block_interval_secs.max(1)), 1);

    tracing::info!(
        bind_addr = %config.bind_addr,
        chain_id = config.chain_id,
        "paw-node starting (consensus feed is a stub: no real mempool or network)"
    );

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
            block = feed.next_block() => {
                for tx in &block.transactions {
                    if let Err(err) = machine
                        .apply_transaction(&mut store, tx, block.height, block.timestamp, &events)
                        .await
                    {
                        tracing::warn!(sender = %tx.sender, nonce = tx.nonce, error = %err, "transaction rejected");
                    }
                }
                if let Err(err) = machine
                    .run_end_block(&mut store, block.height, block.timestamp, &events)
                    .await
                {
                    tracing::error!(height = block.height, error = %err, "end-of-block sweep failed");
                }
                tracing::debug!(height = block.height, state_keys = store.len(), "block executed");
            }
        }
    }

    tracing::info!("paw-node stopped");
    Ok(())
}
