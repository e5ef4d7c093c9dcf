//! `paw-node query`: looks up a raw state key after replaying genesis
//! into a fresh `MemoryStore`.
//!
//! Mirrors the shape of the teacher's `query state <key>` command
//! (`kernel/crates/cli/src/commands/query.rs`), minus the IPC round
//! trip to a running node: this core has no persistence engine or RPC
//! gateway (both explicitly out of scope, see DESIGN.md), so there is
//! no live daemon to query against. This command answers "what would
//! genesis have written at this key", which is the only state this
//! simplified core can reconstruct outside of a running `start` loop.

use crate::config::NodeConfig;
use anyhow::{Context, Result};
use clap::Parser;
use paw_api::StateAccess;
use paw_execution::Genesis;
use paw_storage::MemoryStore;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
pub struct QueryArgs {
    #[clap(long, default_value = "node.toml")]
    pub config: PathBuf,

    /// Hex-encoded state key.
    pub key: String,
}

pub fn run(args: QueryArgs) -> Result<()> {
    let config_text = fs::read_to_string(&args.config)
        .with_context(|| format!("reading node config at {}", args.config.display()))?;
    let config: NodeConfig = toml::from_str(&config_text)?;

    let genesis_text = fs::read_to_string(&config.genesis_path)
        .with_context(|| format!("reading genesis file at {}", config.genesis_path.display()))?;
    let genesis: Genesis = toml::from_str(&genesis_text)?;

    let mut store = MemoryStore::new();
    genesis.apply(&mut store)?;

    let key = hex::decode(&args.key).context("key must be hex-encoded")?;
    match store.get(&key)? {
        Some(value) => println!("{}", hex::encode(value)),
        None => println!("key not found"),
    }
    Ok(())
}
