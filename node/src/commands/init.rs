//! `paw-node init`: scaffolds a default `node.toml` and `genesis.toml`
//! in the target directory. Mirrors the teacher's `config new` command
//! (`kernel/crates/cli/src/commands/config.rs`).

use crate::config::NodeConfig;
use anyhow::{Context, Result};
use clap::Parser;
use paw_execution::Genesis;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
pub struct InitArgs {
    #[clap(long, default_value = ".")]
    pub out_dir: PathBuf,

    #[clap(long, default_value = "1")]
    pub chain_id: u32,
}

pub fn run(args: InitArgs) -> Result<()> {
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    let genesis_path = args.out_dir.join("genesis.toml");
    let config = NodeConfig {
        chain_id: args.chain_id,
        genesis_path: genesis_path.clone(),
        ..NodeConfig::default()
    };
    fs::write(
        args.out_dir.join("node.toml"),
        toml::to_string_pretty(&config)?,
    )?;
    fs::write(&genesis_path, toml::to_string_pretty(&Genesis::default())?)?;

    println!(
        "Generated node.toml and genesis.toml in {}",
        args.out_dir.display()
    );
    println!("Edit genesis.toml to seed balances, validators, and module params before `paw-node start`.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_loadable_config_and_genesis() {
        let dir = tempfile::tempdir().unwrap();
        run(InitArgs {
            out_dir: dir.path().to_path_buf(),
            chain_id: 7,
        })
        .unwrap();

        let config_text = fs::read_to_string(dir.path().join("node.toml")).unwrap();
        let config: NodeConfig = toml::from_str(&config_text).unwrap();
        assert_eq!(config.chain_id, 7);
        assert_eq!(config.genesis_path, dir.path().join("genesis.toml"));

        let genesis_text = fs::read_to_string(dir.path().join("genesis.toml")).unwrap();
        let genesis: Genesis = toml::from_str(&genesis_text).unwrap();
        assert_eq!(genesis, Genesis::default());
    }
}
