//! `paw-node`'s own configuration, loaded from a TOML file by the
//! `init`/`start` commands. Mirrors the shape of the teacher's
//! `OrchestrationConfig` (`kernel/crates/cli/src/commands/config.rs`),
//! trimmed to the fields this simplified core's block loop actually
//! needs — no RPC hardening, no sync timeouts, no IBC gateway address,
//! since networking and consensus are out of this core's scope.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Placeholder for the out-of-scope RPC/gateway listen address;
    /// recorded so `init`-generated configs document where a future
    /// gateway would bind, but nothing in this core binds it.
    pub bind_addr: String,
    pub log_level: String,
    pub genesis_path: PathBuf,
    pub chain_id: u32,
    pub block_interval_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:26657".to_string(),
            log_level: "info".to_string(),
            genesis_path: PathBuf::from("genesis.toml"),
            chain_id: 1,
            block_interval_secs: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_toml() {
        let config = NodeConfig::default();
        let text = toml::to_string_pretty(&config).expect("serialize");
        let parsed: NodeConfig = toml::from_str(&text).expect("deserialize");
        assert_eq!(parsed.chain_id, config.chain_id);
        assert_eq!(parsed.bind_addr, config.bind_addr);
    }
}
