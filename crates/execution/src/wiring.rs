//! Builds a default [`ExecutionMachine`] wired against the `Simple*`
//! collaborator adapters and seeded from a [`Genesis`].
//!
//! Grounded on the teacher's `setup_workload` (construct the
//! collaborator dependencies, then hand them to the execution layer) —
//! simplified down to this core's four leaf modules and the collaborator
//! ports, without the teacher's driver/VM/network wiring.

use crate::collaborators::{SimpleBank, SimpleGovernance, SimpleOracleKeeper, SimpleStaking};
use crate::genesis::Genesis;
use crate::machine::ExecutionMachine;
use paw_api::services::access::ServiceDirectory;
use paw_compute::service::ComputeMarketService;
use paw_dex::service::DexService;
use paw_ibc::service::IbcService;
use paw_oracle::service::OracleService;
use paw_types::app::ChainId;
use std::sync::Arc;

/// Constructs every collaborator adapter from `genesis`, registers the
/// four leaf modules against them, and returns a ready-to-drive
/// [`ExecutionMachine`]. Does not touch `state` — call
/// [`Genesis::apply`] separately to seed canonical state. Also installs
/// `genesis`'s zk verifying key, if any, into `paw_crypto::zk`'s
/// process-wide cache — a one-time side effect outside `state`, same as
/// the verifying key itself.
pub fn build_machine(genesis: &Genesis, chain_id: ChainId) -> ExecutionMachine {
    if let Some(vk) = genesis.zk_verifying_key.clone() {
        vk.install();
    }

    let bank = Arc::new(SimpleBank::new(genesis.balances.iter().cloned()));
    let staking = Arc::new(SimpleStaking::new(genesis.validators.iter().cloned()));
    let governance = Arc::new(SimpleGovernance::new(genesis.governance_authority));
    let oracle_keeper = Arc::new(SimpleOracleKeeper::new());

    let compute = Arc::new(ComputeMarketService::new(bank.clone(), governance.clone()));
    let oracle = Arc::new(OracleService::new(staking, governance.clone()));
    let dex = Arc::new(DexService::new(
        bank.clone(),
        oracle_keeper.clone(),
        governance.clone(),
    ));
    let ibc = Arc::new(IbcService::new(bank, governance));

    let services = ServiceDirectory::new(vec![compute, oracle, dex, ibc]);
    ExecutionMachine::new(services, chain_id, oracle_keeper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use paw_storage::MemoryStore;

    #[tokio::test]
    async fn default_genesis_seeds_and_runs_an_empty_end_block() {
        let genesis = Genesis::default();
        let mut store = MemoryStore::new();
        genesis.apply(&mut store).expect("genesis should apply cleanly");

        let machine = build_machine(&genesis, ChainId(1));
        let events = paw_types::events::VecEventSink::new();
        machine
            .run_end_block(&mut store, 1, 0, &events)
            .await
            .expect("end block sweep should succeed against freshly seeded state");
    }
}
