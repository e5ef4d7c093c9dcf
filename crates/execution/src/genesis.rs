//! Genesis seeding: the one-time state writes that bootstrap a chain
//! before the first block is executed.
//!
//! Mirrors the shape of the teacher's `load_or_initialize_status`
//! genesis branch (`kernel/crates/execution/src/app/mod.rs`) but
//! without its status/timing/service-meta bookkeeping, none of which
//! this simplified core carries (`paw-node` has no `ChainStatus`
//! concept — block height is just whatever the caller passes into
//! `ExecutionMachine::apply_transaction`/`run_end_block`). What remains
//! is writing each module's governance-seeded entities directly into
//! state, the same way the teacher writes `ActiveServiceMeta` directly
//! rather than dispatching a transaction for it.

use paw_ibc::types::ChannelAuth;
use paw_oracle::types::Asset;
use paw_types::app::{AccountId, Coin};
use paw_types::codec;
use paw_types::error::StateError;
use paw_types::service_configs::{ComputeParams, DexParams, IbcParams, OracleParams};
use paw_types::keys::{compute, dex, ibc, oracle};
use serde::{Deserialize, Serialize};

/// Everything needed to seed a fresh chain. Deserializable from the
/// node's genesis TOML/JSON file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Genesis {
    /// Initial `(account, denom, amount)` balances, handed to
    /// [`crate::collaborators::SimpleBank`] rather than written into
    /// the canonical state (BANK is an external collaborator).
    pub balances: Vec<(AccountId, Coin)>,
    /// Initial validator stake weights, handed to
    /// [`crate::collaborators::SimpleStaking`].
    pub validators: Vec<(AccountId, u128)>,
    /// The account authorized to call every module's governance-gated
    /// methods, handed to [`crate::collaborators::SimpleGovernance`].
    pub governance_authority: AccountId,
    /// ORACLE assets enabled for price submission at genesis.
    pub oracle_assets: Vec<String>,
    /// IBC channels authorized at genesis.
    pub ibc_channels: Vec<ChannelAuth>,
    /// Per-module parameter overrides; `None` keeps the module's
    /// `Default`.
    pub compute_params: Option<ComputeParams>,
    pub dex_params: Option<DexParams>,
    pub oracle_params: Option<OracleParams>,
    pub ibc_params: Option<IbcParams>,
    /// The compute-result circuit's Groth16 verifying key, handed to
    /// [`paw_crypto::zk::install_verifying_key`] rather than written
    /// into state (it is a process-cached verifier input, not chain
    /// data). `None` leaves COMPUTE's zk verification tier disabled:
    /// any `SubmitResult` carrying a `zk_proof` is then rejected as
    /// unverifiable rather than silently skipped.
    pub zk_verifying_key: Option<paw_crypto::zk::VerifyingKeyConfig>,
}

impl Genesis {
    /// Writes every governance-seeded entity directly into state. Must
    /// run exactly once, before the first call to
    /// `ExecutionMachine::apply_transaction`.
    pub fn apply(&self, state: &mut dyn paw_api::StateAccess) -> Result<(), StateError> {
        if let Some(params) = &self.compute_params {
            state.insert(&compute::params_key(), &codec::to_bytes_canonical(params))?;
        }
        if let Some(params) = &self.dex_params {
            state.insert(&dex::params_key(), &codec::to_bytes_canonical(params))?;
        }
        if let Some(params) = &self.oracle_params {
            state.insert(&oracle::params_key(), &codec::to_bytes_canonical(params))?;
        }
        if let Some(params) = &self.ibc_params {
            state.insert(&ibc::params_key(), &codec::to_bytes_canonical(params))?;
        }

        for denom in &self.oracle_assets {
            let asset = Asset {
                denom: denom.clone(),
                enabled: true,
            };
            state.insert(&oracle::asset_key(denom), &codec::to_bytes_canonical(&asset))?;
        }

        for auth in &self.ibc_channels {
            state.insert(
                &ibc::channel_auth_key(&auth.port, &auth.channel),
                &codec::to_bytes_canonical(auth),
            )?;
        }

        tracing::info!(
            balances = self.balances.len(),
            validators = self.validators.len(),
            oracle_assets = self.oracle_assets.len(),
            ibc_channels = self.ibc_channels.len(),
            "applied genesis state"
        );
        Ok(())
    }
}
