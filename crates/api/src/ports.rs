//! Read-only collaborator ports.
//!
//! Not grounded on a single teacher file — the teacher wires its
//! modules together directly through `ServiceDirectory` lookups rather
//! than named capability ports. These traits exist because the
//! consensus engine, BANK ledger, staking/slashing registry, and
//! governance process are explicitly out of this core's scope
//! (treated as "external collaborators with named interfaces"), and
//! because DEX needs a read-only view onto ORACLE prices without a
//! hard compile-time dependency between the two crates. Each port is
//! a small, synchronous, read-only capability — no port ever mutates
//! collaborator state, matching the "external collaborator" framing.

use paw_types::app::{AccountId, Coin, DenomId};
use paw_types::error::TransactionError;

/// Base-layer account/balance ledger, external to this core.
pub trait BankKeeper: Send + Sync {
    fn balance(&self, account: &AccountId, denom: &DenomId) -> Result<Coin, TransactionError>;

    fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: &Coin,
    ) -> Result<(), TransactionError>;

    fn mint(&self, to: &AccountId, amount: &Coin) -> Result<(), TransactionError>;

    fn burn(&self, from: &AccountId, amount: &Coin) -> Result<(), TransactionError>;
}

/// The staking/slashing registry's validator set and stake weights.
pub trait StakingKeeper: Send + Sync {
    /// Whether `validator` is an active member of the current validator
    /// set, per `ORACLE §SubmitPrice`'s eligibility check.
    fn is_active_validator(&self, validator: &AccountId) -> Result<bool, TransactionError>;

    /// The validator's current stake weight, used for stake-weighted
    /// price aggregation and quorum checks.
    fn stake_weight(&self, validator: &AccountId) -> Result<u128, TransactionError>;

    /// Total stake bonded across the active validator set, the
    /// denominator for ORACLE's `quorum_fraction × total_bonded_stake`
    /// quorum check.
    fn total_bonded_stake(&self) -> Result<u128, TransactionError>;

    /// Every currently bonded validator, active or not. ORACLE's miss
    /// tracking needs the full set — a validator that has never once
    /// submitted a price still accrues misses — not just the addresses
    /// it has already seen.
    fn bonded_validators(&self) -> Result<Vec<AccountId>, TransactionError>;

    /// Requests a slash of `validator` by `fraction` of its stake (a
    /// `numer/10000` basis-point fraction), e.g. for an oracle
    /// miss-rate violation or a COMPUTE dispute loss.
    fn request_slash(&self, validator: &AccountId, fraction_bps: u32) -> Result<(), TransactionError>;
}

/// Read-only view onto ORACLE's aggregated prices, handed to the DEX
/// keeper at construction so DEX can check swap prices against an
/// external reference without a hard dependency on the oracle crate.
pub trait OracleKeeper: Send + Sync {
    /// The latest aggregated price for `denom` and the height it was
    /// set at.
    fn get_price(&self, denom: &DenomId) -> Result<Option<(paw_types::app::Rational64, u64)>, TransactionError>;
}

/// Symmetric read-only port, should ORACLE ever need a DEX-side TWAP as
/// an aggregation input. No module in this core currently implements
/// it; it exists so that dependency stays one-directional and explicit
/// if it is ever needed, rather than growing a circular construction
/// between the two keepers.
pub trait DexKeeper: Send + Sync {
    fn twap(&self, denom: &DenomId, lookback: u64) -> Result<Option<paw_types::app::Rational64>, TransactionError>;
}

/// The governance process's authority to pause/unpause modules and
/// providers, and to update module parameters.
pub trait GovernanceAuthority: Send + Sync {
    /// Whether `account` currently holds governance authority over this
    /// chain (the result of an executed proposal, external to this core).
    fn is_authorized(&self, account: &AccountId) -> Result<bool, TransactionError>;
}
