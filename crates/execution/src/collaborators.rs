//! Minimal concrete implementations of `paw-api`'s read-only
//! collaborator ports, standing in for the out-of-scope BANK ledger,
//! staking/slashing registry, and governance process so the node can
//! actually run end to end.
//!
//! None of these are grounded on a teacher module — the teacher wires
//! its modules against its own BANK/staking/governance crates, which
//! `spec.md §1` places explicitly out of this core's scope. Each
//! collaborator owns its own internal state, entirely separate from
//! the block's canonical `StateAccess`, matching the ports' own
//! signatures (none of them take a `&dyn StateAccess` parameter).
//! [`SimpleOracleKeeper`] is the one exception worth calling out: since
//! it must reflect ORACLE's canonical prices, which *do* live in the
//! block's real state, `paw-execution` refreshes its cache once per
//! block from the committed state rather than giving it a live
//! `StateAccess` handle (see `ExecutionMachine::run_end_block`).

use paw_types::app::{AccountId, Coin, DenomId, Rational64};
use paw_types::error::TransactionError;
use std::collections::HashMap;
use std::sync::Mutex;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// An in-memory ledger keyed by `(account, denom)`, seeded from genesis
/// balances. Stands in for the out-of-scope BANK module; balance
/// failures are reported via `TransactionError::Internal` since a
/// dedicated BANK error taxonomy is out of this core's scope.
#[derive(Default)]
pub struct SimpleBank {
    balances: Mutex<HashMap<(AccountId, DenomId), u128>>,
}

impl SimpleBank {
    pub fn new(initial: impl IntoIterator<Item = (AccountId, Coin)>) -> Self {
        let mut balances = HashMap::new();
        for (account, coin) in initial {
            *balances.entry((account, coin.denom)).or_insert(0) += coin.amount;
        }
        Self {
            balances: Mutex::new(balances),
        }
    }
}

impl paw_api::ports::BankKeeper for SimpleBank {
    fn balance(&self, account: &AccountId, denom: &DenomId) -> Result<Coin, TransactionError> {
        let amount = lock(&self.balances)
            .get(&(*account, denom.clone()))
            .copied()
            .unwrap_or(0);
        Ok(Coin::new(denom.clone(), amount))
    }

    fn transfer(&self, from: &AccountId, to: &AccountId, amount: &Coin) -> Result<(), TransactionError> {
        let mut balances = lock(&self.balances);
        let from_key = (*from, amount.denom.clone());
        let have = balances.get(&from_key).copied().unwrap_or(0);
        if have < amount.amount {
            return Err(TransactionError::Internal(format!(
                "insufficient balance: {from} has {have} {}, needs {}",
                amount.denom, amount.amount
            )));
        }
        balances.insert(from_key, have - amount.amount);
        *balances.entry((*to, amount.denom.clone())).or_insert(0) += amount.amount;
        Ok(())
    }

    fn mint(&self, to: &AccountId, amount: &Coin) -> Result<(), TransactionError> {
        *lock(&self.balances).entry((*to, amount.denom.clone())).or_insert(0) += amount.amount;
        Ok(())
    }

    fn burn(&self, from: &AccountId, amount: &Coin) -> Result<(), TransactionError> {
        let mut balances = lock(&self.balances);
        let key = (*from, amount.denom.clone());
        let have = balances.get(&key).copied().unwrap_or(0);
        if have < amount.amount {
            return Err(TransactionError::Internal(format!(
                "insufficient balance to burn: {from} has {have} {}, needs {}",
                amount.denom, amount.amount
            )));
        }
        balances.insert(key, have - amount.amount);
        Ok(())
    }
}

/// A fixed, genesis-loaded validator set and stake-weight table.
/// Stands in for the out-of-scope staking/slashing registry;
/// `request_slash` only logs since there is no real stake to burn.
pub struct SimpleStaking {
    weights: HashMap<AccountId, u128>,
    total: u128,
}

impl SimpleStaking {
    pub fn new(weights: impl IntoIterator<Item = (AccountId, u128)>) -> Self {
        let weights: HashMap<AccountId, u128> = weights.into_iter().collect();
        let total = weights.values().sum();
        Self { weights, total }
    }
}

impl paw_api::ports::StakingKeeper for SimpleStaking {
    fn is_active_validator(&self, validator: &AccountId) -> Result<bool, TransactionError> {
        Ok(self.weights.contains_key(validator))
    }

    fn stake_weight(&self, validator: &AccountId) -> Result<u128, TransactionError> {
        Ok(self.weights.get(validator).copied().unwrap_or(0))
    }

    fn total_bonded_stake(&self) -> Result<u128, TransactionError> {
        Ok(self.total)
    }

    fn bonded_validators(&self) -> Result<Vec<AccountId>, TransactionError> {
        Ok(self.weights.keys().copied().collect())
    }

    fn request_slash(&self, validator: &AccountId, fraction_bps: u32) -> Result<(), TransactionError> {
        tracing::info!(
            %validator,
            fraction_bps,
            "slash requested against validator (staking module is out of scope, not applied)"
        );
        Ok(())
    }
}

/// A single designated governance authority account. Stands in for the
/// out-of-scope governance process; every `*::update_params`/pause
/// method checks `is_authorized` against this account.
pub struct SimpleGovernance {
    authority: AccountId,
}

impl SimpleGovernance {
    pub fn new(authority: AccountId) -> Self {
        Self { authority }
    }
}

impl paw_api::ports::GovernanceAuthority for SimpleGovernance {
    fn is_authorized(&self, account: &AccountId) -> Result<bool, TransactionError> {
        Ok(*account == self.authority)
    }
}

/// A read-only cache of ORACLE's canonical prices, refreshed once per
/// block by `ExecutionMachine::run_end_block` from the committed state
/// (see module docs for why this isn't a live `StateAccess` handle).
#[derive(Default)]
pub struct SimpleOracleKeeper {
    prices: Mutex<HashMap<String, (Rational64, u64)>>,
}

impl SimpleOracleKeeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh(&self, prices: HashMap<String, (Rational64, u64)>) {
        *lock(&self.prices) = prices;
    }
}

impl paw_api::ports::OracleKeeper for SimpleOracleKeeper {
    fn get_price(&self, denom: &DenomId) -> Result<Option<(Rational64, u64)>, TransactionError> {
        Ok(lock(&self.prices).get(&denom.0).copied())
    }
}

/// Unused symmetric port (no module in this core calls it yet, see
/// `paw-api::ports::DexKeeper`); kept so `paw-execution` can wire it up
/// the moment ORACLE grows a DEX-side TWAP input.
#[derive(Default)]
pub struct UnimplementedDexKeeper;

impl paw_api::ports::DexKeeper for UnimplementedDexKeeper {
    fn twap(&self, _denom: &DenomId, _lookback: u64) -> Result<Option<Rational64>, TransactionError> {
        Ok(None)
    }
}
