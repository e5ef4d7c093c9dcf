//! The DEX module service: constant-product liquidity pools, a
//! price-time-priority limit-order book, a TWAP accumulator, and the
//! bounded end-of-block sweep that matches orders and prunes history.
//!
//! Structured the same way as `paw-compute`'s `ComputeMarketService`: a
//! struct of collaborator ports, a `#[service_interface(...)]` impl
//! block with `#[method]`-tagged handlers, and private helpers split
//! between "normal transaction" helpers (return `TransactionError`, may
//! call `BankKeeper`) and "end-of-block sweep" helpers (return
//! `StateError` only, per the dispatcher's `OnEndBlock` signature;
//! every bank transfer inside a sweep gates the order deletion/event
//! emission it precedes on `.is_ok()`, matching `IbcService`'s
//! `sweep_timed_out_escrows` — a failed transfer leaves the order in
//! place for a later sweep to retry instead of being recorded as done).

use crate::types::{
    CommitRevealRecord, LimitOrder, LpPosition, OrderSide, OrderType, Pool, PriceHistorySample,
    PriceSnapshot,
};
use async_trait::async_trait;
use paw_api::breaker;
use paw_api::lifecycle::OnEndBlock;
use paw_api::ports::{BankKeeper, GovernanceAuthority, OracleKeeper};
use paw_api::services::UpgradableService;
use paw_api::state::StateAccess;
use paw_api::transaction::context::TxContext;
use paw_macros::service_interface;
use paw_types::app::{AccountId, Coin, DenomId, Rational64};
use paw_types::codec;
use paw_types::error::{DexError, StateError, TransactionError, UpgradeError};
use paw_types::events::PawEvent;
use paw_types::keys::dex as keys;
use paw_types::service_configs::DexParams;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Module-owned escrow account, distinct from COMPUTE's `0xEE, 0x01`.
pub const ESCROW_ACCOUNT: AccountId = AccountId([
    0xEE, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
]);

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone)]
pub struct CreatePoolParams {
    pub token_a: DenomId,
    pub token_b: DenomId,
    pub amount_a: u128,
    pub amount_b: u128,
    pub swap_fee: Rational64,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone)]
pub struct AddLiquidityParams {
    pub pool_id: u64,
    pub amount_a_max: u128,
    pub amount_b_max: u128,
    pub min_shares: u128,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone)]
pub struct RemoveLiquidityParams {
    pub pool_id: u64,
    pub shares: u128,
    pub min_a: u128,
    pub min_b: u128,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone)]
pub struct SwapParams {
    pub pool_id: u64,
    pub token_in: DenomId,
    pub amount_in: u128,
    pub min_amount_out: u128,
    pub deadline_height: u64,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone)]
pub struct PlaceLimitOrderParams {
    pub pool_id: u64,
    pub side: OrderSide,
    pub price: Rational64,
    pub amount: u128,
    pub order_type: OrderType,
    pub expiry_height: u64,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone)]
pub struct CancelLimitOrderParams {
    pub order_id: u64,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone)]
pub struct CommitSwapParams {
    pub hash: [u8; 32],
    pub escrow_denom: DenomId,
    pub escrow_amount: u128,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone)]
pub struct RevealSwapParams {
    pub pool_id: u64,
    pub token_in: DenomId,
    pub amount_in: u128,
    pub min_amount_out: u128,
    pub deadline_height: u64,
    pub salt: [u8; 32],
}

pub struct DexService {
    bank: Arc<dyn BankKeeper>,
    oracle: Arc<dyn OracleKeeper>,
    governance: Arc<dyn GovernanceAuthority>,
}

impl DexService {
    pub fn new(
        bank: Arc<dyn BankKeeper>,
        oracle: Arc<dyn OracleKeeper>,
        governance: Arc<dyn GovernanceAuthority>,
    ) -> Self {
        Self { bank, oracle, governance }
    }

    fn params(&self, state: &dyn StateAccess) -> Result<DexParams, TransactionError> {
        match state.get(&keys::params_key())? {
            Some(bytes) => Ok(codec::from_bytes_canonical(&keys::params_key(), &bytes)?),
            None => Ok(DexParams::default()),
        }
    }

    fn next_pool_id(&self, state: &mut dyn StateAccess) -> Result<u64, TransactionError> {
        let key = keys::next_pool_id_key();
        let id = match state.get(&key)? {
            Some(bytes) => u64::from_be_bytes(bytes.try_into().unwrap_or([0u8; 8])),
            None => 0,
        };
        state.insert(&key, &(id + 1).to_be_bytes())?;
        Ok(id)
    }

    fn next_order_id(&self, state: &mut dyn StateAccess) -> Result<u64, TransactionError> {
        let key = keys::next_order_id_key();
        let id = match state.get(&key)? {
            Some(bytes) => u64::from_be_bytes(bytes.try_into().unwrap_or([0u8; 8])),
            None => 0,
        };
        state.insert(&key, &(id + 1).to_be_bytes())?;
        Ok(id)
    }

    fn load_pool(&self, state: &dyn StateAccess, id: u64) -> Result<Pool, TransactionError> {
        match state.get(&keys::pool_key(id))? {
            Some(bytes) => Ok(codec::from_bytes_canonical(&keys::pool_key(id), &bytes)?),
            None => Err(DexError::PoolNotFound(id).into()),
        }
    }

    fn save_pool(&self, state: &mut dyn StateAccess, pool: &Pool) -> Result<(), TransactionError> {
        state.insert(&keys::pool_key(pool.id), &codec::to_bytes_canonical(pool))?;
        Ok(())
    }

    fn load_lp_position(
        &self,
        state: &dyn StateAccess,
        pool_id: u64,
        owner: &AccountId,
    ) -> Result<Option<LpPosition>, TransactionError> {
        let key = keys::lp_position_key(pool_id, owner.as_ref());
        match state.get(&key)? {
            Some(bytes) => Ok(Some(codec::from_bytes_canonical(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    fn save_lp_position(&self, state: &mut dyn StateAccess, position: &LpPosition) -> Result<(), TransactionError> {
        let key = keys::lp_position_key(position.pool_id, position.owner.as_ref());
        state.insert(&key, &codec::to_bytes_canonical(position))?;
        Ok(())
    }

    fn load_order(&self, state: &dyn StateAccess, id: u64) -> Result<Option<LimitOrder>, TransactionError> {
        match state.get(&keys::order_key(id))? {
            Some(bytes) => Ok(Some(codec::from_bytes_canonical(&keys::order_key(id), &bytes)?)),
            None => Ok(None),
        }
    }

    fn save_order(&self, state: &mut dyn StateAccess, order: &LimitOrder) -> Result<(), TransactionError> {
        state.insert(&keys::order_key(order.id), &codec::to_bytes_canonical(order))?;
        Ok(())
    }

    fn save_order_index(&self, state: &mut dyn StateAccess, order: &LimitOrder) -> Result<(), TransactionError> {
        let rank = price_rank(&order.price, order.side);
        let key = keys::order_index_key(order.pool_id, order.side.as_byte(), rank, order.created_at, order.id);
        state.insert(&key, &order.id.to_be_bytes())?;
        Ok(())
    }

    fn delete_order(&self, state: &mut dyn StateAccess, order: &LimitOrder) -> Result<(), TransactionError> {
        state.delete(&keys::order_key(order.id))?;
        let rank = price_rank(&order.price, order.side);
        state.delete(&keys::order_index_key(order.pool_id, order.side.as_byte(), rank, order.created_at, order.id))?;
        Ok(())
    }

    fn load_snapshot(&self, state: &dyn StateAccess, pool_id: u64) -> Result<PriceSnapshot, TransactionError> {
        match state.get(&keys::price_snapshot_key(pool_id))? {
            Some(bytes) => Ok(codec::from_bytes_canonical(&keys::price_snapshot_key(pool_id), &bytes)?),
            None => Ok(PriceSnapshot { pool_id, ..Default::default() }),
        }
    }

    fn save_snapshot(&self, state: &mut dyn StateAccess, snapshot: &PriceSnapshot) -> Result<(), TransactionError> {
        state.insert(&keys::price_snapshot_key(snapshot.pool_id), &codec::to_bytes_canonical(snapshot))?;
        Ok(())
    }

    fn assert_not_paused(&self, state: &dyn StateAccess) -> Result<(), TransactionError> {
        if breaker::is_paused(state, &keys::breaker_key())? {
            return Err(DexError::ModulePaused.into());
        }
        Ok(())
    }

    fn assert_governance(&self, caller: &AccountId) -> Result<(), TransactionError> {
        if !self.governance.is_authorized(caller)? {
            return Err(DexError::Unauthorized.into());
        }
        Ok(())
    }

    /// Accumulates the pool's TWAP counters for the elapsed height since
    /// the last touch and appends a `PriceHistorySample`, so a later
    /// TWAP query can difference two samples (`spot_price` argument not
    /// needed: both directions are derived straight from reserves).
    fn accrue_twap(&self, state: &mut dyn StateAccess, pool: &Pool, height: u64) -> Result<(), TransactionError> {
        let mut snapshot = self.load_snapshot(state, pool.id)?;
        let elapsed = height.saturating_sub(snapshot.last_update_height);
        if elapsed == 0 || pool.reserve_a == 0 || pool.reserve_b == 0 {
            return Ok(());
        }
        let price_a_per_b = q64(pool.reserve_a, pool.reserve_b);
        let price_b_per_a = q64(pool.reserve_b, pool.reserve_a);
        snapshot.cumulative_price_a_per_b_q64 =
            snapshot.cumulative_price_a_per_b_q64.wrapping_add(price_a_per_b.wrapping_mul(elapsed as u128));
        snapshot.cumulative_price_b_per_a_q64 =
            snapshot.cumulative_price_b_per_a_q64.wrapping_add(price_b_per_a.wrapping_mul(elapsed as u128));
        snapshot.last_update_height = height;
        self.save_snapshot(state, &snapshot)?;

        let sample = PriceHistorySample {
            pool_id: pool.id,
            height,
            cumulative_price_a_per_b_q64: snapshot.cumulative_price_a_per_b_q64,
            cumulative_price_b_per_a_q64: snapshot.cumulative_price_b_per_a_q64,
        };
        state.insert(&keys::price_history_key(pool.id, height), &codec::to_bytes_canonical(&sample))?;
        Ok(())
    }

    /// TWAP of `reserve_b / reserve_a` over the last `lookback` heights,
    /// computed as the difference of the current accumulator and the
    /// earliest retained sample at or after the window start. `None`
    /// when the pool has no sample old enough to difference against yet
    /// (e.g. a pool younger than `lookback`) — guard (i) is then simply
    /// skipped for that swap rather than rejecting it.
    fn pool_twap_b_per_a(
        &self,
        state: &dyn StateAccess,
        pool: &Pool,
        current_height: u64,
        lookback: u64,
    ) -> Result<Option<f64>, TransactionError> {
        let snapshot = self.load_snapshot(state, pool.id)?;
        let window_start = current_height.saturating_sub(lookback);
        let mut reference: Option<PriceHistorySample> = None;
        for item in state.prefix_scan(&price_history_prefix(pool.id))? {
            let (key, value) = item?;
            let sample: PriceHistorySample = codec::from_bytes_canonical(&key, &value)?;
            if sample.height >= window_start {
                reference = Some(sample);
                break;
            }
        }
        let reference = match reference {
            Some(r) => r,
            None => return Ok(None),
        };
        let elapsed = current_height.saturating_sub(reference.height);
        if elapsed == 0 {
            return Ok(None);
        }
        let delta = snapshot.cumulative_price_b_per_a_q64.wrapping_sub(reference.cumulative_price_b_per_a_q64);
        Ok(Some(delta as f64 / elapsed as f64 / (1u128 << 64) as f64))
    }

    /// ORACLE's cross rate `token_b per token_a`, derived from each
    /// token's independently-quoted reference price. `None` if either
    /// side has no price, or either is older than
    /// `oracle_staleness_blocks`.
    fn oracle_reference_price(
        &self,
        pool: &Pool,
        current_height: u64,
        dex_params: &DexParams,
    ) -> Result<Option<f64>, TransactionError> {
        let price_a = self.oracle.get_price(&pool.token_a)?;
        let price_b = self.oracle.get_price(&pool.token_b)?;
        match (price_a, price_b) {
            (Some((pa, ha)), Some((pb, hb))) => {
                if current_height.saturating_sub(ha) > dex_params.oracle_staleness_blocks
                    || current_height.saturating_sub(hb) > dex_params.oracle_staleness_blocks
                {
                    return Ok(None);
                }
                let pa_f64 = pa.to_f64();
                if pa_f64 <= 0.0 {
                    return Ok(None);
                }
                Ok(Some(pb.to_f64() / pa_f64))
            }
            _ => Ok(None),
        }
    }

    /// Anti-manipulation guards (i) pool-TWAP deviation and ORACLE
    /// reference-price deviation. Both compare against `spot_b_per_a`,
    /// the pool's pre-trade mid price; both are skipped (not rejected)
    /// when no reference is available.
    fn assert_price_guards(
        &self,
        state: &dyn StateAccess,
        pool: &Pool,
        dex_params: &DexParams,
        spot_b_per_a: f64,
        current_height: u64,
    ) -> Result<(), TransactionError> {
        if let Some(twap) = self.pool_twap_b_per_a(state, pool, current_height, dex_params.twap_lookback)? {
            if twap > 0.0 {
                let deviation = ((spot_b_per_a - twap) / twap).abs();
                if deviation > dex_params.max_price_deviation.to_f64() {
                    return Err(DexError::PriceDeviation {
                        observed: format!("{:.8}", spot_b_per_a),
                        bound: format!("twap {:.8}, max_price_deviation {:.4}", twap, dex_params.max_price_deviation.to_f64()),
                    }
                    .into());
                }
            }
        }
        if let Some(reference) = self.oracle_reference_price(pool, current_height, dex_params)? {
            if reference > 0.0 {
                let deviation = ((spot_b_per_a - reference) / reference).abs();
                if deviation > dex_params.oracle_price_deviation.to_f64() {
                    return Err(DexError::PriceDeviation {
                        observed: format!("{:.8}", spot_b_per_a),
                        bound: format!(
                            "oracle reference {:.8}, oracle_price_deviation {:.4}",
                            reference,
                            dex_params.oracle_price_deviation.to_f64()
                        ),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Anti-manipulation guard (iv): cumulative swap-in volume over the
    /// trailing `flash_guard_window` heights may not exceed
    /// `flash_guard_cap` of `reserve_in`. Records this swap's own
    /// volume into the window after the check passes.
    fn check_flash_guard(
        &self,
        state: &mut dyn StateAccess,
        pool_id: u64,
        height: u64,
        amount_in: u128,
        reserve_in: u128,
        dex_params: &DexParams,
    ) -> Result<(), TransactionError> {
        let window_start = height.saturating_sub(dex_params.flash_guard_window);
        let mut cumulative = amount_in;
        for item in state.prefix_scan(&flash_guard_prefix(pool_id))? {
            let (key, value) = item?;
            if key.len() < 8 || value.len() != 16 {
                continue;
            }
            let mut height_arr = [0u8; 8];
            height_arr.copy_from_slice(&key[key.len() - 8..]);
            if u64::from_be_bytes(height_arr) < window_start {
                continue;
            }
            let mut amount_arr = [0u8; 16];
            amount_arr.copy_from_slice(&value);
            cumulative = cumulative.saturating_add(u128::from_be_bytes(amount_arr));
        }
        let cap = mul_div(
            reserve_in,
            dex_params.flash_guard_cap.numer().max(0) as u128,
            dex_params.flash_guard_cap.denom().max(1) as u128,
        )?;
        if cumulative > cap {
            return Err(DexError::FlashGuard.into());
        }
        let key = keys::flash_guard_key(pool_id, height);
        let existing = match state.get(&key)? {
            Some(bytes) if bytes.len() == 16 => {
                let mut arr = [0u8; 16];
                arr.copy_from_slice(&bytes);
                u128::from_be_bytes(arr)
            }
            _ => 0,
        };
        state.insert(&key, &existing.saturating_add(amount_in).to_be_bytes())?;
        Ok(())
    }

    /// Shared body for `Swap` and `RevealSwap`: both validate, move
    /// funds, and update reserves identically; only where the funds
    /// come from differs.
    fn execute_swap(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        sender: AccountId,
        params: SwapParams,
    ) -> Result<(), TransactionError> {
        self.assert_not_paused(state)?;
        if ctx.block_height > params.deadline_height {
            return Err(DexError::DeadlineExpired { deadline: params.deadline_height, now: ctx.block_height }.into());
        }
        let mut pool = self.load_pool(state, params.pool_id)?;
        self.accrue_twap(state, &pool, ctx.block_height)?;
        let dex_params = self.params(state)?;

        let (reserve_in, reserve_out, token_out, token_in_is_a) = if params.token_in == pool.token_a {
            (pool.reserve_a, pool.reserve_b, pool.token_b.clone(), true)
        } else if params.token_in == pool.token_b {
            (pool.reserve_b, pool.reserve_a, pool.token_a.clone(), false)
        } else {
            return Err(DexError::InvalidArgument("token_in is not one of the pool's tokens".into()).into());
        };

        let max_in = mul_div(
            reserve_in,
            dex_params.max_swap_size_percent.numer().max(0) as u128,
            dex_params.max_swap_size_percent.denom().max(1) as u128,
        )?;
        if params.amount_in > max_in {
            return Err(DexError::InvalidArgument("swap exceeds max_swap_size_percent of reserve_in".into()).into());
        }

        self.check_flash_guard(state, params.pool_id, ctx.block_height, params.amount_in, reserve_in, &dex_params)?;

        let spot_b_per_a = if token_in_is_a {
            reserve_out as f64 / reserve_in as f64
        } else {
            reserve_in as f64 / reserve_out as f64
        };
        self.assert_price_guards(state, &pool, &dex_params, spot_b_per_a, ctx.block_height)?;

        let amount_out = swap_output(reserve_in, reserve_out, params.amount_in, &pool.swap_fee)
            .ok_or_else(|| DexError::InvalidArgument("swap math overflow".into()))?;
        if amount_out < params.min_amount_out {
            return Err(DexError::Slippage { got: amount_out, min: params.min_amount_out }.into());
        }

        let drain_complement = complement(&dex_params.max_pool_drain_percent);
        let drain_floor = mul_div(
            reserve_out,
            drain_complement.numer().max(0) as u128,
            drain_complement.denom().max(1) as u128,
        )?;
        if reserve_out.saturating_sub(amount_out) < drain_floor {
            return Err(DexError::DrainLimit.into());
        }

        self.bank.transfer(&sender, &ESCROW_ACCOUNT, &Coin::new(params.token_in.clone(), params.amount_in))?;
        self.bank.transfer(&ESCROW_ACCOUNT, &sender, &Coin::new(token_out, amount_out))?;

        if token_in_is_a {
            pool.reserve_a += params.amount_in;
            pool.reserve_b -= amount_out;
        } else {
            pool.reserve_b += params.amount_in;
            pool.reserve_a -= amount_out;
        }
        self.save_pool(state, &pool)?;

        ctx.events.emit(
            ctx.block_height,
            PawEvent::DexSwap { pool_id: pool.id, sender, amount_in: params.amount_in, amount_out },
        );
        debug!(pool_id = pool.id, %sender, amount_in = params.amount_in, amount_out, "swap executed");
        Ok(())
    }
}

#[async_trait]
impl UpgradableService for DexService {
    async fn prepare_upgrade(&self, _new_params: &[u8]) -> Result<Vec<u8>, UpgradeError> {
        Ok(Vec::new())
    }

    async fn complete_upgrade(&self, _snapshot: &[u8]) -> Result<(), UpgradeError> {
        Ok(())
    }
}

#[service_interface(id = "dex", abi_version = 1, state_schema = "v1", capabilities = "ON_END_BLOCK")]
impl DexService {
    #[method]
    pub fn create_pool(
        &self,
        state: &mut dyn StateAccess,
        params: CreatePoolParams,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        self.assert_not_paused(state)?;
        if params.token_a == params.token_b {
            return Err(DexError::InvalidArgument("token_a and token_b must differ".into()).into());
        }
        if params.amount_a == 0 || params.amount_b == 0 {
            return Err(DexError::InvalidArgument("initial liquidity must be nonzero".into()).into());
        }
        let dex_params = self.params(state)?;
        let fee = params.swap_fee.to_f64();
        if fee < dex_params.min_swap_fee.to_f64() || fee > dex_params.max_swap_fee.to_f64() {
            return Err(DexError::InvalidArgument("swap_fee outside governance-bounded range".into()).into());
        }

        let creator = ctx.signer_account_id;
        self.bank.transfer(&creator, &ESCROW_ACCOUNT, &Coin::new(params.token_a.clone(), params.amount_a))?;
        self.bank.transfer(&creator, &ESCROW_ACCOUNT, &Coin::new(params.token_b.clone(), params.amount_b))?;

        let shares = isqrt(params.amount_a.saturating_mul(params.amount_b));
        if shares == 0 {
            return Err(DexError::InvalidArgument("initial liquidity too small to mint shares".into()).into());
        }
        let id = self.next_pool_id(state)?;
        let pool = Pool {
            id,
            token_a: params.token_a.clone(),
            token_b: params.token_b.clone(),
            reserve_a: params.amount_a,
            reserve_b: params.amount_b,
            total_shares: shares,
            swap_fee: params.swap_fee,
            created_at: ctx.block_height,
        };
        self.save_pool(state, &pool)?;
        self.save_lp_position(state, &LpPosition { pool_id: id, owner: creator, shares })?;
        self.save_snapshot(
            state,
            &PriceSnapshot {
                pool_id: id,
                cumulative_price_a_per_b_q64: 0,
                cumulative_price_b_per_a_q64: 0,
                last_update_height: ctx.block_height,
            },
        )?;

        ctx.events.emit(
            ctx.block_height,
            PawEvent::DexPoolCreated { pool_id: id, token_a: params.token_a.0, token_b: params.token_b.0 },
        );
        Ok(())
    }

    #[method]
    pub fn add_liquidity(
        &self,
        state: &mut dyn StateAccess,
        params: AddLiquidityParams,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        self.assert_not_paused(state)?;
        let mut pool = self.load_pool(state, params.pool_id)?;
        self.accrue_twap(state, &pool, ctx.block_height)?;
        let provider = ctx.signer_account_id;

        let (amount_a, amount_b) = if pool.total_shares == 0 {
            (params.amount_a_max, params.amount_b_max)
        } else {
            let amount_b_optimal = mul_div(params.amount_a_max, pool.reserve_b, pool.reserve_a)?;
            if amount_b_optimal <= params.amount_b_max {
                (params.amount_a_max, amount_b_optimal)
            } else {
                let amount_a_optimal = mul_div(params.amount_b_max, pool.reserve_a, pool.reserve_b)?;
                (amount_a_optimal, params.amount_b_max)
            }
        };

        let shares_minted = if pool.total_shares == 0 {
            isqrt(amount_a.saturating_mul(amount_b))
        } else {
            let share_a = mul_div(amount_a, pool.total_shares, pool.reserve_a)?;
            let share_b = mul_div(amount_b, pool.total_shares, pool.reserve_b)?;
            share_a.min(share_b)
        };
        if shares_minted < params.min_shares {
            return Err(DexError::Slippage { got: shares_minted, min: params.min_shares }.into());
        }
        if shares_minted == 0 {
            return Err(DexError::InvalidArgument("deposit too small to mint shares".into()).into());
        }

        self.bank.transfer(&provider, &ESCROW_ACCOUNT, &Coin::new(pool.token_a.clone(), amount_a))?;
        self.bank.transfer(&provider, &ESCROW_ACCOUNT, &Coin::new(pool.token_b.clone(), amount_b))?;

        pool.reserve_a += amount_a;
        pool.reserve_b += amount_b;
        pool.total_shares += shares_minted;
        self.save_pool(state, &pool)?;

        let mut position = self
            .load_lp_position(state, params.pool_id, &provider)?
            .unwrap_or(LpPosition { pool_id: params.pool_id, owner: provider, shares: 0 });
        position.shares += shares_minted;
        self.save_lp_position(state, &position)?;

        ctx.events.emit(
            ctx.block_height,
            PawEvent::DexLiquidityAdded { pool_id: params.pool_id, provider, shares_minted },
        );
        Ok(())
    }

    #[method]
    pub fn remove_liquidity(
        &self,
        state: &mut dyn StateAccess,
        params: RemoveLiquidityParams,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        self.assert_not_paused(state)?;
        let mut pool = self.load_pool(state, params.pool_id)?;
        self.accrue_twap(state, &pool, ctx.block_height)?;
        let provider = ctx.signer_account_id;

        let mut position = self
            .load_lp_position(state, params.pool_id, &provider)?
            .ok_or(DexError::InsufficientShares { has: 0, needs: params.shares })?;
        if position.shares < params.shares {
            return Err(DexError::InsufficientShares { has: position.shares, needs: params.shares }.into());
        }

        let amount_a = mul_div(params.shares, pool.reserve_a, pool.total_shares)?;
        let amount_b = mul_div(params.shares, pool.reserve_b, pool.total_shares)?;
        if amount_a < params.min_a || amount_b < params.min_b {
            return Err(DexError::Slippage { got: amount_a.min(amount_b), min: params.min_a.min(params.min_b) }.into());
        }

        pool.reserve_a -= amount_a;
        pool.reserve_b -= amount_b;
        pool.total_shares -= params.shares;
        position.shares -= params.shares;
        self.save_pool(state, &pool)?;
        if position.shares == 0 {
            state.delete(&keys::lp_position_key(params.pool_id, provider.as_ref()))?;
        } else {
            self.save_lp_position(state, &position)?;
        }

        self.bank.transfer(&ESCROW_ACCOUNT, &provider, &Coin::new(pool.token_a.clone(), amount_a))?;
        self.bank.transfer(&ESCROW_ACCOUNT, &provider, &Coin::new(pool.token_b.clone(), amount_b))?;

        ctx.events.emit(
            ctx.block_height,
            PawEvent::DexLiquidityRemoved { pool_id: params.pool_id, provider, shares_burned: params.shares },
        );
        Ok(())
    }

    #[method]
    pub fn swap(&self, state: &mut dyn StateAccess, params: SwapParams, ctx: &TxContext) -> Result<(), TransactionError> {
        let sender = ctx.signer_account_id;
        self.execute_swap(state, ctx, sender, params)
    }

    #[method]
    pub fn place_limit_order(
        &self,
        state: &mut dyn StateAccess,
        params: PlaceLimitOrderParams,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        self.assert_not_paused(state)?;
        if params.amount == 0 {
            return Err(DexError::InvalidArgument("amount must be nonzero".into()).into());
        }
        let pool = self.load_pool(state, params.pool_id)?;
        let price_f64 = params.price.to_f64();
        if price_f64 <= 0.0 {
            return Err(DexError::InvalidArgument("price must be positive".into()).into());
        }
        let owner = ctx.signer_account_id;

        let (denom, escrow_amount) = match params.side {
            OrderSide::Buy => (pool.token_b.clone(), (params.amount as f64 * price_f64).ceil() as u128),
            OrderSide::Sell => (pool.token_a.clone(), params.amount),
        };
        self.bank.transfer(&owner, &ESCROW_ACCOUNT, &Coin::new(denom, escrow_amount))?;

        let id = self.next_order_id(state)?;
        let order = LimitOrder {
            id,
            pool_id: params.pool_id,
            owner,
            side: params.side,
            price: params.price,
            amount: params.amount,
            remaining: params.amount,
            order_type: params.order_type,
            expiry_height: params.expiry_height,
            created_at: ctx.block_height,
        };
        self.save_order(state, &order)?;
        self.save_order_index(state, &order)?;

        ctx.events.emit(ctx.block_height, PawEvent::DexLimitOrderPlaced { order_id: id, pool_id: params.pool_id, owner });
        Ok(())
    }

    #[method]
    pub fn cancel_limit_order(
        &self,
        state: &mut dyn StateAccess,
        params: CancelLimitOrderParams,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        let order = self.load_order(state, params.order_id)?.ok_or(DexError::OrderNotFound(params.order_id))?;
        if order.owner != ctx.signer_account_id {
            return Err(DexError::Unauthorized.into());
        }
        let pool = self.load_pool(state, order.pool_id)?;
        let (denom, refund) = match order.side {
            OrderSide::Buy => (pool.token_b.clone(), (order.remaining as f64 * order.price.to_f64()).ceil() as u128),
            OrderSide::Sell => (pool.token_a.clone(), order.remaining),
        };
        self.delete_order(state, &order)?;
        self.bank.transfer(&ESCROW_ACCOUNT, &order.owner, &Coin::new(denom, refund))?;

        ctx.events.emit(ctx.block_height, PawEvent::DexLimitOrderCancelled { order_id: order.id });
        Ok(())
    }

    #[method]
    pub fn commit_swap(
        &self,
        state: &mut dyn StateAccess,
        params: CommitSwapParams,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        self.assert_not_paused(state)?;
        let sender = ctx.signer_account_id;
        let key = keys::commit_reveal_key(sender.as_ref());
        if state.get(&key)?.is_some() {
            return Err(DexError::InvalidArgument("a commitment is already pending for this sender".into()).into());
        }
        self.bank.transfer(&sender, &ESCROW_ACCOUNT, &Coin::new(params.escrow_denom.clone(), params.escrow_amount))?;
        let record = CommitRevealRecord {
            sender,
            hash: params.hash,
            commit_height: ctx.block_height,
            escrow_denom: params.escrow_denom,
            escrow_amount: params.escrow_amount,
        };
        state.insert(&key, &codec::to_bytes_canonical(&record))?;
        Ok(())
    }

    #[method]
    pub fn reveal_swap(
        &self,
        state: &mut dyn StateAccess,
        params: RevealSwapParams,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        self.assert_not_paused(state)?;
        let sender = ctx.signer_account_id;
        let record_key = keys::commit_reveal_key(sender.as_ref());
        let record: CommitRevealRecord = match state.get(&record_key)? {
            Some(bytes) => codec::from_bytes_canonical(&record_key, &bytes)?,
            None => return Err(DexError::InvalidArgument("no pending commitment for this sender".into()).into()),
        };

        let mut preimage = Vec::with_capacity(8 + params.token_in.0.len() + 16 + 16 + 8 + 32);
        preimage.extend_from_slice(&params.pool_id.to_be_bytes());
        preimage.extend_from_slice(params.token_in.0.as_bytes());
        preimage.extend_from_slice(&params.amount_in.to_be_bytes());
        preimage.extend_from_slice(&params.min_amount_out.to_be_bytes());
        preimage.extend_from_slice(&params.deadline_height.to_be_bytes());
        preimage.extend_from_slice(&params.salt);
        let computed = paw_crypto::sha256(&preimage).map_err(|e| DexError::InvalidArgument(e.to_string()))?;
        if computed != record.hash {
            return Err(DexError::InvalidArgument("revealed parameters do not match the commitment hash".into()).into());
        }
        if record.escrow_denom != params.token_in || record.escrow_amount < params.amount_in {
            return Err(DexError::InvalidArgument("escrowed funds do not cover the revealed swap".into()).into());
        }

        state.delete(&record_key)?;
        self.bank.transfer(&ESCROW_ACCOUNT, &sender, &Coin::new(record.escrow_denom, record.escrow_amount))?;

        self.execute_swap(
            state,
            ctx,
            sender,
            SwapParams {
                pool_id: params.pool_id,
                token_in: params.token_in,
                amount_in: params.amount_in,
                min_amount_out: params.min_amount_out,
                deadline_height: params.deadline_height,
            },
        )
    }

    #[method]
    pub fn update_params(
        &self,
        state: &mut dyn StateAccess,
        params: DexParams,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        self.assert_governance(&ctx.signer_account_id)?;
        state.insert(&keys::params_key(), &codec::to_bytes_canonical(&params))?;
        Ok(())
    }
}

#[async_trait]
impl OnEndBlock for DexService {
    /// Bounded end-of-block sweep (`spec.md §4.4`): match crossed limit
    /// orders, cancel any IOC order still unfilled after its one
    /// matching pass, and prune price history and flash-guard windows
    /// beyond their retention.
    async fn on_end_block(&self, state: &mut dyn StateAccess, ctx: &TxContext) -> Result<(), StateError> {
        let params = match self.params(state) {
            Ok(p) => p,
            Err(_) => DexParams::default(),
        };

        self.match_orders(state, ctx, &params)?;
        self.cancel_unfilled_ioc_orders(state, ctx, &params)?;
        self.prune_price_history(state, ctx, &params)?;
        self.prune_flash_guard_window(state, ctx, &params)?;
        Ok(())
    }
}

impl DexService {
    /// Rotates the starting pool across blocks via a persisted cursor
    /// so that no single pool's order book can starve the others of
    /// matching attempts when `match_batch` is the binding constraint.
    fn match_orders(&self, state: &mut dyn StateAccess, ctx: &TxContext, params: &DexParams) -> Result<(), StateError> {
        let pool_ids = all_pool_ids(state)?;
        if pool_ids.is_empty() {
            return Ok(());
        }
        let cursor = read_cursor(state, &keys::match_cursor_key())?;
        let start = pool_ids.iter().position(|id| *id > cursor).unwrap_or(0);
        let mut matched = 0u32;
        let mut last_pool = cursor;
        for i in 0..pool_ids.len() {
            if matched >= params.match_batch {
                break;
            }
            let pool_id = pool_ids[(start + i) % pool_ids.len()];
            loop {
                if matched >= params.match_batch {
                    break;
                }
                match try_match_pool(state, ctx, &self.bank, pool_id) {
                    Ok(true) => matched += 1,
                    Ok(false) | Err(_) => break,
                }
            }
            last_pool = pool_id;
        }
        state.insert(&keys::match_cursor_key(), &last_pool.to_be_bytes())?;
        Ok(())
    }

    fn cancel_unfilled_ioc_orders(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        params: &DexParams,
    ) -> Result<(), StateError> {
        let full = keys::order_key(0);
        let prefix = full[..full.len() - 8].to_vec();
        let mut scanned = 0u32;
        let mut to_cancel = Vec::new();
        for item in state.prefix_scan(&prefix)? {
            if scanned >= params.prune_batch {
                break;
            }
            let (key, value) = item?;
            let order: LimitOrder = match codec::from_bytes_canonical(&key, &value) {
                Ok(o) => o,
                Err(_) => continue,
            };
            scanned += 1;
            if order.order_type == OrderType::Ioc {
                to_cancel.push(order);
            }
        }
        for order in to_cancel {
            let pool = match load_pool_raw(state, order.pool_id)? {
                Some(p) => p,
                None => continue,
            };
            let (denom, refund) = match order.side {
                OrderSide::Buy => (pool.token_b.clone(), (order.remaining as f64 * order.price.to_f64()).ceil() as u128),
                OrderSide::Sell => (pool.token_a.clone(), order.remaining),
            };
            let refunded = refund == 0
                || self
                    .bank
                    .transfer(&ESCROW_ACCOUNT, &order.owner, &Coin::new(denom, refund))
                    .is_ok();
            if !refunded {
                continue;
            }
            delete_order_raw(state, &order)?;
            ctx.events.emit(ctx.block_height, PawEvent::DexLimitOrderCancelled { order_id: order.id });
        }
        Ok(())
    }

    fn prune_price_history(&self, state: &mut dyn StateAccess, ctx: &TxContext, params: &DexParams) -> Result<(), StateError> {
        if ctx.block_height <= params.twap_lookback {
            return Ok(());
        }
        let cutoff = ctx.block_height - params.twap_lookback;
        let full = keys::price_history_key(0, 0);
        let prefix = full[..full.len() - 16].to_vec();
        let mut pruned = 0u32;
        let mut to_delete = Vec::new();
        for item in state.prefix_scan(&prefix)? {
            if pruned >= params.prune_batch {
                break;
            }
            let (key, value) = item?;
            let sample: PriceHistorySample = match codec::from_bytes_canonical(&key, &value) {
                Ok(s) => s,
                Err(_) => continue,
            };
            pruned += 1;
            if sample.height < cutoff {
                to_delete.push(key.to_vec());
            }
        }
        for key in to_delete {
            state.delete(&key)?;
        }
        Ok(())
    }

    /// Same cursor-rotation fairness as `match_orders`, since an
    /// unbounded number of pools could otherwise let the earliest ones
    /// monopolize each block's prune budget.
    fn prune_flash_guard_window(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        params: &DexParams,
    ) -> Result<(), StateError> {
        let pool_ids = all_pool_ids(state)?;
        if pool_ids.is_empty() {
            return Ok(());
        }
        let cursor = read_cursor(state, &keys::prune_cursor_key())?;
        let start = pool_ids.iter().position(|id| *id > cursor).unwrap_or(0);
        let cutoff = ctx.block_height.saturating_sub(params.flash_guard_window);
        let mut pruned = 0u32;
        let mut last_pool = cursor;
        for i in 0..pool_ids.len() {
            if pruned >= params.prune_batch {
                break;
            }
            let pool_id = pool_ids[(start + i) % pool_ids.len()];
            let mut to_delete = Vec::new();
            for item in state.prefix_scan(&flash_guard_prefix(pool_id))? {
                if pruned >= params.prune_batch {
                    break;
                }
                let (key, _) = item?;
                if key.len() < 8 {
                    continue;
                }
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&key[key.len() - 8..]);
                if u64::from_be_bytes(arr) < cutoff {
                    to_delete.push(key.to_vec());
                    pruned += 1;
                }
            }
            for key in to_delete {
                state.delete(&key)?;
            }
            last_pool = pool_id;
        }
        state.insert(&keys::prune_cursor_key(), &last_pool.to_be_bytes())?;
        Ok(())
    }
}

fn read_cursor(state: &dyn StateAccess, key: &[u8]) -> Result<u64, StateError> {
    match state.get(key)? {
        Some(bytes) if bytes.len() == 8 => {
            let mut arr = [0u8; 8];
            arr.copy_from_slice(&bytes);
            Ok(u64::from_be_bytes(arr))
        }
        _ => Ok(0),
    }
}

fn all_pool_ids(state: &dyn StateAccess) -> Result<Vec<u64>, StateError> {
    let full = keys::pool_key(0);
    let prefix = full[..full.len() - 8].to_vec();
    let mut ids = Vec::new();
    for item in state.prefix_scan(&prefix)? {
        let (key, _) = item?;
        if key.len() >= 8 {
            let mut arr = [0u8; 8];
            arr.copy_from_slice(&key[key.len() - 8..]);
            ids.push(u64::from_be_bytes(arr));
        }
    }
    Ok(ids)
}

fn price_history_prefix(pool_id: u64) -> Vec<u8> {
    let full = keys::price_history_key(pool_id, 0);
    full[..full.len() - 8].to_vec()
}

fn flash_guard_prefix(pool_id: u64) -> Vec<u8> {
    let full = keys::flash_guard_key(pool_id, 0);
    full[..full.len() - 8].to_vec()
}

pub(crate) fn side_index_prefix(pool_id: u64, side: OrderSide) -> Vec<u8> {
    let full = keys::order_index_key(pool_id, side.as_byte(), 0, 0, 0);
    full[..full.len() - 24].to_vec()
}

pub(crate) fn load_pool_raw(state: &dyn StateAccess, id: u64) -> Result<Option<Pool>, StateError> {
    match state.get(&keys::pool_key(id))? {
        Some(bytes) => Ok(Some(codec::from_bytes_canonical(&keys::pool_key(id), &bytes)?)),
        None => Ok(None),
    }
}

fn save_order_raw(state: &mut dyn StateAccess, order: &LimitOrder) -> Result<(), StateError> {
    state.insert(&keys::order_key(order.id), &codec::to_bytes_canonical(order))
}

fn delete_order_raw(state: &mut dyn StateAccess, order: &LimitOrder) -> Result<(), StateError> {
    state.delete(&keys::order_key(order.id))?;
    let rank = price_rank(&order.price, order.side);
    state.delete(&keys::order_index_key(order.pool_id, order.side.as_byte(), rank, order.created_at, order.id))
}

fn best_order_in_side(state: &dyn StateAccess, pool_id: u64, side: OrderSide) -> Result<Option<LimitOrder>, StateError> {
    for item in state.prefix_scan(&side_index_prefix(pool_id, side))? {
        let (key, _) = item?;
        if key.len() < 8 {
            continue;
        }
        let mut arr = [0u8; 8];
        arr.copy_from_slice(&key[key.len() - 8..]);
        let order_id = u64::from_be_bytes(arr);
        if let Some(bytes) = state.get(&keys::order_key(order_id))? {
            if let Ok(order) = codec::from_bytes_canonical(&keys::order_key(order_id), &bytes) {
                return Ok(Some(order));
            }
        }
    }
    Ok(None)
}

/// One match attempt between the pool's best resting bid and ask.
/// Trades execute at the resting ask's price (the earlier-placed order
/// sets the price the crossing order meets). Returns `Ok(false)` when
/// the book isn't crossed so the caller can stop looping.
fn try_match_pool(
    state: &mut dyn StateAccess,
    ctx: &TxContext,
    bank: &Arc<dyn BankKeeper>,
    pool_id: u64,
) -> Result<bool, StateError> {
    let buy = best_order_in_side(state, pool_id, OrderSide::Buy)?;
    let sell = best_order_in_side(state, pool_id, OrderSide::Sell)?;
    let (mut buy, mut sell) = match (buy, sell) {
        (Some(b), Some(s)) => (b, s),
        _ => return Ok(false),
    };
    if buy.price.to_f64() + 1e-12 < sell.price.to_f64() {
        return Ok(false);
    }
    let pool = match load_pool_raw(state, pool_id)? {
        Some(p) => p,
        None => return Ok(false),
    };
    let fill = buy.remaining.min(sell.remaining);
    if fill == 0 {
        return Ok(false);
    }
    let quote_amount = (fill as f64 * sell.price.to_f64()).round() as u128;

    if bank
        .transfer(&ESCROW_ACCOUNT, &buy.owner, &Coin::new(pool.token_a.clone(), fill))
        .is_err()
    {
        return Ok(false);
    }
    if bank
        .transfer(&ESCROW_ACCOUNT, &sell.owner, &Coin::new(pool.token_b.clone(), quote_amount))
        .is_err()
    {
        return Ok(false);
    }

    buy.remaining -= fill;
    sell.remaining -= fill;

    ctx.events.emit(ctx.block_height, PawEvent::DexLimitOrderFilled { order_id: buy.id, filled_amount: fill });
    ctx.events.emit(ctx.block_height, PawEvent::DexLimitOrderFilled { order_id: sell.id, filled_amount: fill });

    settle_matched_order(state, bank, &pool, buy)?;
    settle_matched_order(state, bank, &pool, sell)?;
    Ok(true)
}

fn settle_matched_order(
    state: &mut dyn StateAccess,
    bank: &Arc<dyn BankKeeper>,
    pool: &Pool,
    order: LimitOrder,
) -> Result<(), StateError> {
    if order.remaining == 0 {
        return delete_order_raw(state, &order);
    }
    if order.order_type == OrderType::Ioc {
        let (denom, refund) = match order.side {
            OrderSide::Buy => (pool.token_b.clone(), (order.remaining as f64 * order.price.to_f64()).ceil() as u128),
            OrderSide::Sell => (pool.token_a.clone(), order.remaining),
        };
        let refunded =
            refund == 0 || bank.transfer(&ESCROW_ACCOUNT, &order.owner, &Coin::new(denom, refund)).is_ok();
        if !refunded {
            return Ok(());
        }
        delete_order_raw(state, &order)?;
        return Ok(());
    }
    save_order_raw(state, &order)
}

fn price_to_fixed(price: &Rational64) -> u64 {
    let scaled = price.to_f64().max(0.0) * (1u64 << 32) as f64;
    if scaled >= u64::MAX as f64 {
        u64::MAX
    } else {
        scaled as u64
    }
}

/// Encodes `price_rank` so ascending key order is always
/// best-price-first: ascending for SELL (cheapest ask wins), inverted
/// (`u64::MAX - price_fixed`) for BUY (highest bid wins).
fn price_rank(price: &Rational64, side: OrderSide) -> u64 {
    let fixed = price_to_fixed(price);
    match side {
        OrderSide::Sell => fixed,
        OrderSide::Buy => u64::MAX - fixed,
    }
}

fn q64(num: u128, den: u128) -> u128 {
    if den == 0 {
        return 0;
    }
    num.saturating_mul(1u128 << 64) / den
}

fn mul_div(a: u128, b: u128, c: u128) -> Result<u128, TransactionError> {
    if c == 0 {
        return Err(DexError::InvalidArgument("division by zero in pool math".into()).into());
    }
    a.checked_mul(b)
        .and_then(|v| v.checked_div(c))
        .ok_or_else(|| DexError::InvalidArgument("overflow in pool math".into()).into())
}

fn complement(fraction: &Rational64) -> Rational64 {
    let denom = fraction.denom().max(1);
    let numer = (denom - fraction.numer()).max(0);
    Rational64::new(numer, denom)
}

/// `Δy = ⌊(y × a') / (x + a')⌋` where `a' = a × (1 − fee)` (`spec.md
/// §4.4`), all in integer arithmetic to stay deterministic.
pub(crate) fn swap_output(reserve_in: u128, reserve_out: u128, amount_in: u128, fee: &Rational64) -> Option<u128> {
    if reserve_in == 0 || reserve_out == 0 || amount_in == 0 {
        return None;
    }
    let fee_numer = fee.numer().max(0) as u128;
    let fee_denom = fee.denom().max(1) as u128;
    let fee_amount = amount_in.checked_mul(fee_numer)?.checked_div(fee_denom)?;
    let amount_in_after_fee = amount_in.checked_sub(fee_amount)?;
    let numerator = reserve_out.checked_mul(amount_in_after_fee)?;
    let denominator = reserve_in.checked_add(amount_in_after_fee)?;
    if denominator == 0 {
        return None;
    }
    Some(numerator / denominator)
}

/// Integer square root via Newton's method, used for the first
/// liquidity deposit's share count (`sqrt(amount_a * amount_b)`).
fn isqrt(n: u128) -> u128 {
    if n == 0 {
        return 0;
    }
    let mut x = n;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use paw_api::services::access::ServiceDirectory;
    use paw_storage::MemoryStore;
    use paw_types::app::ChainId;
    use paw_types::events::VecEventSink;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeBank(Mutex<HashMap<(AccountId, DenomId), u128>>);

    impl FakeBank {
        fn new(seed: &[(AccountId, &str, u128)]) -> Self {
            let mut map = HashMap::new();
            for (acct, denom, amount) in seed {
                map.insert((*acct, DenomId::from(*denom)), *amount);
            }
            Self(Mutex::new(map))
        }

        fn bal(&self, account: &AccountId, denom: &str) -> u128 {
            self.0.lock().unwrap().get(&(*account, DenomId::from(denom))).copied().unwrap_or(0)
        }
    }

    impl BankKeeper for FakeBank {
        fn balance(&self, account: &AccountId, denom: &DenomId) -> Result<Coin, TransactionError> {
            let amount = self.0.lock().unwrap().get(&(*account, denom.clone())).copied().unwrap_or(0);
            Ok(Coin::new(denom.clone(), amount))
        }
        fn transfer(&self, from: &AccountId, to: &AccountId, amount: &Coin) -> Result<(), TransactionError> {
            let mut ledger = self.0.lock().unwrap();
            let key_from = (*from, amount.denom.clone());
            let from_balance = ledger.entry(key_from).or_insert(0);
            if *from_balance < amount.amount {
                return Err(TransactionError::Internal("insufficient test balance".into()));
            }
            *from_balance -= amount.amount;
            *ledger.entry((*to, amount.denom.clone())).or_insert(0) += amount.amount;
            Ok(())
        }
        fn mint(&self, to: &AccountId, amount: &Coin) -> Result<(), TransactionError> {
            *self.0.lock().unwrap().entry((*to, amount.denom.clone())).or_insert(0) += amount.amount;
            Ok(())
        }
        fn burn(&self, from: &AccountId, amount: &Coin) -> Result<(), TransactionError> {
            let mut ledger = self.0.lock().unwrap();
            let bal = ledger.entry((*from, amount.denom.clone())).or_insert(0);
            *bal = bal.saturating_sub(amount.amount);
            Ok(())
        }
    }

    struct FakeOracle(Mutex<HashMap<String, (Rational64, u64)>>);

    impl FakeOracle {
        fn empty() -> Self {
            Self(Mutex::new(HashMap::new()))
        }
    }

    impl OracleKeeper for FakeOracle {
        fn get_price(&self, denom: &DenomId) -> Result<Option<(Rational64, u64)>, TransactionError> {
            Ok(self.0.lock().unwrap().get(&denom.0).cloned())
        }
    }

    struct FakeGovernance(AccountId);

    impl GovernanceAuthority for FakeGovernance {
        fn is_authorized(&self, account: &AccountId) -> Result<bool, TransactionError> {
            Ok(*account == self.0)
        }
    }

    fn harness(
        seed: &[(AccountId, &str, u128)],
    ) -> (DexService, MemoryStore, ServiceDirectory, VecEventSink, Arc<FakeBank>) {
        let bank = Arc::new(FakeBank::new(seed));
        let svc = DexService::new(
            bank.clone(),
            Arc::new(FakeOracle::empty()),
            Arc::new(FakeGovernance(AccountId([0x99; 32]))),
        );
        (svc, MemoryStore::default(), ServiceDirectory::new(vec![]), VecEventSink::new(), bank)
    }

    fn ctx<'a>(services: &'a ServiceDirectory, events: &'a VecEventSink, signer: AccountId, height: u64) -> TxContext<'a> {
        TxContext {
            block_height: height,
            block_timestamp: height * 5,
            chain_id: ChainId(1),
            signer_account_id: signer,
            services,
            events,
            simulation: false,
            is_internal: false,
        }
    }

    #[test]
    fn create_pool_escrows_both_sides_and_mints_shares() {
        let creator = AccountId([1u8; 32]);
        let (svc, mut state, dir, events, bank) =
            harness(&[(creator, "ua", 10_000), (creator, "ub", 10_000)]);

        svc.create_pool(
            &mut state,
            CreatePoolParams {
                token_a: "ua".into(),
                token_b: "ub".into(),
                amount_a: 1_000,
                amount_b: 4_000,
                swap_fee: Rational64::new(3, 1000),
            },
            &ctx(&dir, &events, creator, 1),
        )
        .unwrap();

        let pool = svc.load_pool(&state, 0).unwrap();
        assert_eq!(pool.reserve_a, 1_000);
        assert_eq!(pool.reserve_b, 4_000);
        assert_eq!(pool.total_shares, isqrt(1_000 * 4_000));
        assert_eq!(bank.bal(&creator, "ua"), 9_000);
        assert_eq!(bank.bal(&creator, "ub"), 6_000);

        let position = svc.load_lp_position(&state, 0, &creator).unwrap().unwrap();
        assert_eq!(position.shares, pool.total_shares);
    }

    #[test]
    fn create_pool_rejects_identical_tokens() {
        let creator = AccountId([2u8; 32]);
        let (svc, mut state, dir, events, _bank) = harness(&[(creator, "ua", 10_000)]);
        let err = svc
            .create_pool(
                &mut state,
                CreatePoolParams {
                    token_a: "ua".into(),
                    token_b: "ua".into(),
                    amount_a: 100,
                    amount_b: 100,
                    swap_fee: Rational64::new(3, 1000),
                },
                &ctx(&dir, &events, creator, 1),
            )
            .unwrap_err();
        assert!(matches!(err, TransactionError::Dex(DexError::InvalidArgument(_))));
    }

    #[test]
    fn swap_respects_slippage_floor() {
        let trader = AccountId([3u8; 32]);
        let (svc, mut state, dir, events, _bank) =
            harness(&[(trader, "ua", 1_000_000), (trader, "ub", 1_000_000)]);

        svc.create_pool(
            &mut state,
            CreatePoolParams {
                token_a: "ua".into(),
                token_b: "ub".into(),
                amount_a: 100_000,
                amount_b: 100_000,
                swap_fee: Rational64::new(0, 1),
            },
            &ctx(&dir, &events, trader, 1),
        )
        .unwrap();

        let err = svc
            .swap(
                &mut state,
                SwapParams {
                    pool_id: 0,
                    token_in: "ua".into(),
                    amount_in: 1_000,
                    min_amount_out: 999_999,
                    deadline_height: 100,
                },
                &ctx(&dir, &events, trader, 2),
            )
            .unwrap_err();
        assert!(matches!(err, TransactionError::Dex(DexError::Slippage { .. })));
    }

    #[test]
    fn swap_moves_reserves_and_emits_event() {
        let trader = AccountId([4u8; 32]);
        let (svc, mut state, dir, events, bank) =
            harness(&[(trader, "ua", 1_000_000), (trader, "ub", 1_000_000)]);

        svc.create_pool(
            &mut state,
            CreatePoolParams {
                token_a: "ua".into(),
                token_b: "ub".into(),
                amount_a: 100_000,
                amount_b: 100_000,
                swap_fee: Rational64::new(0, 1),
            },
            &ctx(&dir, &events, trader, 1),
        )
        .unwrap();

        svc.swap(
            &mut state,
            SwapParams { pool_id: 0, token_in: "ua".into(), amount_in: 1_000, min_amount_out: 1, deadline_height: 100 },
            &ctx(&dir, &events, trader, 2),
        )
        .unwrap();

        let pool = svc.load_pool(&state, 0).unwrap();
        assert_eq!(pool.reserve_a, 101_000);
        assert!(pool.reserve_b < 100_000);
        assert!(bank.bal(&trader, "ub") > 1_000_000 - 1);
    }

    #[test]
    fn cancel_limit_order_refunds_escrow_and_requires_owner() {
        let owner = AccountId([5u8; 32]);
        let other = AccountId([6u8; 32]);
        let (svc, mut state, dir, events, bank) =
            harness(&[(owner, "ua", 1_000_000), (owner, "ub", 1_000_000)]);

        svc.create_pool(
            &mut state,
            CreatePoolParams {
                token_a: "ua".into(),
                token_b: "ub".into(),
                amount_a: 100_000,
                amount_b: 100_000,
                swap_fee: Rational64::new(0, 1),
            },
            &ctx(&dir, &events, owner, 1),
        )
        .unwrap();

        svc.place_limit_order(
            &mut state,
            PlaceLimitOrderParams {
                pool_id: 0,
                side: OrderSide::Sell,
                price: Rational64::new(1, 1),
                amount: 500,
                order_type: OrderType::Gtc,
                expiry_height: 1_000,
            },
            &ctx(&dir, &events, owner, 2),
        )
        .unwrap();

        let err = svc
            .cancel_limit_order(&mut state, CancelLimitOrderParams { order_id: 0 }, &ctx(&dir, &events, other, 3))
            .unwrap_err();
        assert!(matches!(err, TransactionError::Dex(DexError::Unauthorized)));

        svc.cancel_limit_order(&mut state, CancelLimitOrderParams { order_id: 0 }, &ctx(&dir, &events, owner, 3))
            .unwrap();
        assert!(svc.load_order(&state, 0).unwrap().is_none());
        assert_eq!(bank.bal(&owner, "ua"), 900_000);
    }

    #[tokio::test]
    async fn end_of_block_matches_crossed_limit_orders() {
        let buyer = AccountId([7u8; 32]);
        let seller = AccountId([8u8; 32]);
        let (svc, mut state, dir, events, bank) = harness(&[
            (buyer, "ua", 1_000_000),
            (buyer, "ub", 1_000_000),
            (seller, "ua", 1_000_000),
            (seller, "ub", 1_000_000),
        ]);

        svc.create_pool(
            &mut state,
            CreatePoolParams {
                token_a: "ua".into(),
                token_b: "ub".into(),
                amount_a: 100_000,
                amount_b: 100_000,
                swap_fee: Rational64::new(0, 1),
            },
            &ctx(&dir, &events, buyer, 1),
        )
        .unwrap();

        svc.place_limit_order(
            &mut state,
            PlaceLimitOrderParams {
                pool_id: 0,
                side: OrderSide::Sell,
                price: Rational64::new(1, 1),
                amount: 200,
                order_type: OrderType::Gtc,
                expiry_height: 1_000,
            },
            &ctx(&dir, &events, seller, 2),
        )
        .unwrap();
        svc.place_limit_order(
            &mut state,
            PlaceLimitOrderParams {
                pool_id: 0,
                side: OrderSide::Buy,
                price: Rational64::new(1, 1),
                amount: 150,
                order_type: OrderType::Gtc,
                expiry_height: 1_000,
            },
            &ctx(&dir, &events, buyer, 2),
        )
        .unwrap();

        let internal_ctx = ctx(&dir, &events, AccountId::zero(), 3);
        svc.on_end_block(&mut state, &internal_ctx).await.unwrap();

        let sell_order = svc.load_order(&state, 0).unwrap().unwrap();
        assert_eq!(sell_order.remaining, 50);
        assert!(svc.load_order(&state, 1).unwrap().is_none());
        assert_eq!(bank.bal(&buyer, "ua"), 1_000_000 - 100_000 - 1_000 + 150);
        assert_eq!(bank.bal(&seller, "ub"), 1_000_000 - 1_000 + 150);
    }

    #[tokio::test]
    async fn end_of_block_cancels_unfilled_ioc_order() {
        let trader = AccountId([9u8; 32]);
        let (svc, mut state, dir, events, bank) = harness(&[(trader, "ua", 1_000_000), (trader, "ub", 1_000_000)]);

        svc.create_pool(
            &mut state,
            CreatePoolParams {
                token_a: "ua".into(),
                token_b: "ub".into(),
                amount_a: 100_000,
                amount_b: 100_000,
                swap_fee: Rational64::new(0, 1),
            },
            &ctx(&dir, &events, trader, 1),
        )
        .unwrap();

        svc.place_limit_order(
            &mut state,
            PlaceLimitOrderParams {
                pool_id: 0,
                side: OrderSide::Sell,
                price: Rational64::new(2, 1),
                amount: 300,
                order_type: OrderType::Ioc,
                expiry_height: 1_000,
            },
            &ctx(&dir, &events, trader, 2),
        )
        .unwrap();

        let internal_ctx = ctx(&dir, &events, AccountId::zero(), 3);
        svc.on_end_block(&mut state, &internal_ctx).await.unwrap();

        assert!(svc.load_order(&state, 0).unwrap().is_none());
        assert_eq!(bank.bal(&trader, "ua"), 1_000_000 - 100_000);
    }
}
