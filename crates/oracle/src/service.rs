//! The ORACLE module service: validator price submission, stake-weighted
//! median aggregation at each vote-period boundary, miss tracking, and
//! time-weighted price history.
//!
//! Structured the same way as `paw-compute`'s `ComputeMarketService` and
//! `paw-dex`'s `DexService`: collaborator ports held by `Arc`, a
//! `#[service_interface(...)]` impl block of `#[method]`-tagged
//! handlers, and an `OnEndBlock` sweep split into free, `StateError`-only
//! helper functions.

use crate::types::{AggregationMethod, Asset, CanonicalPrice, MissCounter, PriceHistorySample, ValidatorPriceVote};
use async_trait::async_trait;
use paw_api::breaker;
use paw_api::lifecycle::OnEndBlock;
use paw_api::ports::{GovernanceAuthority, StakingKeeper};
use paw_api::services::UpgradableService;
use paw_api::state::StateAccess;
use paw_api::transaction::context::TxContext;
use paw_macros::service_interface;
use paw_types::app::{AccountId, Rational64};
use paw_types::codec;
use paw_types::error::{OracleError, StateError, TransactionError, UpgradeError};
use paw_types::events::PawEvent;
use paw_types::keys::oracle as keys;
use paw_types::service_configs::OracleParams;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone)]
pub struct SubmitPriceParams {
    pub asset: String,
    pub price: Rational64,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone)]
pub struct UpdateAssetParams {
    pub denom: String,
    pub enabled: bool,
}

pub struct OracleService {
    staking: Arc<dyn StakingKeeper>,
    governance: Arc<dyn GovernanceAuthority>,
}

impl OracleService {
    pub fn new(staking: Arc<dyn StakingKeeper>, governance: Arc<dyn GovernanceAuthority>) -> Self {
        Self { staking, governance }
    }

    fn params(&self, state: &dyn StateAccess) -> Result<OracleParams, TransactionError> {
        match state.get(&keys::params_key())? {
            Some(bytes) => Ok(codec::from_bytes_canonical(&keys::params_key(), &bytes)?),
            None => Ok(OracleParams::default()),
        }
    }

    fn load_asset(&self, state: &dyn StateAccess, denom: &str) -> Result<Option<Asset>, TransactionError> {
        match state.get(&keys::asset_key(denom))? {
            Some(bytes) => Ok(Some(codec::from_bytes_canonical(&keys::asset_key(denom), &bytes)?)),
            None => Ok(None),
        }
    }

    fn assert_not_paused(&self, state: &dyn StateAccess) -> Result<(), TransactionError> {
        if breaker::is_paused(state, &keys::breaker_key())? {
            return Err(OracleError::ModulePaused.into());
        }
        Ok(())
    }

    fn assert_governance(&self, caller: &AccountId) -> Result<(), TransactionError> {
        if !self.governance.is_authorized(caller)? {
            return Err(OracleError::Unauthorized(format!("{caller}")).into());
        }
        Ok(())
    }
}

#[async_trait]
impl UpgradableService for OracleService {
    async fn prepare_upgrade(&self, _new_params: &[u8]) -> Result<Vec<u8>, UpgradeError> {
        Ok(Vec::new())
    }

    async fn complete_upgrade(&self, _snapshot: &[u8]) -> Result<(), UpgradeError> {
        Ok(())
    }
}

#[service_interface(id = "oracle", abi_version = 1, state_schema = "v1", capabilities = "ON_END_BLOCK")]
impl OracleService {
    #[method]
    pub fn submit_price(
        &self,
        state: &mut dyn StateAccess,
        params: SubmitPriceParams,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        self.assert_not_paused(state)?;
        let asset = self
            .load_asset(state, &params.asset)?
            .ok_or_else(|| OracleError::AssetNotEnabled(params.asset.clone()))?;
        if !asset.enabled {
            return Err(OracleError::AssetNotEnabled(params.asset.clone()).into());
        }
        let validator = ctx.signer_account_id;
        if !self.staking.is_active_validator(&validator)? {
            return Err(OracleError::Unauthorized(format!("{validator}")).into());
        }
        if params.price.to_f64() <= 0.0 {
            return Err(OracleError::InvalidArgument("price must be positive".into()).into());
        }

        let vote = ValidatorPriceVote {
            asset: params.asset.clone(),
            validator,
            price: params.price,
            submit_height: ctx.block_height,
        };
        let key = keys::validator_vote_key(&params.asset, validator.as_ref());
        state.insert(&key, &codec::to_bytes_canonical(&vote))?;

        ctx.events.emit(ctx.block_height, PawEvent::OraclePriceSubmitted { asset: params.asset, validator });
        debug!(%validator, "oracle price submitted");
        Ok(())
    }

    #[method]
    pub fn update_asset(
        &self,
        state: &mut dyn StateAccess,
        params: UpdateAssetParams,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        self.assert_governance(&ctx.signer_account_id)?;
        let asset = Asset { denom: params.denom.clone(), enabled: params.enabled };
        state.insert(&keys::asset_key(&params.denom), &codec::to_bytes_canonical(&asset))?;
        Ok(())
    }

    #[method]
    pub fn update_params(
        &self,
        state: &mut dyn StateAccess,
        params: OracleParams,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        self.assert_governance(&ctx.signer_account_id)?;
        state.insert(&keys::params_key(), &codec::to_bytes_canonical(&params))?;
        Ok(())
    }
}

#[async_trait]
impl OnEndBlock for OracleService {
    /// At each vote-period boundary, aggregate every asset's votes into
    /// a canonical price (or record a quorum miss). Every block, prune
    /// a bounded slice of price history across a rotating asset cursor,
    /// mirroring DEX's `prune_flash_guard_window` cursor pattern.
    async fn on_end_block(&self, state: &mut dyn StateAccess, ctx: &TxContext) -> Result<(), StateError> {
        let params = match self.params(state) {
            Ok(p) => p,
            Err(_) => OracleParams::default(),
        };

        if params.vote_period > 0 && (ctx.block_height + 1) % params.vote_period == 0 {
            self.run_vote_period_boundary(state, ctx, &params);
        }
        prune_price_history(state, ctx, &params)?;
        Ok(())
    }
}

impl OracleService {
    fn run_vote_period_boundary(&self, state: &mut dyn StateAccess, ctx: &TxContext, params: &OracleParams) {
        let assets = match all_assets(state) {
            Ok(a) => a,
            Err(e) => {
                warn!(error = %e, "failed to list assets for vote-period aggregation");
                return;
            }
        };
        for asset in assets {
            if !asset.enabled {
                continue;
            }
            if let Err(e) = self.aggregate_asset(state, ctx, &asset.denom, params) {
                warn!(asset = %asset.denom, error = %e, "vote-period aggregation failed for asset");
            }
        }
    }

    fn aggregate_asset(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        asset: &str,
        params: &OracleParams,
    ) -> Result<(), TransactionError> {
        let votes = load_votes(state, asset)?;
        let survivors = remove_outliers(&votes, params.outlier_deviation.to_f64());

        let mut contributing_stake: u128 = 0;
        for vote in &survivors {
            contributing_stake = contributing_stake.saturating_add(self.staking.stake_weight(&vote.validator)?);
        }
        let total_stake = self.staking.total_bonded_stake()?;
        let quorum_met = total_stake > 0
            && (contributing_stake as f64 / total_stake as f64) >= params.quorum_fraction.to_f64();

        let contributors: std::collections::HashSet<AccountId> = survivors.iter().map(|v| v.validator).collect();

        if quorum_met {
            if let Some(median) = stake_weighted_median(&survivors, &self.staking)? {
                let canonical = CanonicalPrice {
                    asset: asset.to_string(),
                    price: median,
                    timestamp_height: ctx.block_height,
                    contributors: survivors.len() as u32,
                    aggregation_method: AggregationMethod::StakeWeightedMedian,
                };
                state.insert(&keys::canonical_price_key(asset), &codec::to_bytes_canonical(&canonical))?;
                state.insert(
                    &keys::price_history_key(asset, ctx.block_height),
                    &codec::to_bytes_canonical(&PriceHistorySample {
                        asset: asset.to_string(),
                        height: ctx.block_height,
                        price: median,
                    }),
                )?;
                ctx.events.emit(
                    ctx.block_height,
                    PawEvent::OraclePriceAggregated { asset: asset.to_string(), contributors: survivors.len() as u32 },
                );
            }
        } else {
            ctx.events.emit(ctx.block_height, PawEvent::OracleQuorumMissed { asset: asset.to_string() });
        }

        self.update_miss_counters(state, ctx, asset, &contributors, params)?;

        for vote in &votes {
            state.delete(&keys::validator_vote_key(asset, vote.validator.as_ref()))?;
        }
        Ok(())
    }

    /// Decays the miss counter for validators who contributed this
    /// period and increments it for every other bonded validator, then
    /// requests a slash if the miss rate within the rolling window
    /// exceeds the threshold. Iterates the staking port's full bonded
    /// set rather than existing `MissCounter` records, so a validator
    /// who has never once submitted a price still accrues misses from
    /// its first missed period onward.
    fn update_miss_counters(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        asset: &str,
        contributors: &std::collections::HashSet<AccountId>,
        params: &OracleParams,
    ) -> Result<(), TransactionError> {
        let periods_per_window = (params.miss_window / params.vote_period.max(1)).max(1);

        for validator in contributors {
            let mut counter = load_or_init_miss_counter(state, validator, ctx.block_height)?;
            reset_window_if_expired(&mut counter, ctx.block_height, params.miss_window);
            counter.miss_count = counter.miss_count.saturating_sub(1);
            save_miss_counter(state, &counter)?;
        }

        for validator in self.staking.bonded_validators()? {
            if contributors.contains(&validator) {
                continue;
            }
            let mut counter = load_or_init_miss_counter(state, &validator, ctx.block_height)?;
            reset_window_if_expired(&mut counter, ctx.block_height, params.miss_window);
            counter.miss_count = (counter.miss_count + 1).min(periods_per_window);
            save_miss_counter(state, &counter)?;

            let miss_rate = counter.miss_count as f64 / periods_per_window as f64;
            if miss_rate > params.miss_slash_threshold.to_f64() {
                let fraction_bps = (params.slash_fraction.numer().max(0) as u64 * 10_000
                    / params.slash_fraction.denom().max(1) as u64) as u32;
                let _ = self.staking.request_slash(&validator, fraction_bps);
                ctx.events.emit(
                    ctx.block_height,
                    PawEvent::OracleValidatorSlashRequested { validator, fraction_bps },
                );
            }
        }
        let _ = asset;
        Ok(())
    }
}

fn all_assets(state: &dyn StateAccess) -> Result<Vec<Asset>, TransactionError> {
    let full = keys::asset_key("");
    let mut out = Vec::new();
    for item in state.prefix_scan(&full)? {
        let (key, value) = item?;
        if let Ok(asset) = codec::from_bytes_canonical::<Asset>(&key, &value) {
            out.push(asset);
        }
    }
    Ok(out)
}

fn load_votes(state: &dyn StateAccess, asset: &str) -> Result<Vec<ValidatorPriceVote>, TransactionError> {
    let mut prefix = vec![b'E', keys::VALIDATOR_VOTE];
    prefix.extend_from_slice(asset.as_bytes());
    prefix.push(0);
    let mut votes = Vec::new();
    for item in state.prefix_scan(&prefix)? {
        let (key, value) = item?;
        if let Ok(vote) = codec::from_bytes_canonical::<ValidatorPriceVote>(&key, &value) {
            votes.push(vote);
        }
    }
    Ok(votes)
}

fn load_or_init_miss_counter(
    state: &dyn StateAccess,
    validator: &AccountId,
    height: u64,
) -> Result<MissCounter, TransactionError> {
    let key = keys::miss_counter_key(validator.as_ref());
    match state.get(&key)? {
        Some(bytes) => Ok(codec::from_bytes_canonical(&key, &bytes)?),
        None => Ok(MissCounter { validator: *validator, window_start_height: height, miss_count: 0 }),
    }
}

fn save_miss_counter(state: &mut dyn StateAccess, counter: &MissCounter) -> Result<(), TransactionError> {
    state.insert(&keys::miss_counter_key(counter.validator.as_ref()), &codec::to_bytes_canonical(counter))?;
    Ok(())
}

fn reset_window_if_expired(counter: &mut MissCounter, height: u64, miss_window: u64) {
    if height.saturating_sub(counter.window_start_height) > miss_window {
        counter.window_start_height = height;
        counter.miss_count = 0;
    }
}

/// Drops votes whose price deviates from the plain (non-stake-weighted)
/// provisional median by more than `outlier_deviation`, the reference
/// point the spec calls for before stake-weighting the remainder.
fn remove_outliers(votes: &[ValidatorPriceVote], outlier_deviation: f64) -> Vec<ValidatorPriceVote> {
    if votes.is_empty() {
        return Vec::new();
    }
    let mut prices: Vec<f64> = votes.iter().map(|v| v.price.to_f64()).collect();
    prices.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let provisional_median = prices[prices.len() / 2];
    if provisional_median <= 0.0 {
        return votes.to_vec();
    }
    votes
        .iter()
        .filter(|v| ((v.price.to_f64() - provisional_median) / provisional_median).abs() <= outlier_deviation)
        .cloned()
        .collect()
}

/// Stake-weighted median: sort by price, walk cumulative stake until it
/// crosses half of the total, return that vote's price.
fn stake_weighted_median(
    votes: &[ValidatorPriceVote],
    staking: &Arc<dyn StakingKeeper>,
) -> Result<Option<Rational64>, TransactionError> {
    if votes.is_empty() {
        return Ok(None);
    }
    let mut weighted: Vec<(f64, u128)> = Vec::with_capacity(votes.len());
    let mut total_stake: u128 = 0;
    for vote in votes {
        let weight = staking.stake_weight(&vote.validator)?;
        total_stake = total_stake.saturating_add(weight);
        weighted.push((vote.price.to_f64(), weight));
    }
    if total_stake == 0 {
        weighted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        return Ok(Some(f64_to_rational(weighted[weighted.len() / 2].0)));
    }
    weighted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
    let half = total_stake as f64 / 2.0;
    let mut cumulative = 0.0;
    for (price, weight) in &weighted {
        cumulative += *weight as f64;
        if cumulative >= half {
            return Ok(Some(f64_to_rational(*price)));
        }
    }
    Ok(Some(f64_to_rational(weighted.last().unwrap().0)))
}

/// Scales to 1e6 fixed precision: the pack's `Rational64` has no
/// arithmetic impls (see `paw-dex`'s Q64.64 accumulator for the same
/// constraint), so an aggregated f64 median is converted back into an
/// exact rational at a fixed decimal precision rather than chasing an
/// irreducible fraction.
fn f64_to_rational(value: f64) -> Rational64 {
    const SCALE: i64 = 1_000_000;
    let numer = (value * SCALE as f64).round() as i64;
    Rational64::new(numer, SCALE)
}

fn prune_price_history(state: &mut dyn StateAccess, ctx: &TxContext, params: &OracleParams) -> Result<(), StateError> {
    if params.history_prune_batch == 0 {
        return Ok(());
    }
    let assets = match all_assets(state) {
        Ok(a) => a,
        Err(_) => return Ok(()),
    };
    if assets.is_empty() {
        return Ok(());
    }
    let cursor_asset = read_cursor_asset(state, &keys::history_prune_cursor_key())?;
    let start = assets.iter().position(|a| a.denom > cursor_asset).unwrap_or(0);

    let retention_heights = params.miss_window;
    let cutoff = ctx.block_height.saturating_sub(retention_heights);
    let mut pruned = 0u32;
    let mut last_asset = cursor_asset;
    for i in 0..assets.len() {
        if pruned >= params.history_prune_batch {
            break;
        }
        let asset = &assets[(start + i) % assets.len()].denom;
        let mut prefix = vec![b'E', keys::PRICE_HISTORY];
        prefix.extend_from_slice(asset.as_bytes());
        prefix.push(0);
        let mut to_delete = Vec::new();
        for item in state.prefix_scan(&prefix)? {
            if pruned >= params.history_prune_batch {
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
        last_asset = asset.clone();
    }
    state.insert(&keys::history_prune_cursor_key(), last_asset.as_bytes())?;
    Ok(())
}

fn read_cursor_asset(state: &dyn StateAccess, key: &[u8]) -> Result<String, StateError> {
    match state.get(key)? {
        Some(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        None => Ok(String::new()),
    }
}
