//! DEX module's on-chain data model (`spec.md §3.2`).
//!
//! Shaped the same way as COMPUTE's `types.rs`: SCALE + serde
//! dual-derived structs, one per entity named in the spec's data model.

use paw_types::app::{AccountId, DenomId, Rational64};
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Pool {
    pub id: u64,
    pub token_a: DenomId,
    pub token_b: DenomId,
    pub reserve_a: u128,
    pub reserve_b: u128,
    pub total_shares: u128,
    pub swap_fee: Rational64,
    pub created_at: u64,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LpPosition {
    pub pool_id: u64,
    pub owner: AccountId,
    pub shares: u128,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_byte(&self) -> u8 {
        match self {
            Self::Buy => 0,
            Self::Sell => 1,
        }
    }
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    /// Good-till-cancelled: stays on the book until filled, cancelled, or
    /// expired.
    Gtc,
    /// Immediate-or-cancel: any unfilled remainder is cancelled and
    /// refunded at the same end-of-block pass that tried to match it.
    Ioc,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LimitOrder {
    pub id: u64,
    pub pool_id: u64,
    pub owner: AccountId,
    pub side: OrderSide,
    pub price: Rational64,
    pub amount: u128,
    pub remaining: u128,
    pub order_type: OrderType,
    pub expiry_height: u64,
    pub created_at: u64,
}

/// The pool's current TWAP accumulator state (`spec.md §4.4`).
///
/// Prices are accumulated as Q64.64 fixed-point integers rather than
/// `Rational64`: `Rational64` has no arithmetic impls of its own (it
/// exists for exact single-value fractions like fees and deviation
/// bounds), and a running sum of reduced fractions over many blocks
/// would either overflow an `i64` numerator immediately or need
/// arbitrary-precision rationals. A wrapping fixed-point accumulator —
/// the same shape Uniswap V2's `UQ112x112` cumulative price uses — gives
/// a deterministic, bounded-width running sum; a TWAP is the difference
/// of two samples divided by elapsed height, same as the spec describes.
#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct PriceSnapshot {
    pub pool_id: u64,
    pub cumulative_price_a_per_b_q64: u128,
    pub cumulative_price_b_per_a_q64: u128,
    pub last_update_height: u64,
}

/// One ring-buffer sample of a pool's accumulator, retained for
/// `twap_lookback` heights so a TWAP over an arbitrary sub-window can be
/// computed as a difference of two samples.
#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PriceHistorySample {
    pub pool_id: u64,
    pub height: u64,
    pub cumulative_price_a_per_b_q64: u128,
    pub cumulative_price_b_per_a_q64: u128,
}

/// Governance-gated anti-front-running record: `CommitSwap` locks the
/// swap's funds against a hash of its parameters; `RevealSwap` supplies
/// the preimage and executes.
#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CommitRevealRecord {
    pub sender: AccountId,
    pub hash: [u8; 32],
    pub commit_height: u64,
    pub escrow_denom: DenomId,
    pub escrow_amount: u128,
}
