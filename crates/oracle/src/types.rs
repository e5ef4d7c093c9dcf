//! ORACLE module's on-chain data model (`spec.md §3.3`).
//!
//! Shaped the same way as COMPUTE's and DEX's `types.rs`: SCALE + serde
//! dual-derived structs, one per entity named in the spec's data model.

use paw_types::app::{AccountId, Rational64};
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub denom: String,
    pub enabled: bool,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ValidatorPriceVote {
    pub asset: String,
    pub validator: AccountId,
    pub price: Rational64,
    pub submit_height: u64,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum AggregationMethod {
    StakeWeightedMedian,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CanonicalPrice {
    pub asset: String,
    pub price: Rational64,
    pub timestamp_height: u64,
    pub contributors: u32,
    pub aggregation_method: AggregationMethod,
}

/// Rolling miss-tracking window (`spec.md §4.5` step 6–7). `window_start_height`
/// marks when the current window began; `miss_count` never exceeds the
/// window size in heights / vote_period (the max number of periods that
/// can fall inside one window).
#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct MissCounter {
    pub validator: AccountId,
    pub window_start_height: u64,
    pub miss_count: u64,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PriceHistorySample {
    pub asset: String,
    pub height: u64,
    pub price: Rational64,
}
