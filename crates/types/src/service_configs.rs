//! Per-module capability flags and governance-updatable parameter sets.
//!
//! Each `*Params` struct is exactly the configuration table named in
//! `spec.md §6`, with a `Default` impl matching the spec's stated
//! defaults. Updated only through a module's governance-gated
//! `UpdateParams` method.

use crate::app::{Coin, Rational64};
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Declares which lifecycle hooks a service participates in, so the
    /// dispatcher can downcast to `OnEndBlock`/`TxDecorator`/etc. without
    /// every service paying for hooks it doesn't use.
    #[derive(Default, Serialize, Deserialize)]
    pub struct Capabilities: u32 {
        const NONE = 0b0000;
        const TX_DECORATOR = 0b0001;
        const ON_END_BLOCK = 0b0010;
        const CREDENTIALS_VIEW = 0b0100;
    }
}

impl Encode for Capabilities {
    fn encode(&self) -> Vec<u8> {
        self.bits().encode()
    }
}

impl parity_scale_codec::EncodeLike for Capabilities {}

impl Decode for Capabilities {
    fn decode<I: parity_scale_codec::Input>(input: &mut I) -> Result<Self, parity_scale_codec::Error> {
        let bits = u32::decode(input)?;
        Self::from_bits(bits).ok_or_else(|| "invalid Capabilities bit pattern".into())
    }
}

/// COMPUTE module parameters (`spec.md §6`, COMPUTE row).
#[derive(Clone, Debug, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct ComputeParams {
    /// Height window after which nonce records become eligible for purge.
    pub nonce_retention: u64,
    /// Cap on evidence payload size, in bytes.
    pub max_evidence_size: u64,
    /// Fraction of bonded dispute-relevant stake required for a dispute
    /// to be actionable by governance.
    pub dispute_quorum: Rational64,
    /// Fraction of stake removed by a single SlashProvider call.
    pub slash_fraction: Rational64,
    /// Minimum stake a provider must lock to register.
    pub min_provider_stake: Coin,
    /// Fixed step reputation moves on slash (subtracted) or verified
    /// completion (added).
    pub reputation_slash_step: i32,
    pub reputation_gain_step: i32,
    /// Reputation floor below which a provider is auto-deactivated.
    pub active_reputation_threshold: i32,
    /// Per-block bound on nonce-purge work in the end-of-block sweep.
    pub nonce_purge_batch: u32,
    /// Per-block bound on deadline-expiry scanning.
    pub expiry_scan_batch: u32,
    /// Per-block bound on pending-request match attempts.
    pub match_scan_batch: u32,
    /// Per-block bound on queued-refund payouts in the end-of-block sweep.
    pub refund_sweep_batch: u32,
}

impl Default for ComputeParams {
    fn default() -> Self {
        Self {
            nonce_retention: 17_280,
            max_evidence_size: 10 * 1024 * 1024,
            dispute_quorum: Rational64::new(1, 3),
            slash_fraction: Rational64::new(1, 10),
            min_provider_stake: Coin::new("upaw", crate::app::ONE_PAW),
            reputation_slash_step: 10,
            reputation_gain_step: 1,
            active_reputation_threshold: 10,
            nonce_purge_batch: 100,
            expiry_scan_batch: 100,
            match_scan_batch: 100,
            refund_sweep_batch: 100,
        }
    }
}

impl ComputeParams {
    pub const MAX_EVIDENCE_SIZE_CEILING: u64 = 50 * 1024 * 1024;
    pub const MAX_EVIDENCE_SIZE_FLOOR: u64 = 1024;
    pub const MAX_COMMAND_LEN: usize = 256;

    pub fn validate(&self) -> Result<(), String> {
        if self.max_evidence_size < Self::MAX_EVIDENCE_SIZE_FLOOR
            || self.max_evidence_size > Self::MAX_EVIDENCE_SIZE_CEILING
        {
            return Err("max_evidence_size out of bounds".into());
        }
        if self.nonce_retention == 0 || self.nonce_retention > 1_000_000 {
            return Err("nonce_retention out of bounds".into());
        }
        Ok(())
    }
}

/// DEX module parameters (`spec.md §6`, DEX row).
#[derive(Clone, Debug, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct DexParams {
    pub max_pool_drain_percent: Rational64,
    pub max_price_deviation: Rational64,
    pub max_swap_size_percent: Rational64,
    pub twap_lookback: u64,
    pub min_swap_fee: Rational64,
    pub max_swap_fee: Rational64,
    /// Per-block bound on order-matching work.
    pub match_batch: u32,
    /// Per-block bound on history-pruning work.
    pub prune_batch: u32,
    /// Rolling window (in blocks) over which the flash-loan guard sums
    /// per-pool volume.
    pub flash_guard_window: u64,
    /// Cap on cumulative swap-in volume (as a fraction of reserve_in)
    /// within the flash-guard window.
    pub flash_guard_cap: Rational64,
    /// Max allowed deviation between a swap's mid-price and ORACLE's
    /// reference price before the swap is rejected. Distinct from
    /// `max_price_deviation`, which bounds deviation from the pool's own
    /// TWAP rather than an external reference.
    pub oracle_price_deviation: Rational64,
    /// Height age beyond which an ORACLE price is treated as stale and
    /// oracle validation is skipped for that swap (other guards still
    /// apply).
    pub oracle_staleness_blocks: u64,
}

impl Default for DexParams {
    fn default() -> Self {
        Self {
            max_pool_drain_percent: Rational64::new(30, 100),
            max_price_deviation: Rational64::new(50, 100),
            max_swap_size_percent: Rational64::new(10, 100),
            twap_lookback: 1_000,
            min_swap_fee: Rational64::new(0, 1),
            max_swap_fee: Rational64::new(10, 100),
            match_batch: 100,
            prune_batch: 50,
            flash_guard_window: 10,
            flash_guard_cap: Rational64::new(30, 100),
            oracle_price_deviation: Rational64::new(5, 100),
            oracle_staleness_blocks: 100,
        }
    }
}

impl DexParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_swap_size_percent.to_f64() > 0.10 {
            return Err("max_swap_size_percent may not exceed 10%".into());
        }
        if self.min_swap_fee > self.max_swap_fee {
            return Err("min_swap_fee must not exceed max_swap_fee".into());
        }
        Ok(())
    }
}

/// ORACLE module parameters (`spec.md §6`, ORACLE row).
#[derive(Clone, Debug, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct OracleParams {
    pub vote_period: u64,
    pub quorum_fraction: Rational64,
    pub outlier_deviation: Rational64,
    pub miss_window: u64,
    pub slash_fraction: Rational64,
    /// Miss rate within `miss_window` above which slashing is requested.
    pub miss_slash_threshold: Rational64,
    /// Per-block bound on per-asset history-ring cleanup.
    pub history_prune_batch: u32,
}

impl Default for OracleParams {
    fn default() -> Self {
        Self {
            vote_period: 30,
            quorum_fraction: Rational64::new(2, 3),
            outlier_deviation: Rational64::new(25, 100),
            miss_window: 10_000,
            slash_fraction: Rational64::new(1, 100),
            miss_slash_threshold: Rational64::new(1, 2),
            history_prune_batch: 50,
        }
    }
}

/// IBC module parameters (`spec.md §6`, IBC row).
#[derive(Clone, Debug, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct IbcParams {
    /// Packet/acknowledgement payload cap, in bytes, enforced before any
    /// parsing is attempted.
    pub max_payload_bytes: u64,
    /// Max allowed drift (in blocks) between a packet's carried
    /// timestamp and the receiving block's height before it is treated
    /// as replay/expired.
    pub max_timestamp_drift: u64,
    /// Height after which an un-acknowledged outbound packet's escrow
    /// becomes eligible for timeout refund.
    pub escrow_timeout: u64,
    /// Per-block bound on the timeout-refund sweep.
    pub escrow_sweep_batch: u32,
}

impl Default for IbcParams {
    fn default() -> Self {
        Self {
            max_payload_bytes: 1024 * 1024,
            max_timestamp_drift: 50,
            escrow_timeout: 1_000,
            escrow_sweep_batch: 50,
        }
    }
}

/// Genesis-time migration metadata, mirroring the teacher's
/// `MigrationConfig` shape; tracks the schema version a module's state
/// was last written under so a future upgrade can detect drift.
#[derive(Clone, Debug, PartialEq, Encode, Decode, Serialize, Deserialize, Default)]
pub struct MigrationConfig {
    pub state_schema: String,
    pub abi_version: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_params_defaults_match_spec() {
        let p = ComputeParams::default();
        assert_eq!(p.nonce_retention, 17_280);
        assert_eq!(p.max_evidence_size, 10 * 1024 * 1024);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn dex_params_defaults_match_spec() {
        let p = DexParams::default();
        assert_eq!(p.max_pool_drain_percent.to_f64(), 0.30);
        assert_eq!(p.max_swap_size_percent.to_f64(), 0.10);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn oracle_params_defaults_match_spec() {
        let p = OracleParams::default();
        assert_eq!(p.vote_period, 30);
        assert_eq!(p.miss_window, 10_000);
    }

    #[test]
    fn ibc_params_defaults_match_spec() {
        let p = IbcParams::default();
        assert_eq!(p.max_payload_bytes, 1024 * 1024);
    }

    #[test]
    fn capabilities_round_trip_through_codec() {
        let c = Capabilities::ON_END_BLOCK | Capabilities::TX_DECORATOR;
        let bytes = c.encode();
        let back = Capabilities::decode(&mut &bytes[..]).unwrap();
        assert_eq!(c, back);
    }
}
