//! The typed event log emitted by every mutating operation.
//!
//! Mirrors the teacher's `KernelEvent` shape (a single tagged enum,
//! `Display`-able for log lines, `Serialize`-able for external
//! subscribers) but carries the PAW domain's event set instead of the
//! teacher's agentic-automation one.

use crate::app::{AccountId, Coin, Height};
use serde::{Deserialize, Serialize};

/// One event per notable state change, named to match `spec.md §6`'s
/// enumerated event list exactly.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PawEvent {
    ComputeProviderRegistered {
        addr: AccountId,
        stake: Coin,
    },
    ComputeRequestSubmitted {
        request_id: u64,
        requester: AccountId,
        max_payment: Coin,
    },
    ComputeRequestAssigned {
        request_id: u64,
        provider: AccountId,
    },
    ComputeResultVerified {
        request_id: u64,
        provider: AccountId,
    },
    ComputeRequestFailed {
        request_id: u64,
        reason: String,
    },
    ComputeRequestTimedOut {
        request_id: u64,
    },
    ComputeRequestCancelled {
        request_id: u64,
    },
    ComputeProviderSlashed {
        provider: AccountId,
        fraction_bps: u32,
    },
    ComputeDisputeOpened {
        request_id: u64,
        challenger: AccountId,
    },
    ComputeEscrowRefunded {
        request_id: u64,
    },

    DexPoolCreated {
        pool_id: u64,
        token_a: String,
        token_b: String,
    },
    DexLiquidityAdded {
        pool_id: u64,
        provider: AccountId,
        shares_minted: u128,
    },
    DexLiquidityRemoved {
        pool_id: u64,
        provider: AccountId,
        shares_burned: u128,
    },
    DexSwap {
        pool_id: u64,
        sender: AccountId,
        amount_in: u128,
        amount_out: u128,
    },
    DexLimitOrderPlaced {
        order_id: u64,
        pool_id: u64,
        owner: AccountId,
    },
    DexLimitOrderFilled {
        order_id: u64,
        filled_amount: u128,
    },
    DexLimitOrderCancelled {
        order_id: u64,
    },

    OraclePriceSubmitted {
        asset: String,
        validator: AccountId,
    },
    OraclePriceAggregated {
        asset: String,
        contributors: u32,
    },
    OracleQuorumMissed {
        asset: String,
    },
    OracleValidatorSlashRequested {
        validator: AccountId,
        fraction_bps: u32,
    },

    IbcPacketValidationFailed {
        port: String,
        channel: String,
        reason: String,
    },
    IbcPacketAcked {
        port: String,
        channel: String,
        sequence: u64,
    },
    IbcEscrowRefunded {
        port: String,
        channel: String,
        sequence: u64,
    },

    CircuitBreakerOpen {
        module: String,
    },
    CircuitBreakerClose {
        module: String,
    },
    ProviderSuspended {
        provider: AccountId,
    },
    ProviderResumed {
        provider: AccountId,
    },
}

impl PawEvent {
    /// A stable tag, independent of serde's `#[serde(tag = ...)]`
    /// rendering, used for log-line prefixes and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ComputeProviderRegistered { .. } => "compute_provider_registered",
            Self::ComputeRequestSubmitted { .. } => "compute_request_submitted",
            Self::ComputeRequestAssigned { .. } => "compute_request_assigned",
            Self::ComputeResultVerified { .. } => "compute_result_verified",
            Self::ComputeRequestFailed { .. } => "compute_request_failed",
            Self::ComputeRequestTimedOut { .. } => "compute_request_timed_out",
            Self::ComputeRequestCancelled { .. } => "compute_request_cancelled",
            Self::ComputeProviderSlashed { .. } => "compute_provider_slashed",
            Self::ComputeDisputeOpened { .. } => "compute_dispute_opened",
            Self::ComputeEscrowRefunded { .. } => "compute_escrow_refunded",
            Self::DexPoolCreated { .. } => "dex_pool_created",
            Self::DexLiquidityAdded { .. } => "dex_liquidity_added",
            Self::DexLiquidityRemoved { .. } => "dex_liquidity_removed",
            Self::DexSwap { .. } => "dex_swap",
            Self::DexLimitOrderPlaced { .. } => "dex_limit_order_placed",
            Self::DexLimitOrderFilled { .. } => "dex_limit_order_filled",
            Self::DexLimitOrderCancelled { .. } => "dex_limit_order_cancelled",
            Self::OraclePriceSubmitted { .. } => "oracle_price_submitted",
            Self::OraclePriceAggregated { .. } => "oracle_price_aggregated",
            Self::OracleQuorumMissed { .. } => "oracle_quorum_missed",
            Self::OracleValidatorSlashRequested { .. } => "oracle_validator_slash_requested",
            Self::IbcPacketValidationFailed { .. } => "ibc_packet_validation_failed",
            Self::IbcPacketAcked { .. } => "ibc_packet_acked",
            Self::IbcEscrowRefunded { .. } => "ibc_escrow_refunded",
            Self::CircuitBreakerOpen { .. } => "circuit_breaker_open",
            Self::CircuitBreakerClose { .. } => "circuit_breaker_close",
            Self::ProviderSuspended { .. } => "provider_suspended",
            Self::ProviderResumed { .. } => "provider_resumed",
        }
    }
}

/// A single entry in the block's event log: the event itself plus the
/// height it was emitted at, for consumers that subscribe to a stream
/// rather than a per-block batch.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EventRecord {
    pub height: Height,
    pub event: PawEvent,
}

/// A dyn-safe sink services emit events into during a transaction.
/// Implementations collect events for later draining into the block's
/// event log; they never reject or transform an event.
pub trait EventSink: Send + Sync {
    fn emit(&self, height: Height, event: PawEvent);
}

/// The reference `EventSink`: an append-only buffer behind a mutex. A
/// `Mutex` rather than a `RefCell` because `EventSink` must be `Sync` to
/// be held as `&dyn EventSink` across the async service-call boundary,
/// even though block execution itself is single-threaded.
#[derive(Default)]
pub struct VecEventSink(std::sync::Mutex<Vec<EventRecord>>);

impl VecEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains and returns every event recorded so far, in emission order.
    pub fn drain(&self) -> Vec<EventRecord> {
        match self.0.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl EventSink for VecEventSink {
    fn emit(&self, height: Height, event: PawEvent) {
        match self.0.lock() {
            Ok(mut guard) => guard.push(EventRecord { height, event }),
            Err(poisoned) => poisoned.into_inner().push(EventRecord { height, event }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_serde_tag_convention() {
        let ev = PawEvent::DexSwap {
            pool_id: 1,
            sender: AccountId::zero(),
            amount_in: 10,
            amount_out: 9,
        };
        assert_eq!(ev.kind(), "dex_swap");
    }

    #[test]
    fn vec_event_sink_drains_in_emission_order() {
        let sink = VecEventSink::new();
        sink.emit(1, PawEvent::ComputeRequestCancelled { request_id: 1 });
        sink.emit(1, PawEvent::ComputeRequestCancelled { request_id: 2 });
        let drained = sink.drain();
        assert_eq!(drained.len(), 2);
        assert!(sink.drain().is_empty());
    }
}
