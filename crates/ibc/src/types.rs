//! IBC module's on-chain data model (`spec.md §3.4`).
//!
//! Shaped the same way as the other modules' `types.rs`: SCALE + serde
//! dual-derived structs, one per entity named in the spec's data model.

use paw_types::app::AccountId;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// A governance-managed `{port, channel}` allowlist entry. `ordered`
/// mirrors the spec's channel-ordering note: COMPUTE's channel is
/// ordered (strictly increasing sequence), DEX's and ORACLE's are not.
#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChannelAuth {
    pub port: String,
    pub channel: String,
    pub ordered: bool,
    pub authorized: bool,
}

/// The packet structure routed by `receive_packet`. `method`/`params`
/// are the same `(method, params)` pair a `ServiceMessage` would carry
/// for a local call — `port` selects the target service by id.
#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Packet {
    pub port: String,
    pub channel: String,
    pub sequence: u64,
    pub sender: AccountId,
    pub nonce: u64,
    pub timestamp: u64,
    pub method: String,
    pub params: Vec<u8>,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Acknowledgement {
    Success,
    Error(String),
}

/// A sent packet awaiting relay, binding the packet's `(port, channel,
/// sequence)` to the relay payload and, if its effect reserved local
/// assets, the escrow it owns (`amount` is `0` otherwise). Cleared on a
/// success acknowledgement; escrowed funds are refunded on an error
/// acknowledgement or on timeout.
#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PendingEscrow {
    pub port: String,
    pub channel: String,
    pub sequence: u64,
    pub sender: AccountId,
    pub method: String,
    pub params: Vec<u8>,
    pub denom: String,
    pub amount: u128,
    pub created_at: u64,
}
