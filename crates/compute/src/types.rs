//! COMPUTE module's on-chain data model (`spec.md §3.1`).
//!
//! Field shapes follow the teacher's `JobTicket`/`ProvisioningReceipt`
//! pattern in `services/src/compute_market/mod.rs` (a SCALE + serde
//! dual-derived struct per entity), generalized from that file's
//! placeholder two-field ticket into the full request/provider/result
//! lifecycle the module actually specifies.

use paw_types::app::{AccountId, Coin};
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

pub const MAX_COMMAND_LEN: usize = 256;

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProviderSpecs {
    pub cpu: u32,
    pub mem_mb: u64,
    pub gpu: u32,
    pub storage_gb: u64,
    pub timeout_secs: u32,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Provider {
    pub addr: AccountId,
    pub moniker: String,
    pub endpoint: String,
    pub specs: ProviderSpecs,
    /// Price per job, in the stake denomination's base units.
    pub pricing: u128,
    pub stake: Coin,
    /// 0–100.
    pub reputation: i32,
    pub completed: u64,
    pub failed: u64,
    pub slash_count: u64,
    pub active: bool,
    pub registered_at_height: u64,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Assigned,
    Processing,
    Completed,
    Failed,
    Disputed,
    Cancelled,
    TimedOut,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::TimedOut
        )
    }
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Request {
    pub id: u64,
    pub requester: AccountId,
    pub specs: ProviderSpecs,
    pub container_image: String,
    pub command: String,
    pub max_payment: Coin,
    pub provider: Option<AccountId>,
    pub status: RequestStatus,
    pub deadline: u64,
    pub created_at: u64,
    pub escrow: Coin,
}

/// Wire form of a [`paw_crypto::merkle::ProofStep`] — the crypto crate's
/// verifier type has no codec/serde impls of its own since it is a pure
/// verification routine, not a persisted shape.
#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MerkleProofStep {
    pub sibling: [u8; 32],
    pub sibling_is_left: bool,
}

/// Wire form of a [`paw_crypto::zk::Groth16Proof`], for the same reason.
#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ZkProofBytes {
    pub a: [u8; 64],
    pub b: [u8; 128],
    pub c: [u8; 64],
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JobResult {
    pub request_id: u64,
    pub provider: AccountId,
    pub output_hash: [u8; 32],
    pub output_url: String,
    pub merkle_proof: Option<Vec<MerkleProofStep>>,
    pub signature: Option<Vec<u8>>,
    pub zk_proof: Option<ZkProofBytes>,
    pub submitted_at: u64,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Dispute {
    pub id: u64,
    pub request_id: u64,
    pub challenger: AccountId,
    pub created_at: u64,
    pub resolved: bool,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Evidence {
    pub id: u64,
    pub request_id: u64,
    pub submitter: AccountId,
    pub payload: Vec<u8>,
    pub submitted_at: u64,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Appeal {
    pub id: u64,
    pub dispute_id: u64,
    pub submitter: AccountId,
    pub created_at: u64,
}

/// A refund owed to `recipient` that has been decided but not yet paid.
/// Written as part of the same state write as the decision that created
/// it (e.g. a failed `SubmitResult`), so it shares that write's
/// rollback boundary; the actual `BankKeeper` transfer happens later,
/// in the end-of-block sweep, so a transaction that ultimately errors
/// never leaves money already moved.
#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct QueuedRefund {
    pub request_id: u64,
    pub recipient: AccountId,
    pub amount: Coin,
    pub queued_at: u64,
}
