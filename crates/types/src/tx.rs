//! The transaction envelope and its typed message payloads.
//!
//! Per `spec.md §9`, message dispatch only needs "a tagged-variant
//! representation per module, with a registry mapping the tag to a
//! handler function" — no open inheritance hierarchy. A
//! [`ChainTransaction`] is exactly that: a sender/nonce/memo envelope
//! carrying one or more [`ServiceMessage`]s, each tagged by
//! `(service_id, method)` and SCALE-encoded payload, routed at
//! execution time to the matching `BlockchainService::handle_service_call`.

use crate::app::AccountId;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

pub const MAX_MEMO_LEN: usize = 256;

#[derive(Clone, Debug, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct ServiceMessage {
    /// The target service, e.g. `"compute_market"`, `"dex"`, `"oracle"`.
    pub service_id: String,
    /// The method tag, e.g. `"submit_request@v1"`.
    pub method: String,
    /// Canonically-encoded method parameters.
    pub payload: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct ChainTransaction {
    pub sender: AccountId,
    /// Per-sender monotonic nonce, used for replay rejection.
    pub nonce: u64,
    /// Optional free-text memo, capped at [`MAX_MEMO_LEN`] bytes.
    pub memo: Option<String>,
    pub messages: Vec<ServiceMessage>,
}

impl ChainTransaction {
    pub fn validate_basic(&self) -> Result<(), String> {
        if self.messages.is_empty() {
            return Err("transaction carries no messages".into());
        }
        if let Some(memo) = &self.memo {
            if memo.len() > MAX_MEMO_LEN {
                return Err(format!("memo exceeds {MAX_MEMO_LEN} bytes"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_message_list() {
        let tx = ChainTransaction {
            sender: AccountId::zero(),
            nonce: 1,
            memo: None,
            messages: vec![],
        };
        assert!(tx.validate_basic().is_err());
    }

    #[test]
    fn rejects_oversized_memo() {
        let tx = ChainTransaction {
            sender: AccountId::zero(),
            nonce: 1,
            memo: Some("x".repeat(MAX_MEMO_LEN + 1)),
            messages: vec![ServiceMessage {
                service_id: "dex".into(),
                method: "swap@v1".into(),
                payload: vec![],
            }],
        };
        assert!(tx.validate_basic().is_err());
    }
}
