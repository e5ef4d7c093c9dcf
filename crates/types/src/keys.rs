//! Canonical state-key constants and builders.
//!
//! Every module owns a single-byte prefix; suffix layout is fixed per
//! entity so iteration order is deterministic lexicographic order on the
//! raw key bytes, per the KV contract. Collisions across modules are
//! prevented by the prefix byte alone — never reuse one.

/// COMPUTE module prefixes.
pub mod compute {
    pub const PROVIDER: u8 = 0x01;
    pub const SIGNING_KEY: u8 = 0x02;
    pub const REQUEST: u8 = 0x03;
    pub const RESULT: u8 = 0x04;
    pub const DISPUTE: u8 = 0x05;
    pub const EVIDENCE: u8 = 0x06;
    pub const APPEAL: u8 = 0x07;
    pub const NONCE: u8 = 0x08;
    pub const NEXT_REQUEST_ID: u8 = 0x09;
    pub const PARAMS: u8 = 0x0a;
    pub const BREAKER: u8 = 0x0b;
    pub const PROVIDER_BREAKER: u8 = 0x0c;
    pub const NONCE_PURGE_CURSOR: u8 = 0x0d;
    pub const REPUTATION_CURSOR: u8 = 0x0e;
    pub const MATCH_CURSOR: u8 = 0x0f;
    pub const QUEUED_REFUND: u8 = 0x10;
    pub const REFUND_SWEEP_CURSOR: u8 = 0x11;

    pub fn provider_key(addr: &[u8]) -> Vec<u8> {
        prefixed(PROVIDER, addr)
    }

    pub fn signing_key_key(addr: &[u8]) -> Vec<u8> {
        prefixed(SIGNING_KEY, addr)
    }

    pub fn request_key(id: u64) -> Vec<u8> {
        prefixed(REQUEST, &id.to_be_bytes())
    }

    pub fn result_key(request_id: u64) -> Vec<u8> {
        prefixed(RESULT, &request_id.to_be_bytes())
    }

    pub fn nonce_key(sender: &[u8], nonce: u64) -> Vec<u8> {
        let mut suffix = Vec::with_capacity(sender.len() + 8);
        suffix.extend_from_slice(sender);
        suffix.extend_from_slice(&nonce.to_be_bytes());
        prefixed(NONCE, &suffix)
    }

    pub fn dispute_key(id: u64) -> Vec<u8> {
        prefixed(DISPUTE, &id.to_be_bytes())
    }

    pub fn evidence_key(id: u64) -> Vec<u8> {
        prefixed(EVIDENCE, &id.to_be_bytes())
    }

    pub fn appeal_key(id: u64) -> Vec<u8> {
        prefixed(APPEAL, &id.to_be_bytes())
    }

    pub fn provider_breaker_key(addr: &[u8]) -> Vec<u8> {
        prefixed(PROVIDER_BREAKER, addr)
    }

    pub fn params_key() -> Vec<u8> {
        prefixed(PARAMS, &[])
    }

    pub fn breaker_key() -> Vec<u8> {
        prefixed(BREAKER, &[])
    }

    pub fn queued_refund_key(request_id: u64) -> Vec<u8> {
        prefixed(QUEUED_REFUND, &request_id.to_be_bytes())
    }

    pub fn refund_sweep_cursor_key() -> Vec<u8> {
        prefixed(REFUND_SWEEP_CURSOR, &[])
    }

    fn prefixed(prefix: u8, suffix: &[u8]) -> Vec<u8> {
        super::prefixed(MODULE, prefix, suffix)
    }

    const MODULE: u8 = b'C';
}

/// DEX module prefixes.
pub mod dex {
    pub const POOL: u8 = 0x01;
    pub const LP_POSITION: u8 = 0x02;
    pub const ORDER: u8 = 0x03;
    pub const ORDER_INDEX: u8 = 0x04;
    pub const PRICE_SNAPSHOT: u8 = 0x05;
    pub const PRICE_HISTORY: u8 = 0x06;
    pub const COMMIT_REVEAL: u8 = 0x07;
    pub const NEXT_POOL_ID: u8 = 0x08;
    pub const NEXT_ORDER_ID: u8 = 0x09;
    pub const PARAMS: u8 = 0x0a;
    pub const BREAKER: u8 = 0x0b;
    pub const MATCH_CURSOR: u8 = 0x0c;
    pub const PRUNE_CURSOR: u8 = 0x0d;
    pub const FLASH_GUARD_WINDOW: u8 = 0x0e;

    pub fn pool_key(id: u64) -> Vec<u8> {
        prefixed(POOL, &id.to_be_bytes())
    }

    pub fn lp_position_key(pool_id: u64, owner: &[u8]) -> Vec<u8> {
        let mut suffix = Vec::with_capacity(8 + owner.len());
        suffix.extend_from_slice(&pool_id.to_be_bytes());
        suffix.extend_from_slice(owner);
        prefixed(LP_POSITION, &suffix)
    }

    pub fn order_key(id: u64) -> Vec<u8> {
        prefixed(ORDER, &id.to_be_bytes())
    }

    /// Secondary index key: `(pool_id, side, price_rank, created_at, order_id)`
    /// sorted so that scanning in key order gives price-time priority.
    /// Callers encode `price_rank` so ascending key order is always
    /// best-price-first: ascending for SELL, inverted (`u64::MAX -
    /// price_fixed`) for BUY.
    pub fn order_index_key(pool_id: u64, side: u8, price_rank: u64, created_at: u64, order_id: u64) -> Vec<u8> {
        let mut suffix = Vec::with_capacity(8 + 1 + 8 + 8 + 8);
        suffix.extend_from_slice(&pool_id.to_be_bytes());
        suffix.push(side);
        suffix.extend_from_slice(&price_rank.to_be_bytes());
        suffix.extend_from_slice(&created_at.to_be_bytes());
        suffix.extend_from_slice(&order_id.to_be_bytes());
        prefixed(ORDER_INDEX, &suffix)
    }

    pub fn price_snapshot_key(pool_id: u64) -> Vec<u8> {
        prefixed(PRICE_SNAPSHOT, &pool_id.to_be_bytes())
    }

    pub fn price_history_key(pool_id: u64, height: u64) -> Vec<u8> {
        let mut suffix = Vec::with_capacity(16);
        suffix.extend_from_slice(&pool_id.to_be_bytes());
        suffix.extend_from_slice(&height.to_be_bytes());
        prefixed(PRICE_HISTORY, &suffix)
    }

    pub fn commit_reveal_key(sender: &[u8]) -> Vec<u8> {
        prefixed(COMMIT_REVEAL, sender)
    }

    pub fn next_pool_id_key() -> Vec<u8> {
        prefixed(NEXT_POOL_ID, &[])
    }

    pub fn next_order_id_key() -> Vec<u8> {
        prefixed(NEXT_ORDER_ID, &[])
    }

    pub fn params_key() -> Vec<u8> {
        prefixed(PARAMS, &[])
    }

    pub fn breaker_key() -> Vec<u8> {
        prefixed(BREAKER, &[])
    }

    pub fn match_cursor_key() -> Vec<u8> {
        prefixed(MATCH_CURSOR, &[])
    }

    pub fn prune_cursor_key() -> Vec<u8> {
        prefixed(PRUNE_CURSOR, &[])
    }

    pub fn flash_guard_key(pool_id: u64, height: u64) -> Vec<u8> {
        let mut suffix = Vec::with_capacity(16);
        suffix.extend_from_slice(&pool_id.to_be_bytes());
        suffix.extend_from_slice(&height.to_be_bytes());
        prefixed(FLASH_GUARD_WINDOW, &suffix)
    }

    fn prefixed(prefix: u8, suffix: &[u8]) -> Vec<u8> {
        super::prefixed(MODULE, prefix, suffix)
    }

    const MODULE: u8 = b'D';
}

/// ORACLE module prefixes.
pub mod oracle {
    pub const ASSET: u8 = 0x01;
    pub const VALIDATOR_VOTE: u8 = 0x02;
    pub const CANONICAL_PRICE: u8 = 0x03;
    pub const MISS_COUNTER: u8 = 0x04;
    pub const PRICE_HISTORY: u8 = 0x05;
    pub const PARAMS: u8 = 0x06;
    pub const BREAKER: u8 = 0x07;
    pub const PERIOD_CURSOR: u8 = 0x08;
    pub const HISTORY_PRUNE_CURSOR: u8 = 0x09;

    pub fn asset_key(denom: &str) -> Vec<u8> {
        prefixed(ASSET, denom.as_bytes())
    }

    pub fn validator_vote_key(asset: &str, validator: &[u8]) -> Vec<u8> {
        let mut suffix = Vec::with_capacity(asset.len() + 1 + validator.len());
        suffix.extend_from_slice(asset.as_bytes());
        suffix.push(0);
        suffix.extend_from_slice(validator);
        prefixed(VALIDATOR_VOTE, &suffix)
    }

    pub fn canonical_price_key(asset: &str) -> Vec<u8> {
        prefixed(CANONICAL_PRICE, asset.as_bytes())
    }

    pub fn miss_counter_key(validator: &[u8]) -> Vec<u8> {
        prefixed(MISS_COUNTER, validator)
    }

    pub fn price_history_key(asset: &str, height: u64) -> Vec<u8> {
        let mut suffix = Vec::with_capacity(asset.len() + 1 + 8);
        suffix.extend_from_slice(asset.as_bytes());
        suffix.push(0);
        suffix.extend_from_slice(&height.to_be_bytes());
        prefixed(PRICE_HISTORY, &suffix)
    }

    pub fn params_key() -> Vec<u8> {
        prefixed(PARAMS, &[])
    }

    pub fn breaker_key() -> Vec<u8> {
        prefixed(BREAKER, &[])
    }

    /// Persisted cursor for the asset rotated through by the
    /// per-asset history-ring cleanup pass.
    pub fn history_prune_cursor_key() -> Vec<u8> {
        prefixed(HISTORY_PRUNE_CURSOR, &[])
    }

    fn prefixed(prefix: u8, suffix: &[u8]) -> Vec<u8> {
        super::prefixed(MODULE, prefix, suffix)
    }

    const MODULE: u8 = b'E';
}

/// Inter-chain packet layer (F) prefixes.
pub mod ibc {
    pub const CHANNEL_AUTH: u8 = 0x01;
    pub const PENDING_ESCROW: u8 = 0x02;
    pub const PACKET_REPLAY: u8 = 0x03;
    pub const PARAMS: u8 = 0x04;
    pub const BREAKER: u8 = 0x05;
    pub const NEXT_SEQUENCE: u8 = 0x06;
    pub const ORDERED_CURSOR: u8 = 0x07;

    pub fn params_key() -> Vec<u8> {
        prefixed(PARAMS, &[])
    }

    pub fn breaker_key() -> Vec<u8> {
        prefixed(BREAKER, &[])
    }

    /// Next expected inbound sequence number for an ORDERED channel
    /// (COMPUTE's), used to reject out-of-order delivery.
    pub fn next_sequence_key(port: &str, channel: &str) -> Vec<u8> {
        let mut suffix = Vec::with_capacity(port.len() + 1 + channel.len());
        suffix.extend_from_slice(port.as_bytes());
        suffix.push(0);
        suffix.extend_from_slice(channel.as_bytes());
        prefixed(NEXT_SEQUENCE, &suffix)
    }

    /// Persisted cursor for the asset/channel rotated through by the
    /// pending-escrow timeout sweep.
    pub fn ordered_cursor_key() -> Vec<u8> {
        prefixed(ORDERED_CURSOR, &[])
    }

    pub fn channel_auth_key(port: &str, channel: &str) -> Vec<u8> {
        let mut suffix = Vec::with_capacity(port.len() + 1 + channel.len());
        suffix.extend_from_slice(port.as_bytes());
        suffix.push(0);
        suffix.extend_from_slice(channel.as_bytes());
        prefixed(CHANNEL_AUTH, &suffix)
    }

    pub fn pending_escrow_key(port: &str, channel: &str, sequence: u64) -> Vec<u8> {
        let mut suffix = Vec::with_capacity(port.len() + 1 + channel.len() + 1 + 8);
        suffix.extend_from_slice(port.as_bytes());
        suffix.push(0);
        suffix.extend_from_slice(channel.as_bytes());
        suffix.push(0);
        suffix.extend_from_slice(&sequence.to_be_bytes());
        prefixed(PENDING_ESCROW, &suffix)
    }

    pub fn packet_replay_key(sender: &[u8], nonce: u64) -> Vec<u8> {
        let mut suffix = Vec::with_capacity(sender.len() + 8);
        suffix.extend_from_slice(sender);
        suffix.extend_from_slice(&nonce.to_be_bytes());
        prefixed(PACKET_REPLAY, &suffix)
    }

    fn prefixed(prefix: u8, suffix: &[u8]) -> Vec<u8> {
        super::prefixed(MODULE, prefix, suffix)
    }

    const MODULE: u8 = b'F';
}

/// Shared/system-level keys outside any one module (active service
/// registry, genesis marker).
pub const ACTIVE_SERVICE_PREFIX: u8 = b'S';

pub fn active_service_key(service_id: &str) -> Vec<u8> {
    let mut key = vec![ACTIVE_SERVICE_PREFIX];
    key.extend_from_slice(service_id.as_bytes());
    key
}

/// Per-sender next-expected transaction nonce, checked and bumped by
/// `paw-execution` ahead of message dispatch (`spec.md §9`'s "unique
/// (sender, nonce) pair for replay", enforced once at the envelope
/// level rather than duplicated per message).
pub const ACCOUNT_NONCE_PREFIX: u8 = b'N';

pub fn account_nonce_key(sender: &[u8]) -> Vec<u8> {
    let mut key = vec![ACCOUNT_NONCE_PREFIX];
    key.extend_from_slice(sender);
    key
}

fn prefixed(module: u8, entity: u8, suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + suffix.len());
    key.push(module);
    key.push(entity);
    key.extend_from_slice(suffix);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_keys_sort_in_id_order() {
        let a = compute::request_key(1);
        let b = compute::request_key(2);
        assert!(a < b);
    }

    #[test]
    fn module_prefixes_never_collide() {
        let c = compute::provider_key(b"a");
        let d = dex::pool_key(0);
        assert_ne!(c[0], d[0]);
    }
}
