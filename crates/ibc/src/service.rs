//! The IBC module service: the simplified inter-chain packet pipeline
//! (`spec.md §4.6`) — channel authorization, size cap, structural
//! validation, replay guard, dispatch into a local module, and
//! acknowledgement with escrow/refund.
//!
//! Structured the way `ComputeMarketService` is: a unit struct holding
//! its collaborator ports, a `#[service_interface(...)]` impl block
//! with `#[method]`-tagged handlers, and a bounded end-of-block sweep
//! for escrow timeouts. Unlike COMPUTE/DEX/ORACLE, IBC's own handlers
//! re-enter the `ServiceDirectory` to dispatch into another service's
//! `handle_service_call` — the one place in this core a module calls
//! back into the dispatcher rather than only its own state.

use crate::types::{Acknowledgement, ChannelAuth, Packet, PendingEscrow};
use async_trait::async_trait;
use paw_api::breaker;
use paw_api::lifecycle::OnEndBlock;
use paw_api::ports::{BankKeeper, GovernanceAuthority};
use paw_api::services::UpgradableService;
use paw_api::state::StateAccess;
use paw_api::transaction::context::TxContext;
use paw_macros::service_interface;
use paw_types::app::{AccountId, Coin};
use paw_types::codec;
use paw_types::error::{IbcError, StateError, TransactionError, UpgradeError};
use paw_types::events::PawEvent;
use paw_types::keys::ibc as keys;
use paw_types::service_configs::IbcParams;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Module-owned escrow account for pending outbound packets.
pub const ESCROW_ACCOUNT: AccountId = AccountId([
    0xEE, 0x03, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
]);

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone)]
pub struct SendPacketParams {
    pub port: String,
    pub channel: String,
    pub method: String,
    pub inner_params: Vec<u8>,
    /// Funds reserved for this packet's effect, released on success ack
    /// and refunded on error ack / timeout. `None` for packets that
    /// reserve nothing.
    pub escrow: Option<Coin>,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone)]
pub struct AckPacketParams {
    pub port: String,
    pub channel: String,
    pub sequence: u64,
    pub ack: Acknowledgement,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone)]
pub struct TimeoutPacketParams {
    pub port: String,
    pub channel: String,
    pub sequence: u64,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone)]
pub struct UpdateChannelAuthParams {
    pub port: String,
    pub channel: String,
    pub ordered: bool,
    pub authorized: bool,
}

pub struct IbcService {
    bank: Arc<dyn BankKeeper>,
    governance: Arc<dyn GovernanceAuthority>,
}

impl IbcService {
    pub fn new(bank: Arc<dyn BankKeeper>, governance: Arc<dyn GovernanceAuthority>) -> Self {
        Self { bank, governance }
    }

    fn params(&self, state: &dyn StateAccess) -> Result<IbcParams, TransactionError> {
        match state.get(&keys::params_key())? {
            Some(bytes) => Ok(codec::from_bytes_canonical(&keys::params_key(), &bytes)?),
            None => Ok(IbcParams::default()),
        }
    }

    fn load_channel_auth(
        &self,
        state: &dyn StateAccess,
        port: &str,
        channel: &str,
    ) -> Result<Option<ChannelAuth>, TransactionError> {
        let key = keys::channel_auth_key(port, channel);
        match state.get(&key)? {
            Some(bytes) => Ok(Some(codec::from_bytes_canonical(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    fn next_sequence(&self, state: &mut dyn StateAccess, port: &str, channel: &str) -> Result<u64, TransactionError> {
        let key = keys::next_sequence_key(port, channel);
        let seq = match state.get(&key)? {
            Some(bytes) => u64::from_be_bytes(bytes.try_into().unwrap_or([0u8; 8])),
            None => 0,
        };
        state.insert(&key, &(seq + 1).to_be_bytes())?;
        Ok(seq)
    }

    fn load_escrow(
        &self,
        state: &dyn StateAccess,
        port: &str,
        channel: &str,
        sequence: u64,
    ) -> Result<Option<PendingEscrow>, TransactionError> {
        let key = keys::pending_escrow_key(port, channel, sequence);
        match state.get(&key)? {
            Some(bytes) => Ok(Some(codec::from_bytes_canonical(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    fn assert_not_paused(&self, state: &dyn StateAccess) -> Result<(), TransactionError> {
        if breaker::is_paused(state, &keys::breaker_key())? {
            return Err(IbcError::HandlerRejected("module paused".into()).into());
        }
        Ok(())
    }

    fn assert_governance(&self, caller: &AccountId) -> Result<(), TransactionError> {
        if !self.governance.is_authorized(caller)? {
            return Err(IbcError::HandlerRejected("caller lacks governance authority".into()).into());
        }
        Ok(())
    }

    /// Refunds a pending escrow's sender and deletes the record. A
    /// no-op (not an error) if the record is already gone, so both the
    /// error-ack path and the timeout sweep can call it without
    /// coordinating who runs first.
    fn refund_escrow(
        &self,
        state: &mut dyn StateAccess,
        port: &str,
        channel: &str,
        sequence: u64,
    ) -> Result<(), TransactionError> {
        let key = keys::pending_escrow_key(port, channel, sequence);
        if let Some(escrow) = self.load_escrow(state, port, channel, sequence)? {
            if escrow.amount > 0 {
                self.bank.transfer(
                    &ESCROW_ACCOUNT,
                    &escrow.sender,
                    &Coin::new(escrow.denom.as_str(), escrow.amount),
                )?;
            }
            state.delete(&key)?;
        }
        Ok(())
    }
}

#[async_trait]
impl UpgradableService for IbcService {
    async fn prepare_upgrade(&self, _new_params: &[u8]) -> Result<Vec<u8>, UpgradeError> {
        Ok(Vec::new())
    }

    async fn complete_upgrade(&self, _snapshot: &[u8]) -> Result<(), UpgradeError> {
        Ok(())
    }
}

#[service_interface(
    id = "ibc",
    abi_version = 1,
    state_schema = "v1",
    capabilities = "ON_END_BLOCK"
)]
impl IbcService {
    /// The inbound pipeline: channel authorization, size cap, structural
    /// validation, replay guard, dispatch, acknowledgement.
    ///
    /// `#[method]` handlers are plain synchronous functions (the
    /// dispatch table `#[service_interface]` generates calls them
    /// without `.await`), but dispatching into another module means
    /// calling its `async-trait`-generated `handle_service_call`. Bridged
    /// the same way the teacher's own execution engine bridges async
    /// transaction processing into a sync call site: a dedicated
    /// current-thread runtime driving `block_on`.
    #[method]
    pub fn receive_packet(
        &self,
        state: &mut dyn StateAccess,
        params: Packet,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        self.assert_not_paused(state)?;
        let ibc_params = self.params(state)?;

        // 1. Channel authorization.
        let auth = self
            .load_channel_auth(state, &params.port, &params.channel)?
            .filter(|a| a.authorized)
            .ok_or_else(|| IbcError::UnauthorizedChannel {
                port: params.port.clone(),
                channel: params.channel.clone(),
                reason: "channel is not on the authorized allowlist".into(),
            })?;

        // 2. Size cap, checked before any further parsing of the payload.
        if params.params.len() as u64 > ibc_params.max_payload_bytes {
            return Err(IbcError::PayloadTooLarge {
                got: params.params.len(),
                max: ibc_params.max_payload_bytes as usize,
            }
            .into());
        }

        // 3. Structural validation.
        if params.method.is_empty() {
            return Err(IbcError::InvalidPacket("method must not be empty".into()).into());
        }
        if params.nonce == 0 {
            return Err(IbcError::InvalidPacket("nonce must be nonzero".into()).into());
        }

        // 4. Replay guard: nonce/timestamp drift plus per-sender replay,
        // plus strict sequencing for ordered channels.
        let drift = ctx.block_height.abs_diff(params.timestamp);
        if drift > ibc_params.max_timestamp_drift {
            return Err(IbcError::Replay.into());
        }
        let replay_key = keys::packet_replay_key(params.sender.as_ref(), params.nonce);
        if state.get(&replay_key)?.is_some() {
            return Err(IbcError::Replay.into());
        }
        if auth.ordered {
            let seq_key = keys::next_sequence_key(&params.port, &params.channel);
            let expected = match state.get(&seq_key)? {
                Some(bytes) => u64::from_be_bytes(bytes.try_into().unwrap_or([0u8; 8])),
                None => 0,
            };
            if params.sequence != expected {
                return Err(IbcError::InvalidPacket(format!(
                    "ordered channel expected sequence {expected}, got {}",
                    params.sequence
                ))
                .into());
            }
            state.insert(&seq_key, &(expected + 1).to_be_bytes())?;
        }
        state.insert(&replay_key, &ctx.block_height.to_be_bytes())?;

        // 5. Dispatch, within the same atomic overlay as everything above.
        let target = ctx.services.get_by_id(&params.port).ok_or_else(|| {
            IbcError::HandlerRejected(format!("no local service registered for port {}", params.port))
        })?;
        let mut inner_ctx = ctx.clone();
        inner_ctx.is_internal = true;
        inner_ctx.signer_account_id = params.sender;
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .map_err(|e| TransactionError::Internal(format!("failed to start dispatch runtime: {e}")))?;
        let result = rt.block_on(target.handle_service_call(
            state,
            &params.method,
            &params.params,
            &mut inner_ctx,
        ));

        // 6. Acknowledgement.
        match result {
            Ok(()) => {
                ctx.events.emit(
                    ctx.block_height,
                    PawEvent::IbcPacketAcked {
                        port: params.port,
                        channel: params.channel,
                        sequence: params.sequence,
                    },
                );
                Ok(())
            }
            Err(e) => {
                warn!(port = %params.port, channel = %params.channel, error = %e, "ibc packet rejected by handler");
                ctx.events.emit(
                    ctx.block_height,
                    PawEvent::IbcPacketValidationFailed {
                        port: params.port,
                        channel: params.channel,
                        reason: e.to_string(),
                    },
                );
                Err(e)
            }
        }
    }

    /// Records an outbound packet's sequence number and, if it reserves
    /// local assets, escrows them pending acknowledgement or timeout.
    #[method]
    pub fn send_packet(
        &self,
        state: &mut dyn StateAccess,
        params: SendPacketParams,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        self.assert_not_paused(state)?;
        self.load_channel_auth(state, &params.port, &params.channel)?
            .filter(|a| a.authorized)
            .ok_or_else(|| IbcError::UnauthorizedChannel {
                port: params.port.clone(),
                channel: params.channel.clone(),
                reason: "channel is not on the authorized allowlist".into(),
            })?;

        let sequence = self.next_sequence(state, &params.port, &params.channel)?;
        let sender = ctx.signer_account_id;

        if let Some(coin) = &params.escrow {
            self.bank.transfer(&sender, &ESCROW_ACCOUNT, coin)?;
        }
        let outbound = PendingEscrow {
            port: params.port.clone(),
            channel: params.channel.clone(),
            sequence,
            sender,
            method: params.method,
            params: params.inner_params,
            denom: params.escrow.as_ref().map(|c| c.denom.to_string()).unwrap_or_default(),
            amount: params.escrow.as_ref().map(|c| c.amount).unwrap_or(0),
            created_at: ctx.block_height,
        };
        state.insert(
            &keys::pending_escrow_key(&params.port, &params.channel, sequence),
            &codec::to_bytes_canonical(&outbound),
        )?;

        debug!(sequence, "packet queued for relay");
        Ok(())
    }

    /// Resolves a previously sent packet's escrow once its
    /// acknowledgement arrives: released on success, refunded on error.
    #[method]
    pub fn ack_packet(
        &self,
        state: &mut dyn StateAccess,
        params: AckPacketParams,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        let key = keys::pending_escrow_key(&params.port, &params.channel, params.sequence);
        match params.ack {
            Acknowledgement::Success => {
                // Funds already left this chain's liability when the
                // counterparty confirmed; the escrow record is simply
                // cleared, idempotently.
                state.delete(&key)?;
            }
            Acknowledgement::Error(reason) => {
                self.refund_escrow(state, &params.port, &params.channel, params.sequence)?;
                debug!(port = %params.port, channel = %params.channel, sequence = params.sequence, %reason, "escrow refunded on error ack");
                ctx.events.emit(
                    ctx.block_height,
                    PawEvent::IbcEscrowRefunded {
                        port: params.port.clone(),
                        channel: params.channel.clone(),
                        sequence: params.sequence,
                    },
                );
            }
        }
        Ok(())
    }

    /// Refunds a pending escrow directly, for packets the relayer
    /// reports as timed out rather than acknowledged.
    #[method]
    pub fn timeout_packet(
        &self,
        state: &mut dyn StateAccess,
        params: TimeoutPacketParams,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        self.refund_escrow(state, &params.port, &params.channel, params.sequence)?;
        ctx.events.emit(
            ctx.block_height,
            PawEvent::IbcEscrowRefunded {
                port: params.port,
                channel: params.channel,
                sequence: params.sequence,
            },
        );
        Ok(())
    }

    #[method]
    pub fn update_channel_auth(
        &self,
        state: &mut dyn StateAccess,
        params: UpdateChannelAuthParams,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        self.assert_governance(&ctx.signer_account_id)?;
        let auth = ChannelAuth {
            port: params.port.clone(),
            channel: params.channel.clone(),
            ordered: params.ordered,
            authorized: params.authorized,
        };
        state.insert(
            &keys::channel_auth_key(&params.port, &params.channel),
            &codec::to_bytes_canonical(&auth),
        )?;
        Ok(())
    }

    #[method]
    pub fn update_params(
        &self,
        state: &mut dyn StateAccess,
        params: IbcParams,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        self.assert_governance(&ctx.signer_account_id)?;
        state.insert(&keys::params_key(), &codec::to_bytes_canonical(&params))?;
        Ok(())
    }
}

#[async_trait]
impl OnEndBlock for IbcService {
    /// Bounded sweep: refund any pending escrow whose packet has aged
    /// past `escrow_timeout` without an acknowledgement, capped by
    /// `escrow_sweep_batch` and resumed across blocks via a persisted
    /// cursor, mirroring DEX's and ORACLE's sweep-cursor pattern.
    async fn on_end_block(&self, state: &mut dyn StateAccess, ctx: &TxContext) -> Result<(), StateError> {
        let params = match self.params(state) {
            Ok(p) => p,
            Err(_) => IbcParams::default(),
        };
        self.sweep_timed_out_escrows(state, ctx, &params)?;
        Ok(())
    }
}

impl IbcService {
    fn sweep_timed_out_escrows(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        params: &IbcParams,
    ) -> Result<(), StateError> {
        let cutoff = ctx.block_height.saturating_sub(params.escrow_timeout);

        let mut entries = Vec::new();
        for item in state.prefix_scan(&[b'F', keys::PENDING_ESCROW])? {
            let (key, value) = item?;
            if let Ok(escrow) = codec::from_bytes_canonical::<PendingEscrow>(&key, &value) {
                entries.push((key.to_vec(), escrow));
            }
        }
        if entries.is_empty() {
            state.delete(&keys::ordered_cursor_key())?;
            return Ok(());
        }

        let cursor = state.get(&keys::ordered_cursor_key())?.unwrap_or_default();
        let start = entries
            .iter()
            .position(|(key, _)| key.as_slice() > cursor.as_slice())
            .unwrap_or(0);

        let mut to_refund = Vec::new();
        let mut last_key = cursor;
        for i in 0..entries.len().min(params.escrow_sweep_batch as usize) {
            let (key, escrow) = &entries[(start + i) % entries.len()];
            last_key = key.clone();
            if escrow.created_at < cutoff {
                to_refund.push(escrow.clone());
            }
        }
        state.insert(&keys::ordered_cursor_key(), &last_key)?;

        for escrow in to_refund {
            let key = keys::pending_escrow_key(&escrow.port, &escrow.channel, escrow.sequence);
            let refunded = escrow.amount == 0
                || self
                    .bank
                    .transfer(
                        &ESCROW_ACCOUNT,
                        &escrow.sender,
                        &Coin::new(escrow.denom.as_str(), escrow.amount),
                    )
                    .is_ok();
            if refunded {
                state.delete(&key)?;
                ctx.events.emit(
                    ctx.block_height,
                    PawEvent::IbcEscrowRefunded {
                        port: escrow.port,
                        channel: escrow.channel,
                        sequence: escrow.sequence,
                    },
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paw_api::services::access::ServiceDirectory;
    use paw_storage::MemoryStore;
    use paw_types::app::{ChainId, DenomId};
    use paw_types::events::VecEventSink;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeBank(Mutex<HashMap<(AccountId, String), u128>>);

    impl FakeBank {
        fn new(seed: &[(AccountId, &str, u128)]) -> Self {
            let mut m = HashMap::new();
            for (acc, denom, amt) in seed {
                m.insert((*acc, denom.to_string()), *amt);
            }
            Self(Mutex::new(m))
        }
    }

    impl BankKeeper for FakeBank {
        fn balance(&self, account: &AccountId, denom: &DenomId) -> Result<Coin, TransactionError> {
            let amount = self
                .0
                .lock()
                .unwrap()
                .get(&(*account, denom.to_string()))
                .copied()
                .unwrap_or(0);
            Ok(Coin::new(denom.to_string(), amount))
        }
        fn transfer(&self, from: &AccountId, to: &AccountId, amount: &Coin) -> Result<(), TransactionError> {
            let mut ledger = self.0.lock().unwrap();
            let key = (*from, amount.denom.to_string());
            let from_balance = ledger.entry(key).or_insert(0);
            if *from_balance < amount.amount {
                return Err(TransactionError::Internal("insufficient test balance".into()));
            }
            *from_balance -= amount.amount;
            *ledger.entry((*to, amount.denom.to_string())).or_insert(0) += amount.amount;
            Ok(())
        }
        fn mint(&self, to: &AccountId, amount: &Coin) -> Result<(), TransactionError> {
            *self
                .0
                .lock()
                .unwrap()
                .entry((*to, amount.denom.to_string()))
                .or_insert(0) += amount.amount;
            Ok(())
        }
        fn burn(&self, from: &AccountId, amount: &Coin) -> Result<(), TransactionError> {
            let mut ledger = self.0.lock().unwrap();
            let key = (*from, amount.denom.to_string());
            let bal = ledger.entry(key).or_insert(0);
            *bal = bal.saturating_sub(amount.amount);
            Ok(())
        }
    }

    struct FakeGovernance(AccountId);

    impl GovernanceAuthority for FakeGovernance {
        fn is_authorized(&self, account: &AccountId) -> Result<bool, TransactionError> {
            Ok(*account == self.0)
        }
    }

    fn harness(seed: &[(AccountId, &str, u128)]) -> (IbcService, MemoryStore, ServiceDirectory, VecEventSink) {
        let svc = IbcService::new(
            Arc::new(FakeBank::new(seed)),
            Arc::new(FakeGovernance(AccountId([0x99; 32]))),
        );
        (svc, MemoryStore::default(), ServiceDirectory::new(vec![]), VecEventSink::new())
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
    fn send_packet_rejects_unauthorized_channel() {
        let sender = AccountId([1u8; 32]);
        let (svc, mut state, dir, events) = harness(&[(sender, "upaw", 1_000)]);
        let err = svc
            .send_packet(
                &mut state,
                SendPacketParams {
                    port: "dex".into(),
                    channel: "channel-0".into(),
                    method: "swap".into(),
                    inner_params: vec![],
                    escrow: None,
                },
                &ctx(&dir, &events, sender, 1),
            )
            .unwrap_err();
        assert!(matches!(err, TransactionError::Ibc(IbcError::UnauthorizedChannel { .. })));
    }

    #[test]
    fn send_packet_escrows_funds_and_timeout_refunds() {
        let sender = AccountId([2u8; 32]);
        let (svc, mut state, dir, events) = harness(&[(sender, "upaw", 1_000)]);

        svc.update_channel_auth(
            &mut state,
            UpdateChannelAuthParams {
                port: "dex".into(),
                channel: "channel-0".into(),
                ordered: false,
                authorized: true,
            },
            &ctx(&dir, &events, AccountId([0x99; 32]), 1),
        )
        .unwrap();

        svc.send_packet(
            &mut state,
            SendPacketParams {
                port: "dex".into(),
                channel: "channel-0".into(),
                method: "swap".into(),
                inner_params: vec![],
                escrow: Some(Coin::new("upaw", 500)),
            },
            &ctx(&dir, &events, sender, 2),
        )
        .unwrap();

        assert_eq!(svc.bank.balance(&sender, &"upaw".into()).unwrap().amount, 500);

        let params = IbcParams {
            escrow_timeout: 5,
            ..IbcParams::default()
        };
        let cutoff_ctx = ctx(&dir, &events, AccountId::zero(), 10);
        svc.sweep_timed_out_escrows(&mut state, &cutoff_ctx, &params).unwrap();

        assert_eq!(svc.bank.balance(&sender, &"upaw".into()).unwrap().amount, 1_000);
        assert!(svc.load_escrow(&state, "dex", "channel-0", 0).unwrap().is_none());
    }

    #[test]
    fn ack_packet_success_clears_escrow_without_refund() {
        let sender = AccountId([3u8; 32]);
        let (svc, mut state, dir, events) = harness(&[(sender, "upaw", 1_000)]);
        svc.update_channel_auth(
            &mut state,
            UpdateChannelAuthParams {
                port: "dex".into(),
                channel: "channel-0".into(),
                ordered: false,
                authorized: true,
            },
            &ctx(&dir, &events, AccountId([0x99; 32]), 1),
        )
        .unwrap();
        svc.send_packet(
            &mut state,
            SendPacketParams {
                port: "dex".into(),
                channel: "channel-0".into(),
                method: "swap".into(),
                inner_params: vec![],
                escrow: Some(Coin::new("upaw", 500)),
            },
            &ctx(&dir, &events, sender, 2),
        )
        .unwrap();

        svc.ack_packet(
            &mut state,
            AckPacketParams {
                port: "dex".into(),
                channel: "channel-0".into(),
                sequence: 0,
                ack: Acknowledgement::Success,
            },
            &ctx(&dir, &events, sender, 3),
        )
        .unwrap();

        assert_eq!(svc.bank.balance(&sender, &"upaw".into()).unwrap().amount, 500);
        assert!(svc.load_escrow(&state, "dex", "channel-0", 0).unwrap().is_none());
    }

    #[test]
    fn receive_packet_rejects_unknown_channel() {
        let relayer = AccountId([4u8; 32]);
        let (svc, mut state, dir, events) = harness(&[]);
        let err = svc
            .receive_packet(
                &mut state,
                Packet {
                    port: "dex".into(),
                    channel: "channel-0".into(),
                    sequence: 0,
                    sender: AccountId([9u8; 32]),
                    nonce: 1,
                    timestamp: 5,
                    method: "swap".into(),
                    params: vec![],
                },
                &ctx(&dir, &events, relayer, 5),
            )
            .unwrap_err();
        assert!(matches!(err, TransactionError::Ibc(IbcError::UnauthorizedChannel { .. })));
    }

    #[test]
    fn receive_packet_rejects_replay() {
        let relayer = AccountId([5u8; 32]);
        let (svc, mut state, dir, events) = harness(&[]);
        svc.update_channel_auth(
            &mut state,
            UpdateChannelAuthParams {
                port: "dex".into(),
                channel: "channel-0".into(),
                ordered: false,
                authorized: true,
            },
            &ctx(&dir, &events, AccountId([0x99; 32]), 1),
        )
        .unwrap();

        let packet = Packet {
            port: "dex".into(),
            channel: "channel-0".into(),
            sequence: 0,
            sender: AccountId([9u8; 32]),
            nonce: 1,
            timestamp: 5,
            method: "swap".into(),
            params: vec![],
        };
        // First delivery dispatches to a port with no registered service,
        // which still consumes the replay guard before failing dispatch.
        let _ = svc.receive_packet(&mut state, packet.clone(), &ctx(&dir, &events, relayer, 5));
        let err = svc
            .receive_packet(&mut state, packet, &ctx(&dir, &events, relayer, 5))
            .unwrap_err();
        assert!(matches!(err, TransactionError::Ibc(IbcError::Replay)));
    }
}
