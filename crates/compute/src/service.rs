//! The COMPUTE module service: provider registry, job lifecycle, result
//! verification, disputes, and the bounded end-of-block sweep.
//!
//! Structured the way the teacher's `ComputeMarketService` is
//! (`services/src/compute_market/mod.rs`): a unit struct, a
//! `#[service_interface(...)]` impl block with `#[method]`-tagged
//! handlers, an internal `next_id` counter helper. That file implements
//! only a two-field placeholder ticket; every method body here is
//! written from scratch against `spec.md §4.3`'s actual state machine.

use crate::types::{
    Dispute, Evidence, JobResult, MerkleProofStep, Provider, ProviderSpecs, QueuedRefund, Request,
    RequestStatus, ZkProofBytes, MAX_COMMAND_LEN,
};
use async_trait::async_trait;
use paw_api::breaker;
use paw_api::lifecycle::OnEndBlock;
use paw_api::ports::{BankKeeper, GovernanceAuthority};
use paw_api::services::UpgradableService;
use paw_api::state::StateAccess;
use paw_api::transaction::context::TxContext;
use paw_crypto::merkle::{verify_merkle_proof, ProofStep};
use paw_crypto::sign::verify_ed25519;
use paw_crypto::zk::{verify_compute_proof, ComputePublicInputs, Groth16Proof};
use paw_macros::service_interface;
use paw_types::app::{AccountId, Coin};
use paw_types::codec;
use paw_types::error::{ComputeError, TransactionError, UpgradeError};
use paw_types::events::PawEvent;
use paw_types::keys::compute as keys;
use paw_types::service_configs::ComputeParams;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Module-owned escrow account. A fixed, recognizable byte pattern
/// rather than a hash of the service id: there is nothing to hide and
/// nothing to derive it from at const-eval time.
pub const ESCROW_ACCOUNT: AccountId = AccountId([
    0xEE, 0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
]);

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone)]
pub struct RegisterProviderParams {
    pub moniker: String,
    pub endpoint: String,
    pub specs: ProviderSpecs,
    pub pricing: u128,
    pub stake: Coin,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone)]
pub struct RegisterSigningKeyParams {
    pub pubkey: Vec<u8>,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone)]
pub struct SubmitRequestParams {
    pub specs: ProviderSpecs,
    pub container_image: String,
    pub command: String,
    pub max_payment: Coin,
    pub deadline: u64,
    pub nonce: u64,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone)]
pub struct SubmitResultParams {
    pub request_id: u64,
    pub output_hash: [u8; 32],
    pub output_url: String,
    pub merkle_proof: Option<Vec<MerkleProofStep>>,
    pub signature: Option<Vec<u8>>,
    pub zk_proof: Option<ZkProofBytes>,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone)]
pub struct DisputeResultParams {
    pub request_id: u64,
    pub evidence: Vec<u8>,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone)]
pub struct CancelRequestParams {
    pub request_id: u64,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone)]
pub struct SubmitEvidenceParams {
    pub request_id: u64,
    pub payload: Vec<u8>,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone)]
pub struct SlashProviderParams {
    pub provider: AccountId,
    pub fraction_bps: u32,
}

pub struct ComputeMarketService {
    bank: Arc<dyn BankKeeper>,
    governance: Arc<dyn GovernanceAuthority>,
}

impl ComputeMarketService {
    pub fn new(bank: Arc<dyn BankKeeper>, governance: Arc<dyn GovernanceAuthority>) -> Self {
        Self { bank, governance }
    }

    fn params(&self, state: &dyn StateAccess) -> Result<ComputeParams, TransactionError> {
        match state.get(&keys::params_key())? {
            Some(bytes) => Ok(codec::from_bytes_canonical(&keys::params_key(), &bytes)?),
            None => Ok(ComputeParams::default()),
        }
    }

    fn next_request_id(&self, state: &mut dyn StateAccess) -> Result<u64, TransactionError> {
        let key = [b'C', keys::NEXT_REQUEST_ID];
        let id = match state.get(&key)? {
            Some(bytes) => u64::from_be_bytes(bytes.try_into().unwrap_or([0u8; 8])),
            None => 0,
        };
        state.insert(&key, &(id + 1).to_be_bytes())?;
        Ok(id)
    }

    fn load_provider(&self, state: &dyn StateAccess, addr: &AccountId) -> Result<Option<Provider>, TransactionError> {
        match state.get(&keys::provider_key(addr.as_ref()))? {
            Some(bytes) => Ok(Some(codec::from_bytes_canonical(
                &keys::provider_key(addr.as_ref()),
                &bytes,
            )?)),
            None => Ok(None),
        }
    }

    fn save_provider(&self, state: &mut dyn StateAccess, provider: &Provider) -> Result<(), TransactionError> {
        let key = keys::provider_key(provider.addr.as_ref());
        state.insert(&key, &codec::to_bytes_canonical(provider))?;
        Ok(())
    }

    fn load_request(&self, state: &dyn StateAccess, id: u64) -> Result<Option<Request>, TransactionError> {
        match state.get(&keys::request_key(id))? {
            Some(bytes) => Ok(Some(codec::from_bytes_canonical(&keys::request_key(id), &bytes)?)),
            None => Ok(None),
        }
    }

    fn save_request(&self, state: &mut dyn StateAccess, request: &Request) -> Result<(), TransactionError> {
        state.insert(&keys::request_key(request.id), &codec::to_bytes_canonical(request))?;
        Ok(())
    }

    fn assert_not_paused(&self, state: &dyn StateAccess) -> Result<(), TransactionError> {
        if breaker::is_paused(state, &keys::breaker_key())? {
            return Err(ComputeError::ModulePaused.into());
        }
        Ok(())
    }

    fn assert_provider_not_suspended(&self, state: &dyn StateAccess, provider: &AccountId) -> Result<(), TransactionError> {
        if breaker::is_paused(state, &keys::provider_breaker_key(provider.as_ref()))? {
            return Err(ComputeError::ProviderSuspended(provider.to_string()).into());
        }
        Ok(())
    }

    fn assert_governance(&self, caller: &AccountId) -> Result<(), TransactionError> {
        if !self.governance.is_authorized(caller)? {
            return Err(ComputeError::Unauthorized.into());
        }
        Ok(())
    }

    /// Deterministic provider-selection policy (`spec.md §4.3`): among
    /// active providers whose specs satisfy the request and whose
    /// pricing is within budget, rank by descending
    /// `reputation × available_stake`, tie-break by ascending address.
    fn select_provider(
        &self,
        state: &dyn StateAccess,
        request: &Request,
    ) -> Result<Option<AccountId>, TransactionError> {
        let mut best: Option<(i128, Provider)> = None;
        for item in state.prefix_scan(&[b'C', keys::PROVIDER])? {
            let (_, value) = item?;
            let provider: Provider = codec::from_bytes_canonical(b"provider-scan", &value)?;
            if !provider.active {
                continue;
            }
            if provider.specs.cpu < request.specs.cpu
                || provider.specs.mem_mb < request.specs.mem_mb
                || provider.specs.gpu < request.specs.gpu
                || provider.specs.storage_gb < request.specs.storage_gb
            {
                continue;
            }
            if provider.pricing > request.max_payment.amount {
                continue;
            }
            let rank = provider.reputation as i128 * provider.stake.amount as i128;
            match &best {
                Some((best_rank, best_provider)) => {
                    if rank > *best_rank
                        || (rank == *best_rank && provider.addr < best_provider.addr)
                    {
                        best = Some((rank, provider));
                    }
                }
                None => best = Some((rank, provider)),
            }
        }
        Ok(best.map(|(_, p)| p.addr))
    }
}

#[async_trait]
impl UpgradableService for ComputeMarketService {
    async fn prepare_upgrade(&self, _new_params: &[u8]) -> Result<Vec<u8>, UpgradeError> {
        Ok(Vec::new())
    }

    async fn complete_upgrade(&self, _snapshot: &[u8]) -> Result<(), UpgradeError> {
        Ok(())
    }
}

#[service_interface(
    id = "compute_market",
    abi_version = 1,
    state_schema = "v1",
    capabilities = "ON_END_BLOCK"
)]
impl ComputeMarketService {
    #[method]
    pub fn register_provider(
        &self,
        state: &mut dyn StateAccess,
        params: RegisterProviderParams,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        self.assert_not_paused(state)?;
        let addr = ctx.signer_account_id;

        if let Some(existing) = self.load_provider(state, &addr)? {
            if existing.active {
                return Err(ComputeError::ProviderAlreadyActive.into());
            }
        }

        let compute_params = self.params(state)?;
        if params.stake.denom != compute_params.min_provider_stake.denom
            || params.stake.amount < compute_params.min_provider_stake.amount
        {
            return Err(ComputeError::InsufficientStake {
                got: params.stake.amount,
                min: compute_params.min_provider_stake.amount,
            }
            .into());
        }
        if params.endpoint.is_empty() || params.moniker.is_empty() {
            return Err(ComputeError::InvalidArgument("moniker/endpoint must not be empty".into()).into());
        }

        self.bank.transfer(&addr, &ESCROW_ACCOUNT, &params.stake)?;

        let provider = Provider {
            addr,
            moniker: params.moniker,
            endpoint: params.endpoint,
            specs: params.specs,
            pricing: params.pricing,
            stake: params.stake.clone(),
            reputation: 50,
            completed: 0,
            failed: 0,
            slash_count: 0,
            active: true,
            registered_at_height: ctx.block_height,
        };
        self.save_provider(state, &provider)?;
        ctx.events.emit(
            ctx.block_height,
            PawEvent::ComputeProviderRegistered {
                addr,
                stake: params.stake,
            },
        );
        debug!(provider = %addr, "provider registered");
        Ok(())
    }

    #[method]
    pub fn register_signing_key(
        &self,
        state: &mut dyn StateAccess,
        params: RegisterSigningKeyParams,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        let addr = ctx.signer_account_id;
        let provider = self
            .load_provider(state, &addr)?
            .ok_or_else(|| ComputeError::ProviderNotFound(addr.to_string()))?;
        if !provider.active {
            return Err(ComputeError::ProviderSuspended(addr.to_string()).into());
        }
        state.insert(&keys::signing_key_key(addr.as_ref()), &params.pubkey)?;
        Ok(())
    }

    #[method]
    pub fn submit_request(
        &self,
        state: &mut dyn StateAccess,
        params: SubmitRequestParams,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        self.assert_not_paused(state)?;
        if params.command.len() > MAX_COMMAND_LEN {
            return Err(ComputeError::InvalidArgument("command exceeds max length".into()).into());
        }

        let nonce_key = keys::nonce_key(ctx.signer_account_id.as_ref(), params.nonce);
        if state.get(&nonce_key)?.is_some() {
            return Err(ComputeError::Replay.into());
        }
        state.insert(&nonce_key, &ctx.block_height.to_be_bytes())?;

        let requester = ctx.signer_account_id;
        self.bank.transfer(&requester, &ESCROW_ACCOUNT, &params.max_payment)?;

        let id = self.next_request_id(state)?;
        let mut request = Request {
            id,
            requester,
            specs: params.specs,
            container_image: params.container_image,
            command: params.command,
            max_payment: params.max_payment.clone(),
            provider: None,
            status: RequestStatus::Pending,
            deadline: params.deadline,
            created_at: ctx.block_height,
            escrow: params.max_payment.clone(),
        };

        ctx.events.emit(
            ctx.block_height,
            PawEvent::ComputeRequestSubmitted {
                request_id: id,
                requester,
                max_payment: params.max_payment,
            },
        );

        if let Some(provider_addr) = self.select_provider(state, &request)? {
            request.provider = Some(provider_addr);
            request.status = RequestStatus::Assigned;
            ctx.events.emit(
                ctx.block_height,
                PawEvent::ComputeRequestAssigned {
                    request_id: id,
                    provider: provider_addr,
                },
            );
        }
        self.save_request(state, &request)?;
        Ok(())
    }

    #[method]
    pub fn submit_result(
        &self,
        state: &mut dyn StateAccess,
        params: SubmitResultParams,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        self.assert_not_paused(state)?;
        let provider_addr = ctx.signer_account_id;
        self.assert_provider_not_suspended(state, &provider_addr)?;

        let mut request = self
            .load_request(state, params.request_id)?
            .ok_or_else(|| ComputeError::RequestNotFound(params.request_id))?;

        if request.provider != Some(provider_addr) {
            return Err(ComputeError::Unauthorized.into());
        }
        if !matches!(request.status, RequestStatus::Assigned | RequestStatus::Processing) {
            return Err(ComputeError::InvalidState("request is not assigned to this provider".into()).into());
        }

        let verified = self.verify_result(state, &provider_addr, &params)?;

        if !verified {
            request.status = RequestStatus::Failed;
            self.save_request(state, &request)?;
            self.queue_refund(state, &request, ctx.block_height)?;
            self.apply_reputation_delta(state, &provider_addr, false)?;
            ctx.events.emit(
                ctx.block_height,
                PawEvent::ComputeRequestFailed {
                    request_id: request.id,
                    reason: "verification_failed".into(),
                },
            );
            warn!(request_id = request.id, provider = %provider_addr, "result verification failed");
            return Err(ComputeError::VerificationFailed("signature, merkle, or zk check failed".into()).into());
        }

        request.status = RequestStatus::Completed;
        self.save_request(state, &request)?;

        let result = JobResult {
            request_id: request.id,
            provider: provider_addr,
            output_hash: params.output_hash,
            output_url: params.output_url,
            merkle_proof: params.merkle_proof,
            signature: params.signature,
            zk_proof: params.zk_proof,
            submitted_at: ctx.block_height,
        };
        state.insert(&keys::result_key(request.id), &codec::to_bytes_canonical(&result))?;

        self.bank.transfer(&ESCROW_ACCOUNT, &provider_addr, &request.escrow)?;
        self.apply_reputation_delta(state, &provider_addr, true)?;

        ctx.events.emit(
            ctx.block_height,
            PawEvent::ComputeResultVerified {
                request_id: request.id,
                provider: provider_addr,
            },
        );
        Ok(())
    }

    #[method]
    pub fn dispute_result(
        &self,
        state: &mut dyn StateAccess,
        params: DisputeResultParams,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        let mut request = self
            .load_request(state, params.request_id)?
            .ok_or_else(|| ComputeError::RequestNotFound(params.request_id))?;

        let compute_params = self.params(state)?;
        if params.evidence.len() as u64 > compute_params.max_evidence_size {
            return Err(ComputeError::EvidenceTooLarge {
                got: params.evidence.len(),
                max: compute_params.max_evidence_size as usize,
            }
            .into());
        }

        request.status = RequestStatus::Disputed;
        self.save_request(state, &request)?;

        let dispute_id = self.next_request_id(state)?;
        let dispute = Dispute {
            id: dispute_id,
            request_id: request.id,
            challenger: ctx.signer_account_id,
            created_at: ctx.block_height,
            resolved: false,
        };
        state.insert(&keys::dispute_key(dispute_id), &codec::to_bytes_canonical(&dispute))?;

        let evidence = Evidence {
            id: dispute_id,
            request_id: request.id,
            submitter: ctx.signer_account_id,
            payload: params.evidence,
            submitted_at: ctx.block_height,
        };
        state.insert(&keys::evidence_key(dispute_id), &codec::to_bytes_canonical(&evidence))?;

        ctx.events.emit(
            ctx.block_height,
            PawEvent::ComputeDisputeOpened {
                request_id: request.id,
                challenger: ctx.signer_account_id,
            },
        );
        Ok(())
    }

    #[method]
    pub fn cancel_request(
        &self,
        state: &mut dyn StateAccess,
        params: CancelRequestParams,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        let mut request = self
            .load_request(state, params.request_id)?
            .ok_or_else(|| ComputeError::RequestNotFound(params.request_id))?;
        if request.requester != ctx.signer_account_id {
            return Err(ComputeError::Unauthorized.into());
        }
        if request.status != RequestStatus::Pending {
            return Err(ComputeError::InvalidState("only a pending request may be cancelled".into()).into());
        }
        request.status = RequestStatus::Cancelled;
        self.refund_escrow(state, &request)?;
        self.save_request(state, &request)?;
        ctx.events.emit(
            ctx.block_height,
            PawEvent::ComputeRequestCancelled {
                request_id: request.id,
            },
        );
        Ok(())
    }

    #[method]
    pub fn submit_evidence(
        &self,
        state: &mut dyn StateAccess,
        params: SubmitEvidenceParams,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        let compute_params = self.params(state)?;
        if params.payload.len() as u64 > compute_params.max_evidence_size {
            return Err(ComputeError::EvidenceTooLarge {
                got: params.payload.len(),
                max: compute_params.max_evidence_size as usize,
            }
            .into());
        }
        let id = self.next_request_id(state)?;
        let evidence = Evidence {
            id,
            request_id: params.request_id,
            submitter: ctx.signer_account_id,
            payload: params.payload,
            submitted_at: ctx.block_height,
        };
        state.insert(&keys::evidence_key(id), &codec::to_bytes_canonical(&evidence))?;
        Ok(())
    }

    #[method]
    pub fn slash_provider(
        &self,
        state: &mut dyn StateAccess,
        params: SlashProviderParams,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        self.assert_governance(&ctx.signer_account_id)?;
        let mut provider = self
            .load_provider(state, &params.provider)?
            .ok_or_else(|| ComputeError::ProviderNotFound(params.provider.to_string()))?;

        let compute_params = self.params(state)?;
        let slashed = (provider.stake.amount * params.fraction_bps as u128) / 10_000;
        provider.stake.amount = provider.stake.amount.saturating_sub(slashed);
        provider.slash_count += 1;
        provider.reputation = (provider.reputation - compute_params.reputation_slash_step)
            .clamp(0, 100);
        if provider.reputation < compute_params.active_reputation_threshold {
            provider.active = false;
        }
        self.save_provider(state, &provider)?;

        ctx.events.emit(
            ctx.block_height,
            PawEvent::ComputeProviderSlashed {
                provider: params.provider,
                fraction_bps: params.fraction_bps,
            },
        );
        Ok(())
    }

    #[method]
    pub fn update_params(
        &self,
        state: &mut dyn StateAccess,
        params: ComputeParams,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        self.assert_governance(&ctx.signer_account_id)?;
        state.insert(&keys::params_key(), &codec::to_bytes_canonical(&params))?;
        Ok(())
    }
}

impl ComputeMarketService {
    fn verify_result(
        &self,
        state: &dyn StateAccess,
        provider_addr: &AccountId,
        params: &SubmitResultParams,
    ) -> Result<bool, TransactionError> {
        let signature = params
            .signature
            .as_ref()
            .ok_or_else(|| ComputeError::VerificationFailed("missing signature".into()))?;
        let pubkey = state
            .get(&keys::signing_key_key(provider_addr.as_ref()))?
            .ok_or_else(|| ComputeError::VerificationFailed("no registered signing key".into()))?;
        if !verify_ed25519(&pubkey, &params.output_hash, signature)
            .map_err(|e| ComputeError::VerificationFailed(e.to_string()))?
        {
            return Ok(false);
        }

        if let Some(proof) = &params.merkle_proof {
            let root = params.output_hash;
            let steps: Vec<ProofStep> = proof
                .iter()
                .map(|s| ProofStep {
                    sibling: s.sibling,
                    sibling_is_left: s.sibling_is_left,
                })
                .collect();
            let leaf = paw_crypto::merkle::leaf_hash(params.output_url.as_bytes())
                .map_err(|e| ComputeError::VerificationFailed(e.to_string()))?;
            if !verify_merkle_proof(&root, &steps, &leaf)
                .map_err(|e| ComputeError::VerificationFailed(e.to_string()))?
            {
                return Ok(false);
            }
        }

        if let Some(zk) = &params.zk_proof {
            let inputs = ComputePublicInputs {
                request_id: {
                    let mut buf = [0u8; 32];
                    buf[24..].copy_from_slice(&params.request_id.to_be_bytes());
                    buf
                },
                result_hash: params.output_hash,
                provider_address_hash: provider_addr.0,
            };
            let proof = Groth16Proof {
                a: zk.a,
                b: zk.b,
                c: zk.c,
            };
            if !verify_compute_proof(&proof, &inputs)
                .map_err(|e| ComputeError::VerificationFailed(e.to_string()))?
            {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn refund_escrow(&self, state: &mut dyn StateAccess, request: &Request) -> Result<(), TransactionError> {
        let _ = state;
        self.bank.transfer(&ESCROW_ACCOUNT, &request.requester, &request.escrow)?;
        Ok(())
    }

    /// Records a refund owed to `request.requester` without touching the
    /// bank. The write lands in the same state overlay as the message
    /// that decided it, so a later failure in that same message rolls
    /// the refund record back too — unlike a direct `BankKeeper`
    /// transfer, which would already be committed. The end-of-block
    /// sweep (`process_queued_refunds`) performs the actual transfer.
    fn queue_refund(
        &self,
        state: &mut dyn StateAccess,
        request: &Request,
        at_height: u64,
    ) -> Result<(), TransactionError> {
        let refund = QueuedRefund {
            request_id: request.id,
            recipient: request.requester,
            amount: request.escrow.clone(),
            queued_at: at_height,
        };
        state.insert(&keys::queued_refund_key(request.id), &codec::to_bytes_canonical(&refund))?;
        Ok(())
    }

    fn apply_reputation_delta(
        &self,
        state: &mut dyn StateAccess,
        provider_addr: &AccountId,
        success: bool,
    ) -> Result<(), TransactionError> {
        let compute_params = self.params(state)?;
        if let Some(mut provider) = self.load_provider(state, provider_addr)? {
            if success {
                provider.completed += 1;
                provider.reputation =
                    (provider.reputation + compute_params.reputation_gain_step).clamp(0, 100);
            } else {
                provider.failed += 1;
                provider.reputation =
                    (provider.reputation - compute_params.reputation_slash_step).clamp(0, 100);
                if provider.reputation < compute_params.active_reputation_threshold {
                    provider.active = false;
                }
            }
            self.save_provider(state, &provider)?;
        }
        Ok(())
    }
}

#[async_trait]
impl OnEndBlock for ComputeMarketService {
    /// Bounded end-of-block sweep (`spec.md §4.3`): purge expired
    /// nonces, expire overdue requests, retry provider matching for
    /// still-pending requests, and pay out refunds queued by a failed
    /// `SubmitResult`. Each phase is capped by its own `*_batch`
    /// parameter; the bank-moving phases gate their state mutation on
    /// the transfer's success so a failed transfer is retried on a
    /// later block instead of being recorded as done.
    async fn on_end_block(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
    ) -> Result<(), paw_types::error::StateError> {
        let params = match self.params(state) {
            Ok(p) => p,
            Err(_) => ComputeParams::default(),
        };

        self.purge_expired_nonces(state, ctx, &params)?;
        self.expire_overdue_requests(state, ctx, &params)?;
        self.match_pending_requests(state, ctx, &params)?;
        self.process_queued_refunds(state, ctx, &params)?;
        Ok(())
    }
}

impl ComputeMarketService {
    fn purge_expired_nonces(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        params: &ComputeParams,
    ) -> Result<(), paw_types::error::StateError> {
        if ctx.block_height <= params.nonce_retention {
            return Ok(());
        }
        let cutoff = ctx.block_height - params.nonce_retention;
        let mut purged = 0u32;
        let mut to_delete = Vec::new();
        for item in state.prefix_scan(&[b'C', keys::NONCE])? {
            if purged >= params.nonce_purge_batch {
                break;
            }
            let (key, value) = item?;
            if value.len() == 8 {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&value);
                let height = u64::from_be_bytes(arr);
                if height < cutoff {
                    to_delete.push(key.to_vec());
                    purged += 1;
                }
            }
        }
        for key in to_delete {
            state.delete(&key)?;
        }
        Ok(())
    }

    fn expire_overdue_requests(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        params: &ComputeParams,
    ) -> Result<(), paw_types::error::StateError> {
        let mut scanned = 0u32;
        let mut to_update = Vec::new();
        for item in state.prefix_scan(&[b'C', keys::REQUEST])? {
            if scanned >= params.expiry_scan_batch {
                break;
            }
            scanned += 1;
            let (key, value) = item?;
            let request: Request = match codec::from_bytes_canonical(&key, &value) {
                Ok(r) => r,
                Err(_) => continue,
            };
            if !request.status.is_terminal() && ctx.block_height > request.deadline {
                to_update.push(request);
            }
        }
        for mut request in to_update {
            let escrow = request.escrow.clone();
            let requester = request.requester;
            let refunded = escrow.amount == 0
                || self.bank.transfer(&ESCROW_ACCOUNT, &requester, &escrow).is_ok();
            if !refunded {
                continue;
            }
            request.status = RequestStatus::TimedOut;
            state.insert(&keys::request_key(request.id), &codec::to_bytes_canonical(&request))?;
            ctx.events.emit(
                ctx.block_height,
                PawEvent::ComputeRequestTimedOut {
                    request_id: request.id,
                },
            );
        }
        Ok(())
    }

    /// Pays out refunds queued by `submit_result`'s verification-failure
    /// path. Runs after the decision that queued them is already
    /// durably committed, so a failed `BankKeeper::transfer` here simply
    /// leaves the record in place for a future block's sweep to retry.
    fn process_queued_refunds(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        params: &ComputeParams,
    ) -> Result<(), paw_types::error::StateError> {
        let mut scanned = 0u32;
        let mut to_process = Vec::new();
        for item in state.prefix_scan(&[b'C', keys::QUEUED_REFUND])? {
            if scanned >= params.refund_sweep_batch {
                break;
            }
            scanned += 1;
            let (key, value) = item?;
            if let Ok(refund) = codec::from_bytes_canonical::<QueuedRefund>(&key, &value) {
                to_process.push((key.to_vec(), refund));
            }
        }
        for (key, refund) in to_process {
            let refunded = refund.amount.amount == 0
                || self
                    .bank
                    .transfer(&ESCROW_ACCOUNT, &refund.recipient, &refund.amount)
                    .is_ok();
            if refunded {
                state.delete(&key)?;
                ctx.events.emit(
                    ctx.block_height,
                    PawEvent::ComputeEscrowRefunded {
                        request_id: refund.request_id,
                    },
                );
            }
        }
        Ok(())
    }

    fn match_pending_requests(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        params: &ComputeParams,
    ) -> Result<(), paw_types::error::StateError> {
        let mut scanned = 0u32;
        let mut to_assign = Vec::new();
        for item in state.prefix_scan(&[b'C', keys::REQUEST])? {
            if scanned >= params.match_scan_batch {
                break;
            }
            let (key, value) = item?;
            let request: Request = match codec::from_bytes_canonical(&key, &value) {
                Ok(r) => r,
                Err(_) => continue,
            };
            if request.status == RequestStatus::Pending {
                scanned += 1;
                to_assign.push(request);
            }
        }
        for mut request in to_assign {
            if let Ok(Some(provider_addr)) = self.select_provider(state, &request) {
                request.provider = Some(provider_addr);
                request.status = RequestStatus::Assigned;
                state.insert(&keys::request_key(request.id), &codec::to_bytes_canonical(&request))?;
                ctx.events.emit(
                    ctx.block_height,
                    PawEvent::ComputeRequestAssigned {
                        request_id: request.id,
                        provider: provider_addr,
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
    use paw_types::app::ChainId;
    use paw_types::events::VecEventSink;
    use paw_storage::MemoryStore;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeBank(Mutex<HashMap<AccountId, u128>>);

    impl FakeBank {
        fn new(seed: &[(AccountId, u128)]) -> Self {
            Self(Mutex::new(seed.iter().cloned().collect()))
        }
    }

    impl BankKeeper for FakeBank {
        fn balance(&self, account: &AccountId, _denom: &paw_types::app::DenomId) -> Result<Coin, TransactionError> {
            let amount = self.0.lock().unwrap().get(account).copied().unwrap_or(0);
            Ok(Coin::new("upaw", amount))
        }
        fn transfer(&self, from: &AccountId, to: &AccountId, amount: &Coin) -> Result<(), TransactionError> {
            let mut ledger = self.0.lock().unwrap();
            let from_balance = ledger.entry(*from).or_insert(0);
            if *from_balance < amount.amount {
                return Err(TransactionError::Internal("insufficient test balance".into()));
            }
            *from_balance -= amount.amount;
            *ledger.entry(*to).or_insert(0) += amount.amount;
            Ok(())
        }
        fn mint(&self, to: &AccountId, amount: &Coin) -> Result<(), TransactionError> {
            *self.0.lock().unwrap().entry(*to).or_insert(0) += amount.amount;
            Ok(())
        }
        fn burn(&self, from: &AccountId, amount: &Coin) -> Result<(), TransactionError> {
            let mut ledger = self.0.lock().unwrap();
            let bal = ledger.entry(*from).or_insert(0);
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

    fn specs() -> ProviderSpecs {
        ProviderSpecs {
            cpu: 2,
            mem_mb: 1024,
            gpu: 0,
            storage_gb: 10,
            timeout_secs: 600,
        }
    }

    fn harness(seed: &[(AccountId, u128)]) -> (ComputeMarketService, MemoryStore, ServiceDirectory, VecEventSink) {
        let svc = ComputeMarketService::new(
            Arc::new(FakeBank::new(seed)),
            Arc::new(FakeGovernance(AccountId([0x99; 32]))),
        );
        (svc, MemoryStore::default(), ServiceDirectory::new(vec![]), VecEventSink::new())
    }

    fn ctx<'a>(
        services: &'a ServiceDirectory,
        events: &'a VecEventSink,
        signer: AccountId,
        height: u64,
    ) -> TxContext<'a> {
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
    fn register_provider_escrows_stake_and_activates() {
        let provider = AccountId([1u8; 32]);
        let (svc, mut state, dir, events) = harness(&[(provider, 10 * paw_types::app::ONE_PAW)]);
        let tx_ctx = ctx(&dir, &events, provider, 1);

        svc.register_provider(
            &mut state,
            RegisterProviderParams {
                moniker: "p1".into(),
                endpoint: "https://p1.example".into(),
                specs: specs(),
                pricing: 100,
                stake: Coin::new("upaw", paw_types::app::ONE_PAW),
            },
            &tx_ctx,
        )
        .unwrap();

        let stored = svc.load_provider(&state, &provider).unwrap().unwrap();
        assert!(stored.active);
        assert_eq!(stored.reputation, 50);
        assert_eq!(
            svc.bank.balance(&provider, &"upaw".into()).unwrap().amount,
            9 * paw_types::app::ONE_PAW
        );
    }

    #[test]
    fn register_provider_rejects_understake() {
        let provider = AccountId([2u8; 32]);
        let (svc, mut state, dir, events) = harness(&[(provider, paw_types::app::ONE_PAW)]);
        let tx_ctx = ctx(&dir, &events, provider, 1);

        let err = svc
            .register_provider(
                &mut state,
                RegisterProviderParams {
                    moniker: "p2".into(),
                    endpoint: "https://p2.example".into(),
                    specs: specs(),
                    pricing: 100,
                    stake: Coin::new("upaw", 1),
                },
                &tx_ctx,
            )
            .unwrap_err();
        assert!(matches!(err, TransactionError::Compute(ComputeError::InsufficientStake { .. })));
    }

    #[test]
    fn submit_request_assigns_matching_provider_deterministically() {
        let provider = AccountId([3u8; 32]);
        let requester = AccountId([4u8; 32]);
        let (svc, mut state, dir, events) = harness(&[
            (provider, 10 * paw_types::app::ONE_PAW),
            (requester, 10 * paw_types::app::ONE_PAW),
        ]);

        svc.register_provider(
            &mut state,
            RegisterProviderParams {
                moniker: "p3".into(),
                endpoint: "https://p3.example".into(),
                specs: specs(),
                pricing: 100,
                stake: Coin::new("upaw", paw_types::app::ONE_PAW),
            },
            &ctx(&dir, &events, provider, 1),
        )
        .unwrap();

        svc.submit_request(
            &mut state,
            SubmitRequestParams {
                specs: specs(),
                container_image: "alpine".into(),
                command: "echo hi".into(),
                max_payment: Coin::new("upaw", 1000),
                deadline: 100,
                nonce: 1,
            },
            &ctx(&dir, &events, requester, 2),
        )
        .unwrap();

        let request = svc.load_request(&state, 0).unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Assigned);
        assert_eq!(request.provider, Some(provider));
    }

    #[test]
    fn submit_request_rejects_nonce_replay() {
        let requester = AccountId([5u8; 32]);
        let (svc, mut state, dir, events) = harness(&[(requester, 10 * paw_types::app::ONE_PAW)]);
        let params = SubmitRequestParams {
            specs: specs(),
            container_image: "alpine".into(),
            command: "echo hi".into(),
            max_payment: Coin::new("upaw", 1000),
            deadline: 100,
            nonce: 7,
        };
        svc.submit_request(&mut state, params.clone(), &ctx(&dir, &events, requester, 1))
            .unwrap();
        let err = svc
            .submit_request(&mut state, params, &ctx(&dir, &events, requester, 2))
            .unwrap_err();
        assert!(matches!(err, TransactionError::Compute(ComputeError::Replay)));
    }

    #[test]
    fn cancel_request_refunds_escrow_and_requires_requester() {
        let requester = AccountId([6u8; 32]);
        let other = AccountId([7u8; 32]);
        let (svc, mut state, dir, events) = harness(&[(requester, 10 * paw_types::app::ONE_PAW)]);

        svc.submit_request(
            &mut state,
            SubmitRequestParams {
                specs: specs(),
                container_image: "alpine".into(),
                command: "echo hi".into(),
                max_payment: Coin::new("upaw", 1000),
                deadline: 100,
                nonce: 1,
            },
            &ctx(&dir, &events, requester, 1),
        )
        .unwrap();

        let err = svc
            .cancel_request(&mut state, CancelRequestParams { request_id: 0 }, &ctx(&dir, &events, other, 2))
            .unwrap_err();
        assert!(matches!(err, TransactionError::Compute(ComputeError::Unauthorized)));

        svc.cancel_request(&mut state, CancelRequestParams { request_id: 0 }, &ctx(&dir, &events, requester, 2))
            .unwrap();
        let request = svc.load_request(&state, 0).unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Cancelled);
        assert_eq!(
            svc.bank.balance(&requester, &"upaw".into()).unwrap().amount,
            10 * paw_types::app::ONE_PAW
        );
    }

    #[tokio::test]
    async fn end_of_block_times_out_overdue_request_and_refunds() {
        let requester = AccountId([8u8; 32]);
        let (svc, mut state, dir, events) = harness(&[(requester, 10 * paw_types::app::ONE_PAW)]);

        svc.submit_request(
            &mut state,
            SubmitRequestParams {
                specs: specs(),
                container_image: "alpine".into(),
                command: "echo hi".into(),
                max_payment: Coin::new("upaw", 1000),
                deadline: 5,
                nonce: 1,
            },
            &ctx(&dir, &events, requester, 1),
        )
        .unwrap();

        let internal_ctx = ctx(&dir, &events, AccountId::zero(), 10);
        svc.on_end_block(&mut state, &internal_ctx).await.unwrap();

        let request = svc.load_request(&state, 0).unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::TimedOut);
        assert_eq!(
            svc.bank.balance(&requester, &"upaw".into()).unwrap().amount,
            10 * paw_types::app::ONE_PAW
        );
    }

    #[tokio::test]
    async fn submit_result_failure_queues_refund_and_blocks_double_payout() {
        use dcrypt::algorithms::ByteSerializable;
        use dcrypt::sign::eddsa;

        let provider = AccountId([9u8; 32]);
        let requester = AccountId([10u8; 32]);
        let (svc, mut state, dir, events) = harness(&[
            (provider, 10 * paw_types::app::ONE_PAW),
            (requester, 10 * paw_types::app::ONE_PAW),
        ]);

        svc.register_provider(
            &mut state,
            RegisterProviderParams {
                moniker: "p9".into(),
                endpoint: "https://p9.example".into(),
                specs: specs(),
                pricing: 100,
                stake: Coin::new("upaw", paw_types::app::ONE_PAW),
            },
            &ctx(&dir, &events, provider, 1),
        )
        .unwrap();

        let mut rng = rand::rngs::OsRng;
        let (registered_pk, registered_sk) = eddsa::Ed25519::keypair(&mut rng).unwrap();
        let (_other_pk, other_sk) = eddsa::Ed25519::keypair(&mut rng).unwrap();

        svc.register_signing_key(
            &mut state,
            RegisterSigningKeyParams {
                pubkey: registered_pk.to_bytes().to_vec(),
            },
            &ctx(&dir, &events, provider, 1),
        )
        .unwrap();

        svc.submit_request(
            &mut state,
            SubmitRequestParams {
                specs: specs(),
                container_image: "alpine".into(),
                command: "echo hi".into(),
                max_payment: Coin::new("upaw", 1000),
                deadline: 100,
                nonce: 1,
            },
            &ctx(&dir, &events, requester, 2),
        )
        .unwrap();

        // Structurally valid signature from the wrong key: `verify_result`
        // returns `Ok(false)` rather than erroring, exercising the
        // verification-failure branch itself.
        let output_hash = [7u8; 32];
        let wrong_key_sig = eddsa::Ed25519::sign(&output_hash, &other_sk).unwrap();

        let err = svc
            .submit_result(
                &mut state,
                SubmitResultParams {
                    request_id: 0,
                    output_hash,
                    output_url: "https://out.example/0".into(),
                    merkle_proof: None,
                    signature: Some(wrong_key_sig.to_bytes().to_vec()),
                    zk_proof: None,
                },
                &ctx(&dir, &events, provider, 3),
            )
            .unwrap_err();
        assert!(matches!(err, TransactionError::Compute(ComputeError::VerificationFailed(_))));

        let request = svc.load_request(&state, 0).unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Failed);
        // Escrow is queued for refund, not yet paid: the requester's
        // balance is still fully locked at this point.
        assert!(state.get(&keys::queued_refund_key(0)).unwrap().is_some());
        assert_eq!(
            svc.bank.balance(&requester, &"upaw".into()).unwrap().amount,
            10 * paw_types::app::ONE_PAW - 1000
        );

        let internal_ctx = ctx(&dir, &events, AccountId::zero(), 10);
        svc.on_end_block(&mut state, &internal_ctx).await.unwrap();

        assert!(state.get(&keys::queued_refund_key(0)).unwrap().is_none());
        assert_eq!(
            svc.bank.balance(&requester, &"upaw".into()).unwrap().amount,
            10 * paw_types::app::ONE_PAW
        );

        // A later SubmitResult for the same request — even with a
        // genuinely valid signature — must not pay the provider: the
        // request is terminally Failed, not Assigned/Processing.
        let valid_sig = eddsa::Ed25519::sign(&output_hash, &registered_sk).unwrap();
        let err = svc
            .submit_result(
                &mut state,
                SubmitResultParams {
                    request_id: 0,
                    output_hash,
                    output_url: "https://out.example/0".into(),
                    merkle_proof: None,
                    signature: Some(valid_sig.to_bytes().to_vec()),
                    zk_proof: None,
                },
                &ctx(&dir, &events, provider, 11),
            )
            .unwrap_err();
        assert!(matches!(err, TransactionError::Compute(ComputeError::InvalidState(_))));
        assert_eq!(
            svc.bank.balance(&provider, &"upaw".into()).unwrap().amount,
            9 * paw_types::app::ONE_PAW
        );
    }
}
