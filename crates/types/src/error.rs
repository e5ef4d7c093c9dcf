//! Error taxonomy.
//!
//! Each module owns a `thiserror` enum of concrete, diagnosable failure
//! modes. Every concrete enum implements [`ErrorCode`], mapping it to one
//! of the abstract categories below — the categories are what external
//! consumers (metrics, acks, query responses) actually see. Concrete
//! variants carry the detail; categories carry the stable contract.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The abstract error taxonomy every concrete error ultimately resolves
/// to. Stable across releases; do not remove or renumber variants.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ErrorCategory {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    Unauthorized,
    Replay,
    DeadlineExpired,
    Slippage,
    PriceDeviation,
    DrainLimit,
    FlashGuard,
    InsufficientStake,
    InsufficientBalance,
    VerificationFailed,
    ModulePaused,
    UnauthorizedChannel,
    QuotaExceeded,
    Internal,
}

impl ErrorCategory {
    /// The stable machine-readable string used in events, metrics labels,
    /// and acknowledgement payloads.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Replay => "REPLAY",
            Self::DeadlineExpired => "DEADLINE_EXPIRED",
            Self::Slippage => "SLIPPAGE",
            Self::PriceDeviation => "PRICE_DEVIATION",
            Self::DrainLimit => "DRAIN_LIMIT",
            Self::FlashGuard => "FLASH_GUARD",
            Self::InsufficientStake => "INSUFFICIENT_STAKE",
            Self::InsufficientBalance => "INSUFFICIENT_BALANCE",
            Self::VerificationFailed => "VERIFICATION_FAILED",
            Self::ModulePaused => "MODULE_PAUSED",
            Self::UnauthorizedChannel => "UNAUTHORIZED_CHANNEL",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implemented by every module's concrete error enum so callers can map
/// down to the abstract, dashboarded taxonomy without a match at every
/// call site.
pub trait ErrorCode {
    fn category(&self) -> ErrorCategory;

    /// The short, human-readable diagnostic returned alongside the
    /// category in query responses and acks. Defaults to `Display`.
    fn diagnostic(&self) -> String
    where
        Self: fmt::Display,
    {
        self.to_string()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum StateError {
    #[error("key not found: {0:?}")]
    NotFound(Vec<u8>),
    #[error("codec error decoding key {0:?}: {1}")]
    Decode(Vec<u8>, String),
    #[error("overlay already committed")]
    AlreadyCommitted,
}

impl ErrorCode for StateError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::Decode(..) => ErrorCategory::Internal,
            Self::AlreadyCommitted => ErrorCategory::Internal,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ComputeError {
    #[error("argument out of bounds: {0}")]
    InvalidArgument(String),
    #[error("provider {0} not found")]
    ProviderNotFound(String),
    #[error("request {0} not found")]
    RequestNotFound(u64),
    #[error("provider already registered and active")]
    ProviderAlreadyActive,
    #[error("stake {got} below required floor {min}")]
    InsufficientStake { got: u128, min: u128 },
    #[error("replay: (sender, nonce) already recorded")]
    Replay,
    #[error("verification failed: {0}")]
    VerificationFailed(String),
    #[error("request is not in a state that permits this operation: {0}")]
    InvalidState(String),
    #[error("evidence payload of {got} bytes exceeds cap of {max}")]
    EvidenceTooLarge { got: usize, max: usize },
    #[error("module is paused")]
    ModulePaused,
    #[error("provider {0} is suspended")]
    ProviderSuspended(String),
    #[error("caller is not authorized for this operation")]
    Unauthorized,
}

impl ErrorCode for ComputeError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidArgument(_) => ErrorCategory::InvalidArgument,
            Self::ProviderNotFound(_) | Self::RequestNotFound(_) => ErrorCategory::NotFound,
            Self::ProviderAlreadyActive => ErrorCategory::AlreadyExists,
            Self::InsufficientStake { .. } => ErrorCategory::InsufficientStake,
            Self::Replay => ErrorCategory::Replay,
            Self::VerificationFailed(_) => ErrorCategory::VerificationFailed,
            Self::InvalidState(_) => ErrorCategory::InvalidArgument,
            Self::EvidenceTooLarge { .. } => ErrorCategory::QuotaExceeded,
            Self::ModulePaused | Self::ProviderSuspended(_) => ErrorCategory::ModulePaused,
            Self::Unauthorized => ErrorCategory::Unauthorized,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DexError {
    #[error("argument out of bounds: {0}")]
    InvalidArgument(String),
    #[error("pool {0} not found")]
    PoolNotFound(u64),
    #[error("order {0} not found")]
    OrderNotFound(u64),
    #[error("deadline height {deadline} already passed at {now}")]
    DeadlineExpired { deadline: u64, now: u64 },
    #[error("slippage: got {got}, wanted at least {min}")]
    Slippage { got: u128, min: u128 },
    #[error("price deviation {observed} exceeds bound {bound}")]
    PriceDeviation { observed: String, bound: String },
    #[error("swap would drain reserves below the allowed floor")]
    DrainLimit,
    #[error("flash-loan guard: cumulative swap volume in window exceeds cap")]
    FlashGuard,
    #[error("insufficient shares: has {has}, needs {needs}")]
    InsufficientShares { has: u128, needs: u128 },
    #[error("module is paused")]
    ModulePaused,
    #[error("caller is not authorized for this operation")]
    Unauthorized,
}

impl ErrorCode for DexError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidArgument(_) => ErrorCategory::InvalidArgument,
            Self::PoolNotFound(_) | Self::OrderNotFound(_) => ErrorCategory::NotFound,
            Self::DeadlineExpired { .. } => ErrorCategory::DeadlineExpired,
            Self::Slippage { .. } => ErrorCategory::Slippage,
            Self::PriceDeviation { .. } => ErrorCategory::PriceDeviation,
            Self::DrainLimit => ErrorCategory::DrainLimit,
            Self::FlashGuard => ErrorCategory::FlashGuard,
            Self::InsufficientShares { .. } => ErrorCategory::InvalidArgument,
            Self::ModulePaused => ErrorCategory::ModulePaused,
            Self::Unauthorized => ErrorCategory::Unauthorized,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum OracleError {
    #[error("argument out of bounds: {0}")]
    InvalidArgument(String),
    #[error("asset {0} is not on the allowlist or is disabled")]
    AssetNotEnabled(String),
    #[error("asset {0} has no canonical price yet")]
    PriceNotFound(String),
    #[error("validator {0} is not an active bonded member of the validator set")]
    Unauthorized(String),
    #[error("module is paused")]
    ModulePaused,
}

impl ErrorCode for OracleError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidArgument(_) => ErrorCategory::InvalidArgument,
            Self::AssetNotEnabled(_) | Self::PriceNotFound(_) => ErrorCategory::NotFound,
            Self::Unauthorized(_) => ErrorCategory::Unauthorized,
            Self::ModulePaused => ErrorCategory::ModulePaused,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum IbcError {
    #[error("(port={port}, channel={channel}) is not authorized: {reason}")]
    UnauthorizedChannel {
        port: String,
        channel: String,
        reason: String,
    },
    #[error("payload of {got} bytes exceeds the {max} byte cap")]
    PayloadTooLarge { got: usize, max: usize },
    #[error("packet failed structural validation: {0}")]
    InvalidPacket(String),
    #[error("replay: nonce/timestamp already observed or out of drift bound")]
    Replay,
    #[error("handler rejected the packet: {0}")]
    HandlerRejected(String),
}

impl ErrorCode for IbcError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::UnauthorizedChannel { .. } => ErrorCategory::UnauthorizedChannel,
            Self::PayloadTooLarge { .. } => ErrorCategory::QuotaExceeded,
            Self::InvalidPacket(_) => ErrorCategory::InvalidArgument,
            Self::Replay => ErrorCategory::Replay,
            Self::HandlerRejected(_) => ErrorCategory::Internal,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum BreakerError {
    #[error("module {0} is paused")]
    ModulePaused(String),
    #[error("provider {0} is suspended")]
    ProviderSuspended(String),
    #[error("caller is not the designated governance authority")]
    Unauthorized,
}

impl ErrorCode for BreakerError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::ModulePaused(_) | Self::ProviderSuspended(_) => ErrorCategory::ModulePaused,
            Self::Unauthorized => ErrorCategory::Unauthorized,
        }
    }
}

/// Returned by the three verifier capabilities in the crypto crate.
/// Always a rejection, never a panic — malformed inputs are a normal,
/// expected case for every verifier.
#[derive(thiserror::Error, Debug)]
pub enum CryptoError {
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("malformed merkle proof")]
    MalformedProof,
    #[error("malformed zk proof or verifying key")]
    MalformedZkInput,
    #[error("expected a {expected}-byte digest, got {got}")]
    InvalidHashLength { expected: usize, got: usize },
}

impl ErrorCode for CryptoError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::InvalidArgument
    }
}

/// Returned by [`crate::service_configs`]-configured services during a
/// runtime upgrade/rollback attempt (`UpgradableService` in `paw-api`).
#[derive(thiserror::Error, Debug)]
pub enum UpgradeError {
    #[error("incompatible state schema: expected {expected}, got {got}")]
    IncompatibleSchema { expected: String, got: String },
    #[error("migration failed: {0}")]
    MigrationFailed(String),
    #[error("health check failed: {0}")]
    HealthCheckFailed(String),
}

impl ErrorCode for UpgradeError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::IncompatibleSchema { .. } => ErrorCategory::InvalidArgument,
            Self::MigrationFailed(_) | Self::HealthCheckFailed(_) => ErrorCategory::Internal,
        }
    }
}

/// The top-level error every `BlockchainService::handle_service_call`
/// implementation returns. Every module-scoped error funnels into this
/// via `?` / `From`.
#[derive(thiserror::Error, Debug)]
pub enum TransactionError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Compute(#[from] ComputeError),
    #[error(transparent)]
    Dex(#[from] DexError),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Ibc(#[from] IbcError),
    #[error("cryptographic operation failed: {0}")]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Breaker(#[from] BreakerError),
    #[error("method {method:?} is not supported by service {service:?}")]
    Unsupported { service: String, method: String },
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl ErrorCode for TransactionError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::State(e) => e.category(),
            Self::Compute(e) => e.category(),
            Self::Dex(e) => e.category(),
            Self::Oracle(e) => e.category(),
            Self::Ibc(e) => e.category(),
            Self::Breaker(e) => e.category(),
            Self::Crypto(e) => e.category(),
            Self::Unsupported { .. } => ErrorCategory::InvalidArgument,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_strings_match_spec_taxonomy() {
        assert_eq!(ErrorCategory::DrainLimit.as_str(), "DRAIN_LIMIT");
        assert_eq!(ErrorCategory::FlashGuard.as_str(), "FLASH_GUARD");
        assert_eq!(ErrorCategory::UnauthorizedChannel.as_str(), "UNAUTHORIZED_CHANNEL");
    }

    #[test]
    fn concrete_errors_funnel_into_transaction_error_category() {
        let e: TransactionError = DexError::DrainLimit.into();
        assert_eq!(e.category(), ErrorCategory::DrainLimit);
    }
}
