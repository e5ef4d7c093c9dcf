//! Decoupled identity-credential lookups for signature verification.

use crate::services::BlockchainService;
use crate::state::StateAccess;
use paw_types::app::AccountId;
use paw_types::error::TransactionError;

/// A read-only view of an account's signing key, decoupling ante-handler
/// signature checks from any one identity service's implementation.
///
/// The teacher's `Credential` carries a richer struct (algorithm tag,
/// staged-key grace period, revocation height). This core only ever
/// needs the raw Ed25519 public key bytes to call
/// [`paw_crypto::verify_ed25519`], so `get_signing_key` returns that
/// directly instead of round-tripping through a `Credential` type with
/// no other consumer in this core.
pub trait CredentialsView: BlockchainService {
    /// Returns the account's active signing key, if it has been
    /// bootstrapped with one.
    fn get_signing_key(
        &self,
        state: &dyn StateAccess,
        account_id: &AccountId,
    ) -> Result<Option<Vec<u8>>, TransactionError>;
}
