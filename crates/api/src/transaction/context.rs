//! The stable, read-only context threaded through transaction execution.

use crate::services::access::ServiceDirectory;
use paw_types::app::{AccountId, ChainId};
use paw_types::events::EventSink;

/// Provides stable, read-only context to services and decorators during
/// execution of a single transaction.
///
/// `block_timestamp` is a plain `u64` (Unix seconds) rather than a
/// dedicated timestamp type: every time-sensitive invariant in this
/// core (nonce expiry, order deadlines, oracle vote periods, flash-guard
/// windows) is evaluated against `block_height`, with `block_timestamp`
/// carried only for informational/event purposes, so pulling in a
/// timezone-aware timestamp crate is unwarranted here.
#[derive(Clone)]
pub struct TxContext<'a> {
    /// The height of the block currently being processed.
    pub block_height: u64,
    /// The block header's Unix timestamp, in seconds.
    pub block_timestamp: u64,
    /// The chain identifier, checked for replay protection across chains.
    pub chain_id: ChainId,
    /// The account that signed the current transaction. Authoritative
    /// source for permission checks inside services.
    pub signer_account_id: AccountId,
    /// Read-only directory of every registered service.
    pub services: &'a ServiceDirectory,
    /// Sink every mutating operation emits its typed event into.
    pub events: &'a dyn EventSink,
    /// `true` when the transaction is being simulated (e.g. `check_tx`)
    /// and must not have permanent side effects.
    pub simulation: bool,
    /// `true` when the call originates from the chain itself (e.g. an
    /// end-of-block sweep), permitting internal-only methods. Always
    /// `false` for user-submitted transactions.
    pub is_internal: bool,
}
