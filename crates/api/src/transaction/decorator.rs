//! Ante-handler style pre-execution hooks for services.

use crate::services::BlockchainService;
use crate::state::StateAccess;
use crate::transaction::context::TxContext;
use async_trait::async_trait;
use paw_types::error::TransactionError;
use paw_types::tx::ChainTransaction;

/// A service that performs pre-execution validation and, optionally,
/// state mutation ahead of the transaction's own message handlers.
///
/// Decorators run in the `ServiceDirectory`'s deterministic order, split
/// into two phases so the whole ante pipeline is atomic:
///
/// 1. [`validate_ante`](TxDecorator::validate_ante) — read-only checks.
///    Any decorator failing here aborts the transaction with no side
///    effects at all.
/// 2. [`write_ante`](TxDecorator::write_ante) — state mutation (fee
///    deduction, nonce increment). Only runs once every decorator's
///    `validate_ante` has passed.
#[async_trait]
pub trait TxDecorator: BlockchainService {
    async fn validate_ante(
        &self,
        state: &dyn StateAccess,
        tx: &ChainTransaction,
        ctx: &TxContext,
    ) -> Result<(), TransactionError>;

    /// Applies state mutations. The default implementation is a no-op,
    /// suitable for decorators that are pure validation.
    async fn write_ante(
        &self,
        state: &mut dyn StateAccess,
        tx: &ChainTransaction,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        let _ = (state, tx, ctx);
        Ok(())
    }
}
