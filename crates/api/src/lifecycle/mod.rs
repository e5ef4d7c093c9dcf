//! Hooks for services that need to act at the end of a block.

use crate::services::BlockchainService;
use crate::state::StateAccess;
use crate::transaction::context::TxContext;
use async_trait::async_trait;
use paw_types::error::StateError;

/// Implemented by services that run a bounded sweep once every
/// transaction in a block has been processed — nonce/reputation
/// cursors, oracle vote tallying, DEX limit-order matching and pruning.
/// Each sweep must be bounded (see the per-module `*_batch` parameters
/// in [`paw_types::service_configs`]) so end-of-block work cannot grow
/// unbounded with chain age.
#[async_trait]
pub trait OnEndBlock: BlockchainService {
    async fn on_end_block(&self, state: &mut dyn StateAccess, ctx: &TxContext) -> Result<(), StateError>;
}
