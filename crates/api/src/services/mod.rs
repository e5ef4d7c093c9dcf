//! Traits for pluggable blockchain services.

use crate::identity::CredentialsView;
use crate::lifecycle::OnEndBlock;
use crate::transaction::context::TxContext;
use crate::transaction::decorator::TxDecorator;
use async_trait::async_trait;
use paw_types::error::{TransactionError, UpgradeError};
use paw_types::service_configs::Capabilities;
use std::any::Any;
use std::hash::Hash;

pub mod access;

/// An identifier for a swappable service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceType {
    ComputeMarket,
    Dex,
    Oracle,
    Ibc,
    Custom(String),
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceType::ComputeMarket => write!(f, "compute_market"),
            ServiceType::Dex => write!(f, "dex"),
            ServiceType::Oracle => write!(f, "oracle"),
            ServiceType::Ibc => write!(f, "ibc"),
            ServiceType::Custom(s) => write!(f, "{s}"),
        }
    }
}

/// The base trait for any service managed by the chain.
///
/// `id()` is the tag a [`paw_types::tx::ServiceMessage`] carries to
/// route to this service's `handle_service_call`; it must be globally
/// unique and is also the sort key the
/// [`access::ServiceDirectory`] uses for its deterministic iteration
/// order, which every ante-handler pass and end-of-block sweep depends
/// on for cross-node determinism.
#[async_trait]
pub trait BlockchainService: Any + Send + Sync {
    fn id(&self) -> &str;

    /// The ABI version this service expects from the host.
    fn abi_version(&self) -> u32;

    /// A string identifying the schema of the state this service reads/writes.
    fn state_schema(&self) -> &str;

    /// The lifecycle capabilities (hooks) this service implements.
    fn capabilities(&self) -> Capabilities;

    fn as_any(&self) -> &dyn Any;

    /// Dispatches a `(method, params)` pair decoded from a
    /// [`paw_types::tx::ServiceMessage`]. Generated for `#[method]`-tagged
    /// inherent functions by `#[service_interface]`; the default here
    /// only covers services that opt out of that macro entirely.
    async fn handle_service_call(
        &self,
        state: &mut dyn crate::state::StateAccess,
        method: &str,
        params: &[u8],
        ctx: &mut TxContext<'_>,
    ) -> Result<(), TransactionError> {
        let _ = (state, params, ctx);
        Err(TransactionError::Unsupported {
            service: self.id().to_string(),
            method: method.to_string(),
        })
    }

    fn as_tx_decorator(&self) -> Option<&dyn TxDecorator> {
        None
    }

    fn as_on_end_block(&self) -> Option<&dyn OnEndBlock> {
        None
    }

    fn as_credentials_view(&self) -> Option<&dyn CredentialsView> {
        None
    }
}

/// A service that supports runtime upgrades and rollbacks.
#[async_trait]
pub trait UpgradableService: BlockchainService {
    async fn prepare_upgrade(&self, new_params: &[u8]) -> Result<Vec<u8>, UpgradeError>;

    async fn complete_upgrade(&self, snapshot: &[u8]) -> Result<(), UpgradeError>;

    fn start(&self) -> Result<(), UpgradeError> {
        Ok(())
    }

    fn stop(&self) -> Result<(), UpgradeError> {
        Ok(())
    }

    fn health_check(&self) -> Result<(), UpgradeError> {
        Ok(())
    }
}
