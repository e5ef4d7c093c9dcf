//! Read-only access to the set of registered blockchain services.

use crate::services::BlockchainService;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A read-only service locator, keyed by each service's own `id()`.
///
/// The teacher's directory additionally indexes services by
/// `TypeId` so callers can do `directory.get::<MyService>()`, via
/// `Arc::downcast` on an `Arc<dyn BlockchainService>`. That downcast
/// requires the trait object's vtable to carry `dyn Any`'s layout,
/// which `Arc<dyn BlockchainService>` does not guarantee merely because
/// `BlockchainService: Any` — `as_any()` is there precisely because
/// `Arc<dyn BlockchainService>` can't be downcast directly. Looking
/// services up by their own id string instead sidesteps that and is
/// the same key every `ServiceMessage` already carries for dispatch.
#[derive(Clone, Default)]
pub struct ServiceDirectory {
    /// Services in deterministic order (sorted by `id()`), relied on by
    /// ante-handler passes and end-of-block sweeps.
    ordered: Arc<Vec<Arc<dyn BlockchainService>>>,
    by_id: Arc<HashMap<String, Arc<dyn BlockchainService>>>,
}

impl fmt::Debug for ServiceDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDirectory")
            .field("service_count", &self.ordered.len())
            .finish()
    }
}

impl ServiceDirectory {
    /// Builds a directory from an unordered list of services, sorting
    /// them lexicographically by `id()` for deterministic iteration.
    pub fn new(mut services: Vec<Arc<dyn BlockchainService>>) -> Self {
        services.sort_by(|a, b| a.id().cmp(b.id()));
        let by_id = services
            .iter()
            .map(|s| (s.id().to_string(), s.clone()))
            .collect();
        Self {
            ordered: Arc::new(services),
            by_id: Arc::new(by_id),
        }
    }

    /// Looks up a service by its id string.
    pub fn get_by_id(&self, id: &str) -> Option<&Arc<dyn BlockchainService>> {
        self.by_id.get(id)
    }

    /// Iterates every registered service in deterministic id order —
    /// the order ante handlers and end-of-block sweeps must run in on
    /// every node.
    pub fn services_in_deterministic_order(&self) -> impl Iterator<Item = &Arc<dyn BlockchainService>> {
        self.ordered.iter()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateAccess;
    use crate::transaction::context::TxContext;
    use async_trait::async_trait;
    use paw_types::error::TransactionError;
    use paw_types::service_configs::Capabilities;
    use std::any::Any;

    struct Stub(&'static str);

    #[async_trait]
    impl BlockchainService for Stub {
        fn id(&self) -> &str {
            self.0
        }
        fn abi_version(&self) -> u32 {
            1
        }
        fn state_schema(&self) -> &str {
            "v1"
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities::NONE
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        async fn handle_service_call(
            &self,
            _state: &mut dyn StateAccess,
            _method: &str,
            _params: &[u8],
            _ctx: &mut TxContext<'_>,
        ) -> Result<(), TransactionError> {
            Ok(())
        }
    }

    #[test]
    fn iteration_order_is_sorted_by_id() {
        let dir = ServiceDirectory::new(vec![
            Arc::new(Stub("oracle")),
            Arc::new(Stub("compute_market")),
            Arc::new(Stub("dex")),
        ]);
        let ids: Vec<&str> = dir
            .services_in_deterministic_order()
            .map(|s| s.id())
            .collect();
        assert_eq!(ids, vec!["compute_market", "dex", "oracle"]);
    }

    #[test]
    fn lookup_by_id_finds_registered_service() {
        let dir = ServiceDirectory::new(vec![Arc::new(Stub("dex"))]);
        assert!(dir.get_by_id("dex").is_some());
        assert!(dir.get_by_id("nonexistent").is_none());
    }
}
