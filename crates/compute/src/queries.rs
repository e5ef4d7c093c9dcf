//! COMPUTE's read-only query interface (`spec.md §4.3`, Queries row):
//! `Provider`, `Providers`, `Request`, `ProviderRequests`, `Result`.
//!
//! These are plain functions over `&dyn StateAccess`, not `#[method]`
//! dispatch targets — queries never go through `ExecutionMachine`'s
//! transaction pipeline, they read already-committed state directly (the
//! spec's "queries run on a read-only snapshot and may execute
//! concurrently with block execution" note describes a concurrency
//! guarantee this single-process, no-RPC-gateway core doesn't itself
//! provide; the guarantee belongs to whatever snapshotting store backs a
//! real deployment, out of scope here per DESIGN.md).

use crate::types::{JobResult, Provider, Request};
use paw_api::state::StateAccess;
use paw_types::app::AccountId;
use paw_types::codec;
use paw_types::error::{ComputeError, TransactionError};
use paw_types::keys::compute as keys;
use paw_types::pagination::{PageRequest, PageResponse};

pub fn provider(state: &dyn StateAccess, addr: &AccountId) -> Result<Provider, TransactionError> {
    let key = keys::provider_key(addr.as_ref());
    let bytes = state
        .get(&key)?
        .ok_or_else(|| ComputeError::ProviderNotFound(hex::encode(addr.as_ref())))?;
    Ok(codec::from_bytes_canonical(&key, &bytes)?)
}

pub fn providers(state: &dyn StateAccess, page: &PageRequest) -> Result<PageResponse<Provider>, TransactionError> {
    scan_page(state, &[b'C', keys::PROVIDER], page, |_, _| true)
}

pub fn request(state: &dyn StateAccess, id: u64) -> Result<Request, TransactionError> {
    let key = keys::request_key(id);
    let bytes = state.get(&key)?.ok_or(ComputeError::RequestNotFound(id))?;
    Ok(codec::from_bytes_canonical(&key, &bytes)?)
}

pub fn provider_requests(
    state: &dyn StateAccess,
    provider: &AccountId,
    page: &PageRequest,
) -> Result<PageResponse<Request>, TransactionError> {
    scan_page(state, &[b'C', keys::REQUEST], page, |_, req: &Request| {
        req.provider.as_ref() == Some(provider)
    })
}

pub fn result(state: &dyn StateAccess, request_id: u64) -> Result<JobResult, TransactionError> {
    let key = keys::result_key(request_id);
    let bytes = state.get(&key)?.ok_or(ComputeError::RequestNotFound(request_id))?;
    Ok(codec::from_bytes_canonical(&key, &bytes)?)
}

/// Scans every entry under `prefix`, keeps those passing `keep`, and
/// slices out one page starting just past `page.continuation_token`.
/// `next_token` is the raw key of the last item returned, so the next
/// call resumes exactly where this one left off.
fn scan_page<T, F>(
    state: &dyn StateAccess,
    prefix: &[u8],
    page: &PageRequest,
    keep: F,
) -> Result<PageResponse<T>, TransactionError>
where
    T: parity_scale_codec::Decode,
    F: Fn(&[u8], &T) -> bool,
{
    let limit = page.effective_limit() as usize;
    let after = page.continuation_token.clone().unwrap_or_default();

    let mut items = Vec::new();
    let mut last_key: Option<Vec<u8>> = None;
    let mut next_token = None;
    for entry in state.prefix_scan(prefix)? {
        let (key, value) = entry?;
        if key.as_ref() <= after.as_slice() {
            continue;
        }
        let decoded: T = match codec::from_bytes_canonical(&key, &value) {
            Ok(v) => v,
            Err(_) => continue,
        };
        if !keep(&key, &decoded) {
            continue;
        }
        if items.len() == limit {
            next_token = last_key.clone();
            break;
        }
        last_key = Some(key.to_vec());
        items.push(decoded);
    }
    Ok(PageResponse::new(items, next_token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProviderSpecs;
    use paw_storage::MemoryStore;
    use paw_types::app::Coin;

    fn seed_provider(store: &mut MemoryStore, byte: u8) -> AccountId {
        let addr = AccountId([byte; 32]);
        let provider = Provider {
            addr,
            moniker: format!("provider-{byte}"),
            endpoint: "https://example.invalid".into(),
            specs: ProviderSpecs { cpu: 4, mem_mb: 1024, gpu: 0, storage_gb: 10, timeout_secs: 60 },
            pricing: 100,
            stake: Coin::new("upaw", 1_000),
            reputation: 100,
            completed: 0,
            failed: 0,
            slash_count: 0,
            active: true,
            registered_at_height: 1,
        };
        store
            .insert(&keys::provider_key(addr.as_ref()), &codec::to_bytes_canonical(&provider))
            .unwrap();
        addr
    }

    #[test]
    fn provider_returns_not_found_for_missing_address() {
        let store = MemoryStore::new();
        let err = provider(&store, &AccountId([7u8; 32])).unwrap_err();
        assert!(matches!(err, TransactionError::Compute(ComputeError::ProviderNotFound(_))));
    }

    #[test]
    fn providers_paginates_in_ascending_address_order() {
        let mut store = MemoryStore::new();
        seed_provider(&mut store, 1);
        seed_provider(&mut store, 2);
        seed_provider(&mut store, 3);

        let page = PageRequest { limit: Some(2), continuation_token: None };
        let first = providers(&store, &page).unwrap();
        assert_eq!(first.items.len(), 2);
        assert!(first.next_token.is_some());

        let second = providers(&store, &PageRequest { limit: Some(2), continuation_token: first.next_token }).unwrap();
        assert_eq!(second.items.len(), 1);
        assert!(second.next_token.is_none());
    }

    #[test]
    fn provider_requests_filters_by_assigned_provider() {
        let mut store = MemoryStore::new();
        let provider_a = AccountId([0xAA; 32]);
        let provider_b = AccountId([0xBB; 32]);
        for (id, assigned) in [(1u64, Some(provider_a)), (2, Some(provider_b)), (3, Some(provider_a))] {
            let req = Request {
                id,
                requester: AccountId([1; 32]),
                specs: ProviderSpecs { cpu: 1, mem_mb: 1, gpu: 0, storage_gb: 1, timeout_secs: 1 },
                container_image: "img".into(),
                command: "run".into(),
                max_payment: Coin::new("upaw", 10),
                provider: assigned,
                status: crate::types::RequestStatus::Assigned,
                deadline: 100,
                created_at: 1,
                escrow: Coin::new("upaw", 10),
            };
            store.insert(&keys::request_key(id), &codec::to_bytes_canonical(&req)).unwrap();
        }

        let page = provider_requests(&store, &provider_a, &PageRequest::default()).unwrap();
        assert_eq!(page.items.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3]);
    }
}
