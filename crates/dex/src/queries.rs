//! DEX's read-only query interface (`spec.md §4.4`, Queries row):
//! `Pool`, `Pools`, `OrderBook`, `EstimateSwap`, `LPPosition`.
//!
//! Plain functions over `&dyn StateAccess`, same rationale as
//! `paw_compute::queries` (see that module's doc comment).

use crate::service::{load_pool_raw, side_index_prefix, swap_output};
use crate::types::{LimitOrder, LpPosition, OrderSide, Pool};
use paw_api::state::StateAccess;
use paw_types::app::{AccountId, DenomId};
use paw_types::codec;
use paw_types::error::{DexError, TransactionError};
use paw_types::keys::dex as keys;
use paw_types::pagination::{PageRequest, PageResponse};

pub fn pool(state: &dyn StateAccess, id: u64) -> Result<Pool, TransactionError> {
    load_pool_raw(state, id)?.ok_or_else(|| TransactionError::from(DexError::PoolNotFound(id)))
}

pub fn pools(state: &dyn StateAccess, page: &PageRequest) -> Result<PageResponse<Pool>, TransactionError> {
    let limit = page.effective_limit() as usize;
    let after = page.continuation_token.clone().unwrap_or_default();

    let mut items = Vec::new();
    let mut last_key: Option<Vec<u8>> = None;
    let mut next_token = None;
    for entry in state.prefix_scan(&[b'D', keys::POOL])? {
        let (key, value) = entry?;
        if key.as_ref() <= after.as_slice() {
            continue;
        }
        let decoded: Pool = match codec::from_bytes_canonical(&key, &value) {
            Ok(v) => v,
            Err(_) => continue,
        };
        if items.len() == limit {
            next_token = last_key.clone();
            break;
        }
        last_key = Some(key.to_vec());
        items.push(decoded);
    }
    Ok(PageResponse::new(items, next_token))
}

/// Returns up to `limit` resting orders on each side of `pool_id`'s
/// book, already in price-time priority (best first) since that is the
/// order the secondary index itself sorts in.
pub fn order_book(
    state: &dyn StateAccess,
    pool_id: u64,
    limit: u32,
) -> Result<(Vec<LimitOrder>, Vec<LimitOrder>), TransactionError> {
    let limit = limit.clamp(1, paw_types::pagination::MAX_PAGE_SIZE) as usize;
    let bids = side_orders(state, pool_id, OrderSide::Buy, limit)?;
    let asks = side_orders(state, pool_id, OrderSide::Sell, limit)?;
    Ok((bids, asks))
}

fn side_orders(
    state: &dyn StateAccess,
    pool_id: u64,
    side: OrderSide,
    limit: usize,
) -> Result<Vec<LimitOrder>, TransactionError> {
    let mut out = Vec::new();
    for item in state.prefix_scan(&side_index_prefix(pool_id, side))? {
        if out.len() == limit {
            break;
        }
        let (key, _) = item?;
        if key.len() < 8 {
            continue;
        }
        let mut arr = [0u8; 8];
        arr.copy_from_slice(&key[key.len() - 8..]);
        let order_id = u64::from_be_bytes(arr);
        let order_key = keys::order_key(order_id);
        if let Some(bytes) = state.get(&order_key)? {
            if let Ok(order) = codec::from_bytes_canonical::<LimitOrder>(&order_key, &bytes) {
                out.push(order);
            }
        }
    }
    Ok(out)
}

/// Quotes the constant-product output for swapping `amount_in` of
/// `token_in` through `pool_id`, with no state mutation and no
/// size/deviation/flash-guard checks — those are enforced only by the
/// real `swap` transaction, not by this estimate.
pub fn estimate_swap(
    state: &dyn StateAccess,
    pool_id: u64,
    token_in: &DenomId,
    amount_in: u128,
) -> Result<u128, TransactionError> {
    let pool = pool(state, pool_id)?;
    let (reserve_in, reserve_out) = if *token_in == pool.token_a {
        (pool.reserve_a, pool.reserve_b)
    } else if *token_in == pool.token_b {
        (pool.reserve_b, pool.reserve_a)
    } else {
        return Err(DexError::InvalidArgument("token_in is not one of the pool's tokens".into()).into());
    };
    swap_output(reserve_in, reserve_out, amount_in, &pool.swap_fee).ok_or_else(|| {
        TransactionError::from(DexError::InvalidArgument("swap would not produce any output".into()))
    })
}

pub fn lp_position(state: &dyn StateAccess, pool_id: u64, owner: &AccountId) -> Result<LpPosition, TransactionError> {
    let key = keys::lp_position_key(pool_id, owner.as_ref());
    match state.get(&key)? {
        Some(bytes) => Ok(codec::from_bytes_canonical(&key, &bytes)?),
        None => Ok(LpPosition { pool_id, owner: *owner, shares: 0 }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paw_storage::MemoryStore;
    use paw_types::app::Rational64;

    fn seed_pool(store: &mut MemoryStore, id: u64) {
        let pool = Pool {
            id,
            token_a: DenomId("upaw".into()),
            token_b: DenomId("uusdc".into()),
            reserve_a: 1_000_000,
            reserve_b: 2_000_000,
            total_shares: 1_000_000,
            swap_fee: Rational64::new(3, 1000),
            created_at: 1,
        };
        store.insert(&keys::pool_key(id), &codec::to_bytes_canonical(&pool)).unwrap();
    }

    #[test]
    fn pool_not_found_surfaces_typed_error() {
        let store = MemoryStore::new();
        let err = pool(&store, 9).unwrap_err();
        assert!(matches!(err, TransactionError::Dex(DexError::PoolNotFound(9))));
    }

    #[test]
    fn estimate_swap_matches_constant_product_formula() {
        let mut store = MemoryStore::new();
        seed_pool(&mut store, 1);
        let out = estimate_swap(&store, 1, &DenomId("upaw".into()), 1_000).unwrap();
        let expected = swap_output(1_000_000, 2_000_000, 1_000, &Rational64::new(3, 1000)).unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn estimate_swap_rejects_unknown_token() {
        let mut store = MemoryStore::new();
        seed_pool(&mut store, 1);
        let err = estimate_swap(&store, 1, &DenomId("uatom".into()), 1_000).unwrap_err();
        assert!(matches!(err, TransactionError::Dex(DexError::InvalidArgument(_))));
    }

    #[test]
    fn lp_position_defaults_to_zero_shares() {
        let store = MemoryStore::new();
        let pos = lp_position(&store, 1, &AccountId([4; 32])).unwrap();
        assert_eq!(pos.shares, 0);
    }
}
