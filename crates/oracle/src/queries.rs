//! ORACLE's read-only query interface (`spec.md §4.5`, Queries row):
//! `Price`, `Prices`, `ValidatorPrices`.
//!
//! Plain functions over `&dyn StateAccess`, same rationale as
//! `paw_compute::queries` (see that module's doc comment).

use crate::types::{CanonicalPrice, ValidatorPriceVote};
use paw_api::state::StateAccess;
use paw_types::app::AccountId;
use paw_types::codec;
use paw_types::error::{OracleError, TransactionError};
use paw_types::keys::oracle as keys;
use paw_types::pagination::{PageRequest, PageResponse};

pub fn price(state: &dyn StateAccess, asset: &str) -> Result<CanonicalPrice, TransactionError> {
    let key = keys::canonical_price_key(asset);
    let bytes = state
        .get(&key)?
        .ok_or_else(|| TransactionError::from(OracleError::PriceNotFound(asset.to_string())))?;
    Ok(codec::from_bytes_canonical(&key, &bytes)?)
}

pub fn prices(state: &dyn StateAccess, page: &PageRequest) -> Result<PageResponse<CanonicalPrice>, TransactionError> {
    scan_page(state, &[b'E', keys::CANONICAL_PRICE], page, |_, _| true)
}

pub fn validator_prices(
    state: &dyn StateAccess,
    validator: &AccountId,
    page: &PageRequest,
) -> Result<PageResponse<ValidatorPriceVote>, TransactionError> {
    scan_page(state, &[b'E', keys::VALIDATOR_VOTE], page, |_, vote: &ValidatorPriceVote| {
        vote.validator == *validator
    })
}

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
    use crate::types::AggregationMethod;
    use paw_storage::MemoryStore;
    use paw_types::app::Rational64;

    #[test]
    fn price_not_found_surfaces_typed_error() {
        let store = MemoryStore::new();
        let err = price(&store, "upaw").unwrap_err();
        assert!(matches!(err, TransactionError::Oracle(OracleError::PriceNotFound(_))));
    }

    #[test]
    fn prices_lists_every_canonical_price() {
        let mut store = MemoryStore::new();
        for asset in ["upaw", "uusdc"] {
            let canonical = CanonicalPrice {
                asset: asset.to_string(),
                price: Rational64::new(1, 1),
                timestamp_height: 10,
                contributors: 3,
                aggregation_method: AggregationMethod::StakeWeightedMedian,
            };
            store
                .insert(&keys::canonical_price_key(asset), &codec::to_bytes_canonical(&canonical))
                .unwrap();
        }
        let page = prices(&store, &PageRequest::default()).unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.next_token.is_none());
    }

    #[test]
    fn validator_prices_filters_by_validator_across_assets() {
        let mut store = MemoryStore::new();
        let validator = AccountId([9; 32]);
        let other = AccountId([8; 32]);
        for (asset, who) in [("upaw", validator), ("uusdc", other), ("uatom", validator)] {
            let vote = ValidatorPriceVote {
                asset: asset.to_string(),
                validator: who,
                price: Rational64::new(1, 1),
                submit_height: 1,
            };
            store
                .insert(&keys::validator_vote_key(asset, who.as_ref()), &codec::to_bytes_canonical(&vote))
                .unwrap();
        }
        let page = validator_prices(&store, &validator, &PageRequest::default()).unwrap();
        assert_eq!(page.items.len(), 2);
    }
}
