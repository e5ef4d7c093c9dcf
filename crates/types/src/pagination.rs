//! Shared pagination types for list queries.
//!
//! Every paginated query across COMPUTE/DEX/ORACLE uses the same request
//! and response shape: a page size (clamped, never rejected) and an
//! opaque continuation token that callers pass back unmodified.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const MAX_PAGE_SIZE: u32 = 1_000;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageRequest {
    /// Requested page size; `None` means [`DEFAULT_PAGE_SIZE`]. Values
    /// above [`MAX_PAGE_SIZE`] are silently clamped, never rejected,
    /// per the query interface contract.
    pub limit: Option<u32>,
    /// Opaque continuation token from a prior response, or `None` to
    /// start from the beginning.
    pub continuation_token: Option<Vec<u8>>,
}

impl PageRequest {
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: None,
            continuation_token: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    /// Present iff there are more results beyond this page.
    pub next_token: Option<Vec<u8>>,
}

impl<T> PageResponse<T> {
    pub fn new(items: Vec<T>, next_token: Option<Vec<u8>>) -> Self {
        Self { items, next_token }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_limit_is_clamped_not_rejected() {
        let req = PageRequest {
            limit: Some(50_000),
            continuation_token: None,
        };
        assert_eq!(req.effective_limit(), MAX_PAGE_SIZE);
    }

    #[test]
    fn zero_limit_clamps_to_one() {
        let req = PageRequest {
            limit: Some(0),
            continuation_token: None,
        };
        assert_eq!(req.effective_limit(), 1);
    }

    #[test]
    fn missing_limit_uses_default() {
        let req = PageRequest::default();
        assert_eq!(req.effective_limit(), DEFAULT_PAGE_SIZE);
    }
}
