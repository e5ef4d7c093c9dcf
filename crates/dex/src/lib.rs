//! DEX: constant-product AMM pools and a limit-order book.

pub mod queries;
pub mod service;
pub mod types;

pub use service::{DexService, ESCROW_ACCOUNT};
