//! COMPUTE: the decentralized computation marketplace module.

pub mod queries;
pub mod service;
pub mod types;

pub use service::{ComputeMarketService, ESCROW_ACCOUNT};
