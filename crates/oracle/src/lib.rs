//! ORACLE: validator-based price submission and stake-weighted aggregation.

pub mod queries;
pub mod service;
pub mod types;

pub use service::OracleService;
