//! IBC: channel-authorized packet relay between this chain's own
//! modules and an external counterparty, with replay protection and
//! escrowed-asset refunds.

pub mod service;
pub mod types;

pub use service::{IbcService, ESCROW_ACCOUNT};
