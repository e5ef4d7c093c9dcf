//! Shared application-level types for the PAW node: account and coin
//! primitives, the error taxonomy, canonical state-key constants, the
//! canonical codec, the event log, and service configuration shapes.

#![forbid(unsafe_code)]

pub mod app;
pub mod codec;
pub mod error;
pub mod events;
pub mod keys;
pub mod pagination;
pub mod service_configs;
pub mod tx;

pub use app::{AccountId, ChainId, Coin, Height};
pub use tx::{ChainTransaction, ServiceMessage};
