//! Cross-cutting traits shared by every PAW service: state access,
//! transaction context, service dispatch, and lifecycle hooks.
//!
//! Services implement [`services::BlockchainService`] (generated for
//! them by the `#[service_interface]` macro in `paw-macros`), are
//! looked up through [`services::access::ServiceDirectory`], read and
//! write state through [`state::StateAccess`] (transactionally wrapped
//! in [`state::StateOverlay`]), and optionally opt into the
//! [`lifecycle::OnEndBlock`] and [`transaction::decorator::TxDecorator`]
//! hooks via their declared [`paw_types::service_configs::Capabilities`].

#![forbid(unsafe_code)]

pub mod breaker;
pub mod identity;
pub mod lifecycle;
pub mod ports;
pub mod services;
pub mod state;
pub mod transaction;

pub use state::{StateAccess, StateOverlay};
pub use transaction::context::TxContext;
