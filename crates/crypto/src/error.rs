//! Local error alias for the `paw-crypto` crate.

pub use paw_types::error::CryptoError;
