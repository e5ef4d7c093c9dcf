//! Cryptographic primitives (component B): SHA-256 hashing, Ed25519
//! signature verification, Merkle-proof verification, and the Groth16
//! zero-knowledge verifier for the compute-result circuit.
//!
//! Every verifier here must reject malformed input with a typed error
//! rather than panicking — callers feed these with untrusted,
//! attacker-controlled bytes.
#![cfg_attr(
    not(test),
    deny(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)
)]

pub mod error;
pub mod hash;
pub mod merkle;
pub mod sign;
pub mod zk;

pub use error::CryptoError;
pub use hash::sha256;
pub use merkle::verify_merkle_proof;
pub use sign::verify_ed25519;
pub use zk::{verify_compute_proof, ComputePublicInputs};
