//! Groth16 zero-knowledge proof verification for the compute-result
//! circuit (`spec.md §4.2`).
//!
//! The teacher only ships the abstract verifier traits
//! (`ZkProofSystem`/`Groth16Backend` in `api/src/zk`), with no concrete
//! pairing implementation — this wraps `groth16-solana`'s BN254 pairing
//! check, the Groth16 verifier used elsewhere in the retrieved pack for
//! snarkjs/circom-style circuits.
//!
//! Circuit: public inputs `(request_id, result_hash,
//! provider_address_hash)`; constraint `MiMC(private_inputs) ==
//! result_hash` where private inputs are `(computation_data_hash,
//! timestamp, exit_code, cpu_cycles, memory_used)`. The circuit itself
//! is compiled and distributed out-of-band (by the provider tooling);
//! this module only verifies proofs against a fixed verifying key.

use crate::error::CryptoError;
use groth16_solana::groth16::{Groth16Verifier, Groth16Verifyingkey};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

/// The three public inputs the compute-result circuit commits to.
#[derive(Clone, Debug)]
pub struct ComputePublicInputs {
    pub request_id: [u8; 32],
    pub result_hash: [u8; 32],
    pub provider_address_hash: [u8; 32],
}

impl ComputePublicInputs {
    fn as_field_elements(&self) -> [[u8; 32]; 3] {
        [self.request_id, self.result_hash, self.provider_address_hash]
    }
}

/// A Groth16 proof in the 3-element (A, B, C) BN254 encoding
/// `groth16-solana` expects.
#[derive(Clone, Debug)]
pub struct Groth16Proof {
    pub a: [u8; 64],
    pub b: [u8; 128],
    pub c: [u8; 64],
}

/// Process-lifetime cache of the compiled verifying key, matching the
/// teacher's stated caching discipline ("compiled lazily on first use
/// and cached for the process lifetime"). Verification results depend
/// only on `(vk, public_inputs, proof)`, so caching the parsed key is
/// safe under determinism.
static VERIFYING_KEY: OnceCell<Groth16Verifyingkey<'static>> = OnceCell::new();

/// Install the verifying key for the compute-result circuit. Must be
/// called once, at genesis/startup, before any `verify_compute_proof`
/// call; a second call is a no-op (the first key wins), matching
/// "compiled lazily on first use and cached for the process lifetime."
pub fn install_verifying_key(vk: Groth16Verifyingkey<'static>) {
    let _ = VERIFYING_KEY.set(vk);
}

/// Owned, genesis-deserializable shape of a `groth16-solana` verifying
/// key. Field-for-field identical to
/// [`groth16_solana::groth16::Groth16Verifyingkey`]; exists only because
/// that type borrows `vk_ic` and can't itself be deserialized into
/// directly from genesis bytes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerifyingKeyConfig {
    pub nr_pubinputs: usize,
    pub vk_alpha_g1: [u8; 64],
    pub vk_beta_g2: [u8; 128],
    pub vk_gamma_g2: [u8; 128],
    pub vk_delta_g2: [u8; 128],
    pub vk_ic: Vec<[u8; 64]>,
}

impl VerifyingKeyConfig {
    /// Builds the `groth16-solana` key and installs it as the
    /// process-wide cache `verify_compute_proof` consults. `vk_ic` is
    /// leaked to `'static` once here, matching `VERIFYING_KEY`'s own
    /// process-lifetime cache.
    pub fn install(self) {
        let vk_ic: &'static [[u8; 64]] = Box::leak(self.vk_ic.into_boxed_slice());
        install_verifying_key(Groth16Verifyingkey {
            nr_pubinputs: self.nr_pubinputs,
            vk_alpha_g1: self.vk_alpha_g1,
            vk_beta_g2: self.vk_beta_g2,
            vk_gamma_g2: self.vk_gamma_g2,
            vk_delta_g2: self.vk_delta_g2,
            vk_ic,
        });
    }
}

/// Verify a Groth16 proof against the process-cached verifying key.
/// Returns `Ok(false)` for a structurally valid but failing proof;
/// `Err` only for malformed proof/public-input bytes or a missing key.
pub fn verify_compute_proof(
    proof: &Groth16Proof,
    public_inputs: &ComputePublicInputs,
) -> Result<bool, CryptoError> {
    let vk = VERIFYING_KEY.get().ok_or(CryptoError::MalformedZkInput)?;

    let inputs = public_inputs.as_field_elements();
    let mut verifier = Groth16Verifier::new(&proof.a, &proof.b, &proof.c, &inputs, vk)
        .map_err(|_| CryptoError::MalformedZkInput)?;

    Ok(verifier.verify().unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_verifying_key_is_rejected_not_panicked() {
        let proof = Groth16Proof {
            a: [0u8; 64],
            b: [0u8; 128],
            c: [0u8; 64],
        };
        let inputs = ComputePublicInputs {
            request_id: [0u8; 32],
            result_hash: [0u8; 32],
            provider_address_hash: [0u8; 32],
        };
        // No key installed in this isolated test process state: either
        // rejected outright, or rejected by the pairing check. Either
        // way this must never panic.
        let _ = verify_compute_proof(&proof, &inputs);
    }
}
