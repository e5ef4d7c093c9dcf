//! Ed25519 signature verification via `dcrypt`.
//!
//! The core only ever verifies (provider signing keys are generated and
//! held outside the node); there is deliberately no in-protocol signing
//! path here.

use crate::error::CryptoError;
use dcrypt::sign::eddsa;

/// Verify an Ed25519 signature over `message` against a 32-byte raw
/// public key. Returns `Ok(false)` — never `Err` — for a structurally
/// valid-but-non-matching signature; returns `Err` only when the key or
/// signature bytes themselves are malformed.
pub fn verify_ed25519(pubkey: &[u8], message: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
    let pk = eddsa::Ed25519PublicKey::from_bytes(pubkey)
        .map_err(|e| CryptoError::InvalidKey(format!("{e:?}")))?;
    let sig = eddsa::Ed25519Signature::from_bytes(signature)
        .map_err(|e| CryptoError::InvalidSignature(format!("{e:?}")))?;
    Ok(eddsa::Ed25519::verify(message, &sig, &pk).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcrypt::sign::eddsa;

    #[test]
    fn rejects_malformed_key_without_panicking() {
        let result = verify_ed25519(&[0u8; 3], b"msg", &[0u8; 64]);
        assert!(result.is_err());
    }

    #[test]
    fn verifies_a_genuine_signature() {
        let mut rng = rand::rngs::OsRng;
        let (pk, sk) = eddsa::Ed25519::keypair(&mut rng).unwrap();
        let msg = b"compute-result-hash";
        let sig = eddsa::Ed25519::sign(msg, &sk).unwrap();
        use dcrypt::algorithms::ByteSerializable;
        assert!(verify_ed25519(&pk.to_bytes(), msg, &sig.to_bytes()).unwrap());
    }

    #[test]
    fn rejects_signature_from_wrong_key() {
        let mut rng = rand::rngs::OsRng;
        let (_pk1, sk1) = eddsa::Ed25519::keypair(&mut rng).unwrap();
        let (pk2, _sk2) = eddsa::Ed25519::keypair(&mut rng).unwrap();
        let msg = b"compute-result-hash";
        let sig = eddsa::Ed25519::sign(msg, &sk1).unwrap();
        use dcrypt::algorithms::ByteSerializable;
        assert!(!verify_ed25519(&pk2.to_bytes(), msg, &sig.to_bytes()).unwrap());
    }
}
