//! SHA-256/SHA-512 hashing via `dcrypt`.

use crate::error::CryptoError;
use dcrypt::algorithms::hash::sha2::{Sha256 as DcryptSha256, Sha512 as DcryptSha512};
use dcrypt::algorithms::hash::HashFunction as DcryptHashFunction;
use dcrypt::algorithms::ByteSerializable;

pub trait HashFunction {
    fn hash(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError>;
    fn digest_size(&self) -> usize;
    fn name(&self) -> &str;
}

#[derive(Default, Clone)]
pub struct Sha256Hash;

impl HashFunction for Sha256Hash {
    fn hash(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let digest = DcryptSha256::digest(message).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(digest.to_bytes())
    }

    fn digest_size(&self) -> usize {
        32
    }

    fn name(&self) -> &str {
        "SHA-256"
    }
}

#[derive(Default, Clone)]
pub struct Sha512Hash;

impl HashFunction for Sha512Hash {
    fn hash(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let digest = DcryptSha512::digest(message).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(digest.to_bytes())
    }

    fn digest_size(&self) -> usize {
        64
    }

    fn name(&self) -> &str {
        "SHA-512"
    }
}

/// Hash anything byte-addressable into a 32-byte SHA-256 digest.
pub fn sha256<T: AsRef<[u8]>>(data: T) -> Result<[u8; 32], CryptoError> {
    let bytes = Sha256Hash.hash(data.as_ref())?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidHashLength { expected: 32, got: len })
}

/// Hash anything byte-addressable into a 64-byte SHA-512 digest.
pub fn sha512<T: AsRef<[u8]>>(data: T) -> Result<[u8; 64], CryptoError> {
    let bytes = Sha512Hash.hash(data.as_ref())?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidHashLength { expected: 64, got: len })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_is_deterministic() {
        let a = sha256(b"paw").unwrap();
        let b = sha256(b"paw").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn sha256_differs_on_different_input() {
        let a = sha256(b"paw-a").unwrap();
        let b = sha256(b"paw-b").unwrap();
        assert_ne!(a, b);
    }
}
