//! Canonical encode/decode helpers used for every persisted or
//! wire-transmitted value.
//!
//! Wraps `parity-scale-codec` the way the teacher's `ioi_types::codec`
//! does: a single pair of free functions so call sites never have to
//! remember which codec crate is in use or how errors are reported.

use crate::error::StateError;
use parity_scale_codec::{Decode, Encode};

/// Encode a value into its canonical on-disk/on-wire byte representation.
/// SCALE encoding is deterministic for any given type, which is the
/// property the state root depends on.
pub fn to_bytes_canonical<T: Encode>(value: &T) -> Vec<u8> {
    value.encode()
}

/// Decode a value previously produced by [`to_bytes_canonical`]. Returns
/// a [`StateError::Decode`] (carrying the offending key, supplied by the
/// caller) rather than panicking on malformed bytes.
pub fn from_bytes_canonical<T: Decode>(key: &[u8], bytes: &[u8]) -> Result<T, StateError> {
    T::decode(&mut &bytes[..]).map_err(|e| StateError::Decode(key.to_vec(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Encode, Decode, PartialEq, Debug)]
    struct Sample {
        a: u32,
        b: Vec<u8>,
    }

    #[test]
    fn round_trips() {
        let s = Sample {
            a: 7,
            b: vec![1, 2, 3],
        };
        let bytes = to_bytes_canonical(&s);
        let back: Sample = from_bytes_canonical(b"k", &bytes).unwrap();
        assert_eq!(s, back);
    }

    #[test]
    fn decode_failure_reports_key() {
        let err = from_bytes_canonical::<Sample>(b"bad-key", &[0xff]).unwrap_err();
        match err {
            StateError::Decode(k, _) => assert_eq!(k, b"bad-key".to_vec()),
            _ => panic!("expected Decode error"),
        }
    }
}
