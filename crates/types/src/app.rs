//! Core application-level data structures: accounts, coins, and heights.
//!
//! Mirrors the teacher's `AccountId`/`ChainId` newtypes (stable, opaque,
//! canonically encoded) but drops the key-rotation machinery that isn't
//! part of this core's scope.

use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A monotonically increasing block height, set by the (out-of-scope)
/// consensus engine.
pub type Height = u64;

/// A unique identifier for the chain, used for replay protection in
/// inter-chain messages.
#[derive(
    Encode, Decode, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash,
)]
#[serde(transparent)]
pub struct ChainId(pub u32);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An opaque account address with a human-readable prefix (e.g. `paw1...`).
///
/// Internally a 32-byte hash, matching the teacher's `AccountId`. Display
/// renders the hex form prefixed with `paw1`; this is a display convention
/// only, not a bech32 checksum (out of scope: the CLI/SDK own real address
/// encoding).
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 32 {
            return None;
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(bytes);
        Some(Self(out))
    }
}

impl AsRef<[u8]> for AccountId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for AccountId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "paw1{}", hex::encode(self.0))
    }
}

/// A (denomination, amount) pair. Amounts are always non-negative; the
/// BANK collaborator (out of scope) is the source of truth for actual
/// balances — this type only carries amounts through module logic and
/// escrow bookkeeping.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Coin {
    pub denom: DenomId,
    pub amount: u128,
}

impl Coin {
    pub fn new(denom: impl Into<DenomId>, amount: u128) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    pub fn zero(denom: impl Into<DenomId>) -> Self {
        Self::new(denom, 0)
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    pub fn checked_add(&self, other: &Coin) -> Option<Coin> {
        if self.denom != other.denom {
            return None;
        }
        self.amount.checked_add(other.amount).map(|amount| Coin {
            denom: self.denom.clone(),
            amount,
        })
    }

    pub fn checked_sub(&self, other: &Coin) -> Option<Coin> {
        if self.denom != other.denom {
            return None;
        }
        self.amount.checked_sub(other.amount).map(|amount| Coin {
            denom: self.denom.clone(),
            amount,
        })
    }
}

/// A denomination string, e.g. `"upaw"` or `"uusdc"`. Bounded to keep keys
/// and wire payloads predictable.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
pub struct DenomId(pub String);

impl From<&str> for DenomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DenomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for DenomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The native fee/staking denomination, 1 PAW = 1_000_000 µunits.
pub const BASE_DENOM: &str = "upaw";

/// Minimum provider stake floor: 1 PAW expressed in µunits.
pub const ONE_PAW: u128 = 1_000_000;

/// A fixed-point rational used wherever the spec calls for an exact
/// fraction (swap fees, deviation bounds, limit-order prices): backed by
/// `num_rational::Ratio<i64>` for arithmetic, with a hand-written
/// `Encode`/`Decode` pair since the upstream type doesn't derive either.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Rational64(pub num_rational::Ratio<i64>);

impl Rational64 {
    pub fn new(numer: i64, denom: i64) -> Self {
        Self(num_rational::Ratio::new(numer, denom))
    }

    pub fn from_integer(n: i64) -> Self {
        Self(num_rational::Ratio::from_integer(n))
    }

    pub fn numer(&self) -> i64 {
        *self.0.numer()
    }

    pub fn denom(&self) -> i64 {
        *self.0.denom()
    }

    pub fn to_f64(&self) -> f64 {
        *self.0.numer() as f64 / *self.0.denom() as f64
    }
}

impl Default for Rational64 {
    fn default() -> Self {
        Self::from_integer(0)
    }
}

impl fmt::Display for Rational64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0.numer(), self.0.denom())
    }
}

impl Encode for Rational64 {
    fn encode(&self) -> Vec<u8> {
        (self.numer(), self.denom()).encode()
    }
}

impl parity_scale_codec::EncodeLike for Rational64 {}

impl Decode for Rational64 {
    fn decode<I: parity_scale_codec::Input>(input: &mut I) -> Result<Self, parity_scale_codec::Error> {
        let (numer, denom): (i64, i64) = Decode::decode(input)?;
        if denom == 0 {
            return Err("zero denominator in Rational64".into());
        }
        Ok(Self::new(numer, denom))
    }
}

impl Serialize for Rational64 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Rational64 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        num_rational::Ratio::<i64>::deserialize(deserializer).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coin_arithmetic_rejects_mismatched_denoms() {
        let a = Coin::new("upaw", 10);
        let b = Coin::new("uusdc", 5);
        assert!(a.checked_add(&b).is_none());
        assert!(a.checked_sub(&b).is_none());
    }

    #[test]
    fn coin_arithmetic_saturates_to_none_on_overflow() {
        let a = Coin::new("upaw", u128::MAX);
        let b = Coin::new("upaw", 1);
        assert!(a.checked_add(&b).is_none());
    }

    #[test]
    fn rational_round_trips_through_codec() {
        let r = Rational64::new(3, 1000);
        let bytes = r.encode();
        let back = Rational64::decode(&mut &bytes[..]).unwrap();
        assert_eq!(r, back);
    }

    #[test]
    fn account_id_display_is_stable() {
        let id = AccountId([1u8; 32]);
        assert_eq!(
            id.to_string(),
            "paw10101010101010101010101010101010101010101010101010101010101010101"
        );
    }
}
