//! # Addresses
//!
//! ```text
//! public_key (32 bytes)
//!     -> BLAKE3(public_key) -> 32 bytes
//!     -> last 20 bytes      -> 0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed
//! ```
//!
//! Contract addresses (registry, vaults, asset tokens) are derived the same
//! way from a label, see [`Address::derive`]. The all-zero address is
//! reserved: it never belongs to anyone and constructors that take an
//! address reject it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::crypto::{blake3_hash, PublicKey};

/// Address length in bytes.
pub const ADDRESS_LENGTH: usize = 20;

/// Errors that can occur while parsing an address.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    /// The input is not valid hexadecimal.
    #[error("invalid address hex: {0}")]
    InvalidHex(String),

    /// The decoded address has the wrong number of bytes.
    #[error("invalid address length: expected 20 bytes, got {0}")]
    InvalidLength(usize),
}

/// A 20-byte account or contract address.
///
/// Serializes as a lowercase `0x`-prefixed hex string so it can be used as
/// a JSON map key and read by humans in API responses.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// The reserved zero address.
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    /// Creates an address from raw bytes.
    pub const fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Derives the account address that owns `public_key`.
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Self::from_digest(&blake3_hash(public_key.as_bytes()))
    }

    /// Derives a deterministic contract address from a label, e.g.
    /// `"vault:mETH"`. Distinct labels give distinct addresses.
    pub fn derive(label: &str) -> Self {
        let mut preimage = Vec::with_capacity(label.len() + 9);
        preimage.extend_from_slice(b"contract");
        preimage.push(0x00);
        preimage.extend_from_slice(label.as_bytes());
        Self::from_digest(&blake3_hash(&preimage))
    }

    fn from_digest(digest: &[u8; 32]) -> Self {
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&digest[32 - ADDRESS_LENGTH..]);
        Self(bytes)
    }

    /// Whether this is the reserved zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LENGTH]
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parses `0x`-prefixed (or bare) hex.
    pub fn from_hex(s: &str) -> Result<Self, AddressError> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = hex::decode(digits).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        let arr: [u8; ADDRESS_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddressError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use std::collections::HashMap;

    #[test]
    fn hex_roundtrip() {
        let addr = Address::derive("registry");
        let parsed: Address = addr.to_hex().parse().unwrap();
        assert_eq!(addr, parsed);
        assert!(addr.to_hex().starts_with("0x"));
        assert_eq!(addr.to_hex().len(), 42);
    }

    #[test]
    fn parses_bare_and_uppercase_prefix() {
        let addr = Address::derive("vault");
        let bare = hex::encode(addr.as_bytes());
        assert_eq!(Address::from_hex(&bare).unwrap(), addr);
        assert_eq!(Address::from_hex(&format!("0X{}", bare)).unwrap(), addr);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            Address::from_hex("0xzz"),
            Err(AddressError::InvalidHex(_))
        ));
        assert_eq!(
            Address::from_hex("0xdeadbeef"),
            Err(AddressError::InvalidLength(4))
        );
    }

    #[test]
    fn public_key_derivation_is_stable() {
        let kp = Keypair::from_seed(&[7u8; 32]);
        let a = Address::from_public_key(&kp.public_key());
        let b = Address::from_public_key(&kp.public_key());
        assert_eq!(a, b);
        assert!(!a.is_zero());

        let other = Keypair::from_seed(&[8u8; 32]);
        assert_ne!(a, Address::from_public_key(&other.public_key()));
    }

    #[test]
    fn derive_separates_labels() {
        assert_ne!(Address::derive("vault:mETH"), Address::derive("vault:cmETH"));
    }

    #[test]
    fn zero_address() {
        assert!(Address::ZERO.is_zero());
        assert_eq!(
            Address::ZERO.to_hex(),
            "0x0000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn serializes_as_string_and_map_key() {
        let addr = Address::derive("holder");
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr.to_hex()));

        let mut map = HashMap::new();
        map.insert(addr, 5u64);
        let encoded = serde_json::to_string(&map).unwrap();
        let decoded: HashMap<Address, u64> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.get(&addr), Some(&5));
    }
}
