//! # Claims
//!
//! What a verified attestation boils down to: who, which kind of
//! accreditation, whether the threshold was met, and when the attestor
//! looked. Plus the nullifier that makes the claim single-use.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

use crate::config::{INCOME_THRESHOLD_USD, NET_WORTH_THRESHOLD_USD};
use crate::context::Timestamp;
use crate::identity::Address;

// ---------------------------------------------------------------------------
// AccreditationType
// ---------------------------------------------------------------------------

/// Raised when a `u8` tag does not name an accreditation type.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("invalid accreditation type tag: {0}")]
pub struct InvalidAccreditationType(pub u8);

/// SEC Regulation D accreditation basis.
///
/// Fixed 2-bit encoding shared with the contract ABI: `None=0, Income=1,
/// NetWorth=2, Both=3`. `None` exists because the ABI needs a value for
/// "no credential"; a stored credential never carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccreditationType {
    /// Absence of accreditation.
    None,
    /// Annual income of at least $200,000.
    Income,
    /// Net worth of at least $1,000,000.
    NetWorth,
    /// Meets both thresholds.
    Both,
}

impl AccreditationType {
    /// The ABI tag.
    pub fn as_u8(self) -> u8 {
        match self {
            AccreditationType::None => 0,
            AccreditationType::Income => 1,
            AccreditationType::NetWorth => 2,
            AccreditationType::Both => 3,
        }
    }

    /// Whether this type can back a credential.
    pub fn is_accreditation(self) -> bool {
        match self {
            AccreditationType::None => false,
            AccreditationType::Income | AccreditationType::NetWorth | AccreditationType::Both => {
                true
            }
        }
    }

    /// The smallest attested dollar threshold that supports this type.
    /// For `Both` the net-worth figure is the binding one.
    pub fn minimum_threshold_usd(self) -> Option<u64> {
        match self {
            AccreditationType::None => None,
            AccreditationType::Income => Some(INCOME_THRESHOLD_USD),
            AccreditationType::NetWorth | AccreditationType::Both => Some(NET_WORTH_THRESHOLD_USD),
        }
    }

    /// Label shown to users.
    pub fn label(self) -> &'static str {
        match self {
            AccreditationType::None => "None",
            AccreditationType::Income => "Income ($200K+)",
            AccreditationType::NetWorth => "Net Worth ($1M+)",
            AccreditationType::Both => "Both",
        }
    }
}

impl TryFrom<u8> for AccreditationType {
    type Error = InvalidAccreditationType;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(AccreditationType::None),
            1 => Ok(AccreditationType::Income),
            2 => Ok(AccreditationType::NetWorth),
            3 => Ok(AccreditationType::Both),
            other => Err(InvalidAccreditationType(other)),
        }
    }
}

impl fmt::Display for AccreditationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for AccreditationType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for AccreditationType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = u8::deserialize(deserializer)?;
        AccreditationType::try_from(tag).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Nullifier
// ---------------------------------------------------------------------------

/// 32-byte single-use identifier of an attested claim.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Nullifier([u8; 32]);

impl Nullifier {
    /// Wraps raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nullifier({}...)", &self.to_hex()[..14])
    }
}

impl fmt::Display for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Nullifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Nullifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| serde::de::Error::custom("nullifier must be 32 bytes"))?;
        Ok(Self(arr))
    }
}

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

/// The structured result of verifying an attestation proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Account the attestation was produced for.
    pub holder: Address,
    /// Accreditation basis the attestor evaluated.
    pub accreditation_type: AccreditationType,
    /// Whether the holder cleared the threshold.
    pub meets_threshold: bool,
    /// Dollar threshold the attestor checked against.
    pub threshold_amount: u64,
    /// When the attestor produced the claim.
    pub timestamp: Timestamp,
    /// Provider that sourced the underlying data.
    pub provider: String,
    /// Single-use identifier of this claim.
    pub nullifier: Nullifier,
}
