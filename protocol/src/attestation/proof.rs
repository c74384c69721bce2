//! # Attestation Proof Format
//!
//! Proof bytes on the wire are the UTF-8 JSON encoding of an
//! [`AttestationProof`]. The shape follows what the attestation service
//! hands the front end: a `claimData` block whose `parameters` and
//! `context` fields are themselves JSON strings, a list of hex signatures,
//! and one witness per signature naming the attestor key that produced it.
//!
//! ```text
//! digest    = SHA-256("nullifier-claim-v1" 0 provider 0 parameters 0 context)
//! signature = Ed25519(attestor_key, digest)
//! nullifier = BLAKE3(digest)
//! ```
//!
//! Because `parameters` and `context` are signed as opaque strings, the
//! verifier never has to agree with the attestor on JSON canonicalisation.

use serde::{Deserialize, Serialize};

use super::claim::Nullifier;
use crate::config::CLAIM_DOMAIN_TAG;
use crate::context::Timestamp;
use crate::crypto::{blake3_hash, tagged_sha256};
use crate::identity::Address;

/// The attested statement, exactly as signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimData {
    /// Data provider id, e.g. `plaid-income-verification`.
    pub provider: String,
    /// JSON-encoded [`ClaimParameters`].
    pub parameters: String,
    /// JSON-encoded [`ClaimContext`].
    pub context: String,
}

/// A signer entry. `id` is the hex Ed25519 public key of the attestor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    pub id: String,
    pub url: String,
}

/// A complete attestation proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationProof {
    pub claim_data: ClaimData,
    /// Hex signatures, index-aligned with `witnesses`.
    pub signatures: Vec<String>,
    pub witnesses: Vec<Witness>,
}

/// Decoded `claimData.parameters`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimParameters {
    /// Accreditation type tag (see `AccreditationType`).
    pub accreditation_type: u8,
    pub meets_threshold: bool,
    /// Dollar threshold the attestor evaluated against.
    pub threshold_amount: u64,
    /// Unix seconds at which the attestor evaluated the data.
    pub timestamp: Timestamp,
}

/// Decoded `claimData.context`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimContext {
    /// The account the claim is about.
    pub holder: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ClaimData {
    /// The 32-byte digest attestors sign.
    pub fn digest(&self) -> [u8; 32] {
        tagged_sha256(
            CLAIM_DOMAIN_TAG,
            &[
                self.provider.as_bytes(),
                self.parameters.as_bytes(),
                self.context.as_bytes(),
            ],
        )
    }
}

impl AttestationProof {
    /// Encode for submission (`mintCredential(proof, ...)`).
    pub fn to_bytes(&self) -> Vec<u8> {
        // A struct of strings and vectors of strings cannot fail to encode.
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Decode proof bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// The nullifier this proof will consume when minted.
    pub fn nullifier(&self) -> Nullifier {
        Nullifier::from_bytes(blake3_hash(&self.claim_data.digest()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AttestationProof {
        AttestationProof {
            claim_data: ClaimData {
                provider: "plaid-income-verification".into(),
                parameters: r#"{"accreditationType":1,"meetsThreshold":true,"thresholdAmount":200000,"timestamp":1700000000}"#.into(),
                context: format!(r#"{{"holder":"{}"}}"#, Address::derive("alice")),
            },
            signatures: vec![],
            witnesses: vec![],
        }
    }

    #[test]
    fn wire_format_uses_camel_case() {
        let json = String::from_utf8(sample().to_bytes()).unwrap();
        assert!(json.contains("\"claimData\""));
        assert!(json.contains("\"signatures\""));
        assert!(json.contains("\"witnesses\""));
    }

    #[test]
    fn parameters_decode() {
        let params: ClaimParameters = serde_json::from_str(&sample().claim_data.parameters).unwrap();
        assert_eq!(params.accreditation_type, 1);
        assert!(params.meets_threshold);
        assert_eq!(params.threshold_amount, 200_000);
    }

    #[test]
    fn context_tolerates_extra_fields() {
        let ctx: ClaimContext = serde_json::from_str(&format!(
            r#"{{"holder":"{}","appId":"app","version":"1.0.0"}}"#,
            Address::derive("bob")
        ))
        .unwrap();
        assert_eq!(ctx.holder, Address::derive("bob"));
        assert_eq!(ctx.app_id.as_deref(), Some("app"));
    }

    #[test]
    fn digest_covers_every_field() {
        let base = sample();
        let mut other = sample();
        other.claim_data.context = format!(r#"{{"holder":"{}"}}"#, Address::derive("mallory"));
        assert_ne!(base.claim_data.digest(), other.claim_data.digest());

        let mut other = sample();
        other.claim_data.provider = "plaid-net-worth-verification".into();
        assert_ne!(base.claim_data.digest(), other.claim_data.digest());
    }

    #[test]
    fn nullifier_ignores_signatures() {
        let base = sample();
        let mut signed = sample();
        signed.signatures.push("00".repeat(64));
        assert_eq!(base.nullifier(), signed.nullifier());
    }

    #[test]
    fn garbage_bytes_rejected() {
        assert!(AttestationProof::from_bytes(b"not json").is_err());
        assert!(AttestationProof::from_bytes(&[0xff, 0xfe]).is_err());
    }
}
