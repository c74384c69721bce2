//! # Attestor
//!
//! The signing half of the attestation flow. In production this is an
//! off-chain service that actually reads bank data; here it signs whatever
//! verdict it is handed. The devnet uses it to issue proofs, and the test
//! suites use it to manufacture every flavour of good and bad proof.

use super::claim::AccreditationType;
use super::proof::{AttestationProof, ClaimContext, ClaimData, ClaimParameters, Witness};
use crate::config::{DEFAULT_ATTESTOR_URL, PROVIDER_INCOME, PROVIDER_NET_WORTH};
use crate::context::Timestamp;
use crate::crypto::{Keypair, PublicKey};
use crate::identity::Address;

/// The verdict an attestor is asked to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationRequest {
    pub holder: Address,
    pub accreditation_type: AccreditationType,
    pub meets_threshold: bool,
    /// Dollar threshold evaluated.
    pub threshold_amount: u64,
    pub timestamp: Timestamp,
    /// Override the data provider. `None` picks the one matching the type.
    pub provider: Option<String>,
}

impl AttestationRequest {
    /// A request for a holder that clears the statutory threshold for `ty`.
    pub fn passing(holder: Address, ty: AccreditationType, timestamp: Timestamp) -> Self {
        Self {
            holder,
            accreditation_type: ty,
            meets_threshold: true,
            threshold_amount: ty.minimum_threshold_usd().unwrap_or(0),
            timestamp,
            provider: None,
        }
    }

    /// The provider id to put in the claim.
    pub fn provider(&self) -> &str {
        match &self.provider {
            Some(p) => p,
            None => match self.accreditation_type {
                AccreditationType::Income => PROVIDER_INCOME,
                _ => PROVIDER_NET_WORTH,
            },
        }
    }

    fn claim_data(&self) -> ClaimData {
        let parameters = ClaimParameters {
            accreditation_type: self.accreditation_type.as_u8(),
            meets_threshold: self.meets_threshold,
            threshold_amount: self.threshold_amount,
            timestamp: self.timestamp,
        };
        let context = ClaimContext {
            holder: self.holder,
            app_id: None,
            version: Some(crate::config::PROTOCOL_VERSION.to_string()),
        };
        ClaimData {
            provider: self.provider().to_string(),
            // Plain structs of strings and integers; encoding cannot fail.
            parameters: serde_json::to_string(&parameters).unwrap_or_default(),
            context: serde_json::to_string(&context).unwrap_or_default(),
        }
    }
}

/// An Ed25519 attestor identity.
#[derive(Debug, Clone)]
pub struct Attestor {
    keypair: Keypair,
    url: String,
}

impl Attestor {
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair,
            url: DEFAULT_ATTESTOR_URL.to_string(),
        }
    }

    /// Set the URL advertised in witness entries.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    /// Build and sign a proof for `request`.
    pub fn attest(&self, request: &AttestationRequest) -> AttestationProof {
        let proof = self.sign_claim(request.claim_data());
        tracing::debug!(
            holder = %request.holder,
            accreditation_type = %request.accreditation_type,
            nullifier = %proof.nullifier(),
            "attestation issued"
        );
        proof
    }

    /// Sign arbitrary claim data. Tests use this to produce proofs whose
    /// payload no honest attestor would emit.
    pub fn sign_claim(&self, claim_data: ClaimData) -> AttestationProof {
        self.cosign(AttestationProof {
            claim_data,
            signatures: Vec::new(),
            witnesses: Vec::new(),
        })
    }

    /// Append this attestor's signature to an existing proof.
    pub fn cosign(&self, mut proof: AttestationProof) -> AttestationProof {
        let signature = self.keypair.sign(&proof.claim_data.digest());
        proof.signatures.push(signature.to_hex());
        proof.witnesses.push(Witness {
            id: self.public_key().to_hex(),
            url: self.url.clone(),
        });
        proof
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_follows_type() {
        let h = Address::derive("alice");
        assert_eq!(
            AttestationRequest::passing(h, AccreditationType::Income, 0).provider(),
            PROVIDER_INCOME
        );
        assert_eq!(
            AttestationRequest::passing(h, AccreditationType::NetWorth, 0).provider(),
            PROVIDER_NET_WORTH
        );
        assert_eq!(
            AttestationRequest::passing(h, AccreditationType::Both, 0).provider(),
            PROVIDER_NET_WORTH
        );
    }

    #[test]
    fn attest_is_deterministic() {
        let a = Attestor::new(Keypair::from_seed(&[7u8; 32]));
        let req = AttestationRequest::passing(Address::derive("bob"), AccreditationType::Both, 42);
        assert_eq!(a.attest(&req), a.attest(&req));
    }

    #[test]
    fn different_timestamps_different_nullifiers() {
        let a = Attestor::new(Keypair::from_seed(&[7u8; 32]));
        let h = Address::derive("bob");
        let p1 = a.attest(&AttestationRequest::passing(h, AccreditationType::Income, 1));
        let p2 = a.attest(&AttestationRequest::passing(h, AccreditationType::Income, 2));
        assert_ne!(p1.nullifier(), p2.nullifier());
    }

    #[test]
    fn witness_names_signer() {
        let a = Attestor::new(Keypair::from_seed(&[7u8; 32])).with_url("https://attest.test");
        let proof = a.attest(&AttestationRequest::passing(
            Address::derive("carol"),
            AccreditationType::Income,
            0,
        ));
        assert_eq!(proof.witnesses.len(), 1);
        assert_eq!(proof.witnesses[0].id, a.public_key().to_hex());
        assert_eq!(proof.witnesses[0].url, "https://attest.test");
    }
}
