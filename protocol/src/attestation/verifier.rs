//! # Proof Verification
//!
//! The registry only depends on [`ProofVerifier`]: opaque bytes in, a
//! [`Claim`] or a [`VerificationError`] out. [`AttestorVerifier`] is the
//! reference implementation: it trusts a fixed set of Ed25519 attestor keys
//! and requires a quorum of them to have signed the claim digest.
//!
//! Verification is pure. It does not know about the caller, the clock or
//! spent nullifiers; the registry layers those checks on top of the claim.

use std::collections::HashSet;

use thiserror::Error;

use super::claim::{AccreditationType, Claim};
use super::proof::{AttestationProof, ClaimContext, ClaimParameters};
use crate::config::{DEFAULT_ATTESTOR_QUORUM, SUPPORTED_PROVIDERS};
use crate::crypto::{PublicKey, Signature};

/// Why a proof failed verification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// The bytes are not a well-formed proof, or an embedded JSON field
    /// does not decode.
    #[error("malformed proof: {0}")]
    Malformed(String),

    /// The data provider is not one this verifier accepts.
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// The accreditation tag inside the claim is out of range or `None`.
    #[error("claim carries invalid accreditation type tag {0}")]
    InvalidAccreditationType(u8),

    /// The proof carries no signatures at all.
    #[error("proof is unsigned")]
    MissingSignatures,

    /// Every signature needs exactly one witness.
    #[error("signature/witness count mismatch: {signatures} signatures, {witnesses} witnesses")]
    WitnessMismatch { signatures: usize, witnesses: usize },

    /// A witness key is not in the trusted set.
    #[error("untrusted attestor: {0}")]
    UntrustedAttestor(String),

    /// A signature does not verify under its witness key.
    #[error("bad signature from attestor {0}")]
    BadSignature(String),

    /// Not enough distinct trusted attestors signed.
    #[error("insufficient signatures: {valid} valid, {required} required")]
    InsufficientSignatures { valid: usize, required: usize },
}

/// Turns proof bytes into a verified claim.
///
/// Implementations must be deterministic: the same bytes always yield the
/// same result.
pub trait ProofVerifier: Send + Sync {
    fn verify(&self, proof: &[u8]) -> Result<Claim, VerificationError>;
}

/// Verifies attestations against a trusted set of attestor keys.
#[derive(Debug, Clone)]
pub struct AttestorVerifier {
    trusted: HashSet<PublicKey>,
    quorum: usize,
    providers: HashSet<String>,
}

impl AttestorVerifier {
    /// A verifier trusting `attestors`, with the default quorum and providers.
    pub fn new(attestors: impl IntoIterator<Item = PublicKey>) -> Self {
        Self {
            trusted: attestors.into_iter().collect(),
            quorum: DEFAULT_ATTESTOR_QUORUM,
            providers: SUPPORTED_PROVIDERS.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Require `quorum` distinct trusted signatures. Zero is treated as one:
    /// an unsigned claim is never acceptable.
    pub fn with_quorum(mut self, quorum: usize) -> Self {
        self.quorum = quorum.max(1);
        self
    }

    /// Accept an additional data provider.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.providers.insert(provider.into());
        self
    }

    /// The configured quorum.
    pub fn quorum(&self) -> usize {
        self.quorum
    }

    /// Whether `key` is a trusted attestor.
    pub fn is_trusted(&self, key: &PublicKey) -> bool {
        self.trusted.contains(key)
    }

    fn check_signatures(&self, proof: &AttestationProof) -> Result<(), VerificationError> {
        if proof.signatures.is_empty() {
            return Err(VerificationError::MissingSignatures);
        }
        if proof.signatures.len() != proof.witnesses.len() {
            return Err(VerificationError::WitnessMismatch {
                signatures: proof.signatures.len(),
                witnesses: proof.witnesses.len(),
            });
        }

        let digest = proof.claim_data.digest();
        let mut signers = HashSet::new();

        for (sig_hex, witness) in proof.signatures.iter().zip(&proof.witnesses) {
            let key = PublicKey::from_hex(&witness.id)
                .map_err(|_| VerificationError::UntrustedAttestor(witness.id.clone()))?;
            if !self.trusted.contains(&key) {
                return Err(VerificationError::UntrustedAttestor(witness.id.clone()));
            }
            let signature = Signature::from_hex(sig_hex)
                .map_err(|_| VerificationError::BadSignature(witness.id.clone()))?;
            if !key.verify(&digest, &signature) {
                return Err(VerificationError::BadSignature(witness.id.clone()));
            }
            signers.insert(key);
        }

        if signers.len() < self.quorum {
            return Err(VerificationError::InsufficientSignatures {
                valid: signers.len(),
                required: self.quorum,
            });
        }
        Ok(())
    }
}

impl ProofVerifier for AttestorVerifier {
    fn verify(&self, bytes: &[u8]) -> Result<Claim, VerificationError> {
        let proof = AttestationProof::from_bytes(bytes)
            .map_err(|e| VerificationError::Malformed(format!("proof: {}", e)))?;

        if !self.providers.contains(&proof.claim_data.provider) {
            return Err(VerificationError::UnsupportedProvider(
                proof.claim_data.provider.clone(),
            ));
        }

        // Signatures before parsing the signed payload: an attacker should not
        // be able to probe our JSON handling with unsigned garbage.
        self.check_signatures(&proof)?;

        let params: ClaimParameters = serde_json::from_str(&proof.claim_data.parameters)
            .map_err(|e| VerificationError::Malformed(format!("parameters: {}", e)))?;
        let context: ClaimContext = serde_json::from_str(&proof.claim_data.context)
            .map_err(|e| VerificationError::Malformed(format!("context: {}", e)))?;

        let accreditation_type = AccreditationType::try_from(params.accreditation_type)
            .map_err(|e| VerificationError::InvalidAccreditationType(e.0))?;
        let minimum = accreditation_type
            .minimum_threshold_usd()
            .ok_or(VerificationError::InvalidAccreditationType(params.accreditation_type))?;

        let claim = Claim {
            holder: context.holder,
            accreditation_type,
            // An attestor vouching for a threshold below the statutory one
            // has not attested accreditation, whatever the flag says.
            meets_threshold: params.meets_threshold && params.threshold_amount >= minimum,
            threshold_amount: params.threshold_amount,
            timestamp: params.timestamp,
            provider: proof.claim_data.provider.clone(),
            nullifier: proof.nullifier(),
        };

        tracing::debug!(
            holder = %claim.holder,
            accreditation_type = %claim.accreditation_type,
            meets_threshold = claim.meets_threshold,
            nullifier = %claim.nullifier,
            "attestation verified"
        );

        Ok(claim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::attestor::{AttestationRequest, Attestor};
    use crate::attestation::proof::ClaimData;
    use crate::crypto::Keypair;
    use crate::identity::Address;

    const T0: u64 = 1_700_000_000;

    fn attestor(seed: u8) -> Attestor {
        Attestor::new(Keypair::from_seed(&[seed; 32]))
    }

    fn holder() -> Address {
        Address::derive("alice")
    }

    #[test]
    fn verify_valid_proof() {
        let a = attestor(1);
        let v = AttestorVerifier::new([a.public_key()]);
        let proof = a.attest(&AttestationRequest::passing(holder(), AccreditationType::NetWorth, T0));

        let claim = v.verify(&proof.to_bytes()).unwrap();
        assert_eq!(claim.accreditation_type, AccreditationType::NetWorth);
        assert_eq!(claim.threshold_amount, 1_000_000);
        assert!(claim.meets_threshold);
    }

    #[test]
    fn reject_tampered_context() {
        let a = attestor(1);
        let v = AttestorVerifier::new([a.public_key()]);
        let mut proof = a.attest(&AttestationRequest::passing(holder(), AccreditationType::Income, T0));

        // Re-point the signed claim at another account.
        proof.claim_data.context =
            format!(r#"{{"holder":"{}"}}"#, Address::derive("mallory"));

        assert!(matches!(
            v.verify(&proof.to_bytes()),
            Err(VerificationError::BadSignature(_))
        ));
    }

    #[test]
    fn reject_unsigned() {
        let a = attestor(1);
        let v = AttestorVerifier::new([a.public_key()]);
        let mut proof = a.attest(&AttestationRequest::passing(holder(), AccreditationType::Income, T0));
        proof.signatures.clear();
        proof.witnesses.clear();
        assert_eq!(
            v.verify(&proof.to_bytes()),
            Err(VerificationError::MissingSignatures)
        );
    }

    #[test]
    fn reject_witness_mismatch() {
        let a = attestor(1);
        let v = AttestorVerifier::new([a.public_key()]);
        let mut proof = a.attest(&AttestationRequest::passing(holder(), AccreditationType::Income, T0));
        proof.witnesses.clear();
        assert!(matches!(
            v.verify(&proof.to_bytes()),
            Err(VerificationError::WitnessMismatch { signatures: 1, witnesses: 0 })
        ));
    }

    #[test]
    fn reject_unsupported_provider() {
        let a = attestor(1);
        let v = AttestorVerifier::new([a.public_key()]);
        let mut proof = a.attest(&AttestationRequest::passing(holder(), AccreditationType::Income, T0));
        proof.claim_data.provider = "spreadsheet".into();
        assert_eq!(
            v.verify(&proof.to_bytes()),
            Err(VerificationError::UnsupportedProvider("spreadsheet".into()))
        );
    }

    #[test]
    fn extra_provider_accepted_when_configured() {
        let a = attestor(1);
        let v = AttestorVerifier::new([a.public_key()]).with_provider("custom-bank");
        let mut request = AttestationRequest::passing(holder(), AccreditationType::Income, T0);
        request.provider = Some("custom-bank".into());
        let proof = a.attest(&request);
        assert_eq!(v.verify(&proof.to_bytes()).unwrap().provider, "custom-bank");
    }

    #[test]
    fn quorum_requires_distinct_attestors() {
        let a = attestor(1);
        let b = attestor(2);
        let v = AttestorVerifier::new([a.public_key(), b.public_key()]).with_quorum(2);

        let single = a.attest(&AttestationRequest::passing(holder(), AccreditationType::Income, T0));
        assert_eq!(
            v.verify(&single.to_bytes()),
            Err(VerificationError::InsufficientSignatures { valid: 1, required: 2 })
        );

        // The same attestor signing twice still counts once.
        let doubled = a.cosign(single.clone());
        assert_eq!(
            v.verify(&doubled.to_bytes()),
            Err(VerificationError::InsufficientSignatures { valid: 1, required: 2 })
        );

        let cosigned = b.cosign(single);
        assert!(v.verify(&cosigned.to_bytes()).is_ok());
    }

    #[test]
    fn below_statutory_threshold_is_not_met() {
        let a = attestor(1);
        let v = AttestorVerifier::new([a.public_key()]);
        let mut request = AttestationRequest::passing(holder(), AccreditationType::Income, T0);
        request.threshold_amount = 150_000;
        let claim = v.verify(&a.attest(&request).to_bytes()).unwrap();
        assert!(!claim.meets_threshold);
    }

    #[test]
    fn failing_attestation_verifies_but_is_not_met() {
        let a = attestor(1);
        let v = AttestorVerifier::new([a.public_key()]);
        let mut request = AttestationRequest::passing(holder(), AccreditationType::Income, T0);
        request.meets_threshold = false;
        let claim = v.verify(&a.attest(&request).to_bytes()).unwrap();
        assert!(!claim.meets_threshold);
    }

    #[test]
    fn none_type_rejected() {
        let a = attestor(1);
        let v = AttestorVerifier::new([a.public_key()]);
        let request = AttestationRequest::passing(holder(), AccreditationType::None, T0);
        assert_eq!(
            v.verify(&a.attest(&request).to_bytes()),
            Err(VerificationError::InvalidAccreditationType(0))
        );
    }

    #[test]
    fn malformed_parameters_rejected_after_signature_check() {
        let a = attestor(1);
        let v = AttestorVerifier::new([a.public_key()]);
        let claim_data = ClaimData {
            provider: crate::config::PROVIDER_INCOME.into(),
            parameters: "{not json".into(),
            context: format!(r#"{{"holder":"{}"}}"#, holder()),
        };
        let proof = a.sign_claim(claim_data);
        assert!(matches!(
            v.verify(&proof.to_bytes()),
            Err(VerificationError::Malformed(_))
        ));
    }

    #[test]
    fn malformed_bytes_rejected() {
        let v = AttestorVerifier::new([attestor(1).public_key()]);
        assert!(matches!(
            v.verify(b"\x00\x01garbage"),
            Err(VerificationError::Malformed(_))
        ));
    }

    #[test]
    fn verification_is_deterministic() {
        let a = attestor(1);
        let v = AttestorVerifier::new([a.public_key()]);
        let bytes = a
            .attest(&AttestationRequest::passing(holder(), AccreditationType::Both, T0))
            .to_bytes();
        assert_eq!(v.verify(&bytes), v.verify(&bytes));
    }
}
