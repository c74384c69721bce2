//! # Attestation Module
//!
//! The registry never sees a bank statement. It sees an **attestation
//! proof**: a claim produced by an off-chain attestor that looked at the
//! holder's bank data and decided whether an income or net-worth threshold
//! was met, signed so the chain can check who vouched for it.
//!
//! ## Architecture
//!
//! ```text
//! claim.rs    : AccreditationType, Claim, Nullifier (what verification yields)
//! proof.rs    : AttestationProof wire format (JSON bytes) and its digest
//! verifier.rs : ProofVerifier trait + AttestorVerifier (trusted-key quorum)
//! attestor.rs : Attestor, the signing side, for devnet and tests
//! ```
//!
//! ## Security Model
//!
//! - **Authenticity**: every signature is Ed25519 over the SHA-256 claim
//!   digest, and only keys in the verifier's trusted set count.
//! - **Quorum**: a claim needs signatures from at least `quorum` distinct
//!   trusted attestors.
//! - **Binding**: the holder address is part of the signed context, so a
//!   proof minted for one account is useless to another.
//! - **Single use**: the claim nullifier is derived from the digest; the
//!   registry consumes it on mint so the same proof cannot mint twice.
//!
//! How an attestor reaches its verdict (TLS notarisation, zk circuits, a
//! human with a spreadsheet) is outside this module.

pub mod attestor;
pub mod claim;
pub mod proof;
pub mod verifier;

pub use attestor::{AttestationRequest, Attestor};
pub use claim::{AccreditationType, Claim, InvalidAccreditationType, Nullifier};
pub use proof::{AttestationProof, ClaimContext, ClaimData, ClaimParameters, Witness};
pub use verifier::{AttestorVerifier, ProofVerifier, VerificationError};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::identity::Address;

    /// End-to-end: attest -> encode -> verify.
    #[test]
    fn end_to_end_income_attestation() {
        let attestor = Attestor::new(Keypair::from_seed(&[1u8; 32]));
        let verifier = AttestorVerifier::new([attestor.public_key()]);
        let holder = Address::derive("alice");

        let proof = attestor.attest(&AttestationRequest::passing(
            holder,
            AccreditationType::Income,
            1_700_000_000,
        ));
        let claim = verifier
            .verify(&proof.to_bytes())
            .expect("valid proof must verify");

        assert_eq!(claim.holder, holder);
        assert_eq!(claim.accreditation_type, AccreditationType::Income);
        assert!(claim.meets_threshold);
        assert_eq!(claim.timestamp, 1_700_000_000);
        assert_eq!(claim.nullifier, proof.nullifier());
    }

    /// A proof signed by someone outside the trusted set must not verify.
    #[test]
    fn rogue_attestor_rejected() {
        let trusted = Attestor::new(Keypair::from_seed(&[1u8; 32]));
        let rogue = Attestor::new(Keypair::from_seed(&[2u8; 32]));
        let verifier = AttestorVerifier::new([trusted.public_key()]);

        let proof = rogue.attest(&AttestationRequest::passing(
            Address::derive("mallory"),
            AccreditationType::Both,
            1_700_000_000,
        ));
        assert!(matches!(
            verifier.verify(&proof.to_bytes()),
            Err(VerificationError::UntrustedAttestor(_))
        ));
    }
}
