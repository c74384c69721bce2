//! Integration tests for the credential registry.
//!
//! These drive the registry the way a holder and an admin would: real
//! attestor keys, real proof bytes, ledger time passed in explicitly.

use std::sync::Arc;

use nullifier_contracts::credential_registry::{
    CredentialRegistry, CredentialStatus, ProofRejection, RegistryConfig, RegistryError,
    RegistryEvent,
};
use nullifier_protocol::attestation::{
    AccreditationType, AttestationRequest, Attestor, AttestorVerifier, VerificationError,
};
use nullifier_protocol::config::CREDENTIAL_VALIDITY_SECS;
use nullifier_protocol::context::{CallContext, Timestamp};
use nullifier_protocol::crypto::Keypair;
use nullifier_protocol::identity::Address;

/// A registry, its admin, and the attestor it trusts.
struct Harness {
    registry: CredentialRegistry,
    admin: Address,
    attestor: Attestor,
}

impl Harness {
    fn new() -> Self {
        let attestor = Attestor::new(Keypair::from_seed(&[42u8; 32]));
        let admin = Address::derive("admin");
        let registry = CredentialRegistry::new(
            Address::derive("registry"),
            admin,
            Arc::new(AttestorVerifier::new([attestor.public_key()])),
            RegistryConfig::default(),
        )
        .unwrap();
        Self {
            registry,
            admin,
            attestor,
        }
    }

    fn proof(&self, holder: Address, ty: AccreditationType, at: Timestamp) -> Vec<u8> {
        self.attestor
            .attest(&AttestationRequest::passing(holder, ty, at))
            .to_bytes()
    }

    fn mint(&mut self, holder: Address, ty: AccreditationType, at: Timestamp) -> Result<u64, RegistryError> {
        let proof = self.proof(holder, ty, at);
        self.registry
            .mint_credential(&CallContext::new(holder, at), &proof, ty.as_u8())
    }

    fn revoke(&mut self, holder: Address, at: Timestamp) -> Result<bool, RegistryError> {
        self.registry
            .revoke_credential(&CallContext::new(self.admin, at), &holder)
    }
}

// ---------------------------------------------------------------------------
// Minting
// ---------------------------------------------------------------------------

#[test]
fn successful_mint_is_live_for_exactly_the_validity_period() {
    let mut h = Harness::new();
    let alice = Address::derive("alice");
    h.mint(alice, AccreditationType::Income, 1_000).unwrap();

    assert!(h.registry.has_credential(&alice));
    assert!(h.registry.is_accredited(&alice, 1_000));

    let credential = h.registry.get_credential(&alice).unwrap();
    assert!(!credential.revoked);
    assert_eq!(credential.accreditation_type, AccreditationType::Income);
    assert_eq!(credential.expires_at - credential.issued_at, CREDENTIAL_VALIDITY_SECS);
}

#[test]
fn mint_emits_event() {
    let mut h = Harness::new();
    let alice = Address::derive("alice");
    let token_id = h.mint(alice, AccreditationType::Both, 1_000).unwrap();

    assert_eq!(
        h.registry.events(),
        &[RegistryEvent::CredentialMinted {
            holder: alice,
            token_id,
            accreditation_type: AccreditationType::Both,
            expires_at: 1_000 + CREDENTIAL_VALIDITY_SECS,
        }]
    );
}

#[test]
fn second_mint_with_live_credential_changes_nothing() {
    let mut h = Harness::new();
    let alice = Address::derive("alice");
    h.mint(alice, AccreditationType::Income, 1_000).unwrap();
    let before = h.registry.snapshot();

    // A different, perfectly valid proof.
    let result = h.mint(alice, AccreditationType::NetWorth, 1_500);
    assert_eq!(result, Err(RegistryError::AlreadyHasCredential(alice)));
    assert_eq!(h.registry.snapshot(), before);
}

#[test]
fn resubmitting_the_same_proof_fails_cleanly() {
    let mut h = Harness::new();
    let alice = Address::derive("alice");
    let proof = h.proof(alice, AccreditationType::Income, 1_000);
    let ctx = CallContext::new(alice, 1_000);

    h.registry.mint_credential(&ctx, &proof, 1).unwrap();
    assert_eq!(
        h.registry.mint_credential(&ctx, &proof, 1),
        Err(RegistryError::AlreadyHasCredential(alice))
    );
    assert_eq!(h.registry.total_supply(), 1);
}

#[test]
fn spent_proof_cannot_remint_after_revocation() {
    let mut h = Harness::new();
    let alice = Address::derive("alice");
    let proof = h.proof(alice, AccreditationType::Income, 1_000);

    h.registry
        .mint_credential(&CallContext::new(alice, 1_000), &proof, 1)
        .unwrap();
    h.revoke(alice, 1_001).unwrap();

    let result = h
        .registry
        .mint_credential(&CallContext::new(alice, 1_002), &proof, 1);
    assert!(matches!(
        result,
        Err(RegistryError::InvalidProof(ProofRejection::NullifierUsed(_)))
    ));
}

#[test]
fn failing_attestation_rejected() {
    let mut h = Harness::new();
    let alice = Address::derive("alice");
    let mut request = AttestationRequest::passing(alice, AccreditationType::Income, 1_000);
    request.meets_threshold = false;
    let proof = h.attestor.attest(&request).to_bytes();

    assert_eq!(
        h.registry
            .mint_credential(&CallContext::new(alice, 1_000), &proof, 1),
        Err(RegistryError::InvalidProof(ProofRejection::ThresholdNotMet))
    );
}

#[test]
fn proof_from_untrusted_attestor_rejected() {
    let mut h = Harness::new();
    let alice = Address::derive("alice");
    let rogue = Attestor::new(Keypair::from_seed(&[66u8; 32]));
    let proof = rogue
        .attest(&AttestationRequest::passing(alice, AccreditationType::Income, 1_000))
        .to_bytes();

    assert!(matches!(
        h.registry
            .mint_credential(&CallContext::new(alice, 1_000), &proof, 1),
        Err(RegistryError::InvalidProof(ProofRejection::Verification(
            VerificationError::UntrustedAttestor(_)
        )))
    ));
    assert!(!h.registry.has_credential(&alice));
}

#[test]
fn token_ids_are_monotonic_across_holders() {
    let mut h = Harness::new();
    let ids: Vec<u64> = ["a", "b", "c"]
        .iter()
        .map(|l| h.mint(Address::derive(l), AccreditationType::Income, 1_000).unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(h.registry.total_supply(), 3);
}

// ---------------------------------------------------------------------------
// Expiry
// ---------------------------------------------------------------------------

#[test]
fn expiry_boundary() {
    let mut h = Harness::new();
    let alice = Address::derive("alice");
    h.mint(alice, AccreditationType::NetWorth, 1_000).unwrap();
    let expires_at = 1_000 + CREDENTIAL_VALIDITY_SECS;

    assert!(h.registry.is_accredited(&alice, expires_at - 1));
    assert!(!h.registry.is_accredited(&alice, expires_at));
    assert!(h.registry.has_credential(&alice));
}

#[test]
fn holder_may_remint_after_expiry() {
    let mut h = Harness::new();
    let alice = Address::derive("alice");
    let first = h.mint(alice, AccreditationType::Income, 1_000).unwrap();
    let later = 1_000 + CREDENTIAL_VALIDITY_SECS;

    let second = h.mint(alice, AccreditationType::Income, later).unwrap();
    assert_ne!(first, second);
    assert!(h.registry.is_accredited(&alice, later));
    assert_eq!(h.registry.balance_of(&alice), 2);

    // The old record is still there.
    assert_eq!(h.registry.owner_of(first), Ok(alice));
    assert_eq!(
        h.registry.credential_by_token(first).unwrap().status(later),
        CredentialStatus::Expired
    );
}

// ---------------------------------------------------------------------------
// Revocation
// ---------------------------------------------------------------------------

/// Mint at t=1000, revoke, re-mint with a fresh proof.
#[test]
fn revoke_then_remint_yields_new_token() {
    let mut h = Harness::new();
    let alice = Address::derive("alice");

    let old = h.mint(alice, AccreditationType::Income, 1_000).unwrap();
    let credential = h.registry.get_credential(&alice).unwrap();
    assert_eq!(credential.issued_at, 1_000);
    assert_eq!(credential.expires_at, 1_000 + 365 * 86_400);
    assert!(h.registry.is_accredited(&alice, 1_000));

    assert_eq!(h.revoke(alice, 1_000), Ok(true));
    assert!(!h.registry.is_accredited(&alice, 1_001));

    let new = h.mint(alice, AccreditationType::Income, 1_002).unwrap();
    assert_ne!(new, old);
    assert!(h.registry.is_accredited(&alice, 1_002));
    assert_eq!(h.registry.token_id_of(&alice), Ok(new));

    // Revocation of the old token is permanent.
    assert!(h.registry.credential_by_token(old).unwrap().revoked);
}

#[test]
fn revocation_is_idempotent() {
    let mut h = Harness::new();
    let alice = Address::derive("alice");
    h.mint(alice, AccreditationType::Income, 1_000).unwrap();

    assert_eq!(h.revoke(alice, 1_001), Ok(true));
    assert_eq!(h.revoke(alice, 1_002), Ok(false));

    let revocations = h
        .registry
        .events()
        .iter()
        .filter(|e| matches!(e, RegistryEvent::CredentialRevoked { .. }))
        .count();
    assert_eq!(revocations, 1);
}

#[test]
fn only_admin_revokes() {
    let mut h = Harness::new();
    let alice = Address::derive("alice");
    h.mint(alice, AccreditationType::Income, 1_000).unwrap();

    let result = h
        .registry
        .revoke_credential(&CallContext::new(alice, 1_001), &alice);
    assert_eq!(result, Err(RegistryError::Unauthorized(alice)));
    assert!(h.registry.is_accredited(&alice, 1_001));
}

#[test]
fn revoking_unknown_holder_fails() {
    let mut h = Harness::new();
    let nobody = Address::derive("nobody");
    assert_eq!(
        h.revoke(nobody, 1_000),
        Err(RegistryError::CredentialNotFound(nobody))
    );
}

// ---------------------------------------------------------------------------
// Soulbound
// ---------------------------------------------------------------------------

#[test]
fn credentials_cannot_move() {
    let mut h = Harness::new();
    let alice = Address::derive("alice");
    let bob = Address::derive("bob");
    let token_id = h.mint(alice, AccreditationType::Income, 1_000).unwrap();
    let ctx = CallContext::new(alice, 1_000);

    assert_eq!(
        h.registry.transfer_from(&ctx, alice, bob, token_id),
        Err(RegistryError::SoulboundToken)
    );
    assert_eq!(
        h.registry.safe_transfer_from(&ctx, alice, bob, token_id),
        Err(RegistryError::SoulboundToken)
    );
    assert_eq!(
        h.registry.approve(&ctx, bob, token_id),
        Err(RegistryError::SoulboundToken)
    );
    assert_eq!(
        h.registry.set_approval_for_all(&ctx, bob, true),
        Err(RegistryError::SoulboundToken)
    );

    assert_eq!(h.registry.owner_of(token_id), Ok(alice));
    assert!(!h.registry.has_credential(&bob));
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

#[test]
fn unknown_holder_views() {
    let h = Harness::new();
    let nobody = Address::derive("nobody");
    assert!(!h.registry.is_accredited(&nobody, 0));
    assert!(!h.registry.has_credential(&nobody));
    assert_eq!(
        h.registry.get_credential(&nobody),
        Err(RegistryError::CredentialNotFound(nobody))
    );
    assert_eq!(
        h.registry.token_id_of(&nobody),
        Err(RegistryError::CredentialNotFound(nobody))
    );
    assert_eq!(h.registry.owner_of(1), Err(RegistryError::TokenNotFound(1)));
    assert_eq!(h.registry.balance_of(&nobody), 0);
}

#[test]
fn token_metadata() {
    let h = Harness::new();
    assert_eq!(h.registry.name(), "Nullifier Accreditation Credential");
    assert_eq!(h.registry.symbol(), "NAC");
}

#[test]
fn live_count_tracks_latest_records() {
    let mut h = Harness::new();
    let alice = Address::derive("alice");
    let bob = Address::derive("bob");
    h.mint(alice, AccreditationType::Income, 1_000).unwrap();
    h.mint(bob, AccreditationType::NetWorth, 1_000).unwrap();
    assert_eq!(h.registry.live_count(1_000), 2);

    h.revoke(bob, 1_001).unwrap();
    assert_eq!(h.registry.live_count(1_001), 1);
    assert_eq!(h.registry.live_count(1_000 + CREDENTIAL_VALIDITY_SECS), 0);
}
