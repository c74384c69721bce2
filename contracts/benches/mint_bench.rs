// Mint-path and vault benchmarks for the Nullifier contracts.
//
// Measures a full `mint_credential` (verify, bind, nullifier check, store)
// against registries of growing size, plus a gated vault deposit.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use parking_lot::RwLock;

use nullifier_contracts::asset_token::{AssetLedger, AssetToken};
use nullifier_contracts::compliant_vault::CompliantVault;
use nullifier_contracts::credential_registry::{CredentialRegistry, RegistryConfig};
use nullifier_contracts::oracle::RegistryReader;
use nullifier_protocol::attestation::{
    AccreditationType, AttestationRequest, Attestor, AttestorVerifier,
};
use nullifier_protocol::context::CallContext;
use nullifier_protocol::crypto::Keypair;
use nullifier_protocol::identity::Address;

const T0: u64 = 1_700_000_000;

fn registry_with(attestor: &Attestor, holders: usize) -> CredentialRegistry {
    let mut registry = CredentialRegistry::new(
        Address::derive("registry"),
        Address::derive("admin"),
        Arc::new(AttestorVerifier::new([attestor.public_key()])),
        RegistryConfig::default(),
    )
    .unwrap();
    for i in 0..holders {
        let holder = Address::derive(&format!("holder-{i}"));
        let proof = attestor
            .attest(&AttestationRequest::passing(holder, AccreditationType::Income, T0))
            .to_bytes();
        registry
            .mint_credential(&CallContext::new(holder, T0), &proof, 1)
            .unwrap();
    }
    registry
}

fn bench_mint_credential(c: &mut Criterion) {
    let attestor = Attestor::new(Keypair::from_seed(&[1u8; 32]));
    let newcomer = Address::derive("newcomer");
    let proof = attestor
        .attest(&AttestationRequest::passing(newcomer, AccreditationType::NetWorth, T0))
        .to_bytes();

    let mut group = c.benchmark_group("registry/mint_credential");
    for size in [0usize, 100, 1_000] {
        let registry = registry_with(&attestor, size);
        let snapshot = registry.snapshot();
        group.bench_with_input(BenchmarkId::from_parameter(size), &snapshot, |b, snapshot| {
            b.iter_batched(
                || {
                    CredentialRegistry::restore(
                        snapshot.clone(),
                        Arc::new(AttestorVerifier::new([attestor.public_key()])),
                    )
                    .unwrap()
                },
                |mut registry| {
                    registry
                        .mint_credential(&CallContext::new(newcomer, T0), &proof, 2)
                        .unwrap()
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_gated_deposit(c: &mut Criterion) {
    let attestor = Attestor::new(Keypair::from_seed(&[1u8; 32]));
    let registry = Arc::new(RwLock::new(registry_with(&attestor, 1)));
    let holder = Address::derive("holder-0");
    let issuer = Address::derive("issuer");

    let mut token = AssetToken::new(Address::derive("tusdc"), "Test USD", "tUSDC", 6, issuer).unwrap();
    let mut vault = CompliantVault::new(
        Address::derive("vault"),
        token.address(),
        "Vault",
        "vUSDC",
        Arc::new(RegistryReader::new(registry)),
    )
    .unwrap();
    token.mint(issuer, holder, u128::MAX / 2).unwrap();
    token.approve(holder, vault.address(), u128::MAX).unwrap();

    let ctx = CallContext::new(holder, T0);
    c.bench_function("vault/deposit", |b| {
        b.iter(|| vault.deposit(&ctx, &mut token, 1_000, holder).unwrap());
    });
}

criterion_group!(benches, bench_mint_credential, bench_gated_deposit);
criterion_main!(benches);
