//! # Devnet
//!
//! A single-process ledger: one credential registry, the asset tokens and
//! the vaults from genesis, executed one call at a time. There is no
//! consensus, no mempool and no blocks. A call either runs to completion
//! or fails without touching state, and gets a transaction id either way
//! it succeeds.
//!
//! The API holds the devnet behind one `tokio::sync::Mutex`, which is what
//! serializes calls. The registry additionally sits behind its own
//! `parking_lot::RwLock` because vaults read it through a
//! [`RegistryReader`].

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use nullifier_contracts::asset_token::{AssetError, AssetLedger, AssetToken};
use nullifier_contracts::compliant_vault::{CompliantVault, VaultError, VaultEvent, VaultState};
use nullifier_contracts::credential_registry::{
    CredentialRegistry, RegistryError, RegistryEvent, RegistryState, TokenId,
};
use nullifier_contracts::oracle::{RegistryReader, SharedRegistry};
use nullifier_protocol::attestation::{AttestorVerifier, ProofVerifier};
use nullifier_protocol::context::{CallContext, Timestamp};
use nullifier_protocol::identity::Address;

use crate::genesis::Genesis;

/// Name of the snapshot file inside the data directory.
pub const STATE_FILE: &str = "state.json";

/// How many published events the devnet keeps. Older ones are dropped.
pub const EVENT_LOG_CAPACITY: usize = 10_000;

// ---------------------------------------------------------------------------
// Errors & Events
// ---------------------------------------------------------------------------

/// Why a devnet call failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DevnetError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("no vault at {0}")]
    UnknownVault(Address),

    #[error("no asset token at {0}")]
    UnknownAsset(Address),
}

/// Contract events as the node publishes them: tagged with the transaction
/// that emitted them and, for vaults, which vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeEvent {
    Registry {
        tx_id: Uuid,
        #[serde(flatten)]
        event: RegistryEvent,
    },
    Vault {
        tx_id: Uuid,
        vault: Address,
        #[serde(flatten)]
        event: VaultEvent,
    },
}

/// Result of a successful call.
#[derive(Debug, Clone, Serialize)]
pub struct Receipt<T> {
    pub tx_id: Uuid,
    pub result: T,
    pub events: Vec<NodeEvent>,
}

impl<T> Receipt<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Receipt<U> {
        Receipt {
            tx_id: self.tx_id,
            result: f(self.result),
            events: self.events,
        }
    }
}

/// Everything the devnet persists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevnetSnapshot {
    pub chain_id: u64,
    pub registry: RegistryState,
    pub assets: Vec<AssetToken>,
    pub vaults: Vec<VaultState>,
    pub events: Vec<NodeEvent>,
}

// ---------------------------------------------------------------------------
// Devnet
// ---------------------------------------------------------------------------

pub struct Devnet {
    chain_id: u64,
    registry: SharedRegistry,
    assets: BTreeMap<Address, AssetToken>,
    vaults: BTreeMap<Address, CompliantVault>,
    events: Vec<NodeEvent>,
    event_capacity: usize,
}

fn verifier_from(genesis: &Genesis) -> Result<Arc<dyn ProofVerifier>> {
    let keys = genesis.trusted_attestor_keys()?;
    Ok(Arc::new(
        AttestorVerifier::new(keys).with_quorum(genesis.attestor_quorum),
    ))
}

impl Devnet {
    /// Deploys every contract described by `genesis`.
    pub fn from_genesis(genesis: &Genesis) -> Result<Self> {
        genesis.validate()?;
        let admin = Address::from_public_key(&genesis.admin_keypair()?.public_key());

        let registry = CredentialRegistry::new(
            genesis.registry_address(),
            admin,
            verifier_from(genesis)?,
            genesis.registry.clone(),
        )
        .context("failed to deploy credential registry")?;
        let registry: SharedRegistry = Arc::new(RwLock::new(registry));

        let mut assets = BTreeMap::new();
        for def in &genesis.assets {
            let token = AssetToken::new(
                Address::derive(&def.label),
                def.name.clone(),
                def.symbol.clone(),
                def.decimals,
                admin,
            )
            .with_context(|| format!("failed to deploy asset {}", def.label))?;
            assets.insert(token.address(), token);
        }

        let mut vaults = BTreeMap::new();
        for def in &genesis.vaults {
            let vault = CompliantVault::new(
                Address::derive(&def.label),
                Address::derive(&def.asset),
                def.name.clone(),
                def.symbol.clone(),
                Arc::new(RegistryReader::new(registry.clone())),
            )
            .with_context(|| format!("failed to deploy vault {}", def.label))?;
            vaults.insert(vault.address(), vault);
        }

        tracing::info!(
            chain_id = genesis.chain_id,
            registry = %genesis.registry_address(),
            admin = %admin,
            assets = assets.len(),
            vaults = vaults.len(),
            "devnet deployed from genesis"
        );

        Ok(Self {
            chain_id: genesis.chain_id,
            registry,
            assets,
            vaults,
            events: Vec::new(),
            event_capacity: EVENT_LOG_CAPACITY,
        })
    }

    /// Rebuilds a devnet from a snapshot. The verifier still comes from
    /// genesis: trusted keys are configuration, not state.
    pub fn restore(genesis: &Genesis, snapshot: DevnetSnapshot) -> Result<Self> {
        let registry = CredentialRegistry::restore(snapshot.registry, verifier_from(genesis)?)
            .context("failed to restore credential registry")?;
        let registry: SharedRegistry = Arc::new(RwLock::new(registry));

        let assets = snapshot
            .assets
            .into_iter()
            .map(|token| (token.address(), token))
            .collect();

        let mut vaults = BTreeMap::new();
        for state in snapshot.vaults {
            let oracle = Arc::new(RegistryReader::new(registry.clone()));
            let vault = CompliantVault::restore(state, oracle).context("failed to restore vault")?;
            vaults.insert(vault.address(), vault);
        }

        let mut devnet = Self {
            chain_id: snapshot.chain_id,
            registry,
            assets,
            vaults,
            events: snapshot.events,
            event_capacity: EVENT_LOG_CAPACITY,
        };
        devnet.trim_events();
        Ok(devnet)
    }

    /// Keeps at most `capacity` events, newest last.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self.trim_events();
        self
    }

    fn trim_events(&mut self) {
        let excess = self.events.len().saturating_sub(self.event_capacity);
        if excess > 0 {
            self.events.drain(..excess);
        }
    }

    pub fn snapshot(&self) -> DevnetSnapshot {
        DevnetSnapshot {
            chain_id: self.chain_id,
            registry: self.registry.read().snapshot(),
            assets: self.assets.values().cloned().collect(),
            vaults: self.vaults.values().map(CompliantVault::snapshot).collect(),
            events: self.events.clone(),
        }
    }

    /// Writes the snapshot atomically (temp file, then rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_vec_pretty(&self.snapshot()).context("failed to encode snapshot")?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("failed to write snapshot to {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("failed to move snapshot into {}", path.display()))?;
        Ok(())
    }

    pub fn load_snapshot(path: &Path) -> Result<DevnetSnapshot> {
        let raw = std::fs::read(path)
            .with_context(|| format!("failed to read snapshot at {}", path.display()))?;
        serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse snapshot at {}", path.display()))
    }

    // ---- Registry calls ----

    pub fn mint_credential(
        &mut self,
        ctx: &CallContext,
        proof: &[u8],
        type_tag: u8,
    ) -> Result<Receipt<TokenId>, DevnetError> {
        let token_id = self
            .registry
            .write()
            .mint_credential(ctx, proof, type_tag)?;
        Ok(self.commit(token_id))
    }

    /// `result` is whether this call changed anything.
    pub fn revoke_credential(
        &mut self,
        ctx: &CallContext,
        holder: &Address,
    ) -> Result<Receipt<bool>, DevnetError> {
        let revoked = self.registry.write().revoke_credential(ctx, holder)?;
        Ok(self.commit(revoked))
    }

    /// Hands the registry admin role to `new_admin`. Asset tokens keep
    /// their genesis issuer.
    pub fn transfer_admin(
        &mut self,
        ctx: &CallContext,
        new_admin: Address,
    ) -> Result<Receipt<()>, DevnetError> {
        self.registry.write().transfer_admin(ctx, new_admin)?;
        Ok(self.commit(()))
    }

    // ---- Vault calls ----

    fn vault_and_ledger(
        &mut self,
        vault: &Address,
    ) -> Result<(&mut CompliantVault, &mut AssetToken), DevnetError> {
        let vault = self
            .vaults
            .get_mut(vault)
            .ok_or(DevnetError::UnknownVault(*vault))?;
        let asset = vault.asset();
        let ledger = self
            .assets
            .get_mut(&asset)
            .ok_or(DevnetError::UnknownAsset(asset))?;
        Ok((vault, ledger))
    }

    pub fn deposit(
        &mut self,
        ctx: &CallContext,
        vault: &Address,
        assets: u128,
        receiver: Address,
    ) -> Result<Receipt<u128>, DevnetError> {
        let (v, ledger) = self.vault_and_ledger(vault)?;
        let shares = v.deposit(ctx, ledger, assets, receiver)?;
        Ok(self.commit(shares))
    }

    pub fn mint_shares(
        &mut self,
        ctx: &CallContext,
        vault: &Address,
        shares: u128,
        receiver: Address,
    ) -> Result<Receipt<u128>, DevnetError> {
        let (v, ledger) = self.vault_and_ledger(vault)?;
        let assets = v.mint(ctx, ledger, shares, receiver)?;
        Ok(self.commit(assets))
    }

    pub fn withdraw(
        &mut self,
        ctx: &CallContext,
        vault: &Address,
        assets: u128,
        receiver: Address,
        owner: Address,
    ) -> Result<Receipt<u128>, DevnetError> {
        let (v, ledger) = self.vault_and_ledger(vault)?;
        let shares = v.withdraw(ctx, ledger, assets, receiver, owner)?;
        Ok(self.commit(shares))
    }

    pub fn redeem(
        &mut self,
        ctx: &CallContext,
        vault: &Address,
        shares: u128,
        receiver: Address,
        owner: Address,
    ) -> Result<Receipt<u128>, DevnetError> {
        let (v, ledger) = self.vault_and_ledger(vault)?;
        let assets = v.redeem(ctx, ledger, shares, receiver, owner)?;
        Ok(self.commit(assets))
    }

    pub fn approve_shares(
        &mut self,
        ctx: &CallContext,
        vault: &Address,
        spender: Address,
        shares: u128,
    ) -> Result<Receipt<()>, DevnetError> {
        let v = self
            .vaults
            .get_mut(vault)
            .ok_or(DevnetError::UnknownVault(*vault))?;
        v.approve(ctx, spender, shares)?;
        Ok(self.commit(()))
    }

    // ---- Asset calls ----

    /// Issuer-only mint of test tokens.
    pub fn faucet(
        &mut self,
        ctx: &CallContext,
        asset: &Address,
        to: Address,
        amount: u128,
    ) -> Result<Receipt<()>, DevnetError> {
        self.asset_mut(asset)?.mint(ctx.caller, to, amount)?;
        Ok(self.commit(()))
    }

    pub fn approve_asset(
        &mut self,
        ctx: &CallContext,
        asset: &Address,
        spender: Address,
        amount: u128,
    ) -> Result<Receipt<()>, DevnetError> {
        self.asset_mut(asset)?.approve(ctx.caller, spender, amount)?;
        Ok(self.commit(()))
    }

    fn asset_mut(&mut self, asset: &Address) -> Result<&mut AssetToken, DevnetError> {
        self.assets
            .get_mut(asset)
            .ok_or(DevnetError::UnknownAsset(*asset))
    }

    /// Assigns a transaction id and collects the events the call emitted.
    fn commit<T>(&mut self, result: T) -> Receipt<T> {
        let tx_id = Uuid::new_v4();
        let mut events: Vec<NodeEvent> = self
            .registry
            .write()
            .take_events()
            .into_iter()
            .map(|event| NodeEvent::Registry { tx_id, event })
            .collect();
        for (address, vault) in self.vaults.iter_mut() {
            events.extend(vault.take_events().into_iter().map(|event| NodeEvent::Vault {
                tx_id,
                vault: *address,
                event,
            }));
        }
        self.events.extend(events.iter().cloned());
        self.trim_events();
        tracing::debug!(%tx_id, events = events.len(), "call committed");
        Receipt {
            tx_id,
            result,
            events,
        }
    }

    // ---- Views ----

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn vault(&self, address: &Address) -> Option<&CompliantVault> {
        self.vaults.get(address)
    }

    pub fn vaults(&self) -> impl Iterator<Item = &CompliantVault> {
        self.vaults.values()
    }

    pub fn asset(&self, address: &Address) -> Option<&AssetToken> {
        self.assets.get(address)
    }

    pub fn assets(&self) -> impl Iterator<Item = &AssetToken> {
        self.assets.values()
    }

    pub fn events(&self) -> &[NodeEvent] {
        &self.events
    }

    /// Sum of assets under management across all vaults, saturating.
    pub fn total_value_locked(&self) -> u128 {
        self.vaults
            .values()
            .fold(0u128, |acc, v| acc.saturating_add(v.total_assets()))
    }

    pub fn live_credentials(&self, now: Timestamp) -> usize {
        self.registry.read().live_count(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nullifier_protocol::attestation::{AccreditationType, AttestationRequest, Attestor};

    const T0: Timestamp = 1_700_000_000;

    struct Fixture {
        devnet: Devnet,
        genesis: Genesis,
        admin: Address,
        vault: Address,
        asset: Address,
    }

    fn fixture() -> Fixture {
        let genesis = Genesis::generate(31337, T0);
        let devnet = Devnet::from_genesis(&genesis).unwrap();
        let admin = Address::from_public_key(&genesis.admin_keypair().unwrap().public_key());
        let vault = Address::derive(&genesis.vaults[0].label);
        let asset = Address::derive(&genesis.assets[0].label);
        Fixture {
            devnet,
            genesis,
            admin,
            vault,
            asset,
        }
    }

    fn accredit(f: &mut Fixture, holder: Address) {
        let attestor = Attestor::new(f.genesis.attestor_keypair().unwrap());
        let proof = attestor
            .attest(&AttestationRequest::passing(holder, AccreditationType::Income, T0))
            .to_bytes();
        f.devnet
            .mint_credential(&CallContext::new(holder, T0), &proof, 1)
            .unwrap();
    }

    fn fund(f: &mut Fixture, holder: Address, amount: u128) {
        let admin = CallContext::new(f.admin, T0);
        let (asset, vault) = (f.asset, f.vault);
        f.devnet.faucet(&admin, &asset, holder, amount).unwrap();
        f.devnet
            .approve_asset(&CallContext::new(holder, T0), &asset, vault, amount)
            .unwrap();
    }

    #[test]
    fn genesis_deploys_contracts() {
        let f = fixture();
        assert_eq!(f.devnet.vaults().count(), 3);
        assert_eq!(f.devnet.assets().count(), 3);
        assert_eq!(f.devnet.vault(&f.vault).unwrap().asset(), f.asset);
        assert_eq!(f.devnet.registry().read().admin(), f.admin);
    }

    #[test]
    fn mint_receipt_carries_event() {
        let mut f = fixture();
        let alice = Address::derive("alice");
        let attestor = Attestor::new(f.genesis.attestor_keypair().unwrap());
        let proof = attestor
            .attest(&AttestationRequest::passing(alice, AccreditationType::Both, T0))
            .to_bytes();

        let receipt = f
            .devnet
            .mint_credential(&CallContext::new(alice, T0), &proof, 3)
            .unwrap();
        assert_eq!(receipt.result, 1);
        assert_eq!(receipt.events.len(), 1);
        assert!(matches!(
            &receipt.events[0],
            NodeEvent::Registry { tx_id, event: RegistryEvent::CredentialMinted { .. } } if *tx_id == receipt.tx_id
        ));
        assert_eq!(f.devnet.events().len(), 1);
    }

    #[test]
    fn deposit_flow_and_tvl() {
        let mut f = fixture();
        let alice = Address::derive("alice");
        accredit(&mut f, alice);
        fund(&mut f, alice, 5_000);

        let vault = f.vault;
        let receipt = f
            .devnet
            .deposit(&CallContext::new(alice, T0), &vault, 5_000, alice)
            .unwrap();
        assert_eq!(receipt.result, 5_000);
        assert_eq!(f.devnet.total_value_locked(), 5_000);
        assert!(matches!(
            &receipt.events[0],
            NodeEvent::Vault { event: VaultEvent::Deposit { .. }, .. }
        ));
    }

    #[test]
    fn unaccredited_deposit_rejected() {
        let mut f = fixture();
        let bob = Address::derive("bob");
        fund(&mut f, bob, 100);
        let vault = f.vault;
        let result = f
            .devnet
            .deposit(&CallContext::new(bob, T0), &vault, 100, bob);
        assert_eq!(
            result.map(|r| r.result),
            Err(DevnetError::Vault(VaultError::NotAccredited(bob)))
        );
        assert_eq!(f.devnet.asset(&f.asset).unwrap().balance_of(&bob), 100);
    }

    #[test]
    fn faucet_is_issuer_only() {
        let mut f = fixture();
        let bob = Address::derive("bob");
        let asset = f.asset;
        assert_eq!(
            f.devnet
                .faucet(&CallContext::new(bob, T0), &asset, bob, 1)
                .map(|r| r.result),
            Err(DevnetError::Asset(AssetError::UnauthorizedMint))
        );
    }

    #[test]
    fn unknown_vault_rejected() {
        let mut f = fixture();
        let nowhere = Address::derive("nowhere");
        let alice = Address::derive("alice");
        assert_eq!(
            f.devnet
                .deposit(&CallContext::new(alice, T0), &nowhere, 1, alice)
                .map(|r| r.result),
            Err(DevnetError::UnknownVault(nowhere))
        );
    }

    #[test]
    fn revocation_closes_every_vault_but_not_exits() {
        let mut f = fixture();
        let alice = Address::derive("alice");
        accredit(&mut f, alice);

        let vaults: Vec<(Address, Address)> = f
            .genesis
            .vaults
            .iter()
            .map(|v| (Address::derive(&v.label), Address::derive(&v.asset)))
            .collect();
        let admin = CallContext::new(f.admin, T0);
        let ctx = CallContext::new(alice, T0);
        for (vault, asset) in &vaults {
            f.devnet.faucet(&admin, asset, alice, 1_000).unwrap();
            f.devnet.approve_asset(&ctx, asset, *vault, 1_000).unwrap();
            f.devnet.deposit(&ctx, vault, 500, alice).unwrap();
        }
        assert_eq!(f.devnet.total_value_locked(), 500 * vaults.len() as u128);

        f.devnet
            .revoke_credential(&CallContext::new(f.admin, T0 + 1), &alice)
            .unwrap();

        let later = CallContext::new(alice, T0 + 2);
        for (vault, _) in &vaults {
            assert_eq!(
                f.devnet.deposit(&later, vault, 1, alice).map(|r| r.result),
                Err(DevnetError::Vault(VaultError::NotAccredited(alice)))
            );
            let redeemed = f.devnet.redeem(&later, vault, 500, alice, alice).unwrap();
            assert_eq!(redeemed.result, 500);
        }
        assert_eq!(f.devnet.total_value_locked(), 0);
    }

    #[test]
    fn admin_transfer_moves_revocation_rights() {
        let mut f = fixture();
        let alice = Address::derive("alice");
        let successor = Address::derive("successor");
        accredit(&mut f, alice);

        let receipt = f
            .devnet
            .transfer_admin(&CallContext::new(f.admin, T0), successor)
            .unwrap();
        assert!(matches!(
            &receipt.events[0],
            NodeEvent::Registry { event: RegistryEvent::AdminTransferred { .. }, .. }
        ));
        assert_eq!(
            f.devnet
                .revoke_credential(&CallContext::new(f.admin, T0), &alice)
                .map(|r| r.result),
            Err(DevnetError::Registry(RegistryError::Unauthorized(f.admin)))
        );
        let revoked = f
            .devnet
            .revoke_credential(&CallContext::new(successor, T0), &alice)
            .unwrap();
        assert!(revoked.result);
    }

    #[test]
    fn event_log_keeps_newest() {
        let mut f = fixture();
        f.devnet = Devnet::from_genesis(&f.genesis)
            .unwrap()
            .with_event_capacity(2);
        for who in ["alice", "bob", "carol"] {
            accredit(&mut f, Address::derive(who));
        }

        let minted: Vec<Address> = f
            .devnet
            .events()
            .iter()
            .filter_map(|e| match e {
                NodeEvent::Registry {
                    event: RegistryEvent::CredentialMinted { holder, .. },
                    ..
                } => Some(*holder),
                _ => None,
            })
            .collect();
        assert_eq!(f.devnet.events().len(), 2);
        assert_eq!(minted, [Address::derive("bob"), Address::derive("carol")]);
    }

    #[test]
    fn snapshot_survives_restart() {
        let mut f = fixture();
        let alice = Address::derive("alice");
        accredit(&mut f, alice);
        fund(&mut f, alice, 1_000);
        let vault = f.vault;
        f.devnet
            .deposit(&CallContext::new(alice, T0), &vault, 1_000, alice)
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STATE_FILE);
        f.devnet.save(&path).unwrap();

        let snapshot = Devnet::load_snapshot(&path).unwrap();
        let restored = Devnet::restore(&f.genesis, snapshot).unwrap();
        assert!(restored.registry().read().is_accredited(&alice, T0));
        assert_eq!(restored.vault(&vault).unwrap().balance_of(&alice), 1_000);
        assert_eq!(restored.total_value_locked(), 1_000);
        assert_eq!(restored.events().len(), f.devnet.events().len());
    }
}
