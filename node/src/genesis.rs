//! # Genesis
//!
//! `genesis.json` describes a devnet from scratch: who administers the
//! registry, which attestors it trusts, which asset tokens exist and which
//! vaults accept them. `init` writes one with fresh keys; `run` deploys it.
//!
//! The file holds secret keys in hex. It is a devnet file. Treat it like
//! one, and do not commit it anywhere you would be sad to see it leaked.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use nullifier_contracts::credential_registry::RegistryConfig;
use nullifier_protocol::config::{DEFAULT_ATTESTOR_QUORUM, DEFAULT_ATTESTOR_URL};
use nullifier_protocol::crypto::{Keypair, PublicKey};
use nullifier_protocol::identity::Address;

/// Name of the genesis file inside the data directory.
pub const GENESIS_FILE: &str = "genesis.json";

/// Contract address labels. Addresses are derived from these, so the same
/// genesis always deploys to the same addresses.
pub const REGISTRY_LABEL: &str = "nullifier/credential-registry";

/// An asset token to deploy. The registry admin is its issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetGenesis {
    pub label: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// A vault to deploy over one of the genesis assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultGenesis {
    pub label: String,
    pub name: String,
    pub symbol: String,
    /// Label of the asset this vault holds.
    pub asset: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genesis {
    pub chain_id: u64,
    /// Unix seconds at which the genesis was created.
    pub created_at: u64,
    /// Hex secret key of the registry admin and asset issuer.
    pub admin_key: String,
    /// Hex secret key of the development attestor.
    pub attestor_key: String,
    pub attestor_url: String,
    /// Hex public keys the registry's verifier trusts.
    pub trusted_attestors: Vec<String>,
    pub attestor_quorum: usize,
    pub registry: RegistryConfig,
    pub assets: Vec<AssetGenesis>,
    pub vaults: Vec<VaultGenesis>,
}

impl Genesis {
    /// A fresh devnet: new admin and attestor keys, a test stablecoin and
    /// the two staked-ETH tokens, each with its own vault over the one
    /// registry.
    pub fn generate(chain_id: u64, created_at: u64) -> Self {
        let admin = Keypair::generate();
        let attestor = Keypair::generate();
        let deployments = [
            ("tusdc", "Test USD Coin", "tUSDC", 6, "avUSDC"),
            ("meth", "Mantle Staked Ether", "mETH", 18, "avmETH"),
            ("cmeth", "Restaked mETH", "cmETH", 18, "avcmETH"),
        ];
        let assets = deployments
            .iter()
            .map(|(id, name, symbol, decimals, _)| AssetGenesis {
                label: format!("asset/{}", id),
                name: (*name).into(),
                symbol: (*symbol).into(),
                decimals: *decimals,
            })
            .collect();
        let vaults = deployments
            .iter()
            .map(|(id, _, symbol, _, share_symbol)| VaultGenesis {
                label: format!("vault/accredited-{}", id),
                name: format!("Accredited {} Vault", symbol),
                symbol: (*share_symbol).into(),
                asset: format!("asset/{}", id),
            })
            .collect();

        Self {
            chain_id,
            created_at,
            admin_key: admin.to_hex(),
            attestor_key: attestor.to_hex(),
            attestor_url: DEFAULT_ATTESTOR_URL.to_string(),
            trusted_attestors: vec![attestor.public_key().to_hex()],
            attestor_quorum: DEFAULT_ATTESTOR_QUORUM,
            registry: RegistryConfig::default(),
            assets,
            vaults,
        }
    }

    pub fn admin_keypair(&self) -> Result<Keypair> {
        Keypair::from_hex(&self.admin_key).context("invalid admin_key in genesis")
    }

    pub fn attestor_keypair(&self) -> Result<Keypair> {
        Keypair::from_hex(&self.attestor_key).context("invalid attestor_key in genesis")
    }

    pub fn trusted_attestor_keys(&self) -> Result<Vec<PublicKey>> {
        self.trusted_attestors
            .iter()
            .map(|hex| {
                PublicKey::from_hex(hex)
                    .with_context(|| format!("invalid trusted attestor key: {}", hex))
            })
            .collect()
    }

    pub fn registry_address(&self) -> Address {
        Address::derive(REGISTRY_LABEL)
    }

    /// Checks the parts a node would otherwise trip over at deploy time.
    pub fn validate(&self) -> Result<()> {
        self.admin_keypair()?;
        self.attestor_keypair()?;
        if self.trusted_attestor_keys()?.is_empty() {
            bail!("genesis trusts no attestors");
        }
        if self.attestor_quorum == 0 || self.attestor_quorum > self.trusted_attestors.len() {
            bail!(
                "attestor quorum {} is unreachable with {} trusted attestors",
                self.attestor_quorum,
                self.trusted_attestors.len()
            );
        }
        if self.registry.validity_period_secs == 0 {
            bail!("registry validity period must be non-zero");
        }
        for vault in &self.vaults {
            if !self.assets.iter().any(|a| a.label == vault.asset) {
                bail!("vault {} references unknown asset {}", vault.label, vault.asset);
            }
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read genesis at {}", path.display()))?;
        let genesis: Genesis = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse genesis at {}", path.display()))?;
        genesis.validate()?;
        Ok(genesis)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to encode genesis")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write genesis to {}", path.display()))?;

        // It holds secret keys.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("failed to restrict permissions on {}", path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_genesis_is_valid() {
        let genesis = Genesis::generate(31337, 1_700_000_000);
        genesis.validate().unwrap();
        assert_eq!(genesis.trusted_attestor_keys().unwrap().len(), 1);
    }

    #[test]
    fn one_vault_per_asset() {
        let genesis = Genesis::generate(31337, 0);
        let symbols: Vec<&str> = genesis.assets.iter().map(|a| a.symbol.as_str()).collect();
        assert_eq!(symbols, ["tUSDC", "mETH", "cmETH"]);
        assert_eq!(genesis.vaults.len(), genesis.assets.len());
        for (vault, asset) in genesis.vaults.iter().zip(&genesis.assets) {
            assert_eq!(vault.asset, asset.label);
        }
        assert_eq!(genesis.vaults[1].name, "Accredited mETH Vault");
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(GENESIS_FILE);
        let genesis = Genesis::generate(31337, 1_700_000_000);
        genesis.save(&path).unwrap();

        let loaded = Genesis::load(&path).unwrap();
        assert_eq!(loaded.admin_key, genesis.admin_key);
        assert_eq!(loaded.vaults, genesis.vaults);
    }

    #[test]
    fn dangling_vault_rejected() {
        let mut genesis = Genesis::generate(31337, 0);
        genesis.vaults[0].asset = "asset/missing".into();
        assert!(genesis.validate().is_err());
    }

    #[test]
    fn unreachable_quorum_rejected() {
        let mut genesis = Genesis::generate(31337, 0);
        genesis.attestor_quorum = 2;
        assert!(genesis.validate().is_err());
    }
}
