//! # Nullifier Contracts
//!
//! The on-chain half of Nullifier. Three contracts, one question:
//!
//! - **Credential Registry**: mints soulbound accreditation credentials
//!   from attestation proofs, expires them, lets the admin revoke them.
//! - **Compliant Vault**: an ERC-4626-style vault that checks the registry
//!   before every deposit and never before a withdrawal.
//! - **Asset Token**: the fungible token vaults hold.
//!
//! The vault reaches the registry through [`oracle::AccreditationOracle`],
//! a read-only handle. Nothing but the registry ever writes credential state.
//!
//! ## Design Principles
//!
//! 1. All monetary operations check for overflow. Wrapping arithmetic and
//!    money do not mix.
//! 2. Validate everything, then write everything. A failed call leaves no
//!    partial state behind.
//! 3. Time is an argument (`CallContext`), never a syscall.
//! 4. Every state type is serializable (serde) so the node can snapshot it.

pub mod amount;
pub mod asset_token;
pub mod compliant_vault;
pub mod credential_registry;
pub mod oracle;
pub mod share_math;

pub use asset_token::{AssetError, AssetLedger, AssetToken};
pub use compliant_vault::{CompliantVault, VaultError, VaultEvent, VaultState};
pub use credential_registry::{
    Credential, CredentialRegistry, CredentialStatus, ProofRejection, RegistryConfig,
    RegistryError, RegistryEvent, RegistryState, TokenId,
};
pub use oracle::{AccreditationOracle, OracleError, RegistryReader, SharedRegistry};
