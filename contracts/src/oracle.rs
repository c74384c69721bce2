//! # Accreditation Oracle
//!
//! The vault's window onto the registry. It can ask exactly one question,
//! "is this address accredited right now?", and it cannot change the answer.
//!
//! The registry is shared as [`SharedRegistry`]. Vaults hold a
//! [`RegistryReader`], which only ever takes read locks, and only with
//! `try_read`: a query that would have to wait on a registry mid-mutation
//! fails with [`OracleError::Unavailable`] rather than block or guess.

use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;

use nullifier_protocol::context::Timestamp;
use nullifier_protocol::identity::Address;

use crate::credential_registry::CredentialRegistry;

/// A registry shared between the node and its vaults.
pub type SharedRegistry = Arc<RwLock<CredentialRegistry>>;

/// Why the oracle could not answer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// The registry is being written to.
    #[error("accreditation registry unavailable")]
    Unavailable,
}

/// Read-only accreditation lookup.
pub trait AccreditationOracle: Send + Sync {
    /// Whether `holder` holds a live credential at `now`.
    fn is_accredited(&self, holder: &Address, now: Timestamp) -> Result<bool, OracleError>;

    /// Address of the registry behind this oracle.
    fn registry_address(&self) -> Address;
}

/// Read handle onto a [`SharedRegistry`].
#[derive(Debug, Clone)]
pub struct RegistryReader {
    registry: SharedRegistry,
    address: Address,
}

impl RegistryReader {
    pub fn new(registry: SharedRegistry) -> Self {
        let address = registry.read().address();
        Self { registry, address }
    }
}

impl AccreditationOracle for RegistryReader {
    fn is_accredited(&self, holder: &Address, now: Timestamp) -> Result<bool, OracleError> {
        let registry = self.registry.try_read().ok_or(OracleError::Unavailable)?;
        Ok(registry.is_accredited(holder, now))
    }

    fn registry_address(&self) -> Address {
        self.address
    }
}
