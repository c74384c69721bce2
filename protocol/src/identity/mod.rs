//! # Identity Module
//!
//! Accounts on the chain are 20-byte addresses, the same width as the EVM
//! addresses the registry and vault contracts were originally deployed
//! against. An address is either derived from an Ed25519 public key (devnet
//! accounts, attestors, the registry admin) or parsed from its `0x` hex form
//! (contract handles, holders named by the UI).

pub mod address;

pub use address::{Address, AddressError};
