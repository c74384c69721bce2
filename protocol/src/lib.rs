// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Nullifier Protocol Core Library
//!
//! Nullifier answers one question for tokenized securities: *is this wallet
//! an accredited investor?* It answers it without the wallet ever handing a
//! bank statement to anyone on-chain. An attestor looks at the data
//! off-chain, signs a claim, and the holder redeems that claim once for a
//! non-transferable credential. Vaults then ask the credential registry
//! before they take anyone's money.
//!
//! This crate holds the shared primitives. The contracts live in
//! `nullifier-contracts`; the node that hosts them lives in `nullifier-node`.
//!
//! ## Architecture
//!
//! - **crypto**: Ed25519 keys, SHA-256/BLAKE3 helpers. Don't roll your own.
//! - **identity**: 20-byte account addresses.
//! - **attestation**: Claims, the proof wire format, attestors and verifiers.
//! - **context**: Caller identity and ledger time for contract calls.
//! - **config**: Protocol constants. Every magic number lives there.
//!
//! ## Design Philosophy
//!
//! 1. A credential proves a fact, not an identity. Nothing here stores PII.
//! 2. Contracts never read the clock. Time is an argument.
//! 3. Every proof is single-use. Replays are someone else's fantasy.
//! 4. If it touches money, it has tests. Plural.

pub mod attestation;
pub mod config;
pub mod context;
pub mod crypto;
pub mod identity;

pub use attestation::{AccreditationType, Claim, Nullifier, ProofVerifier};
pub use context::{CallContext, Timestamp};
pub use identity::Address;
