//! # Cryptographic Primitives
//!
//! Everything in Nullifier that signs, verifies or hashes goes through here.
//! The list is short on purpose:
//!
//! - **Ed25519** for attestor signatures and signed node requests.
//! - **SHA-256** for claim digests, because attestors outside this codebase
//!   have to reproduce them and SHA-256 is what everyone already ships.
//! - **BLAKE3** for internal identifiers (addresses, nullifiers).
//!
//! Thin, typed wrappers around audited crates. No homemade curves.

pub mod hash;
pub mod keys;

pub use hash::{blake3_hash, sha256_array, tagged_sha256};
pub use keys::{KeyError, Keypair, PublicKey, Signature};
