//! # Hashing Utilities
//!
//! Two hash functions, two jobs:
//!
//! - **SHA-256** for anything an external party must recompute (the claim
//!   digest an attestor signs).
//! - **BLAKE3** for identifiers we derive ourselves: addresses and claim
//!   nullifiers.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash and return a fixed-size array.
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// SHA-256 over a domain tag followed by zero-separated parts.
///
/// Layout: `tag || 0x00 || part_0 || 0x00 || part_1 || ...`. The separator
/// keeps `("ab", "c")` and `("a", "bc")` from hashing to the same value.
pub fn tagged_sha256(tag: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(tag);
    for part in parts {
        hasher.update([0u8]);
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute the BLAKE3 hash of the input data.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256("abc") from FIPS 180-2.
        let digest = sha256_array(b"abc");
        assert_eq!(
            hex::encode(digest),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_tagged_sha256_separates_parts() {
        let a = tagged_sha256(b"t", &[b"ab", b"c"]);
        let b = tagged_sha256(b"t", &[b"a", b"bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_tagged_sha256_depends_on_tag() {
        let a = tagged_sha256(b"one", &[b"payload"]);
        let b = tagged_sha256(b"two", &[b"payload"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_blake3_deterministic() {
        assert_eq!(blake3_hash(b"nullifier"), blake3_hash(b"nullifier"));
        assert_ne!(blake3_hash(b"nullifier"), blake3_hash(b"nullifieR"));
    }
}
