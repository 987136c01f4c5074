//! # SHA-256 Hashing
//!
//! `hash_json` is the message digest every operation signature covers.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::canonical::canonical_json;
use crate::CryptoError;

/// SHA-256 output (256-bit).
pub type Hash = [u8; 32];

/// Hash data with SHA-256 (one-shot).
pub fn sha256(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// Hex-encoded SHA-256.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Hex SHA-256 of the canonical JSON form of `value`.
pub fn hash_json<T: Serialize + ?Sized>(value: &T) -> Result<String, CryptoError> {
    let canonical = canonical_json(value)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_json_ignores_key_order() {
        let a = hash_json(&json!({ "a": 1, "b": [1, 2] })).unwrap();
        let b = hash_json(&json!({ "b": [1, 2], "a": 1 })).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}
