//! # Shared Crypto - MDIP Cryptographic Collaborator
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `canonical` | JSON canonicalization | Stable bytes for hashing and signing |
//! | `hashing` | SHA-256 | `hash_json` message digests |
//! | `ecdsa` | secp256k1 | Operation signatures against JWK keys |
//! | `cid` | CIDv1 / base58btc | Content ids for operations and DIDs |
//!
//! ## Security Properties
//!
//! - **secp256k1**: RFC 6979 deterministic nonces, low-S signatures only
//! - **Canonical form**: object keys sorted, no whitespace, so every party
//!   hashes the same bytes for the same operation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod canonical;
pub mod cid;
pub mod ecdsa;
pub mod errors;
pub mod hashing;

// Re-exports
pub use canonical::{canonicalize, canonical_json};
pub use cid::{generate_cid, generate_raw_cid, is_valid_cid};
pub use ecdsa::{verify_signature, Secp256k1KeyPair};
pub use errors::CryptoError;
pub use hashing::{hash_json, sha256, sha256_hex};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
