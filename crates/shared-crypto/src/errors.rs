//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Signature verification failed
    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    /// Invalid signature format
    #[error("Invalid signature format")]
    InvalidSignatureFormat,

    /// Invalid public key
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Invalid private key
    #[error("Invalid private key")]
    InvalidPrivateKey,

    /// Invalid hash (not 32 bytes of hex)
    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    /// Value could not be serialized for hashing
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Invalid content identifier
    #[error("Invalid CID: {0}")]
    InvalidCid(String),
}
