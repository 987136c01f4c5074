//! Error types for the gatekeeper.
//!
//! Validation failures are per-operation and never fatal; storage failures
//! are surfaced to the caller unchanged and are not retried here.

use shared_crypto::CryptoError;
use thiserror::Error;

/// Errors raised by an [`EventStore`](crate::ports::outbound::EventStore) or
/// [`ContentStore`](crate::ports::outbound::ContentStore) backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database already in use: {0}")]
    Locked(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Gatekeeper errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatekeeperError {
    /// Malformed operation or event.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Operation size {size} exceeds maximum {max}")]
    SizeExceeded { size: usize, max: usize },

    #[error("Unsupported registry: {0}")]
    UnsupportedRegistry(String),

    #[error("Invalid signature")]
    SignatureInvalid,

    /// `previd` does not name the current latest operation.
    #[error("Conflicting history: expected previd {expected}, got {actual:?}")]
    ConflictingHistory {
        expected: String,
        actual: Option<String>,
    },

    #[error("DID deactivated: {0}")]
    AlreadyDeactivated(String),

    #[error("Unknown DID: {0}")]
    UnknownDid(String),

    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    /// A sweep is already running.
    #[error("Busy")]
    Busy,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("No content store configured")]
    NoContentStore,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl GatekeeperError {
    /// Malformed, oversized or unsupported-registry operations.
    pub fn is_invalid_operation(&self) -> bool {
        matches!(
            self,
            GatekeeperError::InvalidOperation(_)
                | GatekeeperError::SizeExceeded { .. }
                | GatekeeperError::UnsupportedRegistry(_)
        )
    }

    /// Errors that condemn the operation itself rather than the call.
    pub fn is_rejection(&self) -> bool {
        self.is_invalid_operation()
            || matches!(
                self,
                GatekeeperError::SignatureInvalid
                    | GatekeeperError::ConflictingHistory { .. }
                    | GatekeeperError::AlreadyDeactivated(_)
                    | GatekeeperError::InvalidParameter(_)
            )
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, GatekeeperError::Storage(_))
    }
}

impl From<CryptoError> for GatekeeperError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::SignatureVerificationFailed
            | CryptoError::InvalidSignatureFormat
            | CryptoError::InvalidPublicKey(_)
            | CryptoError::InvalidHash(_) => GatekeeperError::SignatureInvalid,
            other => GatekeeperError::InvalidOperation(other.to_string()),
        }
    }
}

pub type GatekeeperResult<T> = Result<T, GatekeeperError>;
