//! # Resolved Documents
//!
//! The output of replaying a DID's history. Never stored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entities::{MdipMetadata, PublicJwk};

pub const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";
pub const KEY_TYPE_SECP256K1: &str = "EcdsaSecp256k1VerificationKey2019";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    pub id: String,
    pub controller: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub public_key_jwk: PublicJwk,
}

/// The W3C-facing part of a resolved document.
///
/// A deactivated DID resolves to an empty `DidDocument`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<Vec<VerificationMethod>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DidDocument {
    pub fn is_empty(&self) -> bool {
        self == &DidDocument::default()
    }

    /// The key that signs for this DID: the first verification method.
    pub fn signing_key(&self) -> Option<&PublicJwk> {
        self.verification_method
            .as_ref()
            .and_then(|methods| methods.first())
            .map(|method| &method.public_key_jwk)
    }
}

/// A block bound on when an operation happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimestampBound {
    pub time: i64,
    #[serde(rename = "timeISO")]
    pub time_iso: String,
    pub blockid: String,
    pub height: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txidx: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batchid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opidx: Option<u64>,
}

/// Proof-of-time for the latest folded operation on a block-anchored registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTimestamp {
    pub chain: String,
    pub opid: String,
    /// Block referenced by the operation's `blockid` (it was signed after this).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<TimestampBound>,
    /// Block that anchored the operation (it was signed before this).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<TimestampBound>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub created: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_id: Option<String>,
    /// CID of the latest folded operation; the next operation's `previd`.
    pub version_id: String,
    pub version: u64,
    pub confirmed: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deactivated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DocumentTimestamp>,
}

/// Resolved state of a DID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MdipDocument {
    pub did_document: DidDocument,
    pub did_document_metadata: DocumentMetadata,
    pub did_document_data: Value,
    pub mdip: MdipMetadata,
}

impl MdipDocument {
    pub fn is_deactivated(&self) -> bool {
        self.did_document_metadata.deactivated
    }

    pub fn registry(&self) -> &str {
        &self.mdip.registry
    }

    pub fn controller(&self) -> Option<&str> {
        self.did_document.controller.as_deref()
    }
}
