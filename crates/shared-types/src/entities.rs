//! # Operations
//!
//! The signed instructions that grow a DID's history.
//!
//! ```text
//! create  { created, mdip, publicJwk | controller, data?, signature }
//! update  { did, doc, previd, blockid?, signature }
//! delete  { did, previd, blockid?, signature }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The only operation format version currently defined.
pub const MDIP_VERSION: u32 = 1;

/// What a DID represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DidKind {
    /// Self-controlled identity with its own key.
    Agent,
    /// Data object controlled by an agent.
    Asset,
}

impl DidKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DidKind::Agent => "agent",
            DidKind::Asset => "asset",
        }
    }
}

/// The `mdip` block of a create operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MdipMetadata {
    pub version: u32,
    #[serde(rename = "type")]
    pub kind: DidKind,
    /// Native registry. Fixed for the life of the DID.
    pub registry: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<String>,
    /// Overrides the ledger's DID prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A secp256k1 public key in JWK form. `x` and `y` are base64url.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicJwk {
    pub kty: String,
    pub crv: String,
    pub x: String,
    pub y: String,
}

/// Signature block attached to every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Signing DID. Required for asset operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer: Option<String>,
    pub signed: String,
    /// Hex SHA-256 of the canonical unsigned operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Hex compact (r || s) secp256k1 signature.
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOperation {
    pub created: String,
    pub mdip: MdipMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_jwk: Option<PublicJwk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOperation {
    pub did: String,
    /// Patch applied over the current document, see the resolver.
    #[serde(default)]
    pub doc: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOperation {
    pub did: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A signed create/update/delete instruction targeting a DID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operation {
    Create(CreateOperation),
    Update(UpdateOperation),
    Delete(DeleteOperation),
}

impl Operation {
    pub fn type_name(&self) -> &'static str {
        match self {
            Operation::Create(_) => "create",
            Operation::Update(_) => "update",
            Operation::Delete(_) => "delete",
        }
    }

    pub fn is_create(&self) -> bool {
        matches!(self, Operation::Create(_))
    }

    pub fn signature(&self) -> Option<&Signature> {
        match self {
            Operation::Create(op) => op.signature.as_ref(),
            Operation::Update(op) => op.signature.as_ref(),
            Operation::Delete(op) => op.signature.as_ref(),
        }
    }

    pub fn signature_mut(&mut self) -> &mut Option<Signature> {
        match self {
            Operation::Create(op) => &mut op.signature,
            Operation::Update(op) => &mut op.signature,
            Operation::Delete(op) => &mut op.signature,
        }
    }

    /// Signature value, the identity of the logical operation across registries.
    pub fn signature_value(&self) -> Option<&str> {
        self.signature().map(|s| s.value.as_str())
    }

    /// Target DID. `None` for creates, whose DID is derived from content.
    pub fn did(&self) -> Option<&str> {
        match self {
            Operation::Create(_) => None,
            Operation::Update(op) => Some(&op.did),
            Operation::Delete(op) => Some(&op.did),
        }
    }

    pub fn previd(&self) -> Option<&str> {
        match self {
            Operation::Create(_) => None,
            Operation::Update(op) => op.previd.as_deref(),
            Operation::Delete(op) => op.previd.as_deref(),
        }
    }

    pub fn blockid(&self) -> Option<&str> {
        match self {
            Operation::Create(_) => None,
            Operation::Update(op) => op.blockid.as_deref(),
            Operation::Delete(op) => op.blockid.as_deref(),
        }
    }

    /// The create payload's `mdip` block, if this is a create.
    pub fn mdip(&self) -> Option<&MdipMetadata> {
        match self {
            Operation::Create(op) => Some(&op.mdip),
            _ => None,
        }
    }

    /// Copy of this operation with the signature removed, the form that is signed.
    pub fn unsigned(&self) -> Operation {
        let mut copy = self.clone();
        *copy.signature_mut() = None;
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_round_trip_keeps_unknown_fields() {
        let raw = json!({
            "type": "create",
            "created": "2024-01-01T00:00:00.000Z",
            "mdip": { "version": 1, "type": "agent", "registry": "hyperswarm", "custom": true },
            "publicJwk": { "kty": "EC", "crv": "secp256k1", "x": "AA", "y": "BB" },
            "registration": { "note": "kept" },
            "signature": { "signed": "2024-01-01T00:00:00.000Z", "value": "00" }
        });
        let op: Operation = serde_json::from_value(raw.clone()).unwrap();
        assert!(op.is_create());
        assert_eq!(op.mdip().unwrap().registry, "hyperswarm");
        assert_eq!(serde_json::to_value(&op).unwrap(), raw);
    }

    #[test]
    fn test_update_accessors() {
        let op: Operation = serde_json::from_value(json!({
            "type": "update",
            "did": "did:test:z1",
            "doc": { "didDocumentData": { "k": "v" } },
            "previd": "z0",
            "signature": { "signer": "did:test:z1", "signed": "2024-01-01T00:00:00Z", "value": "ab" }
        }))
        .unwrap();
        assert_eq!(op.type_name(), "update");
        assert_eq!(op.did(), Some("did:test:z1"));
        assert_eq!(op.previd(), Some("z0"));
        assert_eq!(op.signature_value(), Some("ab"));
        assert!(op.unsigned().signature().is_none());
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let res: Result<Operation, _> =
            serde_json::from_value(json!({ "type": "rename", "did": "did:test:z1" }));
        assert!(res.is_err());
    }
}
