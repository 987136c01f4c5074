//! Document building blocks for the replay fold.
//!
//! Update patches are section aware:
//!
//! ```text
//! doc = {
//!   "didDocument":     { ...shallow merged into the DID document... },
//!   "didDocumentData": { ...shallow merged into the data section... },
//! }
//! ```
//!
//! A `null` value deletes the key. `didDocument.id` and the `mdip` block are
//! fixed at creation; other top-level keys of the patch are ignored.

use serde_json::{Map, Value};
use shared_types::time::normalize_time;
use shared_types::{
    CreateOperation, DidDocument, DidKind, DocumentMetadata, MdipDocument, VerificationMethod,
    DID_CONTEXT, KEY_TYPE_SECP256K1,
};

use crate::error::{GatekeeperError, GatekeeperResult};

const KEY_ID: &str = "#key-1";

/// Initial document for a create operation.
pub fn seed_document(did: &str, create: &CreateOperation, opid: &str) -> MdipDocument {
    let mut did_document = DidDocument {
        context: Some(vec![DID_CONTEXT.to_string()]),
        id: Some(did.to_string()),
        ..Default::default()
    };

    let data = match create.mdip.kind {
        DidKind::Agent => {
            if let Some(jwk) = &create.public_jwk {
                did_document.verification_method = Some(vec![VerificationMethod {
                    id: KEY_ID.to_string(),
                    controller: did.to_string(),
                    kind: KEY_TYPE_SECP256K1.to_string(),
                    public_key_jwk: jwk.clone(),
                }]);
                did_document.authentication = Some(vec![KEY_ID.to_string()]);
            }
            Value::Object(Map::new())
        }
        DidKind::Asset => {
            did_document.controller = create.controller.clone();
            create.data.clone().unwrap_or_else(|| Value::Object(Map::new()))
        }
    };

    MdipDocument {
        did_document,
        did_document_metadata: DocumentMetadata {
            created: normalize_time(&create.created),
            canonical_id: create.mdip.prefix.as_ref().map(|_| did.to_string()),
            version_id: opid.to_string(),
            version: 1,
            confirmed: true,
            ..Default::default()
        },
        did_document_data: data,
        mdip: create.mdip.clone(),
    }
}

fn merge_shallow(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        if value.is_null() {
            target.remove(key);
        } else {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Apply an update patch in place.
///
/// Fails without modifying `doc` if the patch is not an object or would
/// leave the DID document unparseable.
pub fn apply_update(doc: &mut MdipDocument, patch: &Value) -> GatekeeperResult<()> {
    let patch = patch
        .as_object()
        .ok_or_else(|| GatekeeperError::InvalidOperation("update doc must be an object".into()))?;

    let did_document = match patch.get("didDocument") {
        Some(Value::Object(section)) => {
            let mut current = match serde_json::to_value(&doc.did_document) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            };
            merge_shallow(&mut current, section);
            let mut next: DidDocument = serde_json::from_value(Value::Object(current))
                .map_err(|e| GatekeeperError::InvalidOperation(format!("didDocument: {e}")))?;
            next.id = doc.did_document.id.clone();
            Some(next)
        }
        Some(Value::Null) | None => None,
        Some(_) => {
            return Err(GatekeeperError::InvalidOperation(
                "didDocument must be an object".into(),
            ))
        }
    };

    let data = match (patch.get("didDocumentData"), &doc.did_document_data) {
        (Some(Value::Object(section)), Value::Object(current)) => {
            let mut merged = current.clone();
            merge_shallow(&mut merged, section);
            Some(Value::Object(merged))
        }
        (Some(Value::Null) | None, _) => None,
        (Some(other), _) => Some(other.clone()),
    };

    if let Some(did_document) = did_document {
        doc.did_document = did_document;
    }
    if let Some(data) = data {
        doc.did_document_data = data;
    }
    Ok(())
}

/// Clear content and mark the document deactivated.
pub fn apply_delete(doc: &mut MdipDocument) {
    doc.did_document = DidDocument::default();
    doc.did_document_data = Value::Object(Map::new());
    doc.did_document_metadata.deactivated = true;
}

/// Carry creation facts forward into the metadata of a later version.
pub fn next_metadata(previous: &DocumentMetadata, version_id: &str, confirmed: bool) -> DocumentMetadata {
    DocumentMetadata {
        created: previous.created.clone(),
        canonical_id: previous.canonical_id.clone(),
        version_id: version_id.to_string(),
        version: previous.version + 1,
        confirmed,
        ..Default::default()
    }
}
