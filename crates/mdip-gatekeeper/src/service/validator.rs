//! Operation Validator.
//!
//! Checks run in three tiers:
//!
//! 1. shape: size, required fields, timestamps, registry names
//! 2. state: target exists, not deactivated, `previd` names the head
//! 3. signature: hash over the unsigned operation, verified with the key of
//!    the agent itself or of the asset's controller

use shared_crypto::{hash_json, is_valid_cid, verify_signature};
use shared_types::time::parse_time;
use shared_types::{
    CreateOperation, DidKind, MdipDocument, Operation, PublicJwk, Signature, MDIP_VERSION,
};

use super::{opid_of, Gatekeeper};
use crate::domain::registry::{is_known_registry, LOCAL};
use crate::domain::replay::apply_update;
use crate::domain::ResolveOptions;
use crate::error::{GatekeeperError, GatekeeperResult};
use crate::ports::inbound::ValidatedOperation;

fn invalid(reason: impl Into<String>) -> GatekeeperError {
    GatekeeperError::InvalidOperation(reason.into())
}

/// `did:<method>[:<segment>...]:<cid>`
pub fn is_valid_did(did: &str) -> bool {
    let parts: Vec<&str> = did.split(':').collect();
    parts.len() >= 3
        && parts[0] == "did"
        && parts.iter().all(|p| !p.is_empty())
        && parts.last().map_or(false, |suffix| is_valid_cid(suffix))
}

fn is_hex_digest(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit())
}

fn check_signature_shape(signature: Option<&Signature>) -> GatekeeperResult<&Signature> {
    let signature = signature.ok_or_else(|| invalid("signature missing"))?;
    if parse_time(&signature.signed).is_err() {
        return Err(invalid(format!("signature.signed={}", signature.signed)));
    }
    if signature.value.is_empty() {
        return Err(invalid("signature.value empty"));
    }
    if let Some(hash) = &signature.hash {
        if !is_hex_digest(hash) {
            return Err(invalid(format!("signature.hash={hash}")));
        }
    }
    if let Some(signer) = &signature.signer {
        if !signer.starts_with("did:") {
            return Err(invalid(format!("signature.signer={signer}")));
        }
    }
    Ok(signature)
}

/// Verify `operation`'s signature with `key`.
fn check_signature(operation: &Operation, key: &PublicJwk) -> GatekeeperResult<()> {
    let signature = operation
        .signature()
        .ok_or_else(|| invalid("signature missing"))?;
    let digest = hash_json(&operation.unsigned())?;
    if let Some(hash) = &signature.hash {
        if !hash.eq_ignore_ascii_case(&digest) {
            return Err(GatekeeperError::SignatureInvalid);
        }
    }
    verify_signature(&digest, &signature.value, key)?;
    Ok(())
}

impl Gatekeeper {
    /// Shape checks that need no storage.
    pub(crate) fn check_shape(&self, operation: &Operation) -> GatekeeperResult<()> {
        let size = serde_json::to_vec(operation)
            .map_err(|e| invalid(e.to_string()))?
            .len();
        if size > self.config.max_op_bytes {
            return Err(GatekeeperError::SizeExceeded {
                size,
                max: self.config.max_op_bytes,
            });
        }

        let signature = check_signature_shape(operation.signature())?;

        match operation {
            Operation::Create(create) => {
                if parse_time(&create.created).is_err() {
                    return Err(invalid(format!("created={}", create.created)));
                }
                if create.mdip.version != MDIP_VERSION {
                    return Err(invalid(format!("mdip.version={}", create.mdip.version)));
                }
                if !is_known_registry(&create.mdip.registry) {
                    return Err(GatekeeperError::UnsupportedRegistry(
                        create.mdip.registry.clone(),
                    ));
                }
                if let Some(valid_until) = &create.mdip.valid_until {
                    if parse_time(valid_until).is_err() {
                        return Err(invalid(format!("mdip.validUntil={valid_until}")));
                    }
                }
                match create.mdip.kind {
                    DidKind::Agent if create.public_jwk.is_none() => Err(invalid("publicJwk")),
                    DidKind::Asset => match &create.controller {
                        None => Err(invalid("controller")),
                        Some(controller) if signature.signer.as_ref() != Some(controller) => {
                            Err(invalid("signer is not controller"))
                        }
                        Some(_) => Ok(()),
                    },
                    DidKind::Agent => Ok(()),
                }
            }
            Operation::Update(_) | Operation::Delete(_) => {
                let did = operation.did().unwrap_or_default();
                if !is_valid_did(did) {
                    return Err(invalid(format!("did={did}")));
                }
                if operation.previd().map_or(true, str::is_empty) {
                    return Err(invalid("previd missing"));
                }
                Ok(())
            }
        }
    }

    /// `<prefix>:<cid>` for a create, prefix from `mdip.prefix` or config.
    pub(crate) fn generate_did(&self, operation: &Operation) -> GatekeeperResult<String> {
        let mdip = operation
            .mdip()
            .ok_or_else(|| invalid("not a create operation"))?;
        let prefix = mdip
            .prefix
            .as_deref()
            .unwrap_or(self.config.did_prefix.as_str());
        Ok(format!("{}:{}", prefix, opid_of(operation)?))
    }

    /// Current signing key of a controller, as confirmed at `at`.
    async fn controller_key(&self, controller: &str, at: &str) -> GatekeeperResult<(PublicJwk, String)> {
        let doc = self
            .resolve_boxed(controller, ResolveOptions::confirmed().at_time(at))
            .await?;
        let key = doc
            .did_document
            .signing_key()
            .cloned()
            .ok_or_else(|| invalid("controller has no verification method"))?;
        Ok((key, doc.mdip.registry))
    }

    /// Signature check for a create.
    pub(crate) async fn verify_create(&self, operation: &Operation) -> GatekeeperResult<()> {
        let Operation::Create(create) = operation else {
            return Err(invalid(format!("type={}", operation.type_name())));
        };
        match create.mdip.kind {
            DidKind::Agent => {
                let key = create
                    .public_jwk
                    .as_ref()
                    .ok_or_else(|| invalid("publicJwk"))?;
                check_signature(operation, key)
            }
            DidKind::Asset => self.verify_asset_create(operation, create).await,
        }
    }

    async fn verify_asset_create(&self, operation: &Operation, create: &CreateOperation) -> GatekeeperResult<()> {
        let controller = create
            .controller
            .as_deref()
            .ok_or_else(|| invalid("controller"))?;
        let signed = create
            .signature
            .as_ref()
            .map(|s| s.signed.as_str())
            .ok_or_else(|| invalid("signature missing"))?;

        let (key, controller_registry) = self.controller_key(controller, signed).await?;
        if controller_registry == LOCAL && create.mdip.registry != LOCAL {
            return Err(invalid(format!(
                "local controller cannot create on {}",
                create.mdip.registry
            )));
        }
        check_signature(operation, &key)
    }

    /// Signature and liveness check of an update/delete against `doc`, the
    /// state it builds on.
    pub(crate) async fn verify_update(&self, operation: &Operation, doc: &MdipDocument) -> GatekeeperResult<()> {
        if doc.is_deactivated() {
            return Err(GatekeeperError::AlreadyDeactivated(
                operation.did().unwrap_or_default().to_string(),
            ));
        }

        let key = match doc.controller() {
            Some(controller) => {
                let signed = operation
                    .signature()
                    .map(|s| s.signed.as_str())
                    .ok_or_else(|| invalid("signature missing"))?;
                self.controller_key(controller, signed).await?.0
            }
            None => doc
                .did_document
                .signing_key()
                .cloned()
                .ok_or_else(|| invalid("didDocument missing verificationMethod"))?,
        };
        check_signature(operation, &key)?;

        if let Operation::Update(update) = operation {
            // the patch must apply cleanly
            let mut scratch = doc.clone();
            apply_update(&mut scratch, &update.doc)?;
        }
        Ok(())
    }

    /// Everything an update/delete must satisfy to extend `doc`'s history.
    pub(crate) async fn check_append(&self, operation: &Operation, doc: &MdipDocument) -> GatekeeperResult<()> {
        if doc.is_deactivated() {
            return Err(GatekeeperError::AlreadyDeactivated(
                operation.did().unwrap_or_default().to_string(),
            ));
        }
        let head = &doc.did_document_metadata.version_id;
        if operation.previd() != Some(head.as_str()) {
            return Err(GatekeeperError::ConflictingHistory {
                expected: head.clone(),
                actual: operation.previd().map(str::to_string),
            });
        }
        self.verify_update(operation, doc).await
    }

    /// Check an operation without admitting it.
    pub async fn validate(&self, operation: &Operation) -> GatekeeperResult<ValidatedOperation> {
        self.check_shape(operation)?;
        match operation {
            Operation::Create(create) => {
                if !self.registries.is_supported(&create.mdip.registry) {
                    return Err(GatekeeperError::UnsupportedRegistry(
                        create.mdip.registry.clone(),
                    ));
                }
                self.verify_create(operation).await?;
                let did = self.generate_did(operation)?;
                self.check_existing_registry(&did, &create.mdip.registry).await?;
                Ok(ValidatedOperation {
                    did,
                    registry: create.mdip.registry.clone(),
                    opid: opid_of(operation)?,
                })
            }
            Operation::Update(_) | Operation::Delete(_) => {
                let did = operation.did().unwrap_or_default();
                let doc = self.resolve_did(did, ResolveOptions::default()).await?;
                self.check_append(operation, &doc).await?;
                Ok(ValidatedOperation {
                    did: did.to_string(),
                    registry: doc.mdip.registry,
                    opid: opid_of(operation)?,
                })
            }
        }
    }

    /// A stored DID with the same id must have the same native registry.
    pub(crate) async fn check_existing_registry(&self, did: &str, registry: &str) -> GatekeeperResult<bool> {
        let Some(history) = self.load_history(did).await? else {
            return Ok(false);
        };
        if history.native != registry {
            return Err(invalid(format!(
                "{did} already exists on registry {}",
                history.native
            )));
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{gatekeeper, TestAgent};
    use serde_json::json;

    #[test]
    fn test_did_syntax() {
        let agent = TestAgent::new();
        let op = agent.create_agent("local");
        let cid = opid_of(&op).unwrap();
        assert!(is_valid_did(&format!("did:test:{cid}")));
        assert!(is_valid_did(&format!("did:mdip:sub:{cid}")));
        assert!(!is_valid_did(&format!("test:{cid}")));
        assert!(!is_valid_did("did:test:not-a-cid"));
        assert!(!is_valid_did(&format!("did::{cid}")));
    }

    #[tokio::test]
    async fn test_valid_create_passes() {
        let gk = gatekeeper();
        let agent = TestAgent::new();
        let op = agent.create_agent("local");
        let validated = gk.validate(&op).await.unwrap();
        assert!(validated.did.starts_with("did:test:z"));
        assert_eq!(validated.registry, "local");
        assert_eq!(validated.did, format!("did:test:{}", validated.opid));
    }

    #[tokio::test]
    async fn test_prefix_from_operation() {
        let gk = gatekeeper();
        let agent = TestAgent::new();
        let mut op = agent.create_agent("local");
        if let Operation::Create(create) = &mut op {
            create.mdip.prefix = Some("did:mdip".into());
        }
        let op = agent.resign(op);
        assert!(gk.validate(&op).await.unwrap().did.starts_with("did:mdip:z"));
    }

    #[tokio::test]
    async fn test_tampered_create_fails_signature() {
        let gk = gatekeeper();
        let agent = TestAgent::new();
        let mut op = agent.create_agent("local");
        if let Operation::Create(create) = &mut op {
            create.created = "2020-01-01T00:00:00Z".into();
        }
        assert_eq!(gk.validate(&op).await, Err(GatekeeperError::SignatureInvalid));
    }

    #[tokio::test]
    async fn test_shape_errors() {
        let gk = gatekeeper();
        let agent = TestAgent::new();

        let mut op = agent.create_agent("local");
        *op.signature_mut() = None;
        assert!(gk.validate(&op).await.unwrap_err().is_invalid_operation());

        let op = agent.create_agent("ethereum");
        assert_eq!(
            gk.validate(&op).await,
            Err(GatekeeperError::UnsupportedRegistry("ethereum".into()))
        );

        let op = agent.create_agent("TBTC");
        assert_eq!(
            gk.validate(&op).await,
            Err(GatekeeperError::UnsupportedRegistry("TBTC".into()))
        );

        let mut op = agent.create_agent("local");
        if let Operation::Create(create) = &mut op {
            create.mdip.version = 2;
        }
        let op = agent.resign(op);
        assert!(matches!(gk.validate(&op).await, Err(GatekeeperError::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn test_size_limit() {
        let gk = gatekeeper();
        let agent = TestAgent::new();
        let mut op = agent.create_agent("local");
        if let Operation::Create(create) = &mut op {
            create.extra.insert("padding".into(), json!("x".repeat(70_000)));
        }
        let op = agent.resign(op);
        assert!(matches!(
            gk.validate(&op).await,
            Err(GatekeeperError::SizeExceeded { max: 65536, .. })
        ));
    }

    #[tokio::test]
    async fn test_signature_hash_must_match() {
        let gk = gatekeeper();
        let agent = TestAgent::new();
        let mut op = agent.create_agent("local");
        if let Some(signature) = op.signature_mut() {
            signature.hash = Some("0".repeat(64));
        }
        assert_eq!(gk.validate(&op).await, Err(GatekeeperError::SignatureInvalid));
    }

    #[tokio::test]
    async fn test_update_checks_previd_and_signer() {
        let gk = gatekeeper();
        let agent = TestAgent::new();
        let did = gk.create_did(agent.create_agent("local")).await.unwrap();
        let doc = gk.resolve_did(&did, ResolveOptions::default()).await.unwrap();
        let head = doc.did_document_metadata.version_id.clone();

        let good = agent.update(&did, &head, json!({ "didDocumentData": { "a": 1 } }));
        assert!(gk.validate(&good).await.is_ok());

        let stale = agent.update(&did, "zStale", json!({}));
        assert!(matches!(
            gk.validate(&stale).await,
            Err(GatekeeperError::ConflictingHistory { .. })
        ));

        let stranger = TestAgent::new();
        let forged = stranger.update(&did, &head, json!({}));
        assert_eq!(gk.validate(&forged).await, Err(GatekeeperError::SignatureInvalid));

        let mut missing = agent.update(&did, &head, json!({}));
        if let Operation::Update(update) = &mut missing {
            update.previd = None;
        }
        let missing = agent.resign(missing);
        assert!(gk.validate(&missing).await.unwrap_err().is_invalid_operation());
    }

    #[tokio::test]
    async fn test_asset_signed_by_controller() {
        let gk = gatekeeper();
        let agent = TestAgent::new();
        let agent_did = gk.create_did(agent.create_agent("hyperswarm")).await.unwrap();

        let asset = agent.create_asset(&agent_did, "hyperswarm", json!({ "name": "box" }));
        assert!(gk.validate(&asset).await.is_ok());

        let mut wrong_signer = agent.create_asset(&agent_did, "hyperswarm", json!({}));
        if let Some(signature) = wrong_signer.signature_mut() {
            signature.signer = Some("did:test:someoneElse".into());
        }
        assert!(gk.validate(&wrong_signer).await.unwrap_err().is_invalid_operation());

        let stranger = TestAgent::new();
        let forged = stranger.create_asset(&agent_did, "hyperswarm", json!({}));
        assert_eq!(gk.validate(&forged).await, Err(GatekeeperError::SignatureInvalid));
    }

    #[tokio::test]
    async fn test_local_controller_cannot_anchor_assets() {
        let gk = gatekeeper();
        let agent = TestAgent::new();
        let agent_did = gk.create_did(agent.create_agent("local")).await.unwrap();
        let asset = agent.create_asset(&agent_did, "hyperswarm", json!({}));
        assert!(matches!(
            gk.validate(&asset).await,
            Err(GatekeeperError::InvalidOperation(_))
        ));
        let local_asset = agent.create_asset(&agent_did, "local", json!({}));
        assert!(gk.validate(&local_asset).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_controller() {
        let gk = gatekeeper();
        let agent = TestAgent::new();
        let ghost = format!("did:test:{}", opid_of(&agent.create_agent("local")).unwrap());
        let asset = agent.create_asset(&ghost, "local", json!({}));
        assert!(matches!(gk.validate(&asset).await, Err(GatekeeperError::UnknownDid(_))));
    }
}
