//! Public create / update / delete.
//!
//! Each call validates under the target's per-DID lock, appends one `local`
//! event and hands it to the anchoring queues.

use shared_types::{Event, Operation};
use tracing::info;

use super::Gatekeeper;
use crate::domain::registry::LOCAL;
use crate::domain::ResolveOptions;
use crate::error::{GatekeeperError, GatekeeperResult};

impl Gatekeeper {
    /// Admit a create. Idempotent for a DID that already exists.
    pub async fn create_did(&self, operation: Operation) -> GatekeeperResult<String> {
        let Operation::Create(create) = &operation else {
            return Err(GatekeeperError::InvalidOperation(format!(
                "expected create, got {}",
                operation.type_name()
            )));
        };
        self.check_shape(&operation)?;

        let registry = create.mdip.registry.clone();
        if !self.registries.is_supported(&registry) {
            return Err(GatekeeperError::UnsupportedRegistry(registry));
        }
        self.verify_create(&operation).await?;

        let did = self.generate_did(&operation)?;
        let time = create.created.clone();

        let _guard = self.locks.lock(&did).await;
        if self.check_existing_registry(&did, &registry).await? {
            return Ok(did);
        }

        let event = Event::new(LOCAL, time, operation)
            .with_ordinal(vec![0])
            .with_did(&did);
        self.store.add_event(&did, event.clone()).await?;
        self.forget_verified(&did);
        self.enqueue_for_anchoring(&registry, event).await?;

        info!(did = %did, registry = %registry, "[gatekeeper] created");
        Ok(did)
    }

    pub async fn update_did(&self, operation: Operation) -> GatekeeperResult<()> {
        if !matches!(operation, Operation::Update(_)) {
            return Err(GatekeeperError::InvalidOperation(format!(
                "expected update, got {}",
                operation.type_name()
            )));
        }
        self.append_operation(operation).await
    }

    pub async fn delete_did(&self, operation: Operation) -> GatekeeperResult<()> {
        if !matches!(operation, Operation::Delete(_)) {
            return Err(GatekeeperError::InvalidOperation(format!(
                "expected delete, got {}",
                operation.type_name()
            )));
        }
        self.append_operation(operation).await
    }

    async fn append_operation(&self, operation: Operation) -> GatekeeperResult<()> {
        self.check_shape(&operation)?;
        let did = operation.did().unwrap_or_default().to_string();

        let _guard = self.locks.lock(&did).await;
        let doc = self.resolve_did(&did, ResolveOptions::default()).await?;
        self.check_append(&operation, &doc).await?;

        let time = operation
            .signature()
            .map(|s| s.signed.clone())
            .unwrap_or_default();
        let kind = operation.type_name();
        let event = Event::new(LOCAL, time, operation).with_did(&did);
        self.store.add_event(&did, event.clone()).await?;
        self.forget_verified(&did);
        self.enqueue_for_anchoring(doc.registry(), event).await?;

        info!(
            did = %did,
            version = doc.did_document_metadata.version + 1,
            "[gatekeeper] {}",
            kind
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{gatekeeper, TestAgent};
    use serde_json::json;

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let gk = gatekeeper();
        let agent = TestAgent::new();
        let op = agent.create_agent("hyperswarm");
        let first = gk.create_did(op.clone()).await.unwrap();
        let second = gk.create_did(op).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(gk.export_did(&first).await.unwrap().len(), 1);
        assert_eq!(gk.get_queue("hyperswarm").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_local_creates_are_not_queued() {
        let gk = gatekeeper();
        let agent = TestAgent::new();
        let did = gk.create_did(agent.create_agent("local")).await.unwrap();
        let events = gk.export_did(&did).await.unwrap();
        assert_eq!(events[0].registry, "local");
        assert_eq!(events[0].did.as_deref(), Some(did.as_str()));
        assert!(gk.get_queue("hyperswarm").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_then_delete() {
        let gk = gatekeeper();
        let agent = TestAgent::new();
        let did = gk.create_did(agent.create_agent("hyperswarm")).await.unwrap();
        let doc = gk.resolve_did(&did, ResolveOptions::default()).await.unwrap();

        let update = agent.update(
            &did,
            &doc.did_document_metadata.version_id,
            json!({ "didDocumentData": { "bio": "hi" } }),
        );
        gk.update_did(update).await.unwrap();
        let doc = gk.resolve_did(&did, ResolveOptions::default()).await.unwrap();
        assert_eq!(doc.did_document_data["bio"], "hi");

        gk.delete_did(agent.delete(&did, &doc.did_document_metadata.version_id))
            .await
            .unwrap();
        let doc = gk.resolve_did(&did, ResolveOptions::default()).await.unwrap();
        assert!(doc.is_deactivated());
        assert!(doc.did_document.is_empty());
        assert_eq!(doc.did_document_metadata.version, 3);

        // create + update + delete, each relayed on hyperswarm
        assert_eq!(gk.get_queue("hyperswarm").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_wrong_operation_type() {
        let gk = gatekeeper();
        let agent = TestAgent::new();
        let op = agent.create_agent("local");
        assert!(matches!(
            gk.update_did(op.clone()).await,
            Err(GatekeeperError::InvalidOperation(_))
        ));
        let did = gk.create_did(op).await.unwrap();
        let del = agent.delete(&did, "zAnything");
        assert!(matches!(
            gk.create_did(del).await,
            Err(GatekeeperError::InvalidOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_of_unknown_did() {
        let gk = gatekeeper();
        let agent = TestAgent::new();
        let ghost = gk.generate_did(&agent.create_agent("local")).unwrap();
        let update = agent.update(&ghost, "zPrev", json!({}));
        assert!(matches!(
            gk.update_did(update).await,
            Err(GatekeeperError::UnknownDid(_))
        ));
    }

    #[tokio::test]
    async fn test_suspended_registry_rejects_creates() {
        let gk = crate::test_utils::gatekeeper_with(crate::config::GatekeeperConfig {
            max_queue_size: 2,
            ..Default::default()
        });
        gk.create_did(TestAgent::new().create_agent("hyperswarm")).await.unwrap();
        gk.create_did(TestAgent::new().create_agent("hyperswarm")).await.unwrap();

        let err = gk
            .create_did(TestAgent::new().create_agent("hyperswarm"))
            .await
            .unwrap_err();
        assert_eq!(err, GatekeeperError::UnsupportedRegistry("hyperswarm".into()));
        assert!(!gk.list_registries().contains(&"hyperswarm".to_string()));

        // draining the queue re-enables it
        let queue = gk.get_queue("hyperswarm").await.unwrap();
        gk.clear_queue("hyperswarm", &queue).await.unwrap();
        assert!(gk
            .create_did(TestAgent::new().create_agent("hyperswarm"))
            .await
            .is_ok());
    }
}
