//! Reconciliation Merger.
//!
//! Folds events observed on any registry into the stored histories. The
//! per-event outcome is an [`ImportStatus`]; validation failures become
//! `Rejected`, missing history becomes `Deferred`, and only storage errors
//! escape as `Err`.

use shared_types::time::{parse_time, unix_to_iso};
use shared_types::{BlockId, Event, Operation, Ordinal};
use tracing::{debug, warn};

use super::{opid_of, Gatekeeper};
use crate::domain::merge::{place_event, resolve_duplicate, DuplicateDecision, Placement};
use crate::domain::ordering::OrderedHistory;
use crate::domain::registry::is_known_registry;
use crate::domain::{ImportStatus, MergeResult, ResolveOptions};
use crate::error::{GatekeeperError, GatekeeperResult};

impl Gatekeeper {
    /// Derive anchoring facts: ordinal from the block position, time from the
    /// tracked block when the carrier left it empty.
    pub(crate) async fn normalize_event(&self, mut event: Event) -> GatekeeperResult<Event> {
        if let Some(anchor) = &event.blockchain {
            event.ordinal = Ordinal::Sequence(vec![anchor.height, anchor.index, anchor.opidx]);
            if event.time.is_empty() {
                let height = anchor.height;
                if let Some(block) = self
                    .store
                    .get_block(&event.registry, Some(&BlockId::Height(height)))
                    .await?
                {
                    event.time = unix_to_iso(block.time).unwrap_or_default();
                }
            }
        }
        Ok(event)
    }

    /// Checks an event must pass before it is worth merging.
    pub(crate) fn check_event_shape(&self, event: &Event) -> GatekeeperResult<()> {
        if !is_known_registry(&event.registry) {
            return Err(GatekeeperError::UnsupportedRegistry(event.registry.clone()));
        }
        if parse_time(&event.time).is_err() && event.blockchain.is_none() {
            return Err(GatekeeperError::InvalidOperation(format!(
                "event time={}",
                event.time
            )));
        }
        self.check_shape(&event.operation)
    }

    /// The DID an event belongs to. Creates are checked against their content.
    fn event_did(&self, event: &Event) -> GatekeeperResult<String> {
        match &event.operation {
            Operation::Create(_) => {
                let opid = opid_of(&event.operation)?;
                match &event.did {
                    Some(did) if did.rsplit(':').next() == Some(opid.as_str()) => Ok(did.clone()),
                    Some(did) => Err(GatekeeperError::InvalidOperation(format!(
                        "{did} does not match create content"
                    ))),
                    None => self.generate_did(&event.operation),
                }
            }
            op => {
                let did = op.did().unwrap_or_default();
                match &event.did {
                    Some(claimed) if claimed != did => Err(GatekeeperError::InvalidOperation(
                        format!("event did {claimed} != operation did {did}"),
                    )),
                    _ => Ok(did.to_string()),
                }
            }
        }
    }

    /// Import one event, classifying validation failures.
    pub(crate) async fn import_event(&self, event: Event) -> GatekeeperResult<ImportStatus> {
        let event = self.normalize_event(event).await?;
        let outcome = match self.event_did(&event) {
            Ok(did) => {
                let _guard = self.locks.lock(&did).await;
                self.merge_locked(&did, event).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(status) => Ok(status),
            Err(GatekeeperError::UnknownDid(did)) => {
                debug!(did = %did, "[gatekeeper] import deferred: unknown DID");
                Ok(ImportStatus::Deferred)
            }
            Err(e) if e.is_storage() => Err(e),
            Err(e) => {
                warn!("[gatekeeper] import rejected: {}", e);
                Ok(ImportStatus::Rejected)
            }
        }
    }

    /// Merge `event` into `did`'s history. Caller holds the DID lock.
    async fn merge_locked(&self, did: &str, event: Event) -> GatekeeperResult<ImportStatus> {
        let opid = opid_of(&event.operation)?;
        let event = event.with_did(did);

        let Some(history) = self.load_history(did).await? else {
            if !event.operation.is_create() {
                return Err(GatekeeperError::UnknownDid(did.to_string()));
            }
            self.verify_create(&event.operation).await?;
            self.store.set_events(did, vec![event]).await?;
            self.forget_verified(did);
            return Ok(ImportStatus::Added);
        };

        let value = event.signature_value().unwrap_or_default();
        let duplicate = history
            .entries
            .iter()
            .position(|entry| entry.event.signature_value() == Some(value));

        if let Some(idx) = duplicate {
            let existing = &history.entries[idx];
            if existing.opid != opid {
                return Err(GatekeeperError::InvalidOperation(
                    "signature reused for different content".into(),
                ));
            }
            return match resolve_duplicate(&existing.event.registry, &event.registry, &history.native) {
                DuplicateDecision::KeepExisting => Ok(ImportStatus::Merged),
                DuplicateDecision::ReplaceWithNative => {
                    let mut events = history.into_events();
                    events[idx] = event;
                    self.store.set_events(did, events).await?;
                    self.forget_verified(did);
                    debug!(did, "[gatekeeper] native copy replaced placeholder");
                    Ok(ImportStatus::Replaced)
                }
            };
        }

        if event.operation.is_create() {
            // a create with the same content always carries the same signature
            return Err(GatekeeperError::InvalidOperation(
                "second create for existing DID".into(),
            ));
        }

        let keep = match place_event(&history, &event) {
            Placement::Append => history.entries.len(),
            Placement::Reorg { keep } => keep,
            Placement::Defer => {
                debug!(did, "[gatekeeper] previd not yet known");
                return Ok(ImportStatus::Deferred);
            }
            Placement::Conflict => {
                return Err(GatekeeperError::ConflictingHistory {
                    expected: history
                        .head()
                        .map(|entry| entry.opid.clone())
                        .unwrap_or_default(),
                    actual: event.operation.previd().map(str::to_string),
                })
            }
        };

        let base = OrderedHistory {
            native: history.native.clone(),
            entries: history.entries[..keep].to_vec(),
        };
        let doc = self.fold_history(did, &base, &ResolveOptions::default()).await?;
        self.verify_update(&event.operation, &doc).await?;

        if keep < history.entries.len() {
            warn!(
                did,
                dropped = history.entries.len() - keep,
                "[gatekeeper] native branch displaced history"
            );
        }
        let mut events = base.into_events();
        events.push(event);
        self.store.set_events(did, events).await?;
        self.forget_verified(did);
        Ok(ImportStatus::Added)
    }

    /// Merge one event observed on some registry into `did`.
    ///
    /// Events that depend on unknown history are parked in the import queue.
    pub async fn merge_event(&self, did: &str, event: Event) -> GatekeeperResult<MergeResult> {
        let event = self.normalize_event(event.with_did(did)).await?;
        self.check_event_shape(&event)?;
        let did = self.event_did(&event)?;

        let status = {
            let _guard = self.locks.lock(&did).await;
            match self.merge_locked(&did, event.clone()).await {
                Err(GatekeeperError::UnknownDid(_)) => ImportStatus::Deferred,
                other => other?,
            }
        };

        if status == ImportStatus::Deferred {
            self.pending.lock().push(event);
        }
        Ok(status.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{gatekeeper, TestAgent};
    use serde_json::json;

    #[tokio::test]
    async fn test_native_copy_replaces_placeholder() {
        let gk = gatekeeper();
        let agent = TestAgent::new();
        let did = gk.create_did(agent.create_agent("hyperswarm")).await.unwrap();
        let doc = gk.resolve_did(&did, ResolveOptions::default()).await.unwrap();
        let update = agent.update(&did, &doc.did_document_metadata.version_id, json!({}));
        gk.update_did(update.clone()).await.unwrap();

        let native = agent.native_copy(&did, update.clone(), "hyperswarm");
        let result = gk.merge_event(&did, native.clone()).await.unwrap();
        assert_eq!(result, MergeResult { accepted: true, replaced: true });

        let events = gk.export_did(&did).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].registry, "hyperswarm");

        // the native copy is never displaced again
        let again = gk.merge_event(&did, native).await.unwrap();
        assert_eq!(again, MergeResult::default());
        let local = agent.native_copy(&did, update, "local");
        assert_eq!(gk.merge_event(&did, local).await.unwrap(), MergeResult::default());
        assert_eq!(gk.export_did(&did).await.unwrap()[1].registry, "hyperswarm");
    }

    #[tokio::test]
    async fn test_unknown_previd_is_parked() {
        let gk = gatekeeper();
        let agent = TestAgent::new();
        let did = gk.create_did(agent.create_agent("hyperswarm")).await.unwrap();
        let orphan = agent.update(&did, "zNotYetSeen", json!({}));
        let event = agent.native_copy(&did, orphan, "hyperswarm");

        let result = gk.merge_event(&did, event).await.unwrap();
        assert!(!result.accepted);
        assert_eq!(gk.pending_events(), 1);
    }

    #[tokio::test]
    async fn test_mismatched_create_did_is_rejected() {
        let gk = gatekeeper();
        let agent = TestAgent::new();
        let create = agent.create_agent("hyperswarm");
        let event = agent.native_copy("did:test:zWrong", create, "hyperswarm");
        assert!(matches!(
            gk.import_event(event).await,
            Ok(ImportStatus::Rejected)
        ));
    }

    #[tokio::test]
    async fn test_forged_update_is_rejected() {
        let gk = gatekeeper();
        let agent = TestAgent::new();
        let did = gk.create_did(agent.create_agent("hyperswarm")).await.unwrap();
        let doc = gk.resolve_did(&did, ResolveOptions::default()).await.unwrap();

        let forged = TestAgent::new().update(&did, &doc.did_document_metadata.version_id, json!({}));
        let event = agent.native_copy(&did, forged, "hyperswarm");
        assert_eq!(gk.import_event(event).await, Ok(ImportStatus::Rejected));
        assert_eq!(gk.export_did(&did).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_native_branch_displaces_provisional_history() {
        let gk = gatekeeper();
        let agent = TestAgent::new();
        let did = gk.create_did(agent.create_agent("hyperswarm")).await.unwrap();
        let doc = gk.resolve_did(&did, ResolveOptions::default()).await.unwrap();
        let root = doc.did_document_metadata.version_id.clone();

        // provisional update known only locally
        let local = agent.update(&did, &root, json!({ "didDocumentData": { "v": "local" } }));
        gk.update_did(local).await.unwrap();

        // a different update on the native registry built on the same parent
        let native = agent.update(&did, &root, json!({ "didDocumentData": { "v": "native" } }));
        let event = agent.native_copy(&did, native, "hyperswarm");
        assert_eq!(gk.import_event(event).await, Ok(ImportStatus::Added));

        let doc = gk.resolve_did(&did, ResolveOptions::default()).await.unwrap();
        assert_eq!(doc.did_document_data["v"], "native");
        assert_eq!(doc.did_document_metadata.version, 2);
        assert_eq!(gk.export_did(&did).await.unwrap().len(), 2);
    }
}
