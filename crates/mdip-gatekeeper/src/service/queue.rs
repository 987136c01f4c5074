//! Registry Queue Manager.
//!
//! Two queues live here:
//!
//! - anchoring queues (persistent, per registry): locally admitted events
//!   waiting for a mediator to carry them to hyperswarm or a chain
//! - the import queue (in memory): imported events waiting for the history
//!   they build on, retried by [`Gatekeeper::process_events`]

use std::cmp::Ordering;
use std::collections::HashSet;

use shared_types::time::parse_time;
use shared_types::Event;
use tracing::{debug, info, warn};

use super::Gatekeeper;
use crate::domain::registry::{is_known_registry, HYPERSWARM, LOCAL};
use crate::domain::{ImportBatchResult, ImportStatus, ProcessEventsResult};
use crate::error::{GatekeeperError, GatekeeperResult};

fn seen_id(event: &Event) -> &str {
    event
        .operation
        .signature()
        .map(|s| s.hash.as_deref().unwrap_or(s.value.as_str()))
        .unwrap_or_default()
}

fn seen_key(event: &Event) -> String {
    format!("{}/{}", event.registry, seen_id(event))
}

fn signed_order(a: &Event, b: &Event) -> Ordering {
    let signed = |e: &Event| {
        e.operation
            .signature()
            .and_then(|s| parse_time(&s.signed).ok())
    };
    signed(a).cmp(&signed(b))
}

fn check_registry(registry: &str) -> GatekeeperResult<()> {
    if is_known_registry(registry) {
        Ok(())
    } else {
        Err(GatekeeperError::InvalidParameter(format!("registry={registry}")))
    }
}

impl Gatekeeper {
    /// Route a locally admitted event: nothing for `local`, otherwise the
    /// hyperswarm relay plus the native registry.
    pub(crate) async fn enqueue_for_anchoring(&self, native: &str, event: Event) -> GatekeeperResult<()> {
        if native == LOCAL {
            return Ok(());
        }
        if native != HYPERSWARM {
            self.enqueue(native, event.clone()).await?;
        }
        self.enqueue(HYPERSWARM, event).await?;
        Ok(())
    }

    /// Add an event to a registry's anchoring queue. Returns the queue length.
    pub async fn enqueue(&self, registry: &str, event: Event) -> GatekeeperResult<usize> {
        check_registry(registry)?;
        if registry == LOCAL {
            return Err(GatekeeperError::InvalidParameter(
                "local events are never queued".into(),
            ));
        }

        let len = self.store.queue_event(registry, event).await?;
        if len >= self.config.max_queue_size && self.registries.suspend(registry) {
            warn!(
                registry,
                len, "[gatekeeper] queue full, registry suspended for new DIDs"
            );
        }
        Ok(len)
    }

    /// Pending anchoring events. Re-enables a suspended registry.
    pub async fn get_queue(&self, registry: &str) -> GatekeeperResult<Vec<Event>> {
        check_registry(registry)?;
        if self.registries.resume(registry) {
            info!(registry, "[gatekeeper] registry resumed");
        }
        Ok(self.store.get_queue(registry).await?)
    }

    pub async fn clear_queue(&self, registry: &str, events: &[Event]) -> GatekeeperResult<()> {
        check_registry(registry)?;
        self.store.clear_queue(registry, events).await?;
        debug!(registry, cleared = events.len(), "[gatekeeper] queue cleared");
        Ok(())
    }

    /// Every event of the given (or all) DIDs whose native registry is not
    /// `local`, ordered by signing time.
    pub async fn export_batch(&self, dids: Option<Vec<String>>) -> GatekeeperResult<Vec<Event>> {
        let dids = match dids {
            Some(dids) => dids,
            None => self.store.get_all_keys().await?,
        };

        let mut batch = Vec::new();
        for did in dids {
            let Some(history) = self.load_history(&did).await? else {
                continue;
            };
            if history.native == LOCAL {
                continue;
            }
            batch.extend(
                history
                    .into_events()
                    .into_iter()
                    .map(|event| event.with_did(did.as_str())),
            );
        }
        batch.sort_by(signed_order);
        Ok(batch)
    }

    /// Import events from any registry.
    ///
    /// Structural failures are rejected up front; events already taken in by
    /// an earlier batch count as processed. Everything else is merged, with
    /// events that depend on unknown history left in the import queue.
    pub async fn import_batch(&self, events: Vec<Event>) -> GatekeeperResult<ImportBatchResult> {
        let mut result = ImportBatchResult::default();

        for event in events {
            if let Err(e) = self.check_event_shape(&event) {
                warn!("[gatekeeper] import_batch: rejected {}", e);
                result.rejected += 1;
                continue;
            }

            let key = seen_key(&event);
            if !self.seen.lock().insert(key.clone()) {
                result.processed += 1;
                continue;
            }

            let status = match self.import_event(event.clone()).await {
                Ok(status) => status,
                Err(e) => {
                    self.seen.lock().remove(&key);
                    return Err(e);
                }
            };
            match status {
                ImportStatus::Added | ImportStatus::Replaced => result.queued += 1,
                ImportStatus::Merged => result.processed += 1,
                ImportStatus::Rejected => {
                    self.seen.lock().remove(&key);
                    result.rejected += 1;
                }
                ImportStatus::Deferred => {
                    self.pending.lock().push(event);
                    result.queued += 1;
                }
            }
        }

        // a drain already in flight will pick up what was deferred
        self.process_events().await?;

        result.total = self.pending.lock().len();
        info!(
            queued = result.queued,
            processed = result.processed,
            rejected = result.rejected,
            total = result.total,
            "[gatekeeper] import_batch"
        );
        Ok(result)
    }

    /// Retry deferred imports until a round makes no progress.
    pub async fn process_events(&self) -> GatekeeperResult<ProcessEventsResult> {
        let Some(_busy) = self.processing.try_acquire() else {
            return Ok(ProcessEventsResult::busy());
        };

        let mut result = ProcessEventsResult::default();
        loop {
            let batch = std::mem::take(&mut *self.pending.lock());
            if batch.is_empty() {
                break;
            }

            let mut progressed = false;
            let mut retry = Vec::new();
            let mut events = batch.into_iter();
            while let Some(event) = events.next() {
                match self.import_event(event.clone()).await {
                    Ok(ImportStatus::Added | ImportStatus::Replaced) => {
                        result.added += 1;
                        progressed = true;
                    }
                    Ok(ImportStatus::Merged) => {
                        result.merged += 1;
                        progressed = true;
                    }
                    Ok(ImportStatus::Rejected) => {
                        self.seen.lock().remove(&seen_key(&event));
                        result.rejected += 1;
                    }
                    Ok(ImportStatus::Deferred) => retry.push(event),
                    Err(e) => {
                        retry.push(event);
                        retry.extend(events);
                        self.requeue(retry);
                        return Err(e);
                    }
                }
            }

            self.requeue(retry);
            if !progressed {
                break;
            }
        }

        result.pending = self.pending.lock().len();
        if result.added + result.merged + result.rejected > 0 {
            info!(
                added = result.added,
                merged = result.merged,
                rejected = result.rejected,
                pending = result.pending,
                "[gatekeeper] process_events"
            );
        }
        Ok(result)
    }

    /// Let copies of `events` from any registry be imported again.
    pub(crate) fn forget_seen(&self, events: &[Event]) {
        if events.is_empty() {
            return;
        }
        let ids: HashSet<&str> = events.iter().map(seen_id).collect();
        self.seen
            .lock()
            .retain(|key| key.split_once('/').map_or(true, |(_, id)| !ids.contains(id)));
    }

    /// Put events back ahead of anything queued meanwhile.
    fn requeue(&self, mut events: Vec<Event>) {
        let mut pending = self.pending.lock();
        events.append(&mut pending);
        *pending = events;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ResolveOptions;
    use crate::test_utils::{gatekeeper, TestAgent};
    use serde_json::json;

    #[tokio::test]
    async fn test_enqueue_rules() {
        let gk = gatekeeper();
        let agent = TestAgent::new();
        let create = agent.create_agent("hyperswarm");
        let event = agent.native_copy("did:test:x", create, "hyperswarm");

        assert!(matches!(
            gk.enqueue("local", event.clone()).await,
            Err(GatekeeperError::InvalidParameter(_))
        ));
        assert!(matches!(
            gk.get_queue("ethereum").await,
            Err(GatekeeperError::InvalidParameter(_))
        ));
        assert_eq!(gk.enqueue("TBTC", event).await.unwrap(), 1);
        // TBTC is known but was never configured, so reading it does not enable it
        assert_eq!(gk.get_queue("TBTC").await.unwrap().len(), 1);
        assert!(!gk.list_registries().contains(&"TBTC".to_string()));
    }

    #[tokio::test]
    async fn test_block_anchored_native_is_queued_twice() {
        let gk = crate::test_utils::gatekeeper_with(crate::config::GatekeeperConfig {
            registries: vec!["hyperswarm".into(), "TFTC".into()],
            ..Default::default()
        });
        let agent = TestAgent::new();
        gk.create_did(agent.create_agent("TFTC")).await.unwrap();
        assert_eq!(gk.get_queue("TFTC").await.unwrap().len(), 1);
        assert_eq!(gk.get_queue("hyperswarm").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_export_skips_local_dids() {
        let gk = gatekeeper();
        let agent = TestAgent::new();
        gk.create_did(agent.create_agent("local")).await.unwrap();
        let remote = gk
            .create_did(TestAgent::new().create_agent("hyperswarm"))
            .await
            .unwrap();

        let batch = gk.export_batch(None).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].did.as_deref(), Some(remote.as_str()));
    }

    #[tokio::test]
    async fn test_out_of_order_batch_is_drained() {
        let source = gatekeeper();
        let agent = TestAgent::new();
        let did = source.create_did(agent.create_agent("hyperswarm")).await.unwrap();
        let doc = source.resolve_did(&did, ResolveOptions::default()).await.unwrap();
        let update = agent.update(
            &did,
            &doc.did_document_metadata.version_id,
            json!({ "didDocumentData": { "k": 1 } }),
        );
        source.update_did(update).await.unwrap();

        let mut batch = source.export_batch(Some(vec![did.clone()])).await.unwrap();
        batch.reverse();

        let target = gatekeeper();
        let result = target.import_batch(batch).await.unwrap();
        assert_eq!(result.queued, 2);
        assert_eq!(result.rejected, 0);
        assert_eq!(result.total, 0);

        let imported = target.resolve_did(&did, ResolveOptions::default()).await.unwrap();
        assert_eq!(imported.did_document_data, json!({ "k": 1 }));
    }

    #[tokio::test]
    async fn test_structural_rejects_are_counted() {
        let gk = gatekeeper();
        let agent = TestAgent::new();
        let mut event = agent.native_copy("did:test:x", agent.create_agent("hyperswarm"), "hyperswarm");
        event.registry = "ethereum".into();
        let mut untimed = agent.native_copy("did:test:x", agent.create_agent("hyperswarm"), "hyperswarm");
        untimed.time = "whenever".into();

        let result = gk.import_batch(vec![event, untimed]).await.unwrap();
        assert_eq!(result.rejected, 2);
        assert_eq!(result.queued + result.processed, 0);
    }

    #[tokio::test]
    async fn test_process_events_reports_busy() {
        let gk = gatekeeper();
        let _held = gk.processing.try_acquire().unwrap();
        assert!(gk.process_events().await.unwrap().busy);
    }

    #[tokio::test]
    async fn test_unresolvable_events_stay_pending() {
        let gk = gatekeeper();
        let agent = TestAgent::new();
        let ghost = gk.generate_did(&agent.create_agent("hyperswarm")).unwrap();
        let orphan = agent.update(&ghost, "zPrev", json!({}));
        let event = agent.native_copy(&ghost, orphan, "hyperswarm");

        let result = gk.import_batch(vec![event]).await.unwrap();
        assert_eq!(result.queued, 1);
        assert_eq!(result.total, 1);

        let drained = gk.process_events().await.unwrap();
        assert_eq!(drained.added, 0);
        assert_eq!(drained.pending, 1);
    }
}
