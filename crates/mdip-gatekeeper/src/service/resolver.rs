//! Resolver (Replay Engine).
//!
//! ```text
//! get_events(did) ──► order_history ──► fold
//!                                        ├─ create  : seed document
//!                                        ├─ update  : merge patch, version + 1
//!                                        └─ delete  : clear, deactivate, stop
//! ```
//!
//! The fold reads one snapshot of the history and never writes.

use futures::future::BoxFuture;
use shared_types::time::{normalize_time, parse_time, unix_to_iso};
use shared_types::{BlockId, BlockInfo, DocumentTimestamp, MdipDocument, Operation, TimestampBound};
use tracing::debug;

use super::{opid_of, Gatekeeper};
use crate::domain::ordering::{order_history, HistoryEntry, OrderedHistory};
use crate::domain::registry::{registry_kind, ConfirmationContext, RegistryKind};
use crate::domain::replay::{apply_delete, apply_update, next_metadata, seed_document};
use crate::domain::ResolveOptions;
use crate::error::{GatekeeperError, GatekeeperResult};

fn bound(block: &BlockInfo) -> TimestampBound {
    TimestampBound {
        time: block.time,
        time_iso: unix_to_iso(block.time).unwrap_or_default(),
        blockid: block.hash.clone(),
        height: block.height,
        txid: None,
        txidx: None,
        batchid: None,
        opidx: None,
    }
}

impl Gatekeeper {
    /// Resolve a DID. Unknown and expired DIDs are `UnknownDid`.
    pub async fn resolve_did(&self, did: &str, options: ResolveOptions) -> GatekeeperResult<MdipDocument> {
        self.resolve_boxed(did, options).await
    }

    /// Boxed so controller lookups can recurse into resolution.
    pub(crate) fn resolve_boxed<'a>(
        &'a self,
        did: &'a str,
        options: ResolveOptions,
    ) -> BoxFuture<'a, GatekeeperResult<MdipDocument>> {
        Box::pin(async move {
            let history = self
                .load_history(did)
                .await?
                .ok_or_else(|| GatekeeperError::UnknownDid(did.to_string()))?;
            let doc = self.fold_history(did, &history, &options).await?;
            if self.is_expired(&doc) {
                debug!(did, "[gatekeeper] resolve: expired");
                return Err(GatekeeperError::UnknownDid(did.to_string()));
            }
            Ok(doc)
        })
    }

    /// Stored events of `did` in chain order. `None` if nothing usable is stored.
    pub(crate) async fn load_history(&self, did: &str) -> GatekeeperResult<Option<OrderedHistory>> {
        let events = self.store.get_events(did).await?;
        if events.is_empty() {
            return Ok(None);
        }
        let entries = events
            .into_iter()
            .map(|event| {
                Ok(HistoryEntry {
                    opid: opid_of(&event.operation)?,
                    event,
                })
            })
            .collect::<GatekeeperResult<Vec<_>>>()?;
        Ok(order_history(entries))
    }

    /// Whether `doc` carries a `validUntil` that has passed.
    pub(crate) fn is_expired(&self, doc: &MdipDocument) -> bool {
        doc.mdip
            .valid_until
            .as_deref()
            .and_then(|until| parse_time(until).ok())
            .map_or(false, |until| self.clock.now() > until)
    }

    /// Fold a history into a document. Expiry is not considered here.
    pub(crate) async fn fold_history(
        &self,
        did: &str,
        history: &OrderedHistory,
        options: &ResolveOptions,
    ) -> GatekeeperResult<MdipDocument> {
        let mut entries = history.entries.iter();
        let first = entries
            .next()
            .ok_or_else(|| GatekeeperError::UnknownDid(did.to_string()))?;
        let Operation::Create(create) = &first.event.operation else {
            return Err(GatekeeperError::InvalidOperation(
                "history does not start with a create".into(),
            ));
        };

        let at_time = options
            .at_time
            .as_deref()
            .map(parse_time)
            .transpose()
            .map_err(|e| GatekeeperError::InvalidParameter(e.to_string()))?;

        if options.verify {
            if did.rsplit(':').next() != Some(first.opid.as_str()) {
                return Err(GatekeeperError::InvalidOperation(format!(
                    "{did} does not match its create"
                )));
            }
            self.verify_create(&first.event.operation).await?;
        }

        let native = history.native.as_str();
        let policy = self.config.policy_for(native);
        let tip_height = if policy.needs_tip() {
            self.store.get_block(native, None).await?.map(|b| b.height)
        } else {
            None
        };
        let ctx = ConfirmationContext {
            now: self.clock.now(),
            tip_height,
        };

        let mut doc = seed_document(did, create, &first.opid);
        doc.did_document_metadata.timestamp = self.timestamp_for(native, first).await?;

        // once an event is unconfirmed, everything after it is too
        let mut confirmed = true;

        for entry in entries {
            let event = &entry.event;

            if doc.is_deactivated() {
                break;
            }
            if let Some(at_version) = options.at_version {
                if doc.did_document_metadata.version >= at_version {
                    break;
                }
            }
            if let Some(at) = at_time {
                match parse_time(&event.time) {
                    Ok(time) if time <= at => {}
                    _ => break,
                }
            }

            confirmed = confirmed && event.registry == native && policy.is_confirmed(event, &ctx);
            if options.confirmed_only && !confirmed {
                break;
            }
            if options.verify {
                self.verify_update(&event.operation, &doc).await?;
            }

            let mut metadata = next_metadata(&doc.did_document_metadata, &entry.opid, confirmed);
            let time = normalize_time(&event.time);
            match &event.operation {
                Operation::Update(update) => {
                    apply_update(&mut doc, &update.doc)?;
                    metadata.updated = Some(time);
                }
                Operation::Delete(_) => {
                    apply_delete(&mut doc);
                    metadata.updated = Some(time.clone());
                    metadata.deleted = Some(time);
                    metadata.deactivated = true;
                }
                // a history holds exactly one create
                Operation::Create(_) => continue,
            }
            metadata.timestamp = self.timestamp_for(native, entry).await?;
            doc.did_document_metadata = metadata;
        }

        Ok(doc)
    }

    /// Block bounds of an operation on a block-anchored native registry.
    async fn timestamp_for(&self, native: &str, entry: &HistoryEntry) -> GatekeeperResult<Option<DocumentTimestamp>> {
        if registry_kind(native) != Some(RegistryKind::BlockAnchored) {
            return Ok(None);
        }

        let lower_bound = match entry
            .event
            .operation
            .blockid()
            .and_then(|id| id.parse::<BlockId>().ok())
        {
            Some(id) => self.store.get_block(native, Some(&id)).await?.map(|b| bound(&b)),
            None => None,
        };

        let upper_bound = match &entry.event.blockchain {
            Some(anchor) if entry.event.registry == native => self
                .store
                .get_block(native, Some(&BlockId::Height(anchor.height)))
                .await?
                .map(|block| TimestampBound {
                    txid: Some(anchor.txid.clone()),
                    txidx: Some(anchor.index),
                    batchid: Some(anchor.batch.clone()),
                    opidx: Some(anchor.opidx),
                    ..bound(&block)
                }),
            _ => None,
        };

        Ok(Some(DocumentTimestamp {
            chain: native.to_string(),
            opid: entry.opid.clone(),
            lower_bound,
            upper_bound,
        }))
    }
}
