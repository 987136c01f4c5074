//! Listing, raw export/import, removal and the content store passthrough.

use std::sync::Arc;

use serde_json::Value;
use shared_crypto::canonicalize;
use shared_types::time::parse_time;
use shared_types::Event;
use tracing::{info, warn};

use super::Gatekeeper;
use crate::domain::{DidList, GetDidsOptions, ImportBatchResult, ResolveOptions};
use crate::error::{GatekeeperError, GatekeeperResult};
use crate::ports::outbound::ContentStore;

fn parse_bound(value: Option<&str>) -> GatekeeperResult<Option<chrono::DateTime<chrono::Utc>>> {
    value
        .map(|v| parse_time(v).map_err(|e| GatekeeperError::InvalidParameter(e.to_string())))
        .transpose()
}

impl Gatekeeper {
    /// DIDs (or their documents) matching `options`. Unresolvable DIDs are skipped.
    pub async fn get_dids(&self, options: GetDidsOptions) -> GatekeeperResult<DidList> {
        let after = parse_bound(options.updated_after.as_deref())?;
        let before = parse_bound(options.updated_before.as_deref())?;
        let dids = match options.dids {
            Some(dids) => dids,
            None => self.store.get_all_keys().await?,
        };
        let resolve_options = ResolveOptions {
            confirmed_only: options.confirm,
            verify: options.verify,
            ..Default::default()
        };

        let mut found = Vec::new();
        let mut docs = Vec::new();
        for did in dids {
            let doc = match self.resolve_did(&did, resolve_options.clone()).await {
                Ok(doc) => doc,
                Err(e) if e.is_storage() => return Err(e),
                Err(_) => continue,
            };

            if after.is_some() || before.is_some() {
                let metadata = &doc.did_document_metadata;
                let updated = metadata.updated.as_deref().unwrap_or(&metadata.created);
                let Ok(updated) = parse_time(updated) else {
                    continue;
                };
                if after.map_or(false, |after| updated <= after)
                    || before.map_or(false, |before| updated >= before)
                {
                    continue;
                }
            }

            if options.resolve {
                docs.push(doc);
            } else {
                found.push(did);
            }
        }

        Ok(if options.resolve {
            DidList::Documents(docs)
        } else {
            DidList::Dids(found)
        })
    }

    /// Raw stored history of one DID.
    pub async fn export_did(&self, did: &str) -> GatekeeperResult<Vec<Event>> {
        Ok(self.store.get_events(did).await?)
    }

    pub async fn export_dids(&self, dids: Option<Vec<String>>) -> GatekeeperResult<Vec<Vec<Event>>> {
        let dids = match dids {
            Some(dids) => dids,
            None => self.store.get_all_keys().await?,
        };
        let mut histories = Vec::with_capacity(dids.len());
        for did in dids {
            let events = self.export_did(&did).await?;
            if !events.is_empty() {
                histories.push(events);
            }
        }
        Ok(histories)
    }

    pub async fn import_dids(&self, histories: Vec<Vec<Event>>) -> GatekeeperResult<ImportBatchResult> {
        self.import_batch(histories.into_iter().flatten().collect())
            .await
    }

    /// Delete histories outright. Returns how many existed.
    pub async fn remove_dids(&self, dids: &[String]) -> GatekeeperResult<usize> {
        let mut removed = 0;
        for did in dids {
            let _guard = self.locks.lock(did).await;
            let events = self.store.get_events(did).await?;
            if events.is_empty() {
                continue;
            }
            self.store.delete_events(did).await?;
            self.forget_verified(did);
            self.forget_seen(&events);
            removed += 1;
        }
        if removed > 0 {
            warn!(removed, "[gatekeeper] DIDs removed");
        }
        Ok(removed)
    }

    pub fn list_registries(&self) -> Vec<String> {
        self.registries.list()
    }

    /// Drop every history, queue and block, and all in-memory state.
    pub async fn reset_db(&self) -> GatekeeperResult<()> {
        self.store.reset_db().await?;
        self.pending.lock().clear();
        self.seen.lock().clear();
        self.verified.lock().clear();
        self.registries.reset();
        info!("[gatekeeper] database reset");
        Ok(())
    }

    fn content(&self) -> GatekeeperResult<&Arc<dyn ContentStore>> {
        self.content.as_ref().ok_or(GatekeeperError::NoContentStore)
    }

    pub async fn add_data(&self, data: Vec<u8>) -> GatekeeperResult<String> {
        Ok(self.content()?.add(data).await?)
    }

    pub async fn get_data(&self, cid: &str) -> GatekeeperResult<Option<Vec<u8>>> {
        Ok(self.content()?.get(cid).await?)
    }

    pub async fn add_text(&self, text: &str) -> GatekeeperResult<String> {
        self.add_data(text.as_bytes().to_vec()).await
    }

    pub async fn get_text(&self, cid: &str) -> GatekeeperResult<Option<String>> {
        self.get_data(cid)
            .await?
            .map(|bytes| {
                String::from_utf8(bytes)
                    .map_err(|_| GatekeeperError::InvalidParameter(format!("{cid} is not text")))
            })
            .transpose()
    }

    /// Stored in canonical form, so equal values share a CID.
    pub async fn add_json(&self, value: &Value) -> GatekeeperResult<String> {
        self.add_data(canonicalize(value).into_bytes()).await
    }

    pub async fn get_json(&self, cid: &str) -> GatekeeperResult<Option<Value>> {
        self.get_data(cid)
            .await?
            .map(|bytes| {
                serde_json::from_slice(&bytes)
                    .map_err(|_| GatekeeperError::InvalidParameter(format!("{cid} is not JSON")))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryContentStore;
    use crate::test_utils::{gatekeeper, TestAgent};
    use serde_json::json;

    #[tokio::test]
    async fn test_get_dids_filters() {
        let gk = gatekeeper();
        let a = gk.create_did(TestAgent::new().create_agent("local")).await.unwrap();
        let b = gk
            .create_did(TestAgent::new().create_agent("hyperswarm"))
            .await
            .unwrap();

        let all = gk.get_dids(GetDidsOptions::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let chosen = gk
            .get_dids(GetDidsOptions {
                dids: Some(vec![a.clone(), "did:test:zGone".into()]),
                resolve: true,
                ..Default::default()
            })
            .await
            .unwrap();
        match chosen {
            DidList::Documents(docs) => {
                assert_eq!(docs.len(), 1);
                assert_eq!(docs[0].did_document.id.as_deref(), Some(a.as_str()));
            }
            other => panic!("expected documents, got {other:?}"),
        }

        let none = gk
            .get_dids(GetDidsOptions {
                updated_after: Some("2999-01-01T00:00:00Z".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(none.is_empty());

        let since = gk
            .get_dids(GetDidsOptions {
                updated_after: Some("2000-01-01T00:00:00Z".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(since, DidList::Dids(expected));
    }

    #[tokio::test]
    async fn test_remove_and_reset() {
        let gk = gatekeeper();
        let did = gk
            .create_did(TestAgent::new().create_agent("hyperswarm"))
            .await
            .unwrap();
        assert_eq!(gk.remove_dids(&[did.clone(), "did:test:zNone".into()]).await.unwrap(), 1);
        assert!(gk.export_did(&did).await.unwrap().is_empty());

        gk.create_did(TestAgent::new().create_agent("hyperswarm"))
            .await
            .unwrap();
        gk.reset_db().await.unwrap();
        assert!(gk.export_dids(None).await.unwrap().is_empty());
        assert!(gk.get_queue("hyperswarm").await.unwrap().is_empty());
        assert_eq!(gk.list_registries(), vec!["local", "hyperswarm"]);
    }

    #[tokio::test]
    async fn test_removed_did_can_be_imported_again() {
        let origin = gatekeeper();
        let did = origin
            .create_did(TestAgent::new().create_agent("hyperswarm"))
            .await
            .unwrap();
        let batch = origin.export_batch(Some(vec![did.clone()])).await.unwrap();

        let replica = gatekeeper();
        assert_eq!(replica.import_batch(batch.clone()).await.unwrap().queued, 1);
        assert_eq!(replica.remove_dids(&[did.clone()]).await.unwrap(), 1);

        let again = replica.import_batch(batch).await.unwrap();
        assert_eq!((again.queued, again.processed), (1, 0));
        assert!(replica.resolve_did(&did, ResolveOptions::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_content_passthrough() {
        let gk = gatekeeper();
        assert_eq!(gk.add_text("x").await, Err(GatekeeperError::NoContentStore));

        let gk = gk.with_content_store(Arc::new(InMemoryContentStore::new()));
        let cid = gk.add_text("hello").await.unwrap();
        assert_eq!(gk.get_text(&cid).await.unwrap().as_deref(), Some("hello"));

        let a = gk.add_json(&json!({ "b": 1, "a": 2 })).await.unwrap();
        let b = gk.add_json(&json!({ "a": 2, "b": 1 })).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(gk.get_json(&a).await.unwrap(), Some(json!({ "a": 2, "b": 1 })));

        let raw = gk.add_data(vec![0xff, 0xfe]).await.unwrap();
        assert!(matches!(
            gk.get_text(&raw).await,
            Err(GatekeeperError::InvalidParameter(_))
        ));
        assert_eq!(gk.get_data("zMissing").await.unwrap(), None);
    }
}
