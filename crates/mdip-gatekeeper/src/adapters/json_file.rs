//! JSON file event store.
//!
//! The whole ledger is one JSON document, cached in memory and rewritten on
//! every mutation via temp file + rename. An exclusive `fs2` lock on a
//! sidecar `.lock` file keeps a second process from opening the same
//! database.
//!
//! Each write serializes the full ledger, so cost grows with the ledger. The
//! rewrite runs on tokio's blocking pool; this backend suits development and
//! small deployments, larger ledgers belong on RocksDB.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use fs2::FileExt;
use parking_lot::Mutex;
use shared_types::{BlockId, BlockInfo, Event};
use tracing::{info, warn};

use crate::adapters::memory::LedgerData;
use crate::error::{StorageError, StorageResult};
use crate::ports::outbound::EventStore;

/// Cached ledger plus the file it mirrors.
struct LedgerFile {
    path: PathBuf,
    data: Mutex<LedgerData>,
    lock_file: File,
}

impl LedgerFile {
    fn persist(&self, data: &LedgerData) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(data)?;

        // Write atomically via temp file
        let temp_path = self.path.with_extension("tmp");
        let mut file = File::create(&temp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    /// Apply `f` to a copy, persist it, then publish it. A failed write
    /// leaves the cache matching the file.
    fn mutate<R>(&self, f: impl FnOnce(&mut LedgerData) -> R) -> StorageResult<R> {
        let mut data = self.data.lock();
        let mut next = data.clone();
        let result = f(&mut next);
        self.persist(&next)?;
        *data = next;
        Ok(result)
    }
}

impl Drop for LedgerFile {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.lock_file) {
            warn!("[gatekeeper] failed to release {}: {}", self.path.display(), e);
        }
    }
}

pub struct JsonFileEventStore {
    ledger: Arc<LedgerFile>,
}

impl JsonFileEventStore {
    /// Open (or create) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let lock_path = path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| StorageError::Locked(lock_path.display().to_string()))?;

        let data = Self::load(&path)?;
        info!(
            "[gatekeeper] json store {} opened ({} DIDs)",
            path.display(),
            data.dids.len()
        );

        Ok(Self {
            ledger: Arc::new(LedgerFile {
                path,
                data: Mutex::new(data),
                lock_file,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.ledger.path
    }

    fn load(path: &Path) -> StorageResult<LedgerData> {
        match std::fs::read(path) {
            Ok(bytes) if bytes.is_empty() => Ok(LedgerData::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LedgerData::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn read<R>(&self, f: impl FnOnce(&LedgerData) -> R) -> R {
        f(&*self.ledger.data.lock())
    }

    /// Run a mutation and its file rewrite on the blocking pool.
    async fn mutate<R, F>(&self, f: F) -> StorageResult<R>
    where
        F: FnOnce(&mut LedgerData) -> R + Send + 'static,
        R: Send + 'static,
    {
        let ledger = Arc::clone(&self.ledger);
        tokio::task::spawn_blocking(move || ledger.mutate(f))
            .await
            .map_err(|e| StorageError::Backend(format!("json store write task: {e}")))?
    }
}

#[async_trait]
impl EventStore for JsonFileEventStore {
    async fn add_event(&self, did: &str, event: Event) -> StorageResult<()> {
        let did = did.to_string();
        self.mutate(move |data| data.add_event(&did, event)).await
    }

    async fn get_events(&self, did: &str) -> StorageResult<Vec<Event>> {
        Ok(self.read(|data| data.get_events(did)))
    }

    async fn set_events(&self, did: &str, events: Vec<Event>) -> StorageResult<()> {
        let did = did.to_string();
        self.mutate(move |data| data.set_events(&did, events)).await
    }

    async fn delete_events(&self, did: &str) -> StorageResult<()> {
        let did = did.to_string();
        self.mutate(move |data| data.delete_events(&did)).await
    }

    async fn get_all_keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.read(LedgerData::keys))
    }

    async fn reset_db(&self) -> StorageResult<()> {
        self.mutate(|data| *data = LedgerData::default()).await
    }

    async fn queue_event(&self, registry: &str, event: Event) -> StorageResult<usize> {
        let registry = registry.to_string();
        self.mutate(move |data| data.queue_event(&registry, event)).await
    }

    async fn get_queue(&self, registry: &str) -> StorageResult<Vec<Event>> {
        Ok(self.read(|data| data.get_queue(registry)))
    }

    async fn clear_queue(&self, registry: &str, events: &[Event]) -> StorageResult<()> {
        let registry = registry.to_string();
        let events = events.to_vec();
        self.mutate(move |data| data.clear_queue(&registry, &events)).await
    }

    async fn add_block(&self, registry: &str, block: BlockInfo) -> StorageResult<()> {
        let registry = registry.to_string();
        self.mutate(move |data| data.add_block(&registry, block)).await
    }

    async fn get_block(&self, registry: &str, id: Option<&BlockId>) -> StorageResult<Option<BlockInfo>> {
        Ok(self.read(|data| data.get_block(registry, id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::tests::{exercise_store, sample_event};

    #[tokio::test]
    async fn test_json_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileEventStore::open(dir.path().join("ledger.json")).unwrap();
        exercise_store(&store).await;
    }

    #[tokio::test]
    async fn test_json_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        {
            let store = JsonFileEventStore::open(&path).unwrap();
            store.add_event("did:test:a", sample_event("1")).await.unwrap();
            store.queue_event("hyperswarm", sample_event("2")).await.unwrap();
        }
        let store = JsonFileEventStore::open(&path).unwrap();
        assert_eq!(store.get_events("did:test:a").await.unwrap(), vec![sample_event("1")]);
        assert_eq!(store.get_queue("hyperswarm").await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_writes_all_reach_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let store = Arc::new(JsonFileEventStore::open(&path).unwrap());

        let writers: Vec<_> = (0..8)
            .map(|n| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .add_event(&format!("did:test:{n}"), sample_event(&n.to_string()))
                        .await
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }
        drop(store);

        let reopened = JsonFileEventStore::open(&path).unwrap();
        assert_eq!(reopened.get_all_keys().await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_second_open_is_locked_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let _first = JsonFileEventStore::open(&path).unwrap();
        let second = JsonFileEventStore::open(&path);
        assert!(matches!(second, Err(StorageError::Locked(_))));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(
            JsonFileEventStore::open(&path),
            Err(StorageError::Serialization(_))
        ));
    }
}
