//! # RocksDB Event Store
//!
//! ## Column Families
//!
//! - `events` - DID -> JSON event list
//! - `queue` - registry -> JSON event list
//! - `blocks` - `registry 0x00 height(be)` -> JSON block
//!
//! Read-modify-write calls hold the write side of the handle lock so queue
//! appends from different DIDs cannot interleave.

use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use shared_types::{BlockId, BlockInfo, Event};

use crate::error::{StorageError, StorageResult};
use crate::ports::outbound::EventStore;

pub const CF_EVENTS: &str = "events";
pub const CF_QUEUE: &str = "queue";
pub const CF_BLOCKS: &str = "blocks";

pub const COLUMN_FAMILIES: &[&str] = &[CF_EVENTS, CF_QUEUE, CF_BLOCKS];

fn backend(e: rocksdb::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

fn block_key(registry: &str, height: u64) -> Vec<u8> {
    let mut key = block_prefix(registry);
    key.extend_from_slice(&height.to_be_bytes());
    key
}

fn block_prefix(registry: &str) -> Vec<u8> {
    let mut key = registry.as_bytes().to_vec();
    key.push(0);
    key
}

pub struct RocksDbEventStore {
    db: RwLock<DB>,
}

impl RocksDbEventStore {
    /// Open or create a database directory.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, path.as_ref(), cf_descriptors).map_err(backend)?;
        tracing::info!("[gatekeeper] rocksdb store opened at {}", path.as_ref().display());
        Ok(Self { db: RwLock::new(db) })
    }

    fn cf<'a>(db: &'a DB, name: &str) -> StorageResult<&'a ColumnFamily> {
        db.cf_handle(name)
            .ok_or_else(|| StorageError::Backend(format!("missing column family {name}")))
    }

    fn read_list(db: &DB, cf: &str, key: &str) -> StorageResult<Vec<Event>> {
        match db.get_cf(Self::cf(db, cf)?, key.as_bytes()).map_err(backend)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    fn write_list(db: &DB, cf: &str, key: &str, events: &[Event]) -> StorageResult<()> {
        let cf = Self::cf(db, cf)?;
        if events.is_empty() {
            db.delete_cf(cf, key.as_bytes()).map_err(backend)
        } else {
            db.put_cf(cf, key.as_bytes(), serde_json::to_vec(events)?)
                .map_err(backend)
        }
    }

    fn clear_family(db: &DB, name: &str) -> StorageResult<()> {
        let cf = Self::cf(db, name)?;
        let mut batch = WriteBatch::default();
        for item in db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item.map_err(backend)?;
            batch.delete_cf(cf, key);
        }
        db.write(batch).map_err(backend)
    }
}

#[async_trait]
impl EventStore for RocksDbEventStore {
    async fn add_event(&self, did: &str, event: Event) -> StorageResult<()> {
        let db = self.db.write();
        let mut events = Self::read_list(&db, CF_EVENTS, did)?;
        events.push(event);
        Self::write_list(&db, CF_EVENTS, did, &events)
    }

    async fn get_events(&self, did: &str) -> StorageResult<Vec<Event>> {
        Self::read_list(&self.db.read(), CF_EVENTS, did)
    }

    async fn set_events(&self, did: &str, events: Vec<Event>) -> StorageResult<()> {
        Self::write_list(&self.db.write(), CF_EVENTS, did, &events)
    }

    async fn delete_events(&self, did: &str) -> StorageResult<()> {
        let db = self.db.write();
        db.delete_cf(Self::cf(&db, CF_EVENTS)?, did.as_bytes())
            .map_err(backend)
    }

    async fn get_all_keys(&self) -> StorageResult<Vec<String>> {
        let db = self.db.read();
        let cf = Self::cf(&db, CF_EVENTS)?;
        let mut keys = Vec::new();
        for item in db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item.map_err(backend)?;
            keys.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(keys)
    }

    async fn reset_db(&self) -> StorageResult<()> {
        let db = self.db.write();
        for name in COLUMN_FAMILIES {
            Self::clear_family(&db, name)?;
        }
        Ok(())
    }

    async fn queue_event(&self, registry: &str, event: Event) -> StorageResult<usize> {
        let db = self.db.write();
        let mut queue = Self::read_list(&db, CF_QUEUE, registry)?;
        queue.push(event);
        Self::write_list(&db, CF_QUEUE, registry, &queue)?;
        Ok(queue.len())
    }

    async fn get_queue(&self, registry: &str) -> StorageResult<Vec<Event>> {
        Self::read_list(&self.db.read(), CF_QUEUE, registry)
    }

    async fn clear_queue(&self, registry: &str, events: &[Event]) -> StorageResult<()> {
        let db = self.db.write();
        let done: Vec<&str> = events.iter().filter_map(|e| e.signature_value()).collect();
        let mut queue = Self::read_list(&db, CF_QUEUE, registry)?;
        queue.retain(|e| e.signature_value().map_or(true, |v| !done.contains(&v)));
        Self::write_list(&db, CF_QUEUE, registry, &queue)
    }

    async fn add_block(&self, registry: &str, block: BlockInfo) -> StorageResult<()> {
        let db = self.db.write();
        let key = block_key(registry, block.height);
        db.put_cf(Self::cf(&db, CF_BLOCKS)?, key, serde_json::to_vec(&block)?)
            .map_err(backend)
    }

    async fn get_block(&self, registry: &str, id: Option<&BlockId>) -> StorageResult<Option<BlockInfo>> {
        let db = self.db.read();
        let cf = Self::cf(&db, CF_BLOCKS)?;
        let prefix = block_prefix(registry);

        match id {
            Some(BlockId::Height(height)) => match db
                .get_cf(cf, block_key(registry, *height))
                .map_err(backend)?
            {
                Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
                None => Ok(None),
            },
            None => {
                let end = block_key(registry, u64::MAX);
                let mut iter = db.iterator_cf(cf, IteratorMode::From(&end, Direction::Reverse));
                match iter.next() {
                    Some(item) => {
                        let (key, value) = item.map_err(backend)?;
                        if key.starts_with(&prefix) {
                            Ok(Some(serde_json::from_slice(&value)?))
                        } else {
                            Ok(None)
                        }
                    }
                    None => Ok(None),
                }
            }
            Some(BlockId::Hash(hash)) => {
                for item in db.iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward)) {
                    let (key, value) = item.map_err(backend)?;
                    if !key.starts_with(&prefix) {
                        break;
                    }
                    let block: BlockInfo = serde_json::from_slice(&value)?;
                    if &block.hash == hash {
                        return Ok(Some(block));
                    }
                }
                Ok(None)
            }
        }
    }
}
