//! In-memory event store for tests and ephemeral nodes.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_types::{BlockId, BlockInfo, Event};

use crate::error::StorageResult;
use crate::ports::outbound::EventStore;

/// The whole ledger as plain collections. Shared by the memory and JSON
/// file backends; the latter persists it as one document.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(crate) struct LedgerData {
    #[serde(default)]
    pub dids: BTreeMap<String, Vec<Event>>,
    #[serde(default)]
    pub queue: BTreeMap<String, Vec<Event>>,
    #[serde(default)]
    pub blocks: BTreeMap<String, BTreeMap<u64, BlockInfo>>,
}

impl LedgerData {
    pub fn add_event(&mut self, did: &str, event: Event) {
        self.dids.entry(did.to_string()).or_default().push(event);
    }

    pub fn get_events(&self, did: &str) -> Vec<Event> {
        self.dids.get(did).cloned().unwrap_or_default()
    }

    pub fn set_events(&mut self, did: &str, events: Vec<Event>) {
        if events.is_empty() {
            self.dids.remove(did);
        } else {
            self.dids.insert(did.to_string(), events);
        }
    }

    pub fn delete_events(&mut self, did: &str) {
        self.dids.remove(did);
    }

    pub fn keys(&self) -> Vec<String> {
        self.dids.keys().cloned().collect()
    }

    pub fn queue_event(&mut self, registry: &str, event: Event) -> usize {
        let queue = self.queue.entry(registry.to_string()).or_default();
        queue.push(event);
        queue.len()
    }

    pub fn get_queue(&self, registry: &str) -> Vec<Event> {
        self.queue.get(registry).cloned().unwrap_or_default()
    }

    pub fn clear_queue(&mut self, registry: &str, events: &[Event]) {
        let done: HashSet<&str> = events.iter().filter_map(|e| e.signature_value()).collect();
        if let Some(queue) = self.queue.get_mut(registry) {
            queue.retain(|e| e.signature_value().map_or(true, |v| !done.contains(v)));
        }
    }

    pub fn add_block(&mut self, registry: &str, block: BlockInfo) {
        self.blocks
            .entry(registry.to_string())
            .or_default()
            .insert(block.height, block);
    }

    pub fn get_block(&self, registry: &str, id: Option<&BlockId>) -> Option<BlockInfo> {
        let chain = self.blocks.get(registry)?;
        match id {
            None => chain.values().next_back().cloned(),
            Some(BlockId::Height(height)) => chain.get(height).cloned(),
            Some(BlockId::Hash(hash)) => chain.values().find(|b| &b.hash == hash).cloned(),
        }
    }
}

/// In-memory event store.
#[derive(Default)]
pub struct InMemoryEventStore {
    data: RwLock<LedgerData>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn add_event(&self, did: &str, event: Event) -> StorageResult<()> {
        self.data.write().add_event(did, event);
        Ok(())
    }

    async fn get_events(&self, did: &str) -> StorageResult<Vec<Event>> {
        Ok(self.data.read().get_events(did))
    }

    async fn set_events(&self, did: &str, events: Vec<Event>) -> StorageResult<()> {
        self.data.write().set_events(did, events);
        Ok(())
    }

    async fn delete_events(&self, did: &str) -> StorageResult<()> {
        self.data.write().delete_events(did);
        Ok(())
    }

    async fn get_all_keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.data.read().keys())
    }

    async fn get_all_events(&self) -> StorageResult<Vec<(String, Vec<Event>)>> {
        Ok(self
            .data
            .read()
            .dids
            .iter()
            .map(|(did, events)| (did.clone(), events.clone()))
            .collect())
    }

    async fn reset_db(&self) -> StorageResult<()> {
        *self.data.write() = LedgerData::default();
        Ok(())
    }

    async fn queue_event(&self, registry: &str, event: Event) -> StorageResult<usize> {
        Ok(self.data.write().queue_event(registry, event))
    }

    async fn get_queue(&self, registry: &str) -> StorageResult<Vec<Event>> {
        Ok(self.data.read().get_queue(registry))
    }

    async fn clear_queue(&self, registry: &str, events: &[Event]) -> StorageResult<()> {
        self.data.write().clear_queue(registry, events);
        Ok(())
    }

    async fn add_block(&self, registry: &str, block: BlockInfo) -> StorageResult<()> {
        self.data.write().add_block(registry, block);
        Ok(())
    }

    async fn get_block(&self, registry: &str, id: Option<&BlockId>) -> StorageResult<Option<BlockInfo>> {
        Ok(self.data.read().get_block(registry, id))
    }
}
