//! Driven Ports (SPI - Outbound)
//!
//! The gatekeeper treats its backend as a key-value store keyed by DID. All
//! history mutation is "read full list, compute new list, write full list";
//! the per-DID locks in the service make that safe without backend
//! transactions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_types::{BlockId, BlockInfo, Event};

use crate::error::StorageResult;

/// Event store: per-DID histories, per-registry queues, per-registry blocks.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append one event to a DID's history.
    async fn add_event(&self, did: &str, event: Event) -> StorageResult<()>;

    /// A DID's history in storage order. Empty if unknown.
    async fn get_events(&self, did: &str) -> StorageResult<Vec<Event>>;

    /// Replace a DID's history.
    async fn set_events(&self, did: &str, events: Vec<Event>) -> StorageResult<()>;

    async fn delete_events(&self, did: &str) -> StorageResult<()>;

    /// Every DID with a stored history.
    async fn get_all_keys(&self) -> StorageResult<Vec<String>>;

    /// Every stored history, keyed by DID.
    async fn get_all_events(&self) -> StorageResult<Vec<(String, Vec<Event>)>> {
        let mut all = Vec::new();
        for did in self.get_all_keys().await? {
            let events = self.get_events(&did).await?;
            all.push((did, events));
        }
        Ok(all)
    }

    /// Drop histories, queues and blocks.
    async fn reset_db(&self) -> StorageResult<()>;

    /// Append to a registry's anchoring queue, returning the new length.
    async fn queue_event(&self, registry: &str, event: Event) -> StorageResult<usize>;

    async fn get_queue(&self, registry: &str) -> StorageResult<Vec<Event>>;

    /// Remove queued events whose signature value matches one in `events`.
    async fn clear_queue(&self, registry: &str, events: &[Event]) -> StorageResult<()>;

    async fn add_block(&self, registry: &str, block: BlockInfo) -> StorageResult<()>;

    /// A recorded block, or the highest one when `id` is `None`.
    async fn get_block(&self, registry: &str, id: Option<&BlockId>) -> StorageResult<Option<BlockInfo>>;
}

/// Content-addressable blob store.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store bytes, returning their CID.
    async fn add(&self, data: Vec<u8>) -> StorageResult<String>;

    async fn get(&self, cid: &str) -> StorageResult<Option<Vec<u8>>>;
}

/// Time source abstraction for testability.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Default system time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests.
#[cfg(any(test, feature = "test-utils"))]
pub struct ManualTimeSource {
    time: parking_lot::Mutex<DateTime<Utc>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl ManualTimeSource {
    pub fn new(initial: DateTime<Utc>) -> Self {
        Self {
            time: parking_lot::Mutex::new(initial),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut time = self.time.lock();
        *time += by;
    }

    pub fn set(&self, time: DateTime<Utc>) {
        *self.time.lock() = time;
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl TimeSource for ManualTimeSource {
    fn now(&self) -> DateTime<Utc> {
        *self.time.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_time_source() {
        let now = SystemTimeSource.now();
        // after Jan 1, 2020
        assert!(now.timestamp() > 1_577_836_800);
    }

    #[test]
    fn test_manual_time_source() {
        let start = Utc::now();
        let clock = ManualTimeSource::new(start);
        clock.advance(chrono::Duration::seconds(90));
        assert_eq!(clock.now() - start, chrono::Duration::seconds(90));
    }
}
