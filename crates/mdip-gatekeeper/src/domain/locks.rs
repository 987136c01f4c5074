//! Concurrency primitives owned by a gatekeeper instance.
//!
//! - [`DidLocks`]: one async mutex per DID, created on demand and dropped when
//!   the last holder or waiter goes away. Writers to different DIDs never
//!   contend.
//! - [`BusyFlag`]: non-blocking re-entry guard for whole-store sweeps.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct DidLocks {
    table: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl DidLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `did`.
    pub async fn lock(&self, did: &str) -> DidLockGuard<'_> {
        let entry = {
            let mut table = self.table.lock();
            table
                .entry(did.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let guard = entry.lock_owned().await;
        DidLockGuard {
            locks: self,
            did: did.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of DIDs with a live lock entry.
    pub fn active(&self) -> usize {
        self.table.lock().len()
    }
}

pub struct DidLockGuard<'a> {
    locks: &'a DidLocks,
    did: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for DidLockGuard<'_> {
    fn drop(&mut self) {
        let mut table = self.locks.table.lock();
        // release first so the strong count reflects only the table and waiters
        self.guard.take();
        if let Some(entry) = table.get(&self.did) {
            if Arc::strong_count(entry) == 1 {
                table.remove(&self.did);
            }
        }
    }
}

/// Re-entry guard: a second acquisition fails instead of waiting.
#[derive(Default)]
pub struct BusyFlag {
    busy: AtomicBool,
}

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard { flag: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

pub struct BusyGuard<'a> {
    flag: &'a BusyFlag,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_did_is_serialized() {
        let locks = Arc::new(DidLocks::new());
        let counter = Arc::new(Mutex::new(Vec::new()));

        let guard = locks.lock("did:test:a").await;
        let waiter = {
            let locks = locks.clone();
            let counter = counter.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("did:test:a").await;
                counter.lock().push("second");
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        counter.lock().push("first");
        drop(guard);
        waiter.await.unwrap();

        assert_eq!(*counter.lock(), vec!["first", "second"]);
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_distinct_dids_do_not_block() {
        let locks = DidLocks::new();
        let _a = locks.lock("did:test:a").await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.lock("did:test:b")).await;
        assert!(b.is_ok());
        assert_eq!(locks.active(), 2);
    }

    #[test]
    fn test_busy_flag() {
        let flag = BusyFlag::new();
        let guard = flag.try_acquire();
        assert!(guard.is_some());
        assert!(flag.is_busy());
        assert!(flag.try_acquire().is_none());
        drop(guard);
        assert!(!flag.is_busy());
        assert!(flag.try_acquire().is_some());
    }
}
