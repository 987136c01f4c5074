//! In-memory content-addressable store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_crypto::generate_raw_cid;

use crate::error::StorageResult;
use crate::ports::outbound::ContentStore;

#[derive(Default)]
pub struct InMemoryContentStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn add(&self, data: Vec<u8>) -> StorageResult<String> {
        let cid = generate_raw_cid(&data);
        self.blobs.write().entry(cid.clone()).or_insert(data);
        Ok(cid)
    }

    async fn get(&self, cid: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.blobs.read().get(cid).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_is_content_addressed() {
        let store = InMemoryContentStore::new();
        let a = store.add(b"hello".to_vec()).await.unwrap();
        let b = store.add(b"hello".to_vec()).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&a).await.unwrap(), Some(b"hello".to_vec()));
        assert_eq!(store.get("zMissing").await.unwrap(), None);
    }
}
