use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::storage::{BlobRef, Storage};

/// An in-process `Storage` backed by a map. Used by tests and by `dry`
/// invocations that never need a real bucket.
pub struct InMemoryStorage {
    data: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn list(&self, prefix: &str) -> Result<Vec<BlobRef>, StorageError> {
        let store = self.data.read().await;
        Ok(store
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| BlobRef {
                name: k.clone(),
                size: v.len() as u64,
            })
            .collect())
    }

    async fn get(&self, name: &str) -> Result<Bytes, StorageError> {
        let store = self.data.read().await;
        store
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn put(&self, name: &str, data: Bytes, _timeout: Option<Duration>) -> Result<(), StorageError> {
        let mut store = self.data.write().await;
        store.insert(name.to_string(), data);
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        let store = self.data.read().await;
        Ok(store.contains_key(name))
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let mut store = self.data.write().await;
        store.remove(name);
        Ok(())
    }
}
