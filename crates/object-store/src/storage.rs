use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageError;

/// A listed blob: its full key and size. Deliberately thin — the adapter
/// does not surface provider-specific metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    pub name: String,
    pub size: u64,
}

/// Object storage abstraction bound to a single bucket. Each fetch worker
/// and aggregator instance owns its own `Storage`; there is no shared
/// client across threads.
#[async_trait]
pub trait Storage: Send + Sync {
    /// List blobs whose key starts with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<BlobRef>, StorageError>;

    /// Read a blob's full contents.
    async fn get(&self, name: &str) -> Result<Bytes, StorageError>;

    /// Write a blob, replacing any existing object at `name`. `timeout`
    /// bounds a single attempt; retry policy lives in the caller.
    async fn put(&self, name: &str, data: Bytes, timeout: Option<Duration>) -> Result<(), StorageError>;

    /// Whether a blob exists at `name`.
    async fn exists(&self, name: &str) -> Result<bool, StorageError>;

    /// Delete a blob. Deleting a missing key is not an error.
    async fn delete(&self, name: &str) -> Result<(), StorageError>;
}
