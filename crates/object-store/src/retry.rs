use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use exponential_backoff::Backoff;

use crate::error::StorageError;
use crate::storage::{BlobRef, Storage};

const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(100);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Wraps any `Storage` and retries `put` with truncated exponential backoff
/// on transient error classes. Reads pass through unretried — a missing or
/// malformed read is never recoverable by waiting.
pub struct RetryingStorage<S> {
    inner: S,
    max_retries: u32,
    min_delay: Duration,
    max_delay: Duration,
}

impl<S: Storage> RetryingStorage<S> {
    pub fn new(inner: S, max_retries: u32) -> Self {
        Self {
            inner,
            max_retries,
            min_delay: DEFAULT_MIN_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    pub fn with_delays(inner: S, max_retries: u32, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            min_delay,
            max_delay,
        }
    }
}

#[async_trait]
impl<S: Storage> Storage for RetryingStorage<S> {
    async fn list(&self, prefix: &str) -> Result<Vec<BlobRef>, StorageError> {
        self.inner.list(prefix).await
    }

    async fn get(&self, name: &str) -> Result<Bytes, StorageError> {
        self.inner.get(name).await
    }

    async fn put(
        &self,
        name: &str,
        data: Bytes,
        timeout: Option<Duration>,
    ) -> Result<(), StorageError> {
        let backoff = Backoff::new(self.max_retries, self.min_delay, self.max_delay);
        let mut attempt = 0u32;
        let mut last_err: Option<StorageError> = None;
        for duration in &backoff {
            attempt += 1;
            match self.inner.put(name, data.clone(), timeout).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() => {
                    last_err = Some(e);
                    match duration {
                        Some(d) => tokio::time::sleep(d).await,
                        None => break,
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(StorageError::RetriesExhausted {
            attempts: attempt,
            source: Box::new(last_err.expect("loop always runs at least once")),
        })
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        self.inner.exists(name).await
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        self.inner.delete(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyStorage {
        inner: crate::memory::InMemoryStorage,
        fail_until_attempt: u32,
        attempts: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Storage for FlakyStorage {
        async fn list(&self, prefix: &str) -> Result<Vec<BlobRef>, StorageError> {
            self.inner.list(prefix).await
        }
        async fn get(&self, name: &str) -> Result<Bytes, StorageError> {
            self.inner.get(name).await
        }
        async fn put(&self, name: &str, data: Bytes, timeout: Option<Duration>) -> Result<(), StorageError> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if n < self.fail_until_attempt {
                return Err(StorageError::WriteFailed("503 service unavailable".to_string()));
            }
            self.inner.put(name, data, timeout).await
        }
        async fn exists(&self, name: &str) -> Result<bool, StorageError> {
            self.inner.exists(name).await
        }
        async fn delete(&self, name: &str) -> Result<(), StorageError> {
            self.inner.delete(name).await
        }
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let attempts = Arc::new(AtomicU32::new(0));
        let flaky = FlakyStorage {
            inner: crate::memory::InMemoryStorage::new(),
            fail_until_attempt: 3,
            attempts: attempts.clone(),
        };
        let retrying = RetryingStorage::with_delays(
            flaky,
            5,
            Duration::from_millis(1),
            Duration::from_millis(5),
        );
        retrying.put("k", Bytes::from("v"), None).await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn surfaces_terminal_failure_after_exhausting_retries() {
        let attempts = Arc::new(AtomicU32::new(0));
        let flaky = FlakyStorage {
            inner: crate::memory::InMemoryStorage::new(),
            fail_until_attempt: 100,
            attempts: attempts.clone(),
        };
        let retrying = RetryingStorage::with_delays(
            flaky,
            2,
            Duration::from_millis(1),
            Duration::from_millis(5),
        );
        let err = retrying.put("k", Bytes::from("v"), None).await.unwrap_err();
        assert!(matches!(err, StorageError::RetriesExhausted { .. }));
    }

    #[tokio::test]
    async fn does_not_retry_permanent_failures() {
        struct AlwaysNotFound;
        #[async_trait]
        impl Storage for AlwaysNotFound {
            async fn list(&self, _prefix: &str) -> Result<Vec<BlobRef>, StorageError> {
                Ok(vec![])
            }
            async fn get(&self, name: &str) -> Result<Bytes, StorageError> {
                Err(StorageError::NotFound(name.to_string()))
            }
            async fn put(&self, _name: &str, _data: Bytes, _timeout: Option<Duration>) -> Result<(), StorageError> {
                Err(StorageError::NotFound("permanent".to_string()))
            }
            async fn exists(&self, _name: &str) -> Result<bool, StorageError> {
                Ok(false)
            }
            async fn delete(&self, _name: &str) -> Result<(), StorageError> {
                Ok(())
            }
        }
        let retrying = RetryingStorage::new(AlwaysNotFound, 5);
        let err = retrying.put("k", Bytes::from("v"), None).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
