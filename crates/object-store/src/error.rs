use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("write failed: {0}")]
    WriteFailed(String),
    #[error("read failed: {0}")]
    ReadFailed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<StorageError>,
    },
}

impl StorageError {
    /// Whether this error class is worth retrying: rate limiting, service
    /// unavailability, or a permission error that may just not have
    /// propagated yet. Everything else (not-found, malformed request) is
    /// permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::WriteFailed(msg) | StorageError::ReadFailed(msg) => {
                let lower = msg.to_lowercase();
                lower.contains("rate limit")
                    || lower.contains("429")
                    || lower.contains("503")
                    || lower.contains("unavailable")
                    || lower.contains("forbidden")
                    || lower.contains("403")
            }
            StorageError::Timeout(_) => true,
            StorageError::Io(_) => true,
            _ => false,
        }
    }
}
