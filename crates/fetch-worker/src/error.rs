use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("transient fetch failure for {url}: {reason}")]
    Transient { url: String, reason: String },
    #[error("permanent fetch failure for {url}: status {status}")]
    Permanent { url: String, status: u16 },
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error(transparent)]
    Keying(#[from] transit_keying::KeyingError),
    #[error(transparent)]
    Storage(#[from] transit_object_store::StorageError),
    #[error(transparent)]
    Registry(#[from] transit_feed_registry::FeedRegistryError),
}

impl FetchError {
    /// Whether the broker should retry this task (§7 FetchTransient) or
    /// fail it outright (FetchPermanent).
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}
