//! transit-object-store: the `Storage` trait plus GCS/S3-backed, in-memory,
//! and retrying implementations.

pub mod error;
pub mod gcs;
pub mod memory;
pub mod retry;
pub mod storage;

pub use error::StorageError;
pub use gcs::ObjectStoreBackend;
pub use memory::InMemoryStorage;
pub use retry::RetryingStorage;
pub use storage::{BlobRef, Storage};
