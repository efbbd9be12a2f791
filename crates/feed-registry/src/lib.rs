//! transit-feed-registry: feed configuration types and the registry that
//! loads, validates, and expands them into per-fetch page tuples.

pub mod error;
pub mod feed;
pub mod registry;

pub use error::FeedRegistryError;
pub use feed::{FeedConfig, FeedType, GtfsScheduleFileType, KeyValue, KeyValues};
pub use registry::FeedRegistry;
