//! transit-aggregator: the hourly parser/aggregator (§4.G). Given a
//! `(feed_type, hour)` partition, lists raw objects, groups them by URL
//! fingerprint, decodes each via `transit-decoders`, and writes one gzip
//! JSONL object per sub-table plus an outcomes ledger.

pub mod aggregate;
pub mod error;

pub use aggregate::{aggregate_hour, aggregate_hour_with_options, AggregateOptions, DEFAULT_CONCURRENCY};
pub use error::AggregatorError;
