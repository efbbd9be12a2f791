//! transit-keying: canonical storage keys and URL fingerprints derived from
//! a feed config + timestamp + page triple, plus the data model types that
//! carry them through the pipeline.

pub mod error;
pub mod keys;
pub mod model;

pub use error::KeyingError;
pub use keys::{agg_key, fingerprint, outcomes_key, raw_hour_prefix, raw_key};
pub use model::{
    FeedTypeHourParseOutcomes, HourAgg, ParseOutcome, ParseOutcomeMetadata, ParsedRecord,
    ParsedRecordMetadata, RawFetchedFile, Table,
};
