use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use transit_feed_registry::{FeedConfig, GtfsScheduleFileType, FeedType, KeyValue};

use crate::error::KeyingError;
use crate::keys;

mod base64_bytes {
    use super::{BASE64_STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&BASE64_STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        BASE64_STANDARD
            .decode(s.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// One raw HTTP response captured for a single fetch task. Exactly one of
/// `contents`/`exception` is set; enforced by the constructors, not serde.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFetchedFile {
    pub ts: DateTime<Utc>,
    pub config: FeedConfig,
    pub page: Vec<KeyValue>,
    pub response_code: u16,
    pub response_headers: HashMap<String, String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "base64_bytes_option"
    )]
    pub contents: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

mod base64_bytes_option {
    use super::base64_bytes;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Vec<u8>>, ser: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(bytes) => base64_bytes::serialize(bytes, ser),
            None => unreachable!("skip_serializing_if filters None"),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Vec<u8>>, D::Error> {
        base64_bytes::deserialize(de).map(Some)
    }
}

impl RawFetchedFile {
    pub fn success(
        ts: DateTime<Utc>,
        config: FeedConfig,
        page: Vec<KeyValue>,
        response_code: u16,
        response_headers: HashMap<String, String>,
        contents: Vec<u8>,
    ) -> Self {
        Self {
            ts: keys::truncate_to_second(ts),
            config,
            page,
            response_code,
            response_headers,
            contents: Some(contents),
            exception: None,
        }
    }

    pub fn failure(
        ts: DateTime<Utc>,
        config: FeedConfig,
        page: Vec<KeyValue>,
        response_code: u16,
        response_headers: HashMap<String, String>,
        exception: String,
    ) -> Self {
        Self {
            ts: keys::truncate_to_second(ts),
            config,
            page,
            response_code,
            response_headers,
            contents: None,
            exception: Some(exception),
        }
    }

    pub fn dt(&self) -> String {
        keys::format_date(self.ts)
    }

    pub fn hour(&self) -> DateTime<Utc> {
        keys::truncate_to_hour(self.ts)
    }

    pub fn base64url(&self) -> Result<String, KeyingError> {
        keys::fingerprint(&self.config)
    }

    pub fn table(&self) -> &'static str {
        self.config.feed_type.value()
    }

    pub fn gcs_key(&self) -> Result<String, KeyingError> {
        keys::raw_key(&self.config, self.ts, &self.page)
    }

    /// A copy of this envelope with `contents` dropped, as embedded in
    /// `ParsedRecord`/`ParseOutcome`.
    pub fn without_contents(&self) -> Self {
        Self {
            ts: self.ts,
            config: self.config.clone(),
            page: self.page.clone(),
            response_code: self.response_code,
            response_headers: self.response_headers.clone(),
            contents: None,
            exception: self.exception.clone(),
        }
    }
}

/// Either a `FeedType` or a `GtfsScheduleFileType`; the partition a `HourAgg`
/// belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Feed(FeedType),
    GtfsFile(GtfsScheduleFileType),
}

impl Table {
    pub fn partition_name(&self) -> String {
        match self {
            Table::Feed(ft) => ft.value().to_string(),
            Table::GtfsFile(gf) => gf.table_name(),
        }
    }
}

/// One hourly aggregate output: all decoded records for one table, one hour,
/// one fingerprint group.
#[derive(Debug, Clone)]
pub struct HourAgg {
    pub table: Table,
    pub base64url: String,
    pub hour: DateTime<Utc>,
}

impl HourAgg {
    pub fn new(table: Table, base64url: impl Into<String>, hour: DateTime<Utc>) -> Self {
        Self {
            table,
            base64url: base64url.into(),
            hour: keys::truncate_to_hour(hour),
        }
    }

    pub fn dt(&self) -> String {
        keys::format_date(self.hour)
    }

    pub fn filename(&self) -> String {
        format!("{}.jsonl.gz", self.base64url)
    }

    pub fn gcs_key(&self) -> String {
        keys::agg_key(&self.table.partition_name(), &self.base64url, self.hour)
    }
}

/// One decoded record, positioned within its source blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedRecordMetadata {
    pub line_number: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedRecord {
    pub file: RawFetchedFile,
    pub record: serde_json::Value,
    pub metadata: ParsedRecordMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseOutcomeMetadata {
    /// Hex MD5 of the concatenation of per-sub-file content digests, in
    /// emit order.
    pub hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub file: RawFetchedFile,
    pub metadata: ParseOutcomeMetadata,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

impl ParseOutcome {
    pub fn ok(file: RawFetchedFile, hash: String) -> Self {
        Self {
            file: file.without_contents(),
            metadata: ParseOutcomeMetadata { hash },
            success: true,
            exception: None,
        }
    }

    pub fn failed(file: RawFetchedFile, hash: String, exception: String) -> Self {
        Self {
            file: file.without_contents(),
            metadata: ParseOutcomeMetadata { hash },
            success: false,
            exception: Some(exception),
        }
    }
}

/// The outcomes ledger for one `(feed_type, hour)` partition: where it's
/// written and the outcomes it accumulates.
#[derive(Debug, Clone)]
pub struct FeedTypeHourParseOutcomes {
    pub feed_type: FeedType,
    pub hour: DateTime<Utc>,
    pub outcomes: Vec<ParseOutcome>,
}

impl FeedTypeHourParseOutcomes {
    pub fn new(feed_type: FeedType, hour: DateTime<Utc>) -> Self {
        Self {
            feed_type,
            hour: keys::truncate_to_hour(hour),
            outcomes: Vec::new(),
        }
    }

    pub fn gcs_key(&self) -> String {
        keys::outcomes_key(self.feed_type.value(), self.hour)
    }

    /// Render as newline-delimited JSON, one outcome per line.
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        for outcome in &self.outcomes {
            out.push_str(&serde_json::to_string(outcome)?);
            out.push('\n');
        }
        Ok(out)
    }
}
