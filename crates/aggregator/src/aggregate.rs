use std::collections::HashMap;
use std::io::Write as _;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use futures_util::stream::{self, StreamExt};

use transit_decoders::{combined_digest_hex, DecoderRegistry};
use transit_feed_registry::FeedType;
use transit_keying::{
    raw_hour_prefix, FeedTypeHourParseOutcomes, HourAgg, ParseOutcome, ParsedRecord,
    ParsedRecordMetadata, RawFetchedFile, Table,
};
use transit_object_store::{BlobRef, Storage};

use crate::error::AggregatorError;

/// Per-blob/per-write timeout (§5: "the aggregator honors a per-blob and
/// per-write timeout (default 60 seconds)").
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default aggregator worker-pool size (§5.3: "a worker pool per CLI
/// invocation (default 8)").
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Tunables for one `aggregate_hour` run, exposed on the `parse day` CLI as
/// `--workers`, `--base64url`, and `--timeout`.
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub concurrency: usize,
    /// Restrict the run to a single fingerprint group, skipping the rest.
    pub base64url_filter: Option<String>,
    pub timeout: Duration,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            base64url_filter: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

fn base64url_segment(key: &str) -> Option<&str> {
    key.split('/').find_map(|seg| seg.strip_prefix("base64url="))
}

/// Group listed blobs by the `base64url=` path segment (the URL
/// fingerprint). Within a group, blobs are kept in lexicographic name order,
/// which §4.G notes is also temporal order.
fn group_by_fingerprint(mut blobs: Vec<BlobRef>) -> Vec<(String, Vec<BlobRef>)> {
    blobs.sort_by(|a, b| a.name.cmp(&b.name));
    let mut groups: HashMap<String, Vec<BlobRef>> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for blob in blobs {
        let Some(fp) = base64url_segment(&blob.name) else {
            tracing::warn!(key = %blob.name, "raw blob key missing base64url segment, skipping");
            continue;
        };
        if !groups.contains_key(fp) {
            order.push(fp.to_string());
        }
        groups.entry(fp.to_string()).or_default().push(blob);
    }
    order
        .into_iter()
        .map(|fp| {
            let blobs = groups.remove(&fp).expect("fp was just inserted into order");
            (fp, blobs)
        })
        .collect()
}

/// The result of processing one fingerprint group: decoded records per
/// sub-table, plus one ParseOutcome per blob in the group.
struct GroupResult {
    records_by_table: HashMap<Table, Vec<ParsedRecord>>,
    outcomes: Vec<ParseOutcome>,
}

async fn process_blob(
    storage: &dyn Storage,
    decoders: &DecoderRegistry,
    feed_type: FeedType,
    blob: &BlobRef,
    records_by_table: &mut HashMap<Table, Vec<ParsedRecord>>,
) -> Result<ParseOutcome, AggregatorError> {
    let body = storage.get(&blob.name).await?;
    let raw: RawFetchedFile = serde_json::from_slice(&body).map_err(|e| AggregatorError::Envelope {
        key: blob.name.clone(),
        source: e,
    })?;

    let Some(contents) = raw.contents.clone() else {
        let exception = raw.exception.clone().unwrap_or_else(|| "no contents captured".to_string());
        return Ok(ParseOutcome::failed(raw, String::new(), exception));
    };

    match decoders.decode(feed_type, &contents) {
        Ok(groups) => {
            let hash = combined_digest_hex(groups.iter().map(|g| g.digest));
            let stripped = raw.without_contents();
            for group in groups {
                let entries = records_by_table.entry(group.sub_table).or_default();
                for (line_number, record) in group.records.into_iter().enumerate() {
                    entries.push(ParsedRecord {
                        file: stripped.clone(),
                        record,
                        metadata: ParsedRecordMetadata { line_number },
                    });
                }
            }
            Ok(ParseOutcome::ok(raw, hash))
        }
        Err(err) => {
            tracing::warn!(key = %blob.name, error = %err, "decoder error, recording failed outcome");
            Ok(ParseOutcome::failed(raw, String::new(), err.to_string()))
        }
    }
}

/// Process one fingerprint group: download and decode each blob in
/// lexicographic order. A decoder failure on one blob is recorded as a
/// failed outcome and does not abort the group (§4.G failure semantics);
/// an object-store error propagates and aborts the group.
async fn process_group(
    storage: &dyn Storage,
    decoders: &DecoderRegistry,
    feed_type: FeedType,
    blobs: Vec<BlobRef>,
) -> Result<GroupResult, AggregatorError> {
    let mut records_by_table: HashMap<Table, Vec<ParsedRecord>> = HashMap::new();
    let mut outcomes = Vec::with_capacity(blobs.len());
    for blob in &blobs {
        let outcome = process_blob(storage, decoders, feed_type, blob, &mut records_by_table).await?;
        outcomes.push(outcome);
    }
    Ok(GroupResult {
        records_by_table,
        outcomes,
    })
}

fn gzip_jsonl(records: &[ParsedRecord]) -> Result<Vec<u8>, AggregatorError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    for record in records {
        serde_json::to_writer(&mut encoder, &record.record)?;
        encoder.write_all(b"\n")?;
    }
    Ok(encoder.finish()?)
}

async fn write_group_output(
    storage: &dyn Storage,
    hour: DateTime<Utc>,
    base64url: &str,
    result: &GroupResult,
    timeout: Duration,
) -> Result<(), AggregatorError> {
    for (table, records) in &result.records_by_table {
        let agg = HourAgg::new(*table, base64url, hour);
        let body = gzip_jsonl(records)?;
        storage.put(&agg.gcs_key(), Bytes::from(body), Some(timeout)).await?;
    }
    Ok(())
}

/// Run the hourly aggregator (§4.G) for one `(feed_type, hour)` partition:
/// list raw objects, group by fingerprint, decode and write each group
/// concurrently across `concurrency` workers, then write the outcomes
/// ledger. Returns the ledger that was written.
pub async fn aggregate_hour(
    storage: &dyn Storage,
    decoders: &DecoderRegistry,
    feed_type: FeedType,
    hour: DateTime<Utc>,
    concurrency: usize,
) -> Result<FeedTypeHourParseOutcomes, AggregatorError> {
    aggregate_hour_with_options(
        storage,
        decoders,
        feed_type,
        hour,
        AggregateOptions {
            concurrency,
            ..Default::default()
        },
    )
    .await
}

/// `aggregate_hour` with full control over concurrency, fingerprint-group
/// filtering, and the per-blob/per-write timeout — the knobs `parse day`
/// exposes as `--workers`/`--base64url`/`--timeout`.
pub async fn aggregate_hour_with_options(
    storage: &dyn Storage,
    decoders: &DecoderRegistry,
    feed_type: FeedType,
    hour: DateTime<Utc>,
    opts: AggregateOptions,
) -> Result<FeedTypeHourParseOutcomes, AggregatorError> {
    let prefix = raw_hour_prefix(feed_type.value(), hour);
    let blobs = storage.list(&prefix).await?;
    let mut groups = group_by_fingerprint(blobs);
    if let Some(filter) = &opts.base64url_filter {
        groups.retain(|(fp, _)| fp == filter);
    }

    tracing::info!(feed_type = feed_type.value(), %hour, groups = groups.len(), "aggregating hour");

    let results: Vec<Result<(String, GroupResult), AggregatorError>> = stream::iter(groups)
        .map(|(base64url, blobs)| async move {
            let result = process_group(storage, decoders, feed_type, blobs).await?;
            Ok((base64url, result))
        })
        .buffer_unordered(opts.concurrency.max(1))
        .collect()
        .await;

    let mut ledger = FeedTypeHourParseOutcomes::new(feed_type, hour);
    for item in results {
        let (base64url, result) = match item {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!(feed_type = feed_type.value(), %hour, error = %err, "group aborted: failed to read its blobs");
                continue;
            }
        };
        if let Err(err) = write_group_output(storage, hour, &base64url, &result, opts.timeout).await {
            tracing::warn!(feed_type = feed_type.value(), %hour, base64url = %base64url, error = %err, "group aborted: failed to write aggregate output");
            continue;
        }
        ledger.outcomes.extend(result.outcomes);
    }
    ledger.outcomes.sort_by(|a, b| a.file.gcs_key().ok().cmp(&b.file.gcs_key().ok()));

    let ledger_body = ledger.to_jsonl().map_err(|e| AggregatorError::Envelope {
        key: ledger.gcs_key(),
        source: e,
    })?;
    storage
        .put(&ledger.gcs_key(), Bytes::from(ledger_body), Some(opts.timeout))
        .await?;

    Ok(ledger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use transit_feed_registry::{FeedConfig, KeyValue};
    use transit_keying::raw_key;
    use transit_object_store::memory::InMemoryStorage;

    fn config() -> FeedConfig {
        FeedConfig {
            name: "test".to_string(),
            url: "http://h/f".to_string(),
            feed_type: FeedType::GtfsRtVehiclePositions,
            agency: None,
            description: None,
            schedule_url: None,
            query: vec![],
            headers: vec![],
            pages: vec![],
        }
    }

    async fn seed_raw_artifact(storage: &InMemoryStorage, ts: DateTime<Utc>, page: Vec<KeyValue>, contents: Vec<u8>) -> String {
        let raw = RawFetchedFile::success(ts, config(), page.clone(), 200, HashMap::new(), contents);
        let key = raw_key(&config(), ts, &page).unwrap();
        let body = serde_json::to_vec(&raw).unwrap();
        storage.put(&key, Bytes::from(body), None).await.unwrap();
        key
    }

    fn feed_message_bytes(vehicle_id: &str) -> Vec<u8> {
        use prost::Message;
        use transit_decoders::gtfs_rt_proto::{
            FeedEntity, FeedHeader, FeedMessage, Position, VehicleDescriptor, VehiclePosition,
        };
        let msg = FeedMessage {
            header: Some(FeedHeader {
                gtfs_realtime_version: "2.0".to_string(),
                incrementality: 0,
                timestamp: 1,
            }),
            entity: vec![FeedEntity {
                id: "e1".to_string(),
                is_deleted: false,
                trip_update: None,
                vehicle: Some(VehiclePosition {
                    vehicle: Some(VehicleDescriptor {
                        id: Some(vehicle_id.to_string()),
                        ..Default::default()
                    }),
                    position: Some(Position {
                        latitude: 39.9,
                        longitude: -75.1,
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                alert: None,
            }],
        };
        msg.encode_to_vec()
    }

    #[tokio::test]
    async fn aggregate_hour_groups_by_fingerprint_and_writes_ledger() {
        let storage = InMemoryStorage::new();
        let decoders = DecoderRegistry::new().unwrap();
        let hour = Utc::now();

        seed_raw_artifact(&storage, hour, vec![], feed_message_bytes("bus-1")).await;
        seed_raw_artifact(
            &storage,
            hour + chrono::Duration::minutes(1),
            vec![],
            feed_message_bytes("bus-2"),
        )
        .await;

        let ledger = aggregate_hour(&storage, &decoders, FeedType::GtfsRtVehiclePositions, hour, 4)
            .await
            .unwrap();

        assert_eq!(ledger.outcomes.len(), 2);
        assert!(ledger.outcomes.iter().all(|o| o.success));

        let fp = transit_keying::fingerprint(&config()).unwrap();
        let agg = HourAgg::new(Table::Feed(FeedType::GtfsRtVehiclePositions), &fp, hour);
        assert!(storage.exists(&agg.gcs_key()).await.unwrap());
        assert!(storage.exists(&ledger.gcs_key()).await.unwrap());
    }

    #[tokio::test]
    async fn base64url_filter_restricts_to_one_fingerprint_group() {
        let storage = InMemoryStorage::new();
        let decoders = DecoderRegistry::new().unwrap();
        let hour = Utc::now();

        seed_raw_artifact(&storage, hour, vec![], feed_message_bytes("bus-1")).await;

        let mut other = config();
        other.url = "http://h/other".to_string();
        let raw = RawFetchedFile::success(hour, other.clone(), vec![], 200, HashMap::new(), feed_message_bytes("bus-2"));
        let key = raw_key(&other, hour, &[]).unwrap();
        storage.put(&key, Bytes::from(serde_json::to_vec(&raw).unwrap()), None).await.unwrap();

        let fp = transit_keying::fingerprint(&config()).unwrap();
        let ledger = aggregate_hour_with_options(
            &storage,
            &decoders,
            FeedType::GtfsRtVehiclePositions,
            hour,
            AggregateOptions {
                base64url_filter: Some(fp),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(ledger.outcomes.len(), 1);
    }

    /// A `Storage` wrapping an `InMemoryStorage` that fails every `get` whose
    /// key contains `poison`, to exercise group-abort-on-storage-error
    /// without needing a real flaky backend.
    struct PoisonedStorage {
        inner: InMemoryStorage,
        poison: &'static str,
    }

    #[async_trait::async_trait]
    impl Storage for PoisonedStorage {
        async fn list(&self, prefix: &str) -> Result<Vec<BlobRef>, transit_object_store::StorageError> {
            self.inner.list(prefix).await
        }

        async fn get(&self, name: &str) -> Result<Bytes, transit_object_store::StorageError> {
            if name.contains(self.poison) {
                return Err(transit_object_store::StorageError::ReadFailed("poisoned".to_string()));
            }
            self.inner.get(name).await
        }

        async fn put(&self, name: &str, data: Bytes, timeout: Option<Duration>) -> Result<(), transit_object_store::StorageError> {
            self.inner.put(name, data, timeout).await
        }

        async fn exists(&self, name: &str) -> Result<bool, transit_object_store::StorageError> {
            self.inner.exists(name).await
        }

        async fn delete(&self, name: &str) -> Result<(), transit_object_store::StorageError> {
            self.inner.delete(name).await
        }
    }

    #[tokio::test]
    async fn storage_failure_in_one_group_does_not_abort_the_others() {
        let inner = InMemoryStorage::new();
        let decoders = DecoderRegistry::new().unwrap();
        let hour = Utc::now();

        seed_raw_artifact(&inner, hour, vec![], feed_message_bytes("bus-1")).await;

        let mut other = config();
        other.url = "http://h/poisoned".to_string();
        let raw = RawFetchedFile::success(hour, other.clone(), vec![], 200, HashMap::new(), feed_message_bytes("bus-2"));
        let key = raw_key(&other, hour, &[]).unwrap();
        inner.put(&key, Bytes::from(serde_json::to_vec(&raw).unwrap()), None).await.unwrap();

        let storage = PoisonedStorage {
            inner,
            poison: "poisoned",
        };

        let ledger = aggregate_hour(&storage, &decoders, FeedType::GtfsRtVehiclePositions, hour, 4)
            .await
            .unwrap();

        // The poisoned group's blob read failed and is dropped entirely; the
        // healthy group's outcome and ledger write still happen.
        assert_eq!(ledger.outcomes.len(), 1);
        assert!(ledger.outcomes[0].success);
        assert!(storage.inner.exists(&ledger.gcs_key()).await.unwrap());
    }

    #[tokio::test]
    async fn aggregate_hour_continues_past_decoder_failure() {
        let storage = InMemoryStorage::new();
        let decoders = DecoderRegistry::new().unwrap();
        let hour = Utc::now();

        seed_raw_artifact(&storage, hour, vec![], b"not a protobuf message at all, surely".to_vec()).await;
        seed_raw_artifact(
            &storage,
            hour + chrono::Duration::minutes(1),
            vec![],
            feed_message_bytes("bus-3"),
        )
        .await;

        let ledger = aggregate_hour(&storage, &decoders, FeedType::GtfsRtVehiclePositions, hour, 4)
            .await
            .unwrap();

        assert_eq!(ledger.outcomes.len(), 2);
        assert_eq!(ledger.outcomes.iter().filter(|o| o.success).count(), 1);
        assert_eq!(ledger.outcomes.iter().filter(|o| !o.success).count(), 1);
    }
}
