//! parse: the aggregator CLI (§4.G, §6). `parse day` runs the hourly
//! aggregator across every hour of a date; `parse file` decodes a single raw
//! artifact outside of any partition, for spot-checking a capture.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transit_aggregator::{aggregate_hour_with_options, AggregateOptions, DEFAULT_CONCURRENCY};
use transit_decoders::DecoderRegistry;
use transit_feed_registry::FeedType;
use transit_object_store::{InMemoryStorage, ObjectStoreBackend, RetryingStorage, Storage};

#[derive(Parser, Debug)]
#[command(name = "parse")]
#[command(about = "Runs the hourly aggregator, or decodes a single raw artifact")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Enumerate every hour of `date` and aggregate each selected feed type.
    Day {
        date: NaiveDate,
        /// Feed types to include; defaults to every known feed type.
        #[arg(long = "include")]
        include: Vec<String>,
        /// Feed types to exclude from the (possibly already-filtered) set.
        #[arg(long = "exclude")]
        exclude: Vec<String>,
        #[arg(long)]
        bucket: Option<String>,
        /// Restrict aggregation to a single URL fingerprint group.
        #[arg(long)]
        base64url: Option<String>,
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        workers: usize,
        #[arg(long, default_value_t = 60)]
        timeout: u64,
        #[arg(long, default_value_t = 5)]
        max_retries: u32,
    },
    /// Decode a single raw artifact and report how many records it yielded.
    File {
        uri: String,
        #[arg(long, default_value_t = 5)]
        max_retries: u32,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match args.command {
        Command::Day {
            date,
            include,
            exclude,
            bucket,
            base64url,
            workers,
            timeout,
            max_retries,
        } => run_day(date, include, exclude, bucket, base64url, workers, timeout, max_retries).await,
        Command::File { uri, max_retries } => run_file(&uri, max_retries).await,
    }
}

fn resolve_feed_types(include: &[String], exclude: &[String]) -> Result<Vec<FeedType>, Box<dyn std::error::Error>> {
    let parse_all = |names: &[String]| -> Result<Vec<FeedType>, Box<dyn std::error::Error>> {
        names
            .iter()
            .map(|s| FeedType::from_value(s).ok_or_else(|| format!("unknown feed type {s:?}").into()))
            .collect()
    };
    let base = if include.is_empty() {
        FeedType::ALL.to_vec()
    } else {
        parse_all(include)?
    };
    let excluded = parse_all(exclude)?;
    Ok(base.into_iter().filter(|ft| !excluded.contains(ft)).collect())
}

fn build_storage(bucket: Option<String>, max_retries: u32) -> Result<Arc<dyn Storage>, Box<dyn std::error::Error>> {
    match bucket {
        Some(bucket) => {
            let backend = ObjectStoreBackend::gcs_from_env(&bucket)?;
            Ok(Arc::new(RetryingStorage::new(backend, max_retries)))
        }
        None => {
            warn!("no --bucket configured, using an in-memory store (nothing will actually be there)");
            Ok(Arc::new(InMemoryStorage::new()))
        }
    }
}

async fn run_day(
    date: NaiveDate,
    include: Vec<String>,
    exclude: Vec<String>,
    bucket: Option<String>,
    base64url: Option<String>,
    workers: usize,
    timeout: u64,
    max_retries: u32,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let feed_types = resolve_feed_types(&include, &exclude)?;
    let storage = build_storage(bucket, max_retries)?;
    let decoders = DecoderRegistry::new()?;

    let mut any_failure = false;
    for feed_type in feed_types {
        for hour_of_day in 0..24 {
            let hour = Utc
                .from_utc_datetime(&date.and_hms_opt(hour_of_day, 0, 0).expect("hour_of_day < 24 is always valid"));
            let opts = AggregateOptions {
                concurrency: workers,
                base64url_filter: base64url.clone(),
                timeout: Duration::from_secs(timeout),
            };
            match aggregate_hour_with_options(storage.as_ref(), &decoders, feed_type, hour, opts).await {
                Ok(ledger) => {
                    let failures = ledger.outcomes.iter().filter(|o| !o.success).count();
                    info!(
                        feed_type = feed_type.value(),
                        %hour,
                        outcomes = ledger.outcomes.len(),
                        failures,
                        "aggregated hour"
                    );
                    if failures > 0 {
                        any_failure = true;
                    }
                }
                Err(err) => {
                    error!(feed_type = feed_type.value(), %hour, error = %err, "failed to aggregate hour");
                    any_failure = true;
                }
            }
        }
    }

    Ok(if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

async fn run_file(uri: &str, max_retries: u32) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let (bucket, key) = split_gs_uri(uri)?;
    let storage = build_storage(Some(bucket), max_retries)?;
    let body = storage.get(&key).await?;

    let raw: transit_keying::RawFetchedFile = serde_json::from_slice(&body)?;
    let Some(contents) = raw.contents else {
        error!(key = %key, "raw artifact has no contents: {:?}", raw.exception);
        return Ok(ExitCode::FAILURE);
    };

    let decoders = DecoderRegistry::new()?;
    let groups = decoders.decode(raw.config.feed_type, &contents)?;
    let total: usize = groups.iter().map(|g| g.records.len()).sum();
    info!(key = %key, groups = groups.len(), records = total, "decoded raw artifact");
    println!("{total}");
    Ok(ExitCode::SUCCESS)
}

fn split_gs_uri(uri: &str) -> Result<(String, String), Box<dyn std::error::Error>> {
    let rest = uri.strip_prefix("gs://").ok_or("expected a gs:// uri")?;
    let (bucket, key) = rest.split_once('/').ok_or("gs:// uri is missing an object key")?;
    Ok((bucket.to_string(), key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_gs_uri_separates_bucket_and_key() {
        let (bucket, key) = split_gs_uri("gs://my-bucket/path/to/object.json").unwrap();
        assert_eq!(bucket, "my-bucket");
        assert_eq!(key, "path/to/object.json");
    }

    #[test]
    fn split_gs_uri_rejects_non_gs_scheme() {
        assert!(split_gs_uri("https://my-bucket/object.json").is_err());
    }

    #[test]
    fn resolve_feed_types_defaults_to_all_when_include_is_empty() {
        let resolved = resolve_feed_types(&[], &[]).unwrap();
        assert_eq!(resolved.len(), FeedType::ALL.len());
    }

    #[test]
    fn resolve_feed_types_applies_include_then_exclude() {
        let resolved = resolve_feed_types(
            &["gtfs_rt__vehicle_positions".to_string(), "gtfs_rt__trip_updates".to_string()],
            &["gtfs_rt__trip_updates".to_string()],
        )
        .unwrap();
        assert_eq!(resolved, vec![FeedType::GtfsRtVehiclePositions]);
    }

    #[test]
    fn resolve_feed_types_rejects_unknown_name() {
        assert!(resolve_feed_types(&["not_a_feed_type".to_string()], &[]).is_err());
    }
}
