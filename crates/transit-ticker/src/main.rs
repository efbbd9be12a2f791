//! ticker: the wall-clock dispatcher (§4.F). Runs a single long-lived loop
//! that wakes at each minute boundary, enqueues a `FetchTask` per expanded
//! feed page, and additionally enqueues the `gtfs_schedule` feeds once a day
//! at 00:00 UTC. `tick` on every enqueued task is the scheduled boundary,
//! not the time the task actually left the loop.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Timelike, Utc};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transit_feed_registry::{FeedConfig, FeedRegistry};
use transit_fetch_worker::WorkerPool;
use transit_object_store::{ObjectStoreBackend, RetryingStorage, Storage};
use transit_queue::{FetchTask, InMemoryQueue, Queue};

#[derive(Parser, Debug)]
#[command(name = "ticker")]
#[command(about = "Dispatches scheduled feed fetches onto the task queue")]
struct Args {
    /// Path to the feed registry YAML file.
    #[arg(long, default_value = "feeds.yaml")]
    feeds: PathBuf,

    /// GCS bucket (`gs://...` or bare name) backing raw artifact storage.
    /// When unset, an in-memory store is used — fine for local runs, but
    /// fetched pages vanish on exit.
    #[arg(long, env = "RAW_BUCKET")]
    bucket: Option<String>,

    /// Metrics HTTP server bind address.
    #[arg(long, default_value = "0.0.0.0:8000")]
    addr: SocketAddr,

    /// Number of fetch workers to run against the dispatched queue in this
    /// same process (§5.2 default pool size 1). There is no standalone
    /// broker in this repo, so the ticker owns the pool that drains what it
    /// enqueues.
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Seconds a dispatched task may sit on the queue before a worker picks
    /// it up and it is dropped as stale.
    #[arg(long, default_value_t = 5)]
    queue_ttl_seconds: i64,

    /// Object-store write retry budget (§4.D).
    #[arg(long, default_value_t = 5)]
    max_retries: u32,

    /// Log the fetch that would happen without issuing the HTTP request or
    /// writing to storage.
    #[arg(long)]
    dry: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let registry = FeedRegistry::load(&args.feeds)?;
    info!(feeds = registry.all_feeds().len(), path = %args.feeds.display(), "loaded feed registry");

    let storage: Arc<dyn Storage> = match &args.bucket {
        Some(bucket) => {
            let backend = ObjectStoreBackend::gcs_from_env(bucket)?;
            Arc::new(RetryingStorage::new(backend, args.max_retries))
        }
        None => {
            info!("no --bucket/RAW_BUCKET configured, using an in-memory store");
            Arc::new(transit_object_store::InMemoryStorage::new())
        }
    };

    let queue = Arc::new(InMemoryQueue::new());
    let pool = WorkerPool::spawn(Arc::clone(&queue), Arc::clone(&storage), args.workers);

    tokio::spawn(async move {
        if let Err(e) = transit_metrics::run_metrics_server(args.addr).await {
            error!(error = %e, "metrics server error");
        }
    });
    info!(addr = %args.addr, "metrics server started");

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
        shutdown_tx.send(true).ok();
    });

    loop {
        let now = Utc::now();
        let next = next_minute_boundary(now);
        let sleep_for = (next - now).to_std().unwrap_or(Duration::from_secs(1));
        tokio::select! {
            biased;
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = tokio::time::sleep(sleep_for) => {
                dispatch_tick(&registry, queue.as_ref(), next, args.dry, args.queue_ttl_seconds).await;
            }
        }
    }

    info!("dispatcher stopped, draining workers");
    queue.close();
    pool.shutdown().await;
    Ok(())
}

/// The next `:00`-second wall-clock boundary strictly after `now`.
fn next_minute_boundary(now: DateTime<Utc>) -> DateTime<Utc> {
    let next_epoch_secs = (now.timestamp() / 60 + 1) * 60;
    Utc.timestamp_opt(next_epoch_secs, 0).single().unwrap_or(now)
}

/// Enqueue one `FetchTask` per expanded page for every feed due at `tick`:
/// every non-daily feed every minute, plus every `gtfs_schedule` feed once a
/// day at 00:00 UTC.
async fn dispatch_tick(registry: &FeedRegistry, queue: &dyn Queue, tick: DateTime<Utc>, dry: bool, ttl_seconds: i64) {
    let is_daily_tick = tick.hour() == 0 && tick.minute() == 0;
    for feed in registry.all_feeds() {
        if feed.feed_type.is_daily() && !is_daily_tick {
            continue;
        }
        enqueue_feed(queue, feed, tick, dry, ttl_seconds).await;
    }
}

async fn enqueue_feed(queue: &dyn Queue, feed: &FeedConfig, tick: DateTime<Utc>, dry: bool, ttl_seconds: i64) {
    let pages = match feed.expand_pages() {
        Ok(pages) => pages,
        Err(err) => {
            error!(feed = %feed.name, error = %err, "failed to expand feed pages, skipping this tick");
            return;
        }
    };
    for page in pages {
        let task = FetchTask::new(tick, feed.clone(), page, dry, Utc::now(), chrono::Duration::seconds(ttl_seconds));
        if let Err(err) = queue.enqueue(task).await {
            error!(feed = %feed.name, error = %err, "failed to enqueue fetch task");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use transit_feed_registry::FeedType;
    use transit_queue::InMemoryQueue;

    fn feed(name: &str, feed_type: FeedType) -> FeedConfig {
        FeedConfig {
            name: name.to_string(),
            url: "http://h/f".to_string(),
            feed_type,
            agency: None,
            description: None,
            schedule_url: None,
            query: vec![],
            headers: vec![],
            pages: vec![],
        }
    }

    #[test]
    fn next_minute_boundary_advances_past_a_mid_minute_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 17).unwrap();
        let next = next_minute_boundary(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 1, 12, 31, 0).unwrap());
    }

    #[test]
    fn next_minute_boundary_on_exact_boundary_advances_a_full_minute() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 31, 0).unwrap();
        let next = next_minute_boundary(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 1, 12, 32, 0).unwrap());
    }

    const MIXED_SCHEDULE: &str = r#"
- name: SEPTA Vehicle Positions
  url: https://truetime.example/vehicles
  feed_type: gtfs_rt__vehicle_positions
- name: SEPTA Schedule
  url: https://truetime.example/schedule.zip
  feed_type: gtfs_schedule
"#;

    #[tokio::test]
    async fn dispatch_tick_skips_daily_feed_off_midnight() {
        let registry = FeedRegistry::from_yaml(MIXED_SCHEDULE).unwrap();
        let queue = InMemoryQueue::new();
        let tick = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();
        dispatch_tick(&registry, &queue, tick, true, 5).await;
        assert_eq!(queue.len().await, 1);
        let task = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(task.config.name, "SEPTA Vehicle Positions");
    }

    #[tokio::test]
    async fn dispatch_tick_includes_daily_feed_at_midnight() {
        let registry = FeedRegistry::from_yaml(MIXED_SCHEDULE).unwrap();
        let queue = InMemoryQueue::new();
        let tick = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        dispatch_tick(&registry, &queue, tick, true, 5).await;
        assert_eq!(queue.len().await, 2);
    }

    #[tokio::test]
    async fn enqueue_feed_enqueues_one_task_per_expanded_page() {
        let queue = InMemoryQueue::new();
        let feed = feed("test", FeedType::GtfsRtVehiclePositions);
        let tick = Utc::now();
        enqueue_feed(&queue, &feed, tick, true, 5).await;
        assert_eq!(queue.len().await, 1);
        let task = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(task.tick, tick);
        assert!(task.dry);
        assert!(!task.is_expired(tick + ChronoDuration::seconds(1)));
    }
}
