//! consumer: drains `FetchTask`s off the queue and executes them (§4.E,
//! §5.2). The queue broker itself (Redis/huey in production) is an external
//! collaborator this repo does not implement; `transit-queue` ships only an
//! in-process `InMemoryQueue`, so a `consumer` run as its own OS process has
//! nothing to dequeue unless something in the same process enqueues onto it.
//! Swapping in a real `Queue` impl that talks to a shared broker makes this
//! binary work standalone without touching anything below `main`.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transit_fetch_worker::WorkerPool;
use transit_object_store::{ObjectStoreBackend, RetryingStorage, Storage};
use transit_queue::InMemoryQueue;

#[derive(Parser, Debug)]
#[command(name = "consumer")]
#[command(about = "Runs a pool of fetch workers against the task queue")]
struct Args {
    /// GCS bucket (`gs://...` or bare name) backing raw artifact storage.
    #[arg(long, env = "RAW_BUCKET")]
    bucket: Option<String>,

    /// Metrics HTTP server bind address.
    #[arg(long, default_value = "0.0.0.0:8000")]
    addr: SocketAddr,

    /// Number of concurrent fetch workers (§5.2 default pool size 1).
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Object-store write retry budget (§4.D).
    #[arg(long, default_value_t = 5)]
    max_retries: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

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
    warn!("consumer owns a private in-memory queue; no external broker is wired up, so nothing will dequeue until this process's own ticker enqueues onto it");

    let pool = WorkerPool::spawn(Arc::clone(&queue), Arc::clone(&storage), args.workers.max(1));

    tokio::spawn(async move {
        if let Err(e) = transit_metrics::run_metrics_server(args.addr).await {
            error!(error = %e, "metrics server error");
        }
    });
    info!(addr = %args.addr, workers = args.workers, "consumer started");

    tokio::signal::ctrl_c().await.ok();
    info!("received shutdown signal, draining workers");
    queue.close();
    pool.shutdown().await;
    Ok(())
}
