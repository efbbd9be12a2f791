//! transit-metrics: shared Prometheus registries for the fetch/dispatch
//! pipeline. Every metric is labeled `(name, url, feed_type)` so a single
//! /metrics endpoint on a fetch-worker or ticker process can be sliced by
//! feed.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

pub mod server;
pub use server::{create_router, run_metrics_server};

const LABEL_NAME: &str = "name";
const LABEL_URL: &str = "url";
const LABEL_FEED_TYPE: &str = "feed_type";
const LABEL_SIGNAL: &str = "signal";
const LABEL_EXC_TYPE: &str = "exc_type";

/// Broker-level task lifecycle signals: enqueued, executing, complete,
/// error, retrying, expired.
static HUEY_TASK_SIGNALS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "huey_task_signals",
        "Broker-level task lifecycle signal counts",
        &[LABEL_NAME, LABEL_URL, LABEL_FEED_TYPE, LABEL_SIGNAL, LABEL_EXC_TYPE]
    )
    .expect("failed to register huey_task_signals metric")
});

static FETCH_REQUEST_DELAY_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "fetch_request_delay_seconds",
        "Seconds between a tick's scheduled time and the worker picking it up",
        &[LABEL_NAME, LABEL_URL, LABEL_FEED_TYPE]
    )
    .expect("failed to register fetch_request_delay_seconds metric")
});

static FETCH_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "fetch_request_duration_seconds",
        "Seconds spent issuing the HTTP GET to the feed origin",
        &[LABEL_NAME, LABEL_URL, LABEL_FEED_TYPE]
    )
    .expect("failed to register fetch_request_duration_seconds metric")
});

static FETCH_SAVE_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "fetch_save_duration_seconds",
        "Seconds spent writing the raw artifact to object storage",
        &[LABEL_NAME, LABEL_URL, LABEL_FEED_TYPE]
    )
    .expect("failed to register fetch_save_duration_seconds metric")
});

/// A metrics handle scoped to one `(name, url, feed_type)` triple — one
/// FeedConfig. Cheap to clone and hand to a spawned task.
#[derive(Clone)]
pub struct FetchMetrics {
    name: String,
    url: String,
    feed_type: String,
}

impl FetchMetrics {
    pub fn new(name: impl Into<String>, url: impl Into<String>, feed_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            feed_type: feed_type.into(),
        }
    }

    pub fn record_request_delay(&self, seconds: f64) {
        FETCH_REQUEST_DELAY_SECONDS
            .with_label_values(&[&self.name, &self.url, &self.feed_type])
            .observe(seconds);
    }

    pub fn record_request_duration(&self, seconds: f64) {
        FETCH_REQUEST_DURATION_SECONDS
            .with_label_values(&[&self.name, &self.url, &self.feed_type])
            .observe(seconds);
    }

    pub fn record_save_duration(&self, seconds: f64) {
        FETCH_SAVE_DURATION_SECONDS
            .with_label_values(&[&self.name, &self.url, &self.feed_type])
            .observe(seconds);
    }

    /// Record a broker task-lifecycle signal. `exc_type` is the exception's
    /// type name, or `""` for signals that carry no error (enqueued,
    /// executing, complete, expired).
    pub fn task_signal(&self, signal: &str, exc_type: Option<&str>) {
        HUEY_TASK_SIGNALS
            .with_label_values(&[&self.name, &self.url, &self.feed_type, signal, exc_type.unwrap_or("")])
            .inc();
    }
}

/// Encode the global Prometheus registry as text exposition format, served
/// at `/metrics` by both `ticker` and `consumer`.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("failed to encode metrics as utf8: {e}")))
}
