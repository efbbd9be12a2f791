use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use transit_feed_registry::{FeedConfig, KeyValue};
use transit_keying::RawFetchedFile;
use transit_metrics::FetchMetrics;
use transit_object_store::Storage;

use crate::error::FetchError;

/// Execute one scheduled fetch task per §4.E: GET the feed origin, build a
/// `RawFetchedFile`, and persist it at its `gcs_key` unless `dry`.
///
/// Query and header `KeyValue`s are resolved (secrets read from the
/// environment) immediately before the request; resolved values never reach
/// the stored envelope's `config`, which carries the original declaration.
pub async fn execute(
    storage: &dyn Storage,
    tick: DateTime<Utc>,
    config: FeedConfig,
    page: Vec<KeyValue>,
    dry: bool,
) -> Result<RawFetchedFile, FetchError> {
    let metrics = FetchMetrics::new(config.name.clone(), config.url.clone(), config.feed_type.value());

    let delay = (Utc::now() - tick).to_std().unwrap_or(Duration::ZERO);
    metrics.record_request_delay(delay.as_secs_f64());

    let client = reqwest::Client::new();
    let mut request = client.get(&config.url);
    for kv in config.query.iter().chain(page.iter()) {
        request = request.query(&[(kv.key.as_str(), kv.resolve()?.as_str())]);
    }
    for kv in &config.headers {
        request = request.header(kv.key.as_str(), kv.resolve()?.as_str());
    }

    let request_start = Instant::now();
    let response = request.send().await;
    metrics.record_request_duration(request_start.elapsed().as_secs_f64());

    let ts = Utc::now();
    let raw = match response {
        Ok(resp) => {
            let status = resp.status();
            let response_headers: HashMap<String, String> = resp
                .headers()
                .iter()
                .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
                .collect();
            if !status.is_success() {
                let code = status.as_u16();
                if code >= 500 || code == 429 {
                    metrics.task_signal("error", Some("FetchTransient"));
                    return Err(FetchError::Transient {
                        url: config.url.clone(),
                        reason: format!("status {code}"),
                    });
                }
                metrics.task_signal("error", Some("FetchPermanent"));
                return Err(FetchError::Permanent {
                    url: config.url.clone(),
                    status: code,
                });
            }
            let body = resp.bytes().await?;
            RawFetchedFile::success(
                ts,
                config.clone(),
                page.clone(),
                status.as_u16(),
                response_headers,
                body.to_vec(),
            )
        }
        Err(err) => {
            let reason = err.to_string();
            let transient = err.is_timeout() || err.is_connect() || err.is_request();
            metrics.task_signal("error", Some(if transient { "FetchTransient" } else { "FetchPermanent" }));
            if !transient {
                return Err(FetchError::Request(err));
            }
            return Err(FetchError::Transient {
                url: config.url.clone(),
                reason,
            });
        }
    };

    let key = raw.gcs_key()?;
    if dry {
        tracing::info!(url = %config.url, key = %key, "dry run: skipping write");
    } else {
        let body = serde_json::to_vec(&raw).map_err(|e| FetchError::Transient {
            url: config.url.clone(),
            reason: format!("failed to serialize raw artifact: {e}"),
        })?;
        let save_start = Instant::now();
        storage.put(&key, Bytes::from(body), Some(Duration::from_secs(60))).await?;
        metrics.record_save_duration(save_start.elapsed().as_secs_f64());
    }

    metrics.task_signal("complete", None);
    Ok(raw)
}
