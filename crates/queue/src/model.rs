use chrono::{DateTime, Utc};
use transit_feed_registry::{FeedConfig, KeyValue};

/// One scheduled fetch, as enqueued by the ticker and consumed by a fetch
/// worker. `tick` is the scheduled time, not `enqueued_at` — downstream
/// partitioning reflects intent, not delivery jitter.
#[derive(Debug, Clone)]
pub struct FetchTask {
    pub tick: DateTime<Utc>,
    pub config: FeedConfig,
    pub page: Vec<KeyValue>,
    pub dry: bool,
    pub enqueued_at: DateTime<Utc>,
    pub expires: chrono::Duration,
}

impl FetchTask {
    pub fn new(
        tick: DateTime<Utc>,
        config: FeedConfig,
        page: Vec<KeyValue>,
        dry: bool,
        enqueued_at: DateTime<Utc>,
        expires: chrono::Duration,
    ) -> Self {
        Self {
            tick,
            config,
            page,
            dry,
            enqueued_at,
            expires,
        }
    }

    /// Whether `now` is past `enqueue_time + expires` — the broker drops
    /// such tasks rather than fetching stale data.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.enqueued_at + self.expires
    }

    pub fn metrics(&self) -> transit_metrics::FetchMetrics {
        transit_metrics::FetchMetrics::new(
            self.config.name.clone(),
            self.config.url.clone(),
            self.config.feed_type.value(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use transit_feed_registry::FeedType;

    fn config() -> FeedConfig {
        FeedConfig {
            name: "x".to_string(),
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

    #[test]
    fn is_expired_respects_ttl() {
        let enqueued_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let task = FetchTask::new(
            enqueued_at,
            config(),
            vec![],
            false,
            enqueued_at,
            chrono::Duration::seconds(30),
        );
        assert!(!task.is_expired(enqueued_at + chrono::Duration::seconds(10)));
        assert!(task.is_expired(enqueued_at + chrono::Duration::seconds(31)));
    }
}
