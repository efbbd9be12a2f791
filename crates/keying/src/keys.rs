use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Timelike, Utc};

use transit_feed_registry::{FeedConfig, KeyValue};

use crate::error::KeyingError;

pub(crate) fn format_date(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

/// RFC 3339, whole-second precision, `+00:00` offset (never `Z`).
pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, false)
}

pub(crate) fn truncate_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_minute(0)
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .expect("zeroing minute/second/nanosecond never overflows")
}

pub(crate) fn truncate_to_second(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_nanosecond(0)
        .expect("zeroing nanosecond never overflows")
}

fn canonical_url(base: &str, mut pairs: Vec<(String, String)>) -> Result<String, KeyingError> {
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    let mut url = url::Url::parse(base).map_err(|e| KeyingError::InvalidUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })?;
    url.set_query(None);
    if !pairs.is_empty() {
        let mut qp = url.query_pairs_mut();
        for (k, v) in &pairs {
            qp.append_pair(k, v);
        }
    }
    Ok(url.to_string())
}

fn public_query_pairs(config: &FeedConfig) -> Vec<(String, String)> {
    config
        .query
        .iter()
        .filter(|kv| !kv.is_secret())
        .map(|kv| (kv.key.clone(), kv.value.clone().unwrap_or_default()))
        .collect()
}

/// URL-safe base64 of the canonicalized request URL, excluding secrets and
/// page parameters. Stable under reordering of `config.query`.
pub fn fingerprint(config: &FeedConfig) -> Result<String, KeyingError> {
    let url = canonical_url(&config.url, public_query_pairs(config))?;
    Ok(URL_SAFE_NO_PAD.encode(url.as_bytes()))
}

/// URL-safe base64 of the canonicalized request URL, including page
/// parameters but excluding secrets.
fn filename_fingerprint(config: &FeedConfig, page: &[KeyValue]) -> Result<String, KeyingError> {
    let mut pairs = public_query_pairs(config);
    for kv in page {
        let value = kv.value.clone().ok_or_else(|| KeyingError::UnresolvedValue {
            key: kv.key.clone(),
            reason: "page KeyValue has no value".to_string(),
        })?;
        pairs.push((kv.key.clone(), value));
    }
    let url = canonical_url(&config.url, pairs)?;
    Ok(URL_SAFE_NO_PAD.encode(url.as_bytes()))
}

/// The full raw-store object key for a fetched artifact, per
/// `{table}/dt={dt}/hour={hour}/ts={ts}/base64url={base64url}/{filename}`.
pub fn raw_key(
    config: &FeedConfig,
    ts: DateTime<Utc>,
    page: &[KeyValue],
) -> Result<String, KeyingError> {
    let ts = truncate_to_second(ts);
    let dt = format_date(ts);
    let hour = format_ts(truncate_to_hour(ts));
    let ts_str = format_ts(ts);
    let base64url = fingerprint(config)?;
    let filename = format!("{}.json", filename_fingerprint(config, page)?);
    let table = config.feed_type.value();
    Ok(format!(
        "{table}/dt={dt}/hour={hour}/ts={ts_str}/base64url={base64url}/{filename}"
    ))
}

/// The raw-store prefix covering every blob fetched for `feed_type` during
/// `hour`, per `{feed_type}/dt={dt}/hour={hour}/`. Used to enumerate a
/// partition before grouping by fingerprint.
pub fn raw_hour_prefix(feed_type: &str, hour: DateTime<Utc>) -> String {
    let hour = truncate_to_hour(hour);
    let dt = format_date(hour);
    let hour_str = format_ts(hour);
    format!("{feed_type}/dt={dt}/hour={hour_str}/")
}

/// The parsed-store object key for an hourly aggregate, per
/// `{table}/dt={dt}/hour={hour}/{base64url}.jsonl.gz`.
pub fn agg_key(table: &str, base64url: &str, hour: DateTime<Utc>) -> String {
    let hour = truncate_to_hour(hour);
    let dt = format_date(hour);
    let hour_str = format_ts(hour);
    format!("{table}/dt={dt}/hour={hour_str}/{base64url}.jsonl.gz")
}

/// The outcomes-ledger object key for a (feed_type, hour) partition, per
/// `{feed_type}__parse_outcomes/dt={dt}/{hour.iso8601}.jsonl`.
pub fn outcomes_key(feed_type: &str, hour: DateTime<Utc>) -> String {
    let hour = truncate_to_hour(hour);
    let dt = format_date(hour);
    let hour_str = format_ts(hour);
    format!("{feed_type}__parse_outcomes/dt={dt}/{hour_str}.jsonl")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use transit_feed_registry::{FeedType, KeyValue};

    fn config_with_query(query: Vec<KeyValue>) -> FeedConfig {
        FeedConfig {
            name: "x".to_string(),
            url: "http://h/f".to_string(),
            feed_type: FeedType::GtfsRtVehiclePositions,
            agency: None,
            description: None,
            schedule_url: None,
            query,
            headers: vec![],
            pages: vec![],
        }
    }

    #[test]
    fn fingerprint_is_independent_of_page() {
        let config = config_with_query(vec![]);
        let fp = fingerprint(&config).unwrap();
        assert_eq!(fp, URL_SAFE_NO_PAD.encode("http://h/f".as_bytes()));
    }

    #[test]
    fn fingerprint_excludes_secrets() {
        let config = config_with_query(vec![KeyValue {
            key: "apikey".to_string(),
            value: None,
            value_secret: Some("SECRET_VAR".to_string()),
        }]);
        let fp = fingerprint(&config).unwrap();
        assert_eq!(fp, URL_SAFE_NO_PAD.encode("http://h/f".as_bytes()));
    }

    #[test]
    fn fingerprint_stable_under_query_reordering() {
        let a = config_with_query(vec![
            KeyValue { key: "b".into(), value: Some("2".into()), value_secret: None },
            KeyValue { key: "a".into(), value: Some("1".into()), value_secret: None },
        ]);
        let b = config_with_query(vec![
            KeyValue { key: "a".into(), value: Some("1".into()), value_secret: None },
            KeyValue { key: "b".into(), value: Some("2".into()), value_secret: None },
        ]);
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn raw_key_matches_fetch_happy_path_shape() {
        let config = config_with_query(vec![]);
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 0).unwrap();
        let key = raw_key(&config, ts, &[]).unwrap();
        let b64 = URL_SAFE_NO_PAD.encode("http://h/f".as_bytes());
        assert_eq!(
            key,
            format!(
                "gtfs_rt__vehicle_positions/dt=2024-01-02/hour=2024-01-02T03:00:00+00:00/ts=2024-01-02T03:04:00+00:00/base64url={b64}/{b64}.json"
            )
        );
    }

    #[test]
    fn raw_key_page_changes_filename_not_fingerprint() {
        let config = config_with_query(vec![]);
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 0).unwrap();
        let page = vec![KeyValue {
            key: "route".to_string(),
            value: Some("A".to_string()),
            value_secret: None,
        }];
        let key_a = raw_key(&config, ts, &page).unwrap();
        let key_none = raw_key(&config, ts, &[]).unwrap();
        let fp = fingerprint(&config).unwrap();
        assert!(key_a.contains(&format!("base64url={fp}/")));
        assert!(key_none.contains(&format!("base64url={fp}/")));
        assert_ne!(key_a, key_none);
    }

    #[test]
    fn raw_hour_prefix_matches_raw_key_partition_segment() {
        let config = config_with_query(vec![]);
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 0).unwrap();
        let key = raw_key(&config, ts, &[]).unwrap();
        let prefix = raw_hour_prefix("gtfs_rt__vehicle_positions", ts);
        assert!(key.starts_with(&prefix));
    }

    #[test]
    fn agg_key_matches_partitioning_regex() {
        let hour = Utc.with_ymd_and_hms(2024, 1, 2, 3, 30, 0).unwrap();
        let key = agg_key("gtfs_schedule__stops", "abc123", hour);
        assert_eq!(
            key,
            "gtfs_schedule__stops/dt=2024-01-02/hour=2024-01-02T03:00:00+00:00/abc123.jsonl.gz"
        );
    }

    #[test]
    fn keys_are_deterministic() {
        let config = config_with_query(vec![]);
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 0).unwrap();
        assert_eq!(
            raw_key(&config, ts, &[]).unwrap(),
            raw_key(&config, ts, &[]).unwrap()
        );
    }
}
