use serde::{Deserialize, Serialize};

use crate::error::FeedRegistryError;

/// Closed enumeration of logical feeds. Every variant must have a registered
/// decoder (enforced at decoder-registry construction, not here).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FeedType {
    GtfsSchedule,
    #[serde(rename = "gtfs_rt__vehicle_positions")]
    GtfsRtVehiclePositions,
    #[serde(rename = "gtfs_rt__trip_updates")]
    GtfsRtTripUpdates,
    #[serde(rename = "gtfs_rt__service_alerts")]
    GtfsRtServiceAlerts,
    #[serde(rename = "septa__arrivals")]
    SeptaArrivals,
    #[serde(rename = "septa__train_view")]
    SeptaTrainView,
    #[serde(rename = "septa__transit_view_all")]
    SeptaTransitViewAll,
    #[serde(rename = "septa__bus_detours")]
    SeptaBusDetours,
    #[serde(rename = "septa__alerts_without_message")]
    SeptaAlertsWithoutMessage,
    #[serde(rename = "septa__alerts")]
    SeptaAlerts,
    #[serde(rename = "septa__elevator_outages")]
    SeptaElevatorOutages,
}

impl FeedType {
    /// Every feed type the registry knows about. Used to assert decoder
    /// coverage is exhaustive at startup.
    pub const ALL: &'static [FeedType] = &[
        FeedType::GtfsSchedule,
        FeedType::GtfsRtVehiclePositions,
        FeedType::GtfsRtTripUpdates,
        FeedType::GtfsRtServiceAlerts,
        FeedType::SeptaArrivals,
        FeedType::SeptaTrainView,
        FeedType::SeptaTransitViewAll,
        FeedType::SeptaBusDetours,
        FeedType::SeptaAlertsWithoutMessage,
        FeedType::SeptaAlerts,
        FeedType::SeptaElevatorOutages,
    ];

    /// `value` as it appears in storage keys and config files.
    pub fn value(&self) -> &'static str {
        match self {
            FeedType::GtfsSchedule => "gtfs_schedule",
            FeedType::GtfsRtVehiclePositions => "gtfs_rt__vehicle_positions",
            FeedType::GtfsRtTripUpdates => "gtfs_rt__trip_updates",
            FeedType::GtfsRtServiceAlerts => "gtfs_rt__service_alerts",
            FeedType::SeptaArrivals => "septa__arrivals",
            FeedType::SeptaTrainView => "septa__train_view",
            FeedType::SeptaTransitViewAll => "septa__transit_view_all",
            FeedType::SeptaBusDetours => "septa__bus_detours",
            FeedType::SeptaAlertsWithoutMessage => "septa__alerts_without_message",
            FeedType::SeptaAlerts => "septa__alerts",
            FeedType::SeptaElevatorOutages => "septa__elevator_outages",
        }
    }

    /// Whether this feed is ticked once a day at 00:00 UTC (only `gtfs_schedule`)
    /// rather than once a minute.
    pub fn is_daily(&self) -> bool {
        matches!(self, FeedType::GtfsSchedule)
    }

    /// Parse from the `value()` string used in configs and CLI flags.
    pub fn from_value(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|ft| ft.value() == s)
    }
}

/// Sub-enumeration for files inside a GTFS static ZIP.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GtfsScheduleFileType {
    Agency,
    Stops,
    Routes,
    Trips,
    StopTimes,
    Calendar,
    CalendarDates,
    Shapes,
    Frequencies,
    Transfers,
    Pathways,
    Levels,
    Translations,
    FeedInfo,
    Attributions,
    FareAttributes,
    FareRules,
    FareMedia,
    FareProducts,
    FareLegRules,
    FareTransferRules,
    Areas,
    StopAreas,
}

impl GtfsScheduleFileType {
    pub const ALL: &'static [GtfsScheduleFileType] = &[
        GtfsScheduleFileType::Agency,
        GtfsScheduleFileType::Stops,
        GtfsScheduleFileType::Routes,
        GtfsScheduleFileType::Trips,
        GtfsScheduleFileType::StopTimes,
        GtfsScheduleFileType::Calendar,
        GtfsScheduleFileType::CalendarDates,
        GtfsScheduleFileType::Shapes,
        GtfsScheduleFileType::Frequencies,
        GtfsScheduleFileType::Transfers,
        GtfsScheduleFileType::Pathways,
        GtfsScheduleFileType::Levels,
        GtfsScheduleFileType::Translations,
        GtfsScheduleFileType::FeedInfo,
        GtfsScheduleFileType::Attributions,
        GtfsScheduleFileType::FareAttributes,
        GtfsScheduleFileType::FareRules,
        GtfsScheduleFileType::FareMedia,
        GtfsScheduleFileType::FareProducts,
        GtfsScheduleFileType::FareLegRules,
        GtfsScheduleFileType::FareTransferRules,
        GtfsScheduleFileType::Areas,
        GtfsScheduleFileType::StopAreas,
    ];

    /// The literal ZIP entry name this variant decodes, e.g. `stops.txt`.
    pub fn filename(&self) -> &'static str {
        match self {
            GtfsScheduleFileType::Agency => "agency.txt",
            GtfsScheduleFileType::Stops => "stops.txt",
            GtfsScheduleFileType::Routes => "routes.txt",
            GtfsScheduleFileType::Trips => "trips.txt",
            GtfsScheduleFileType::StopTimes => "stop_times.txt",
            GtfsScheduleFileType::Calendar => "calendar.txt",
            GtfsScheduleFileType::CalendarDates => "calendar_dates.txt",
            GtfsScheduleFileType::Shapes => "shapes.txt",
            GtfsScheduleFileType::Frequencies => "frequencies.txt",
            GtfsScheduleFileType::Transfers => "transfers.txt",
            GtfsScheduleFileType::Pathways => "pathways.txt",
            GtfsScheduleFileType::Levels => "levels.txt",
            GtfsScheduleFileType::Translations => "translations.txt",
            GtfsScheduleFileType::FeedInfo => "feed_info.txt",
            GtfsScheduleFileType::Attributions => "attributions.txt",
            GtfsScheduleFileType::FareAttributes => "fare_attributes.txt",
            GtfsScheduleFileType::FareRules => "fare_rules.txt",
            GtfsScheduleFileType::FareMedia => "fare_media.txt",
            GtfsScheduleFileType::FareProducts => "fare_products.txt",
            GtfsScheduleFileType::FareLegRules => "fare_leg_rules.txt",
            GtfsScheduleFileType::FareTransferRules => "fare_transfer_rules.txt",
            GtfsScheduleFileType::Areas => "areas.txt",
            GtfsScheduleFileType::StopAreas => "stop_areas.txt",
        }
    }

    pub fn from_filename(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.filename() == name)
    }

    /// The parsed-store partition name: `gtfs_schedule__<slug>`.
    pub fn table_name(&self) -> String {
        let slug = self.filename().trim_end_matches(".txt");
        format!("gtfs_schedule__{slug}")
    }
}

/// `{key, value?, valueSecret?}`. Invariant: at least one of `value` /
/// `valueSecret` is present. `valueSecret` names an environment variable to
/// resolve at fetch time; it is never written to a storage key or output
/// record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct KeyValue {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_secret: Option<String>,
}

impl KeyValue {
    pub fn is_valid(&self) -> bool {
        self.value.is_some() || self.value_secret.is_some()
    }

    /// Whether this entry carries a secret (and must never appear in a
    /// fingerprint or storage key).
    pub fn is_secret(&self) -> bool {
        self.value_secret.is_some()
    }

    /// Resolve to its literal value, reading the named environment variable
    /// for secret entries.
    pub fn resolve(&self) -> Result<String, FeedRegistryError> {
        if let Some(v) = &self.value {
            return Ok(v.clone());
        }
        if let Some(var) = &self.value_secret {
            return std::env::var(var).map_err(|_| FeedRegistryError::Validation {
                name: self.key.clone(),
                reason: format!("missing environment variable {var}"),
            });
        }
        Err(FeedRegistryError::Validation {
            name: self.key.clone(),
            reason: "neither value nor valueSecret set".to_string(),
        })
    }
}

/// `{key, values[]}`; declares a single paginated parameter expansion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct KeyValues {
    pub key: String,
    pub values: Vec<String>,
}

/// A configured feed endpoint. Forbids unknown fields; `url` must be
/// absolute http(s).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    pub feed_type: FeedType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_url: Option<String>,
    #[serde(default)]
    pub query: Vec<KeyValue>,
    #[serde(default)]
    pub headers: Vec<KeyValue>,
    #[serde(default)]
    pub pages: Vec<KeyValues>,
}

impl FeedConfig {
    /// Validates the structural invariants `serde` cannot express:
    /// `url` absolute http(s), every `KeyValue` has a value, and at most one
    /// paginated dimension (cross-product expansion is a non-goal).
    pub fn validate(&self) -> Result<(), FeedRegistryError> {
        let parsed = url::Url::parse(&self.url).map_err(|e| FeedRegistryError::Validation {
            name: self.name.clone(),
            reason: format!("url {:?} is not valid: {e}", self.url),
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(FeedRegistryError::Validation {
                name: self.name.clone(),
                reason: format!("url scheme must be http(s), got {:?}", parsed.scheme()),
            });
        }
        for kv in self.query.iter().chain(self.headers.iter()) {
            if !kv.is_valid() {
                return Err(FeedRegistryError::Validation {
                    name: self.name.clone(),
                    reason: format!("key {:?} has neither value nor valueSecret", kv.key),
                });
            }
        }
        if self.pages.len() > 1 {
            return Err(FeedRegistryError::Validation {
                name: self.name.clone(),
                reason: "only a single paginated dimension is supported".to_string(),
            });
        }
        Ok(())
    }

    /// Expand this config's page declaration into one `Vec<KeyValue>` per
    /// fetch that must be issued. An empty `pages` yields a single fetch with
    /// no page parameters.
    pub fn expand_pages(&self) -> Result<Vec<Vec<KeyValue>>, FeedRegistryError> {
        if self.pages.is_empty() {
            return Ok(vec![Vec::new()]);
        }
        if self.pages.len() > 1 {
            return Err(FeedRegistryError::Validation {
                name: self.name.clone(),
                reason: "only a single paginated dimension is supported".to_string(),
            });
        }
        let dim = &self.pages[0];
        Ok(dim
            .values
            .iter()
            .map(|v| {
                vec![KeyValue {
                    key: dim.key.clone(),
                    value: Some(v.clone()),
                    value_secret: None,
                }]
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> FeedConfig {
        FeedConfig {
            name: "SEPTA Vehicle Positions".to_string(),
            url: "https://truetime.example/vehicles".to_string(),
            feed_type: FeedType::GtfsRtVehiclePositions,
            agency: Some("septa".to_string()),
            description: None,
            schedule_url: None,
            query: vec![KeyValue {
                key: "apikey".to_string(),
                value: None,
                value_secret: Some("SEPTA_KEY".to_string()),
            }],
            headers: vec![],
            pages: vec![],
        }
    }

    #[test]
    fn from_value_inverts_value_for_every_variant() {
        for ft in FeedType::ALL {
            assert_eq!(FeedType::from_value(ft.value()), Some(*ft));
        }
        assert_eq!(FeedType::from_value("not_a_feed_type"), None);
    }

    #[test]
    fn feed_type_value_roundtrips_through_serde() {
        for ft in FeedType::ALL {
            let s = serde_json::to_string(ft).unwrap();
            assert_eq!(s, format!("\"{}\"", ft.value()));
            let parsed: FeedType = serde_json::from_str(&s).unwrap();
            assert_eq!(parsed.value(), ft.value());
        }
    }

    #[test]
    fn validate_accepts_absolute_https_url() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_relative_url() {
        let mut cfg = sample_config();
        cfg.url = "/vehicles".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_keyvalue_without_value() {
        let mut cfg = sample_config();
        cfg.query.push(KeyValue {
            key: "bogus".to_string(),
            value: None,
            value_secret: None,
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn expand_pages_empty_yields_single_fetch() {
        let cfg = sample_config();
        let expanded = cfg.expand_pages().unwrap();
        assert_eq!(expanded, vec![Vec::new()]);
    }

    #[test]
    fn expand_pages_single_dimension_yields_one_fetch_per_value() {
        let mut cfg = sample_config();
        cfg.pages.push(KeyValues {
            key: "route".to_string(),
            values: vec!["A".to_string(), "B".to_string()],
        });
        let expanded = cfg.expand_pages().unwrap();
        assert_eq!(
            expanded,
            vec![
                vec![KeyValue {
                    key: "route".to_string(),
                    value: Some("A".to_string()),
                    value_secret: None
                }],
                vec![KeyValue {
                    key: "route".to_string(),
                    value: Some("B".to_string()),
                    value_secret: None
                }],
            ]
        );
    }

    #[test]
    fn expand_pages_rejects_cross_product() {
        let mut cfg = sample_config();
        cfg.pages.push(KeyValues {
            key: "route".to_string(),
            values: vec!["A".to_string()],
        });
        cfg.pages.push(KeyValues {
            key: "direction".to_string(),
            values: vec!["0".to_string()],
        });
        assert!(cfg.expand_pages().is_err());
    }

    #[test]
    fn deny_unknown_fields_rejects_typo() {
        let yaml = "name: x\nurl: https://h/f\nfeed_type: gtfs_schedule\nbogus_field: 1\n";
        let result: Result<FeedConfig, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }
}
