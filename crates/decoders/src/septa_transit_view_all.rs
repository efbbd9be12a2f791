use serde_json::Value;
use transit_feed_registry::FeedType;
use transit_keying::Table;

use crate::error::DecodeError;
use crate::model::{digest, DecodedGroup, Decoder};

/// Decodes `{routes: [ {route_id: [vehicle, ...], ...} ]}` where `routes`
/// has exactly one element; emits every vehicle across that element's
/// route_id groups.
#[derive(Default)]
pub struct SeptaTransitViewAllDecoder;

impl Decoder for SeptaTransitViewAllDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<DecodedGroup>, DecodeError> {
        let value: Value = serde_json::from_slice(bytes)?;
        let Value::Object(top) = value else {
            return Err(DecodeError::Shape("expected a top-level JSON object".to_string()));
        };
        let routes = top
            .get("routes")
            .ok_or_else(|| DecodeError::Shape("missing \"routes\" key".to_string()))?;
        let Value::Array(routes) = routes else {
            return Err(DecodeError::Shape("\"routes\" must be an array".to_string()));
        };
        if routes.len() != 1 {
            return Err(DecodeError::Shape(format!(
                "expected exactly one routes element, got {}",
                routes.len()
            )));
        }
        let Value::Object(route_groups) = &routes[0] else {
            return Err(DecodeError::Shape(
                "routes element must be an object".to_string(),
            ));
        };
        let mut records = Vec::new();
        for vehicles in route_groups.values() {
            let Value::Array(vehicles) = vehicles else {
                return Err(DecodeError::Shape(
                    "route_id value must be an array of vehicles".to_string(),
                ));
            };
            records.extend(vehicles.iter().cloned());
        }
        Ok(vec![DecodedGroup {
            sub_table: Table::Feed(FeedType::SeptaTransitViewAll),
            records,
            digest: digest(bytes),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_every_vehicle_across_route_groups() {
        let input = br#"{"routes": [{"17": [{"id":"v1"}], "33": [{"id":"v2"},{"id":"v3"}]}]}"#;
        let groups = SeptaTransitViewAllDecoder.decode(input).unwrap();
        assert_eq!(groups[0].records.len(), 3);
    }

    #[test]
    fn rejects_multiple_routes_elements() {
        let input = br#"{"routes": [{}, {}]}"#;
        assert!(SeptaTransitViewAllDecoder.decode(input).is_err());
    }
}
