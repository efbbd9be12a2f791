use serde_json::{Map, Value};
use transit_feed_registry::FeedType;
use transit_keying::Table;

use crate::error::DecodeError;
use crate::model::{digest, DecodedGroup, Decoder};

/// Decodes `[{route_id, route_info: [detour, ...]}, ...]`; emits
/// `{route_id, ...detour}` per detour.
#[derive(Default)]
pub struct SeptaBusDetoursDecoder;

impl Decoder for SeptaBusDetoursDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<DecodedGroup>, DecodeError> {
        let value: Value = serde_json::from_slice(bytes)?;
        let Value::Array(routes) = value else {
            return Err(DecodeError::Shape("expected a top-level JSON array".to_string()));
        };
        let mut records = Vec::new();
        for route in &routes {
            let Value::Object(route) = route else {
                return Err(DecodeError::Shape("expected route object".to_string()));
            };
            let route_id = route
                .get("route_id")
                .cloned()
                .ok_or_else(|| DecodeError::Shape("missing route_id".to_string()))?;
            let Some(Value::Array(detours)) = route.get("route_info") else {
                return Err(DecodeError::Shape(
                    "missing or malformed route_info".to_string(),
                ));
            };
            for detour in detours {
                let Value::Object(detour) = detour else {
                    return Err(DecodeError::Shape("expected detour object".to_string()));
                };
                let mut record = Map::new();
                record.insert("route_id".to_string(), route_id.clone());
                for (k, v) in detour {
                    record.insert(k.clone(), v.clone());
                }
                records.push(Value::Object(record));
            }
        }
        Ok(vec![DecodedGroup {
            sub_table: Table::Feed(FeedType::SeptaBusDetours),
            records,
            digest: digest(bytes),
        }])
    }
}
