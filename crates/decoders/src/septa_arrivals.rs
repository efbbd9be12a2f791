use serde_json::{Map, Value};
use transit_feed_registry::FeedType;
use transit_keying::Table;

use crate::error::DecodeError;
use crate::model::{digest, DecodedGroup, Decoder};

/// Decodes the SEPTA arrivals shape: `{key: [ {direction_key: [update, ...]} ]}`.
/// Each list element under a top-level key carries at most one direction
/// entry; every update in it is emitted as `{key, direction_key, ...update}`.
#[derive(Default)]
pub struct SeptaArrivalsDecoder;

impl Decoder for SeptaArrivalsDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<DecodedGroup>, DecodeError> {
        let value: Value = serde_json::from_slice(bytes)?;
        let Value::Object(top) = value else {
            return Err(DecodeError::Shape("expected a top-level JSON object".to_string()));
        };
        let mut records = Vec::new();
        for (key, groups) in &top {
            let Value::Array(groups) = groups else {
                return Err(DecodeError::Shape(format!("expected array for key {key:?}")));
            };
            for group in groups {
                let Value::Object(group) = group else {
                    return Err(DecodeError::Shape(
                        "expected directional group object".to_string(),
                    ));
                };
                for (direction_key, updates) in group {
                    let Value::Array(updates) = updates else {
                        return Err(DecodeError::Shape(format!(
                            "expected array of updates for direction {direction_key:?}"
                        )));
                    };
                    for update in updates {
                        let Value::Object(update) = update else {
                            return Err(DecodeError::Shape("expected update object".to_string()));
                        };
                        let mut record = Map::new();
                        record.insert("key".to_string(), Value::String(key.clone()));
                        record.insert(
                            "direction_key".to_string(),
                            Value::String(direction_key.clone()),
                        );
                        for (k, v) in update {
                            record.insert(k.clone(), v.clone());
                        }
                        records.push(Value::Object(record));
                    }
                }
            }
        }
        Ok(vec![DecodedGroup {
            sub_table: Table::Feed(FeedType::SeptaArrivals),
            records,
            digest: digest(bytes),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_nested_direction_updates() {
        let input = br#"{
            "Market-Frankford": [
                {"Westbound": [{"stop": "15th St", "min": 3}, {"stop": "30th St", "min": 7}]}
            ]
        }"#;
        let groups = SeptaArrivalsDecoder.decode(input).unwrap();
        assert_eq!(groups[0].records.len(), 2);
        let first = &groups[0].records[0];
        assert_eq!(first["key"], "Market-Frankford");
        assert_eq!(first["direction_key"], "Westbound");
        assert_eq!(first["stop"], "15th St");
    }
}
