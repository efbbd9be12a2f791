use serde_json::{Map, Value};
use transit_feed_registry::FeedType;
use transit_keying::Table;

use crate::error::DecodeError;
use crate::model::{digest, DecodedGroup, Decoder};

/// Decodes `{meta, results: [outage, ...]}`; emits `{meta, ...outage}` per
/// outage.
#[derive(Default)]
pub struct SeptaElevatorOutagesDecoder;

impl Decoder for SeptaElevatorOutagesDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<DecodedGroup>, DecodeError> {
        let value: Value = serde_json::from_slice(bytes)?;
        let Value::Object(top) = value else {
            return Err(DecodeError::Shape("expected a top-level JSON object".to_string()));
        };
        let meta = top
            .get("meta")
            .cloned()
            .ok_or_else(|| DecodeError::Shape("missing meta".to_string()))?;
        let Some(Value::Array(results)) = top.get("results") else {
            return Err(DecodeError::Shape("missing or malformed results".to_string()));
        };
        let mut records = Vec::new();
        for outage in results {
            let Value::Object(outage) = outage else {
                return Err(DecodeError::Shape("expected outage object".to_string()));
            };
            let mut record = Map::new();
            record.insert("meta".to_string(), meta.clone());
            for (k, v) in outage {
                record.insert(k.clone(), v.clone());
            }
            records.push(Value::Object(record));
        }
        Ok(vec![DecodedGroup {
            sub_table: Table::Feed(FeedType::SeptaElevatorOutages),
            records,
            digest: digest(bytes),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_one_record_per_outage_with_meta_attached() {
        let input = br#"{"meta": {"updated": "now"}, "results": [{"id": 1}, {"id": 2}]}"#;
        let groups = SeptaElevatorOutagesDecoder.decode(input).unwrap();
        assert_eq!(groups[0].records.len(), 2);
        assert_eq!(groups[0].records[0]["meta"]["updated"], "now");
        assert_eq!(groups[0].records[1]["id"], 2);
    }
}
