use serde_json::Value;
use transit_feed_registry::FeedType;
use transit_keying::Table;

use crate::error::DecodeError;
use crate::model::{digest, DecodedGroup, Decoder};

/// Decodes a bare JSON array of objects, emitting each element as a record
/// unchanged. One instance is registered per FeedType that uses this shape
/// (`septa__train_view`, `septa__alerts_without_message`, `septa__alerts`).
pub struct ListOfDictsDecoder {
    pub feed_type: FeedType,
}

impl ListOfDictsDecoder {
    pub fn new(feed_type: FeedType) -> Self {
        Self { feed_type }
    }
}

impl Decoder for ListOfDictsDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<DecodedGroup>, DecodeError> {
        let value: Value = serde_json::from_slice(bytes)?;
        let Value::Array(records) = value else {
            return Err(DecodeError::Shape(
                "expected a top-level JSON array".to_string(),
            ));
        };
        Ok(vec![DecodedGroup {
            sub_table: Table::Feed(self.feed_type),
            records,
            digest: digest(bytes),
        }])
    }
}
