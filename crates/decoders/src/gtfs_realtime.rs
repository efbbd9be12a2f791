use prost::Message;
use serde_json::{json, Value};
use transit_feed_registry::FeedType;
use transit_keying::Table;

use crate::error::DecodeError;
use crate::gtfs_rt_proto::FeedMessage;
use crate::model::{digest, DecodedGroup, Decoder};

/// Decodes a GTFS-Realtime `FeedMessage`. Emits one record per entity,
/// shaped `{header, entity}`. One instance is registered per realtime
/// FeedType (vehicle positions, trip updates, service alerts); `feed_type`
/// is the sub_table every emitted group is tagged with.
pub struct GtfsRealtimeDecoder {
    pub feed_type: FeedType,
}

impl GtfsRealtimeDecoder {
    pub fn new(feed_type: FeedType) -> Self {
        Self { feed_type }
    }
}

impl Decoder for GtfsRealtimeDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<DecodedGroup>, DecodeError> {
        let message = FeedMessage::decode(bytes)?;
        let header = serde_json::to_value(&message.header)?;
        let records: Vec<Value> = message
            .entity
            .iter()
            .map(|entity| -> Result<Value, DecodeError> {
                Ok(json!({
                    "header": header,
                    "entity": serde_json::to_value(entity)?,
                }))
            })
            .collect::<Result<_, _>>()?;
        Ok(vec![DecodedGroup {
            sub_table: Table::Feed(self.feed_type),
            records,
            digest: digest(bytes),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs_rt_proto::{FeedEntity, FeedHeader, TripDescriptor, VehiclePosition};

    #[test]
    fn emits_one_record_per_entity_with_header_and_entity_shape() {
        let msg = FeedMessage {
            header: Some(FeedHeader {
                gtfs_realtime_version: "2.0".to_string(),
                incrementality: 0,
                timestamp: 1,
            }),
            entity: vec![
                FeedEntity {
                    id: "e1".to_string(),
                    vehicle: Some(VehiclePosition {
                        trip: Some(TripDescriptor {
                            trip_id: Some("t1".to_string()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                FeedEntity {
                    id: "e2".to_string(),
                    ..Default::default()
                },
            ],
        };
        let mut bytes = Vec::new();
        msg.encode(&mut bytes).unwrap();

        let decoder = GtfsRealtimeDecoder::new(FeedType::GtfsRtVehiclePositions);
        let groups = decoder.decode(&bytes).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].records.len(), 2);
        assert_eq!(groups[0].records[0]["entity"]["id"], "e1");
        assert!(matches!(groups[0].sub_table, Table::Feed(FeedType::GtfsRtVehiclePositions)));
    }

    #[test]
    fn rejects_malformed_protobuf() {
        let decoder = GtfsRealtimeDecoder::new(FeedType::GtfsRtTripUpdates);
        let result = decoder.decode(&[0xFF, 0xFF, 0xFF]);
        assert!(result.is_err());
    }
}
