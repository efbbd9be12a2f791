use std::collections::HashMap;

use transit_feed_registry::FeedType;

use crate::error::DecodeError;
use crate::gtfs_realtime::GtfsRealtimeDecoder;
use crate::gtfs_schedule::GtfsScheduleDecoder;
use crate::list_of_dicts::ListOfDictsDecoder;
use crate::model::{DecodedGroup, Decoder};
use crate::septa_arrivals::SeptaArrivalsDecoder;
use crate::septa_bus_detours::SeptaBusDetoursDecoder;
use crate::septa_elevator_outages::SeptaElevatorOutagesDecoder;
use crate::septa_transit_view_all::SeptaTransitViewAllDecoder;

/// Maps every `FeedType` to its decoder. Construction fails if coverage is
/// not exhaustive over `FeedType::ALL` — a missing decoder is a startup
/// configuration error, not a runtime surprise.
pub struct DecoderRegistry {
    decoders: HashMap<FeedType, Box<dyn Decoder>>,
}

impl DecoderRegistry {
    pub fn new() -> Result<Self, DecodeError> {
        let mut decoders: HashMap<FeedType, Box<dyn Decoder>> = HashMap::new();
        decoders.insert(FeedType::GtfsSchedule, Box::new(GtfsScheduleDecoder));
        decoders.insert(
            FeedType::GtfsRtVehiclePositions,
            Box::new(GtfsRealtimeDecoder::new(FeedType::GtfsRtVehiclePositions)),
        );
        decoders.insert(
            FeedType::GtfsRtTripUpdates,
            Box::new(GtfsRealtimeDecoder::new(FeedType::GtfsRtTripUpdates)),
        );
        decoders.insert(
            FeedType::GtfsRtServiceAlerts,
            Box::new(GtfsRealtimeDecoder::new(FeedType::GtfsRtServiceAlerts)),
        );
        decoders.insert(FeedType::SeptaArrivals, Box::new(SeptaArrivalsDecoder));
        decoders.insert(
            FeedType::SeptaTrainView,
            Box::new(ListOfDictsDecoder::new(FeedType::SeptaTrainView)),
        );
        decoders.insert(
            FeedType::SeptaTransitViewAll,
            Box::new(SeptaTransitViewAllDecoder),
        );
        decoders.insert(FeedType::SeptaBusDetours, Box::new(SeptaBusDetoursDecoder));
        decoders.insert(
            FeedType::SeptaAlertsWithoutMessage,
            Box::new(ListOfDictsDecoder::new(FeedType::SeptaAlertsWithoutMessage)),
        );
        decoders.insert(
            FeedType::SeptaAlerts,
            Box::new(ListOfDictsDecoder::new(FeedType::SeptaAlerts)),
        );
        decoders.insert(
            FeedType::SeptaElevatorOutages,
            Box::new(SeptaElevatorOutagesDecoder),
        );

        let registry = Self { decoders };
        registry.assert_exhaustive()?;
        Ok(registry)
    }

    fn assert_exhaustive(&self) -> Result<(), DecodeError> {
        let missing: Vec<&'static str> = FeedType::ALL
            .iter()
            .filter(|ft| !self.decoders.contains_key(ft))
            .map(|ft| ft.value())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::IncompleteRegistry(missing))
        }
    }

    pub fn get(&self, feed_type: FeedType) -> Option<&dyn Decoder> {
        self.decoders.get(&feed_type).map(|b| b.as_ref())
    }

    pub fn decode(
        &self,
        feed_type: FeedType,
        bytes: &[u8],
    ) -> Result<Vec<DecodedGroup>, DecodeError> {
        match self.get(feed_type) {
            Some(decoder) => decoder.decode(bytes),
            None => Err(DecodeError::IncompleteRegistry(vec![feed_type.value()])),
        }
    }
}
