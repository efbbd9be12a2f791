//! transit-decoders: one decoder per FeedType, mapping raw fetched bytes to
//! a normalized sequence of `(sub_table, records)` groups.

pub mod error;
pub mod gtfs_realtime;
pub mod gtfs_rt_proto;
pub mod gtfs_schedule;
pub mod list_of_dicts;
pub mod model;
pub mod registry;
pub mod septa_arrivals;
pub mod septa_bus_detours;
pub mod septa_elevator_outages;
pub mod septa_transit_view_all;

pub use error::DecodeError;
pub use model::{combined_digest_hex, DecodedGroup, Decoder};
pub use registry::DecoderRegistry;
