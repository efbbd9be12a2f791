use thiserror::Error;

#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error(transparent)]
    Decode(#[from] transit_decoders::DecodeError),
    #[error(transparent)]
    Storage(#[from] transit_object_store::StorageError),
    #[error(transparent)]
    Keying(#[from] transit_keying::KeyingError),
    #[error("malformed raw artifact json at {key}: {source}")]
    Envelope {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
