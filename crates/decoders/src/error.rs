use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("malformed csv in {entry}: {source}")]
    Csv {
        entry: String,
        #[source]
        source: csv::Error,
    },
    #[error("malformed protobuf: {0}")]
    Protobuf(#[from] prost::DecodeError),
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected shape: {0}")]
    Shape(String),
    #[error("io error reading entry {entry}: {source}")]
    Io {
        entry: String,
        #[source]
        source: std::io::Error,
    },
    #[error("decoder registry missing coverage for feed types: {0:?}")]
    IncompleteRegistry(Vec<&'static str>),
}
