use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeyingError {
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to resolve key/value {key:?}: {reason}")]
    UnresolvedValue { key: String, reason: String },
}
