use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedRegistryError {
    #[error("failed to read feed config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse feed config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid feed config {name}: {reason}")]
    Validation { name: String, reason: String },
}
