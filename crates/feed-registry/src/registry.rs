use std::path::Path;

use crate::error::FeedRegistryError;
use crate::feed::{FeedConfig, KeyValue};

/// A validated, loaded set of feed configs. Construction fails closed: any
/// single invalid entry rejects the whole file.
#[derive(Debug, Clone)]
pub struct FeedRegistry {
    feeds: Vec<FeedConfig>,
}

impl FeedRegistry {
    /// Load and validate a list of `FeedConfig` from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FeedRegistryError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, FeedRegistryError> {
        let feeds: Vec<FeedConfig> = serde_yaml::from_str(raw)?;
        for feed in &feeds {
            feed.validate()?;
        }
        Ok(Self { feeds })
    }

    pub fn all_feeds(&self) -> &[FeedConfig] {
        &self.feeds
    }

    /// Expand a single config into the `(config, page_values)` tuples that
    /// must each be fetched. An empty `pages` yields one tuple with no page
    /// parameters; a single paginated dimension yields one tuple per value.
    pub fn expand<'a>(
        &self,
        config: &'a FeedConfig,
    ) -> Result<Vec<(&'a FeedConfig, Vec<KeyValue>)>, FeedRegistryError> {
        Ok(config
            .expand_pages()?
            .into_iter()
            .map(|page| (config, page))
            .collect())
    }

    /// `expand` over every registered feed.
    pub fn expand_all(&self) -> Result<Vec<(&FeedConfig, Vec<KeyValue>)>, FeedRegistryError> {
        let mut out = Vec::new();
        for feed in &self.feeds {
            out.extend(self.expand(feed)?);
        }
        Ok(out)
    }
}
