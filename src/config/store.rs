//! JSON file persistence for the configuration document

use super::{ConfigError, Document};
use crate::runtime::ConfigStore;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Reads and writes the whole document at `path`; last writer wins
#[derive(Debug, Clone)]
pub struct JsonFileConfigStore {
    path: PathBuf,
}

impl JsonFileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigStore for JsonFileConfigStore {
    async fn load(&self) -> Result<Document, ConfigError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn save(&self, doc: &Document) -> Result<(), ConfigError> {
        let raw = serde_json::to_string_pretty(doc)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Readers only ever see a complete document
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!(path = %self.path.display(), "Configuration saved");
        Ok(())
    }
}
