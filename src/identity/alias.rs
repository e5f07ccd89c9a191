//! File-backed alias lookups
//!
//! The transport writes one small JSON file per known mapping:
//! `lid-mapping-<phone>.json` holds the linked id for a phone number and
//! `lid-mapping-<lid>_reverse.json` holds the phone number for a linked id.
//! Each file contains a single JSON string.

use super::{digits, Namespace};
use crate::runtime::AliasStore;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FileAliasStore {
    dir: PathBuf,
}

impl FileAliasStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn mapping_path(&self, namespace: Namespace, local_id: &str) -> Option<PathBuf> {
        // Only digits ever reach the file name
        let id = digits(local_id);
        if id.is_empty() {
            return None;
        }
        let name = match namespace {
            Namespace::Linked => format!("lid-mapping-{id}_reverse.json"),
            Namespace::Primary => format!("lid-mapping-{id}.json"),
            Namespace::Other => return None,
        };
        Some(self.dir.join(name))
    }
}

async fn read_json_string(path: &Path) -> Option<String> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Alias file unreadable");
            return None;
        }
    };
    match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(serde_json::Value::String(s)) => Some(s),
        Ok(serde_json::Value::Number(n)) => Some(n.to_string()),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Alias file is not JSON");
            None
        }
    }
}

#[async_trait]
impl AliasStore for FileAliasStore {
    async fn resolve_alias(&self, namespace: Namespace, local_id: &str) -> Option<String> {
        let path = self.mapping_path(namespace, local_id)?;
        let mapped = digits(&read_json_string(&path).await?);
        (!mapped.is_empty()).then_some(mapped)
    }
}
