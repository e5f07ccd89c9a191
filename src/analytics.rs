//! Time-windowed event counters
//!
//! Timestamps are kept in a small JSON file and pruned to the retention
//! window on every read and write. An unparsable file is moved aside before
//! the next write instead of being overwritten.

use crate::runtime::Analytics;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::Mutex;

/// Longest window that can be counted
pub const MAX_RETENTION_DAYS: i64 = 370;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalyticsEvent {
    /// Any inbound message handled by the conversation flow
    Chat,
    /// A new conversation session
    SessionStart,
}

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Analytics I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Analytics JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyticsData {
    #[serde(default, deserialize_with = "epoch_millis")]
    chat_timestamps: Vec<i64>,
    #[serde(default, deserialize_with = "epoch_millis")]
    session_timestamps: Vec<i64>,
}

/// Keeps the numeric entries of an array; anything else is an empty series
#[allow(clippy::cast_possible_truncation)]
fn epoch_millis<'de, D>(deserializer: D) -> Result<Vec<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(Value::Array(items)) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .iter()
        .filter_map(|item| match item {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .collect())
}

impl AnalyticsData {
    fn series_mut(&mut self, event: AnalyticsEvent) -> &mut Vec<i64> {
        match event {
            AnalyticsEvent::Chat => &mut self.chat_timestamps,
            AnalyticsEvent::SessionStart => &mut self.session_timestamps,
        }
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = cutoff_millis(now, MAX_RETENTION_DAYS);
        self.chat_timestamps.retain(|ts| *ts >= cutoff);
        self.session_timestamps.retain(|ts| *ts >= cutoff);
    }
}

fn cutoff_millis(now: DateTime<Utc>, days: i64) -> i64 {
    (now - Duration::days(days)).timestamp_millis()
}

/// File-backed analytics counters
pub struct JsonFileAnalytics {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file
    lock: Mutex<()>,
}

impl JsonFileAnalytics {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// A missing file is empty; read and parse failures are errors
    async fn load(&self) -> Result<AnalyticsData, AnalyticsError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(AnalyticsData::default())
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    /// Move an unparsable file aside so that no write replaces it
    async fn quarantine(&self) -> Result<PathBuf, AnalyticsError> {
        let aside = self.path.with_extension("json.corrupt");
        tokio::fs::rename(&self.path, &aside).await?;
        Ok(aside)
    }

    async fn store(&self, data: &AnalyticsData) -> Result<(), AnalyticsError> {
        let raw = serde_json::to_string_pretty(data)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    pub async fn record_at(
        &self,
        event: AnalyticsEvent,
        at: DateTime<Utc>,
    ) -> Result<(), AnalyticsError> {
        let _guard = self.lock.lock().await;
        let mut data = match self.load().await {
            Ok(data) => data,
            Err(AnalyticsError::Json(e)) => {
                let aside = self.quarantine().await?;
                tracing::warn!(
                    path = %self.path.display(),
                    moved_to = %aside.display(),
                    error = %e,
                    "Analytics file corrupt, moved aside"
                );
                AnalyticsData::default()
            }
            Err(e) => return Err(e),
        };
        data.prune(at);
        data.series_mut(event).push(at.timestamp_millis());
        self.store(&data).await
    }

    pub async fn count_at(
        &self,
        event: AnalyticsEvent,
        window_days: u32,
        now: DateTime<Utc>,
    ) -> Result<usize, AnalyticsError> {
        let _guard = self.lock.lock().await;
        let mut data = match self.load().await {
            Ok(data) => data,
            Err(AnalyticsError::Json(e)) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Analytics file corrupt, counting zero");
                AnalyticsData::default()
            }
            Err(e) => return Err(e),
        };
        data.prune(now);
        let cutoff = cutoff_millis(now, i64::from(window_days));
        Ok(data
            .series_mut(event)
            .iter()
            .filter(|ts| **ts >= cutoff)
            .count())
    }
}

#[async_trait]
impl Analytics for JsonFileAnalytics {
    async fn record(&self, event: AnalyticsEvent) -> Result<(), AnalyticsError> {
        self.record_at(event, Utc::now()).await
    }

    async fn count(&self, event: AnalyticsEvent, window_days: u32) -> Result<usize, AnalyticsError> {
        self.count_at(event, window_days, Utc::now()).await
    }
}
