//! Mock implementations for testing
//!
//! These mocks let the controller and wizard run without real I/O.

use super::traits::*;
use crate::analytics::{AnalyticsError, AnalyticsEvent};
use crate::config::{ConfigError, Document};
use crate::identity::Namespace;
use crate::transport::TransportError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Recording Transport
// ============================================================================

/// Transport that records every send
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail (they are still recorded)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All `(to, text)` pairs in send order
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, text)| text).collect()
    }

    pub fn last_text(&self) -> Option<String> {
        self.texts().pop()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, to: &str, text: &str) -> Result<(), TransportError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), text.to_string()));
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Status {
                status: 503,
                body: "mock failure".into(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// In-Memory Config Store
// ============================================================================

/// Config store holding one document in memory
#[derive(Default)]
pub struct MemoryConfigStore {
    doc: Mutex<Document>,
    saves: AtomicUsize,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
}

impl MemoryConfigStore {
    pub fn new(doc: Document) -> Self {
        Self {
            doc: Mutex::new(doc),
            ..Self::default()
        }
    }

    pub fn document(&self) -> Document {
        self.doc.lock().unwrap().clone()
    }

    /// Replace the stored document, as an out-of-band edit would
    pub fn replace(&self, doc: Document) {
        *self.doc.lock().unwrap() = doc;
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

fn mock_io_error() -> ConfigError {
    ConfigError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        "mock config failure",
    ))
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self) -> Result<Document, ConfigError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(mock_io_error());
        }
        Ok(self.document())
    }

    async fn save(&self, doc: &Document) -> Result<(), ConfigError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(mock_io_error());
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.replace(doc.clone());
        Ok(())
    }
}

// ============================================================================
// In-Memory Alias Store
// ============================================================================

/// Alias store backed by a shared map; clones see each other's inserts
#[derive(Clone, Default)]
pub struct MemoryAliasStore {
    entries: Arc<Mutex<HashMap<(Namespace, String), String>>>,
}

impl MemoryAliasStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert_pair`](Self::insert_pair)
    pub fn with_pair(self, phone: &str, lid: &str) -> Self {
        self.insert_pair(phone, lid);
        self
    }

    /// Record both directions of a phone/linked-id mapping
    pub fn insert_pair(&self, phone: &str, lid: &str) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert((Namespace::Primary, phone.to_string()), lid.to_string());
        entries.insert((Namespace::Linked, lid.to_string()), phone.to_string());
    }
}

#[async_trait]
impl AliasStore for MemoryAliasStore {
    async fn resolve_alias(&self, namespace: Namespace, local_id: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap()
            .get(&(namespace, local_id.to_string()))
            .cloned()
    }
}

// ============================================================================
// In-Memory Analytics
// ============================================================================

/// Analytics sink that keeps every event; counts ignore the window
#[derive(Default)]
pub struct MemoryAnalytics {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl MemoryAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<AnalyticsEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count_of(&self, event: AnalyticsEvent) -> usize {
        self.recorded().into_iter().filter(|e| *e == event).count()
    }
}

#[async_trait]
impl Analytics for MemoryAnalytics {
    async fn record(&self, event: AnalyticsEvent) -> Result<(), AnalyticsError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }

    async fn count(
        &self,
        event: AnalyticsEvent,
        _window_days: u32,
    ) -> Result<usize, AnalyticsError> {
        Ok(self.count_of(event))
    }
}
