//! Trait abstractions for runtime I/O
//!
//! These traits let the controller and wizard run against in-memory mocks.

use crate::analytics::{AnalyticsError, AnalyticsEvent};
use crate::config::{ConfigError, Document};
use crate::identity::Namespace;
use crate::transport::TransportError;
use async_trait::async_trait;
use std::sync::Arc;

/// Outbound message delivery
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `text` to the identity `to`
    async fn send(&self, to: &str, text: &str) -> Result<(), TransportError>;
}

/// Persistent menu configuration
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read the whole document; callers never cache it across messages
    async fn load(&self) -> Result<Document, ConfigError>;

    /// Replace the whole document
    async fn save(&self, doc: &Document) -> Result<(), ConfigError>;
}

/// Primary/linked identity mappings
#[async_trait]
pub trait AliasStore: Send + Sync {
    /// Look up the counterpart of `local_id` in `namespace`, if one is known
    async fn resolve_alias(&self, namespace: Namespace, local_id: &str) -> Option<String>;
}

/// Time-windowed event counters
#[async_trait]
pub trait Analytics: Send + Sync {
    async fn record(&self, event: AnalyticsEvent) -> Result<(), AnalyticsError>;

    async fn count(&self, event: AnalyticsEvent, window_days: u32)
        -> Result<usize, AnalyticsError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, to: &str, text: &str) -> Result<(), TransportError> {
        (**self).send(to, text).await
    }
}

#[async_trait]
impl<T: ConfigStore + ?Sized> ConfigStore for Arc<T> {
    async fn load(&self) -> Result<Document, ConfigError> {
        (**self).load().await
    }

    async fn save(&self, doc: &Document) -> Result<(), ConfigError> {
        (**self).save(doc).await
    }
}

#[async_trait]
impl<T: AliasStore + ?Sized> AliasStore for Arc<T> {
    async fn resolve_alias(&self, namespace: Namespace, local_id: &str) -> Option<String> {
        (**self).resolve_alias(namespace, local_id).await
    }
}

#[async_trait]
impl<T: Analytics + ?Sized> Analytics for Arc<T> {
    async fn record(&self, event: AnalyticsEvent) -> Result<(), AnalyticsError> {
        (**self).record(event).await
    }

    async fn count(
        &self,
        event: AnalyticsEvent,
        window_days: u32,
    ) -> Result<usize, AnalyticsError> {
        (**self).count(event, window_days).await
    }
}
