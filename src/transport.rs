//! Outbound message delivery
//!
//! The messaging gateway itself lives outside this process. Outbound text is
//! POSTed to it as `{ "to": <identity>, "text": <text> }`; without a gateway
//! URL every send is only logged.

use crate::runtime::Transport;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Gateway rejected message with status {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Serialize)]
struct OutboundMessage<'a> {
    to: &'a str,
    text: &'a str,
}

/// Delivers messages by POSTing them to the gateway
pub struct WebhookTransport {
    client: Client,
    url: String,
}

impl WebhookTransport {
    pub fn new(url: impl Into<String>) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Transport for WebhookTransport {
    async fn send(&self, to: &str, text: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .post(&self.url)
            .json(&OutboundMessage { to, text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Writes outbound messages to the log instead of delivering them
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl Transport for LogTransport {
    async fn send(&self, to: &str, text: &str) -> Result<(), TransportError> {
        tracing::info!(to = %to, text = %text, "Outbound message (no gateway configured)");
        Ok(())
    }
}
