//! API request and response types

use serde::{Deserialize, Serialize};

/// A message delivered by the transport gateway
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundRequest {
    pub sender: String,
    #[serde(default)]
    pub text: String,
    /// Epoch seconds
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub from_me: bool,
}

#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub queued: bool,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub days: u32,
    pub chats: usize,
    pub sessions: usize,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
