//! Conversation state types

use crate::config::Document;
use crate::menu::MenuOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A leaf that is waiting for the party's free-text follow-up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwaitingReply {
    pub menu_id: String,
    pub success_reply: String,
}

/// Conversation state
///
/// `Menu` and `AwaitingReply` are exclusive by construction: whichever one
/// the session is in decides how the next inbound message is read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConvState {
    /// Nobody is talking to us under this key
    #[default]
    NoSession,

    /// A menu was just rendered; the next token picks one of its options
    Menu { options: MenuOptions },

    /// A leaf asked for one more message, accepted verbatim
    AwaitingReply(AwaitingReply),

    /// The conversation just ended; the session is destroyed
    Terminated,
}

impl ConvState {
    /// Whether a session row exists in this state
    pub fn is_live(&self) -> bool {
        matches!(self, ConvState::Menu { .. } | ConvState::AwaitingReply(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConvState::NoSession => "no_session",
            ConvState::Menu { .. } => "menu",
            ConvState::AwaitingReply(_) => "awaiting_reply",
            ConvState::Terminated => "terminated",
        }
    }
}

/// Everything a transition may read besides the state itself
#[derive(Debug, Clone, Copy)]
pub struct ConvContext<'a> {
    /// Configuration as loaded for this event
    pub document: &'a Document,
    /// Idle timeout used when the document sets none
    pub default_timeout_seconds: u64,
    /// Timeout the session currently runs with, if there is a session
    pub session_timeout_seconds: Option<u64>,
    /// Pause between a closing text and the session-end text
    pub close_pause: Duration,
}

impl<'a> ConvContext<'a> {
    pub fn new(document: &'a Document, default_timeout_seconds: u64) -> Self {
        Self {
            document,
            default_timeout_seconds,
            session_timeout_seconds: None,
            close_pause: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_session_timeout(mut self, seconds: u64) -> Self {
        self.session_timeout_seconds = Some(seconds);
        self
    }

    #[must_use]
    pub fn with_close_pause(mut self, pause: Duration) -> Self {
        self.close_pause = pause;
        self
    }

    /// Timeout for a brand-new session
    pub fn idle_timeout_seconds(&self) -> u64 {
        self.document
            .timeout_seconds_or(self.default_timeout_seconds)
    }

    /// Timeout to keep an existing session alive with
    pub fn current_timeout_seconds(&self) -> u64 {
        self.session_timeout_seconds
            .unwrap_or_else(|| self.idle_timeout_seconds())
    }
}
