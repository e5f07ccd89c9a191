//! Effects produced by state transitions

use crate::analytics::AnalyticsEvent;
use std::time::Duration;

/// Why a session was destroyed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// A closing leaf was shown
    Completed,
    /// The awaited follow-up arrived
    ReplyReceived,
    /// The idle timer fired
    TimedOut,
}

impl EndReason {
    pub fn as_str(self) -> &'static str {
        match self {
            EndReason::Completed => "completed",
            EndReason::ReplyReceived => "reply_received",
            EndReason::TimedOut => "timed_out",
        }
    }
}

/// Effects to be executed after state transition, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Register a new session row
    StartSession,

    /// Send text to the party
    Send { text: String },

    /// Wait before the next effect
    Pause { duration: Duration },

    /// Count an analytics event
    Record(AnalyticsEvent),

    /// Replace the idle timer, making `seconds` the session's timeout
    ScheduleTimeout { seconds: u64 },

    /// Destroy the session
    EndSession { reason: EndReason },
}

impl Effect {
    pub fn send(text: impl Into<String>) -> Self {
        Effect::Send { text: text.into() }
    }

    pub fn pause(duration: Duration) -> Self {
        Effect::Pause { duration }
    }
}
