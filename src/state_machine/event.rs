//! Events that can occur in a conversation

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A text message from the party, already trimmed
    Inbound { text: String },

    /// The session's live idle timer fired
    IdleTimeout,
}

impl Event {
    pub fn inbound(text: impl Into<String>) -> Self {
        Event::Inbound { text: text.into() }
    }
}
