//! Runtime for dispatching inbound messages
//!
//! One worker owns every citizen session and admin flow. Inbound messages and
//! timer fires all arrive as [`Envelope`]s on a single mailbox, so a timer
//! can never race a message for the same party. Inbound messages are
//! filtered when they are received, so time spent queued never makes a
//! message stale.

mod controller;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use controller::{ConversationController, Deferred};
pub use traits::*;

use crate::admin::AdminWizard;
use crate::analytics::AnalyticsError;
use crate::config::{ConfigError, Settings};
use crate::identity::IdentityResolver;
use crate::session::Scheduler;
use crate::state_machine::TransitionError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Pseudo-identity status broadcasts arrive from
pub const STATUS_BROADCAST: &str = "status@broadcast";

const MAILBOX_CAPACITY: usize = 256;

/// Shared collaborators handed to the controller and the wizard
#[derive(Clone)]
pub struct Services {
    pub transport: Arc<dyn Transport>,
    pub config: Arc<dyn ConfigStore>,
    pub analytics: Arc<dyn Analytics>,
    pub resolver: IdentityResolver,
    pub scheduler: Arc<dyn Scheduler>,
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Analytics error: {0}")]
    Analytics(#[from] AnalyticsError),
    #[error("Transition rejected: {0}")]
    Transition(#[from] TransitionError),
    #[error("Runtime is not running")]
    MailboxClosed,
}

/// A message as delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender: String,
    pub text: String,
    /// Send time in epoch seconds, when the transport knows it
    pub timestamp: Option<i64>,
    /// Echo of our own outbound message
    pub from_me: bool,
}

impl InboundMessage {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            timestamp: None,
            from_me: false,
        }
    }

    /// Why this message must not be dispatched, if it must not
    pub fn drop_reason(&self, now: DateTime<Utc>, stale_after: Duration) -> Option<&'static str> {
        if self.from_me {
            return Some("from_me");
        }
        if self.sender.trim().is_empty() {
            return Some("no_sender");
        }
        if self.sender == STATUS_BROADCAST {
            return Some("status_broadcast");
        }
        if self.text.trim().is_empty() {
            return Some("empty");
        }
        let stale_after = i64::try_from(stale_after.as_secs()).unwrap_or(i64::MAX);
        match self.timestamp {
            Some(ts) if now.timestamp().saturating_sub(ts) > stale_after => Some("stale"),
            _ => None,
        }
    }
}

/// Everything the worker loop consumes
#[derive(Debug)]
pub enum Envelope {
    Inbound(InboundMessage),
    SessionExpired { session_key: String, generation: u64 },
    WizardExpired { admin: String, generation: u64 },
    PauseElapsed(Deferred),
}

/// Cloneable handle used by the HTTP layer to enqueue messages
#[derive(Clone)]
pub struct RuntimeHandle {
    tx: mpsc::Sender<Envelope>,
    stale_after: Duration,
}

impl RuntimeHandle {
    /// Filter and enqueue a message; `Ok(false)` means it was dropped
    pub async fn submit(&self, message: InboundMessage) -> Result<bool, DispatchError> {
        if let Some(reason) = message.drop_reason(Utc::now(), self.stale_after) {
            tracing::debug!(sender = %message.sender, reason, "Dropping inbound message");
            return Ok(false);
        }
        self.tx
            .send(Envelope::Inbound(message))
            .await
            .map_err(|_| DispatchError::MailboxClosed)?;
        Ok(true)
    }
}

/// The single worker that owns all conversation and wizard state
pub struct Runtime {
    controller: ConversationController,
    wizard: AdminWizard,
    mailbox: mpsc::Receiver<Envelope>,
}

impl Runtime {
    pub fn new(services: Services, settings: &Settings) -> (Self, RuntimeHandle) {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let controller = ConversationController::new(
            services.clone(),
            tx.clone(),
            settings.default_timeout_seconds,
            settings.close_pause,
        );
        let wizard = AdminWizard::new(
            services,
            tx.clone(),
            settings.superadmin.clone(),
            settings.admin_flow_timeout,
            settings.default_timeout_seconds,
        );
        let runtime = Self {
            controller,
            wizard,
            mailbox: rx,
        };
        let handle = RuntimeHandle {
            tx,
            stale_after: settings.stale_after,
        };
        (runtime, handle)
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!("Starting dispatch runtime");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                Some(envelope) = self.mailbox.recv() => self.dispatch(envelope).await,
                else => break,
            }
        }

        tracing::info!(
            live_sessions = self.controller.sessions().len(),
            "Dispatch runtime stopped"
        );
    }

    async fn dispatch(&mut self, envelope: Envelope) {
        let result = match envelope {
            Envelope::Inbound(message) => self.dispatch_inbound(message).await,
            Envelope::SessionExpired {
                session_key,
                generation,
            } => self.controller.handle_timeout(&session_key, generation).await,
            Envelope::WizardExpired { admin, generation } => {
                self.wizard.handle_timeout(&admin, generation).await;
                Ok(())
            }
            Envelope::PauseElapsed(deferred) => {
                self.controller.resume(deferred).await;
                Ok(())
            }
        };
        if let Err(e) = result {
            tracing::error!(error = %e, "Error handling envelope");
        }
    }

    async fn dispatch_inbound(&mut self, message: InboundMessage) -> Result<(), DispatchError> {
        let sender = message.sender.as_str();
        let text = message.text.trim();
        let is_admin = self.wizard.is_admin(sender).await?;
        tracing::info!(
            role = if is_admin { "ADMIN" } else { "CITIZEN" },
            sender = %sender,
            text = %text,
            "Inbound message"
        );

        if self.wizard.handle(sender, text, is_admin).await? {
            return Ok(());
        }
        self.controller.handle_inbound(sender, text).await
    }
}
