//! Conversation controller
//!
//! Drives one citizen event at a time: look the session up, run the pure
//! transition, then execute its effects in order against the session store
//! and the outbound collaborators.
//!
//! A close pause never blocks the worker. The effects after it are handed to
//! a timer and come back as [`Envelope::PauseElapsed`]; until then, messages
//! from the closing party are held back and replayed in arrival order.

use super::{DispatchError, Envelope, Services};
use crate::session::SessionStore;
use crate::state_machine::{transition, ConvContext, ConvState, Effect, Event, TransitionError};
use chrono::Utc;
use futures::FutureExt;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::mpsc;

pub struct ConversationController {
    sessions: SessionStore,
    services: Services,
    mailbox: mpsc::Sender<Envelope>,
    default_timeout_seconds: u64,
    close_pause: Duration,
    /// Sessions waiting out a close pause, with the `(sender, text)` they sent meanwhile
    closing: HashMap<String, VecDeque<(String, String)>>,
}

/// The rest of a transition's effects, parked behind a close pause
#[derive(Debug)]
pub struct Deferred {
    session_key: String,
    reply_to: String,
    new_state: ConvState,
    idle_timeout_seconds: u64,
    effects: Vec<Effect>,
}

/// Where the effects of one transition apply
struct Target<'a> {
    session_key: &'a str,
    reply_to: &'a str,
    new_state: &'a ConvState,
    idle_timeout_seconds: u64,
}

impl ConversationController {
    pub fn new(
        services: Services,
        mailbox: mpsc::Sender<Envelope>,
        default_timeout_seconds: u64,
        close_pause: Duration,
    ) -> Self {
        let sessions = SessionStore::new(services.resolver.clone(), services.scheduler.clone());
        Self {
            sessions,
            services,
            mailbox,
            default_timeout_seconds,
            close_pause,
            closing: HashMap::new(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Process one inbound citizen message
    pub async fn handle_inbound(&mut self, sender: &str, text: &str) -> Result<(), DispatchError> {
        let lookup = self.sessions.resolve_session_context(sender).await;
        let session_key = lookup.session_key;

        if let Some(backlog) = self.closing.get_mut(&session_key) {
            tracing::debug!(session_key = %session_key, "Holding message until session close completes");
            backlog.push_back((sender.to_string(), text.to_string()));
            return Ok(());
        }

        let doc = self.services.config.load().await?;

        let (state, session_timeout) = match self.sessions.get(&session_key) {
            Some(session) => (session.state.clone(), Some(session.timeout_seconds)),
            None => (ConvState::NoSession, None),
        };

        let mut context = ConvContext::new(&doc, self.default_timeout_seconds)
            .with_close_pause(self.close_pause);
        if let Some(seconds) = session_timeout {
            context = context.with_session_timeout(seconds);
        }

        let result = match transition(&state, &context, Event::inbound(text)) {
            Ok(result) => result,
            Err(TransitionError::EmptyMessage) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(
            session_key = %session_key,
            from = state.name(),
            to = result.new_state.name(),
            live = result.new_state.is_live(),
            "Conversation transition"
        );

        if let Some(session) = self.sessions.get_mut(&session_key) {
            session.state = result.new_state.clone();
            session.reply_to = sender.to_string();
            session.updated_at = Utc::now();
            self.sessions.register_aliases_for_jid(&session_key, sender);
        }

        let target = Target {
            session_key: &session_key,
            reply_to: sender,
            new_state: &result.new_state,
            idle_timeout_seconds: context.idle_timeout_seconds(),
        };
        self.execute_effects(&target, result.effects).await;
        Ok(())
    }

    /// Process a session timer fire; stale generations are ignored
    pub async fn handle_timeout(
        &mut self,
        session_key: &str,
        generation: u64,
    ) -> Result<(), DispatchError> {
        if !self.sessions.is_current_timer(session_key, generation) {
            tracing::debug!(session_key, generation, "Discarding stale session timer");
            return Ok(());
        }
        if self.closing.contains_key(session_key) {
            tracing::debug!(session_key, "Session is already closing; ignoring timer");
            return Ok(());
        }

        // On failure the session lingers until its next message
        let doc = self.services.config.load().await?;

        let Some(session) = self.sessions.get(session_key) else {
            return Ok(());
        };
        let state = session.state.clone();
        let reply_to = session.reply_to.clone();
        let context = ConvContext::new(&doc, self.default_timeout_seconds)
            .with_session_timeout(session.timeout_seconds)
            .with_close_pause(self.close_pause);

        let result = transition(&state, &context, Event::IdleTimeout)?;
        tracing::info!(session_key, "Session idle timeout");

        if let Some(session) = self.sessions.get_mut(session_key) {
            session.state = result.new_state.clone();
        }
        let target = Target {
            session_key,
            reply_to: &reply_to,
            new_state: &result.new_state,
            idle_timeout_seconds: context.idle_timeout_seconds(),
        };
        self.execute_effects(&target, result.effects).await;
        Ok(())
    }

    /// Finish a transition whose close pause elapsed, then replay the
    /// messages the party sent in the meantime
    pub async fn resume(&mut self, deferred: Deferred) {
        let Deferred {
            session_key,
            reply_to,
            new_state,
            idle_timeout_seconds,
            effects,
        } = deferred;
        let target = Target {
            session_key: &session_key,
            reply_to: &reply_to,
            new_state: &new_state,
            idle_timeout_seconds,
        };
        if !self.execute_effects(&target, effects).await {
            return;
        }

        let backlog = self.closing.remove(&session_key).unwrap_or_default();
        for (sender, text) in backlog {
            if let Err(e) = self.handle_inbound(&sender, &text).await {
                tracing::error!(session_key = %session_key, error = %e, "Error replaying held message");
            }
        }
    }

    /// Run effects in order; returns `false` when a pause parked the rest
    async fn execute_effects(&mut self, target: &Target<'_>, effects: Vec<Effect>) -> bool {
        let mut effects = effects.into_iter();
        while let Some(effect) = effects.next() {
            if let Effect::Pause { duration } = effect {
                self.defer(target, duration, effects.collect());
                return false;
            }
            self.execute_effect(target, effect).await;
        }
        true
    }

    fn defer(&mut self, target: &Target<'_>, duration: Duration, effects: Vec<Effect>) {
        self.closing
            .entry(target.session_key.to_string())
            .or_default();
        let deferred = Deferred {
            session_key: target.session_key.to_string(),
            reply_to: target.reply_to.to_string(),
            new_state: target.new_state.clone(),
            idle_timeout_seconds: target.idle_timeout_seconds,
            effects,
        };
        let mailbox = self.mailbox.clone();
        let task = async move {
            if mailbox.send(Envelope::PauseElapsed(deferred)).await.is_err() {
                tracing::debug!("Runtime stopped during close pause");
            }
        };
        // Never cancelled; the handle is not kept
        let _ = self.services.scheduler.schedule(duration, task.boxed());
    }

    async fn execute_effect(&mut self, target: &Target<'_>, effect: Effect) {
        match effect {
            Effect::StartSession => {
                let session = self.sessions.create_session(
                    target.session_key,
                    target.idle_timeout_seconds,
                    target.reply_to,
                );
                session.state = target.new_state.clone();
                self.sessions
                    .register_aliases_for_jid(target.session_key, target.reply_to);
                tracing::info!(session_key = %target.session_key, "Session started");
            }

            Effect::Send { text } => {
                if let Err(e) = self.services.transport.send(target.reply_to, &text).await {
                    tracing::error!(
                        session_key = %target.session_key,
                        to = %target.reply_to,
                        error = %e,
                        "Failed to send message"
                    );
                }
            }

            // Parked by execute_effects
            Effect::Pause { .. } => {}

            Effect::Record(event) => {
                if let Err(e) = self.services.analytics.record(event).await {
                    tracing::warn!(event = ?event, error = %e, "Failed to record analytics event");
                }
            }

            Effect::ScheduleTimeout { seconds } => {
                let mailbox = self.mailbox.clone();
                let key = target.session_key.to_string();
                let scheduled =
                    self.sessions
                        .schedule_session_timeout(target.session_key, seconds, move |generation| {
                            async move {
                                let fired = Envelope::SessionExpired {
                                    session_key: key,
                                    generation,
                                };
                                if mailbox.send(fired).await.is_err() {
                                    tracing::debug!("Runtime stopped before session timer fired");
                                }
                            }
                        });
                if scheduled.is_none() {
                    tracing::warn!(session_key = %target.session_key, "No session to schedule a timeout for");
                }
            }

            Effect::EndSession { reason } => {
                if self.sessions.delete_session(target.session_key).is_some() {
                    tracing::info!(
                        session_key = %target.session_key,
                        reason = reason.as_str(),
                        "Session ended"
                    );
                }
            }
        }
    }
}
