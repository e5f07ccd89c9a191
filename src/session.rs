//! Session store
//!
//! Owns the table of live conversations, the alias index used to re-find a
//! session when the same party shows up under another identity, and one idle
//! timer per session.

mod scheduler;

pub use scheduler::{Scheduler, TimerHandle, TokioScheduler};

use crate::identity::{local_part, IdentityResolver};
use crate::menu::MenuOptions;
use crate::state_machine::{AwaitingReply, ConvState};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// One party's in-progress conversation
#[derive(Debug)]
pub struct Session {
    pub session_key: String,
    /// Identities observed so far that route here
    pub aliases: HashSet<String>,
    pub state: ConvState,
    /// Identity the last inbound message came from; replies go here
    pub reply_to: String,
    pub timeout_seconds: u64,
    timer: Option<TimerHandle>,
    timer_generation: u64,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    fn new(session_key: String, timeout_seconds: u64, reply_to: String) -> Self {
        let now = Utc::now();
        Self {
            session_key,
            aliases: HashSet::new(),
            state: ConvState::NoSession,
            reply_to,
            timeout_seconds,
            timer: None,
            timer_generation: 0,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn current_options(&self) -> Option<&MenuOptions> {
        match &self.state {
            ConvState::Menu { options } => Some(options),
            _ => None,
        }
    }

    pub fn awaiting_reply_for(&self) -> Option<&AwaitingReply> {
        match &self.state {
            ConvState::AwaitingReply(pending) => Some(pending),
            _ => None,
        }
    }

    /// Generation of the live timer; a fire carrying any other value is stale
    pub fn timer_generation(&self) -> u64 {
        self.timer_generation
    }

    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

/// Result of looking an identity up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Key the session lives (or would live) under
    pub session_key: String,
    pub exists: bool,
}

pub struct SessionStore {
    resolver: IdentityResolver,
    scheduler: Arc<dyn Scheduler>,
    sessions: HashMap<String, Session>,
    alias_index: HashMap<String, String>,
}

impl SessionStore {
    pub fn new(resolver: IdentityResolver, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            resolver,
            scheduler,
            sessions: HashMap::new(),
            alias_index: HashMap::new(),
        }
    }

    /// Find the session for `identity`
    ///
    /// Falls back to the alias index (raw identity, then local part) when the
    /// canonical key has no session, so a party whose key resolution changed
    /// between messages keeps its conversation.
    pub async fn resolve_session_context(&self, identity: &str) -> SessionContext {
        let session_key = self.resolver.to_session_key(identity).await;
        if self.sessions.contains_key(&session_key) {
            return SessionContext {
                session_key,
                exists: true,
            };
        }

        let aliased = self
            .alias_index
            .get(identity)
            .or_else(|| self.alias_index.get(local_part(identity)))
            .filter(|key| self.sessions.contains_key(*key));
        match aliased {
            Some(key) => {
                tracing::debug!(identity, session_key = %key, "Session found through alias");
                SessionContext {
                    session_key: key.clone(),
                    exists: true,
                }
            }
            None => SessionContext {
                session_key,
                exists: false,
            },
        }
    }

    /// Register a fresh session; no timer is scheduled yet
    pub fn create_session(
        &mut self,
        session_key: &str,
        timeout_seconds: u64,
        reply_to: &str,
    ) -> &mut Session {
        if let Some(mut previous) = self.sessions.remove(session_key) {
            previous.cancel_timer();
        }
        self.sessions
            .entry(session_key.to_string())
            .or_insert_with(|| {
                Session::new(session_key.to_string(), timeout_seconds, reply_to.to_string())
            })
    }

    /// Make `identity` and its local part route to `session_key`
    pub fn register_aliases_for_jid(&mut self, session_key: &str, identity: &str) {
        let Some(session) = self.sessions.get_mut(session_key) else {
            return;
        };
        for alias in [identity, local_part(identity)] {
            if alias.is_empty() {
                continue;
            }
            session.aliases.insert(alias.to_string());
            self.alias_index
                .insert(alias.to_string(), session_key.to_string());
        }
    }

    /// Replace the session's idle timer
    ///
    /// `on_expire` receives the new timer generation and builds the task to run
    /// when it fires. Returns `None` when there is no such session.
    pub fn schedule_session_timeout<F, Fut>(
        &mut self,
        session_key: &str,
        seconds: u64,
        on_expire: F,
    ) -> Option<u64>
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let session = self.sessions.get_mut(session_key)?;
        session.cancel_timer();
        session.timer_generation += 1;
        session.timeout_seconds = seconds;
        session.updated_at = Utc::now();

        let generation = session.timer_generation;
        let task = on_expire(generation).boxed();
        session.timer = Some(self.scheduler.schedule(Duration::from_secs(seconds), task));
        Some(generation)
    }

    /// Remove a session, its timer, and every alias still pointing at it
    pub fn delete_session(&mut self, session_key: &str) -> Option<Session> {
        let mut session = self.sessions.remove(session_key)?;
        session.cancel_timer();
        for alias in &session.aliases {
            if self.alias_index.get(alias).map(String::as_str) == Some(session_key) {
                self.alias_index.remove(alias);
            }
        }
        Some(session)
    }

    /// Whether a fire for `generation` is still the live timer of `session_key`
    pub fn is_current_timer(&self, session_key: &str, generation: u64) -> bool {
        self.sessions
            .get(session_key)
            .is_some_and(|s| s.timer.is_some() && s.timer_generation == generation)
    }

    pub fn get(&self, session_key: &str) -> Option<&Session> {
        self.sessions.get(session_key)
    }

    pub fn get_mut(&mut self, session_key: &str) -> Option<&mut Session> {
        self.sessions.get_mut(session_key)
    }

    pub fn contains(&self, session_key: &str) -> bool {
        self.sessions.contains_key(session_key)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Session key an alias currently routes to
    #[cfg(test)]
    pub fn alias_target(&self, alias: &str) -> Option<&str> {
        self.alias_index.get(alias).map(String::as_str)
    }
}
