//! Admin settings wizard
//!
//! A second keyed state machine, one flow per admin party, that edits the
//! configuration document through chat. Every flow carries its own idle timer;
//! fires come back through the runtime mailbox like session timers do.

mod commands;
mod screens;
mod state;
mod wizard;

pub use state::WizardState;

use crate::analytics::AnalyticsEvent;
use crate::menu::sub_menu_setting_targets;
use crate::runtime::{DispatchError, Envelope, Services};
use crate::session::TimerHandle;
use commands::{AddOutcome, Command, RemoveOutcome};
use futures::FutureExt;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

/// Windows reported by `/stats`
const STATS_WINDOWS: [u32; 3] = [1, 7, 30];

struct Flow {
    state: WizardState,
    reply_to: String,
    timer: Option<TimerHandle>,
    generation: u64,
}

impl Flow {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

pub struct AdminWizard {
    services: Services,
    mailbox: mpsc::Sender<Envelope>,
    superadmin: String,
    flow_timeout: Duration,
    /// Idle timeout shown when the document sets none
    default_timeout_seconds: u64,
    flows: HashMap<String, Flow>,
}

impl AdminWizard {
    pub fn new(
        services: Services,
        mailbox: mpsc::Sender<Envelope>,
        superadmin: impl Into<String>,
        flow_timeout: Duration,
        default_timeout_seconds: u64,
    ) -> Self {
        Self {
            services,
            mailbox,
            superadmin: superadmin.into(),
            flow_timeout,
            default_timeout_seconds,
            flows: HashMap::new(),
        }
    }

    /// Whether `identity` may use admin commands
    pub async fn is_admin(&self, identity: &str) -> Result<bool, DispatchError> {
        let doc = self.services.config.load().await?;
        Ok(commands::is_admin(&self.services.resolver, &doc, &self.superadmin, identity).await)
    }

    /// Current wizard state for a party, if a flow is open
    #[cfg(test)]
    pub async fn flow_state(&self, identity: &str) -> Option<&WizardState> {
        let key = self.services.resolver.to_session_key(identity).await;
        self.flows.get(&key).map(|flow| &flow.state)
    }

    /// Offer a message to the wizard; `Ok(false)` means it is not for us
    pub async fn handle(
        &mut self,
        identity: &str,
        text: &str,
        is_admin: bool,
    ) -> Result<bool, DispatchError> {
        let key = self.services.resolver.to_session_key(identity).await;
        let command = Command::parse(text);

        if command.is_none() && !self.flows.contains_key(&key) {
            return Ok(false);
        }

        if !is_admin {
            if let Some(mut flow) = self.flows.remove(&key) {
                flow.cancel_timer();
            }
            return match command {
                Some(command) => {
                    tracing::warn!(sender = %identity, command = command.name(), "Admin command denied");
                    self.reply(identity, screens::ACCESS_DENIED_TEXT).await;
                    Ok(true)
                }
                None => Ok(false),
            };
        }

        match command {
            Some(command) => self.run_command(&key, identity, command).await?,
            None => self.advance_flow(&key, identity, text).await?,
        }
        Ok(true)
    }

    /// Close a flow whose timer fired; stale generations are ignored
    pub async fn handle_timeout(&mut self, key: &str, generation: u64) {
        let current = self
            .flows
            .get(key)
            .is_some_and(|flow| flow.generation == generation);
        if !current {
            tracing::debug!(admin = key, generation, "Discarding stale wizard timer");
            return;
        }
        if let Some(flow) = self.flows.remove(key) {
            tracing::info!(admin = key, state = flow.state.name(), "Settings flow timed out");
            self.reply(&flow.reply_to, screens::WIZARD_TIMEOUT_TEXT).await;
        }
    }

    async fn run_command(
        &mut self,
        key: &str,
        identity: &str,
        command: Command,
    ) -> Result<(), DispatchError> {
        tracing::info!(sender = %identity, command = command.name(), "Admin command");
        match command {
            Command::Settings => {
                self.open_flow(key, identity, WizardState::SettingsMenu);
                self.reply(identity, &screens::settings_menu()).await;
            }
            Command::Cancel => {
                let text = match self.flows.remove(key) {
                    Some(mut flow) => {
                        flow.cancel_timer();
                        screens::CANCELLED_TEXT
                    }
                    None => screens::NOTHING_TO_CANCEL_TEXT,
                };
                self.reply(identity, text).await;
            }
            Command::AddAdmin(raw) => {
                let mut doc = self.services.config.load().await?;
                let outcome =
                    commands::add_admin(&self.services.resolver, &mut doc, &self.superadmin, &raw)
                        .await;
                let text = match outcome {
                    AddOutcome::Added(added) => {
                        self.services.config.save(&doc).await?;
                        tracing::info!(by = %identity, added = ?added, "Admin added");
                        format!("Added administrator {}.", added.join(", "))
                    }
                    AddOutcome::AlreadyAdmin(who) => format!("{who} is already an administrator."),
                    AddOutcome::InvalidNumber => "Usage: /addadmin <phone number>".to_string(),
                };
                self.reply(identity, &text).await;
            }
            Command::DelAdmin(raw) => {
                let mut doc = self.services.config.load().await?;
                let outcome = commands::remove_admin(
                    &self.services.resolver,
                    &mut doc,
                    &self.superadmin,
                    &raw,
                )
                .await;
                let text = match outcome {
                    RemoveOutcome::Removed(removed) => {
                        self.services.config.save(&doc).await?;
                        tracing::info!(by = %identity, removed = ?removed, "Admin removed");
                        format!("Removed administrator {}.", removed.join(", "))
                    }
                    RemoveOutcome::NotAdmin(who) => format!("{who} is not an administrator."),
                    RemoveOutcome::Protected => "The superadmin cannot be removed.".to_string(),
                    RemoveOutcome::InvalidNumber => "Usage: /deladmin <phone number>".to_string(),
                };
                self.reply(identity, &text).await;
            }
            Command::Admins => {
                let doc = self.services.config.load().await?;
                let text =
                    commands::list_admins(&self.services.resolver, &doc, &self.superadmin).await;
                self.reply(identity, &text).await;
            }
            Command::Flows => {
                let doc = self.services.config.load().await?;
                let text = screens::flows_listing(&sub_menu_setting_targets(&doc));
                self.reply(identity, &text).await;
            }
            Command::Stats => {
                let mut rows = Vec::with_capacity(STATS_WINDOWS.len());
                for days in STATS_WINDOWS {
                    let analytics = &self.services.analytics;
                    let chats = analytics.count(AnalyticsEvent::Chat, days).await?;
                    let sessions = analytics.count(AnalyticsEvent::SessionStart, days).await?;
                    rows.push((days, chats, sessions));
                }
                self.reply(identity, &screens::stats_report(&rows)).await;
            }
        }
        Ok(())
    }

    async fn advance_flow(
        &mut self,
        key: &str,
        identity: &str,
        text: &str,
    ) -> Result<(), DispatchError> {
        let mut doc = self.services.config.load().await?;
        let Some(flow) = self.flows.get(key) else {
            return Ok(());
        };
        let step = wizard::advance(
            &flow.state,
            &mut doc,
            text.trim(),
            self.default_timeout_seconds,
        );
        tracing::debug!(
            admin = key,
            from = flow.state.name(),
            to = step.next.name(),
            persist = step.persist,
            "Wizard step"
        );

        if step.persist {
            if let Err(e) = self.services.config.save(&doc).await {
                // Keep the admin where they were so they can retry
                self.reply(identity, screens::SAVE_FAILED_TEXT).await;
                self.touch_flow(key, identity);
                return Err(e.into());
            }
        }

        match step.next {
            WizardState::Idle => {
                if let Some(mut flow) = self.flows.remove(key) {
                    flow.cancel_timer();
                }
            }
            next => {
                if let Some(flow) = self.flows.get_mut(key) {
                    flow.state = next;
                }
                self.touch_flow(key, identity);
            }
        }
        self.reply(identity, &step.reply).await;
        Ok(())
    }

    fn open_flow(&mut self, key: &str, identity: &str, state: WizardState) {
        let flow = self.flows.entry(key.to_string()).or_insert_with(|| Flow {
            state: WizardState::Idle,
            reply_to: identity.to_string(),
            timer: None,
            generation: 0,
        });
        flow.state = state;
        self.touch_flow(key, identity);
    }

    /// Record the reply address and restart the flow's timer
    fn touch_flow(&mut self, key: &str, identity: &str) {
        let Some(flow) = self.flows.get_mut(key) else {
            return;
        };
        flow.reply_to = identity.to_string();
        flow.cancel_timer();
        flow.generation += 1;

        let generation = flow.generation;
        let mailbox = self.mailbox.clone();
        let admin = key.to_string();
        let task = async move {
            if mailbox
                .send(Envelope::WizardExpired { admin, generation })
                .await
                .is_err()
            {
                tracing::debug!("Runtime stopped before wizard timer fired");
            }
        };
        flow.timer = Some(
            self.services
                .scheduler
                .schedule(self.flow_timeout, task.boxed()),
        );
    }

    async fn reply(&self, to: &str, text: &str) {
        if let Err(e) = self.services.transport.send(to, text).await {
            tracing::error!(to = %to, error = %e, "Failed to send admin reply");
        }
    }
}
