//! Pure state transition function
//!
//! Given the same state, context and event this always produces the same
//! result; every side effect is described by the returned [`Effect`]s.

use super::effect::EndReason;
use super::state::AwaitingReply;
use super::{ConvContext, ConvState, Effect, Event};
use crate::analytics::AnalyticsEvent;
use crate::config::FlowMode;
use crate::menu::{render_menu, render_root, resolve_menu_node, Leaf, MenuNode};
use thiserror::Error;

/// Token that re-renders the root menu from any menu state
pub const RESTART_KEYWORD: &str = "menu";

pub const INVALID_CHOICE_TEXT: &str = "Invalid choice. Reply with one of the numbers shown in the menu, or type *menu* to go back to the start.";
pub const MENU_NOT_CONFIGURED_TEXT: &str =
    "The service menu has not been configured yet. Please contact an administrator.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Empty messages are not processed")]
    EmptyMessage,
    #[error("No active session for this event")]
    NoActiveSession,
}

pub fn transition(
    state: &ConvState,
    context: &ConvContext<'_>,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        (_, Event::Inbound { text }) if text.trim().is_empty() => Err(TransitionError::EmptyMessage),

        // ============================================================
        // Session start
        // ============================================================
        (ConvState::NoSession | ConvState::Terminated, Event::Inbound { .. }) => {
            let Some(root) = render_root(context.document, true) else {
                return Ok(TransitionResult::new(ConvState::NoSession)
                    .with_effect(Effect::Record(AnalyticsEvent::Chat))
                    .with_effect(Effect::send(MENU_NOT_CONFIGURED_TEXT)));
            };
            Ok(TransitionResult::new(ConvState::Menu {
                options: root.options,
            })
            .with_effects([
                Effect::StartSession,
                Effect::Record(AnalyticsEvent::SessionStart),
                Effect::Record(AnalyticsEvent::Chat),
                Effect::send(root.text),
                Effect::ScheduleTimeout {
                    seconds: context.idle_timeout_seconds(),
                },
            ]))
        }

        // ============================================================
        // Follow-up capture: any non-empty text is accepted verbatim
        // ============================================================
        (ConvState::AwaitingReply(AwaitingReply { success_reply, .. }), Event::Inbound { .. }) => {
            Ok(TransitionResult::new(ConvState::Terminated)
                .with_effect(Effect::Record(AnalyticsEvent::Chat))
                .with_effect(Effect::send(success_reply.clone()))
                .with_effects(closing_effects(context, EndReason::ReplyReceived)))
        }

        // ============================================================
        // Menu navigation
        // ============================================================
        (ConvState::Menu { options }, Event::Inbound { text }) => {
            let token = text.trim();
            let keep_alive = Effect::ScheduleTimeout {
                seconds: context.current_timeout_seconds(),
            };
            let chat = Effect::Record(AnalyticsEvent::Chat);

            if token.eq_ignore_ascii_case(RESTART_KEYWORD) {
                if let Some(root) = render_root(context.document, false) {
                    return Ok(TransitionResult::new(ConvState::Menu {
                        options: root.options,
                    })
                    .with_effects([chat, Effect::send(root.text), keep_alive]));
                }
            }

            let node = options
                .resolve(token)
                .and_then(|id| resolve_menu_node(context.document, id).map(|node| (id, node)));

            match node {
                None => Ok(TransitionResult::new(state.clone()).with_effects([
                    chat,
                    Effect::send(INVALID_CHOICE_TEXT),
                    keep_alive,
                ])),
                Some((_, MenuNode::Menu { text, next_menu })) => {
                    let rendered = render_menu(&text, &next_menu);
                    Ok(TransitionResult::new(ConvState::Menu {
                        options: rendered.options,
                    })
                    .with_effects([chat, Effect::send(rendered.text), keep_alive]))
                }
                Some((id, MenuNode::Leaf(leaf))) => Ok(leaf_selected(context, id, leaf)),
            }
        }

        // ============================================================
        // Idle timeout
        // ============================================================
        (ConvState::Menu { .. } | ConvState::AwaitingReply(_), Event::IdleTimeout) => {
            Ok(TransitionResult::new(ConvState::Terminated)
                .with_effect(Effect::send(context.document.timeout_text()))
                .with_effect(Effect::EndSession {
                    reason: EndReason::TimedOut,
                }))
        }

        (ConvState::NoSession | ConvState::Terminated, Event::IdleTimeout) => {
            Err(TransitionError::NoActiveSession)
        }
    }
}

fn leaf_selected(context: &ConvContext<'_>, id: &str, leaf: Leaf) -> TransitionResult {
    let mut effects = vec![Effect::Record(AnalyticsEvent::Chat)];
    if !leaf.text.trim().is_empty() {
        effects.push(Effect::send(leaf.text));
    }

    match leaf.flow_mode {
        FlowMode::Close => TransitionResult::new(ConvState::Terminated)
            .with_effects(effects)
            .with_effects(closing_effects(context, EndReason::Completed)),
        FlowMode::AwaitReply => {
            effects.push(Effect::ScheduleTimeout {
                seconds: leaf.await_timeout_seconds,
            });
            TransitionResult::new(ConvState::AwaitingReply(AwaitingReply {
                menu_id: id.to_string(),
                success_reply: leaf.success_reply,
            }))
            .with_effects(effects)
        }
    }
}

/// Pause, say goodbye, destroy the session
fn closing_effects(context: &ConvContext<'_>, reason: EndReason) -> Vec<Effect> {
    let mut effects = Vec::with_capacity(3);
    if !context.close_pause.is_zero() {
        effects.push(Effect::pause(context.close_pause));
    }
    effects.push(Effect::send(context.document.session_end_text()));
    effects.push(Effect::EndSession { reason });
    effects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        Document, MainMenuItem, NextMenuRow, SubMenuEntry, SubMenuNode, DEFAULT_SESSION_END_TEXT,
    };
    use crate::menu::MenuOptions;
    use std::time::Duration;

    fn doc() -> Document {
        let mut doc = Document::default();
        doc.greeting_message = Some("Hello!".into());
        doc.timeout_seconds = Some(30);
        doc.main_menu = vec![
            MainMenuItem::new("a", "A"),
            MainMenuItem {
                enabled: Some(false),
                ..MainMenuItem::new("b", "B")
            },
            MainMenuItem::new("c", "C"),
        ];
        doc.sub_menus.insert("a".into(), SubMenuEntry::Text("Leaf A".into()));
        doc.sub_menus.insert(
            "c".into(),
            SubMenuEntry::Node(SubMenuNode::menu(
                "Pick one",
                vec![NextMenuRow::new("c1", "Complaint"), NextMenuRow::new("gone", "Gone")],
            )),
        );
        doc.sub_menus.insert(
            "c1".into(),
            SubMenuEntry::Node(SubMenuNode {
                await_timeout_seconds: Some(120),
                success_reply: Some("Got it".into()),
                ..SubMenuNode::leaf("Thanks", FlowMode::AwaitReply)
            }),
        );
        doc
    }

    fn menu(ids: &[&str]) -> ConvState {
        ConvState::Menu {
            options: MenuOptions::from_ids(ids.iter().map(|s| (*s).to_string())),
        }
    }

    fn sends(result: &TransitionResult) -> Vec<&str> {
        result
            .effects
            .iter()
            .filter_map(|e| match e {
                Effect::Send { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_first_message_starts_session_with_root_menu() {
        let doc = doc();
        let ctx = ConvContext::new(&doc, 30);
        let result = transition(&ConvState::NoSession, &ctx, Event::inbound("hi")).unwrap();

        assert_eq!(result.new_state, menu(&["a", "c"]));
        assert_eq!(result.effects[0], Effect::StartSession);
        assert!(result
            .effects
            .contains(&Effect::Record(AnalyticsEvent::SessionStart)));
        assert!(sends(&result)[0].starts_with("Hello!"));
        assert_eq!(
            result.effects.last(),
            Some(&Effect::ScheduleTimeout { seconds: 30 })
        );
    }

    #[test]
    fn test_unconfigured_menu_creates_no_session() {
        let doc = Document::default();
        let ctx = ConvContext::new(&doc, 30);
        let result = transition(&ConvState::NoSession, &ctx, Event::inbound("hi")).unwrap();
        assert_eq!(result.new_state, ConvState::NoSession);
        assert_eq!(sends(&result), vec![MENU_NOT_CONFIGURED_TEXT]);
        assert!(!result.effects.contains(&Effect::StartSession));
    }

    #[test]
    fn test_second_root_option_maps_past_disabled_entry() {
        let doc = doc();
        let ctx = ConvContext::new(&doc, 30).with_session_timeout(30);
        let result = transition(&menu(&["a", "c"]), &ctx, Event::inbound("2")).unwrap();
        assert_eq!(result.new_state, menu(&["c1", "gone"]));
        assert!(sends(&result)[0].starts_with("Pick one"));
    }

    #[test]
    fn test_invalid_token_keeps_state_and_reschedules() {
        let doc = doc();
        let ctx = ConvContext::new(&doc, 30).with_session_timeout(45);
        let state = menu(&["a", "c"]);
        let result = transition(&state, &ctx, Event::inbound("7")).unwrap();
        assert_eq!(result.new_state, state);
        assert_eq!(sends(&result), vec![INVALID_CHOICE_TEXT]);
        assert!(result
            .effects
            .contains(&Effect::ScheduleTimeout { seconds: 45 }));
    }

    #[test]
    fn test_dangling_reference_is_invalid_choice() {
        let doc = doc();
        let ctx = ConvContext::new(&doc, 30);
        let state = menu(&["c1", "gone"]);
        let result = transition(&state, &ctx, Event::inbound("2")).unwrap();
        assert_eq!(result.new_state, state);
        assert_eq!(sends(&result), vec![INVALID_CHOICE_TEXT]);
    }

    #[test]
    fn test_close_leaf_terminates() {
        let doc = doc();
        let ctx = ConvContext::new(&doc, 30).with_close_pause(Duration::from_millis(500));
        let result = transition(&menu(&["a", "c"]), &ctx, Event::inbound("1")).unwrap();
        assert_eq!(result.new_state, ConvState::Terminated);
        assert_eq!(sends(&result), vec!["Leaf A", DEFAULT_SESSION_END_TEXT]);
        assert!(result
            .effects
            .contains(&Effect::pause(Duration::from_millis(500))));
        assert_eq!(
            result.effects.last(),
            Some(&Effect::EndSession {
                reason: EndReason::Completed
            })
        );
    }

    #[test]
    fn test_await_leaf_switches_timeout() {
        let doc = doc();
        let ctx = ConvContext::new(&doc, 30).with_session_timeout(30);
        let result = transition(&menu(&["c1", "gone"]), &ctx, Event::inbound("1")).unwrap();
        assert_eq!(
            result.new_state,
            ConvState::AwaitingReply(AwaitingReply {
                menu_id: "c1".into(),
                success_reply: "Got it".into(),
            })
        );
        assert_eq!(sends(&result), vec!["Thanks"]);
        assert_eq!(
            result.effects.last(),
            Some(&Effect::ScheduleTimeout { seconds: 120 })
        );
    }

    #[test]
    fn test_follow_up_accepted_verbatim() {
        let doc = doc();
        let ctx = ConvContext::new(&doc, 30).with_session_timeout(120);
        let state = ConvState::AwaitingReply(AwaitingReply {
            menu_id: "c1".into(),
            success_reply: "Got it".into(),
        });
        // Looks like a menu token but is still the follow-up
        let result = transition(&state, &ctx, Event::inbound("menu")).unwrap();
        assert_eq!(result.new_state, ConvState::Terminated);
        assert_eq!(sends(&result), vec!["Got it", DEFAULT_SESSION_END_TEXT]);
    }

    #[test]
    fn test_restart_keyword_renders_root_without_greeting() {
        let doc = doc();
        let ctx = ConvContext::new(&doc, 30).with_session_timeout(30);
        let result = transition(&menu(&["c1", "gone"]), &ctx, Event::inbound("MENU")).unwrap();
        assert_eq!(result.new_state, menu(&["a", "c"]));
        assert!(!sends(&result)[0].contains("Hello!"));
    }

    #[test]
    fn test_timeout_sends_timeout_text() {
        let mut doc = doc();
        doc.timeout_text = Some("Bye for now".into());
        let ctx = ConvContext::new(&doc, 30);
        let result = transition(&menu(&["a"]), &ctx, Event::IdleTimeout).unwrap();
        assert_eq!(result.new_state, ConvState::Terminated);
        assert_eq!(sends(&result), vec!["Bye for now"]);
    }

    #[test]
    fn test_rejections() {
        let doc = doc();
        let ctx = ConvContext::new(&doc, 30);
        assert_eq!(
            transition(&ConvState::NoSession, &ctx, Event::IdleTimeout).unwrap_err(),
            TransitionError::NoActiveSession
        );
        assert_eq!(
            transition(&menu(&["a"]), &ctx, Event::inbound("   ")).unwrap_err(),
            TransitionError::EmptyMessage
        );
    }
}
