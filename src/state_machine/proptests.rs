//! Property-based tests for the conversation state machine
//!
//! These tests verify key invariants hold across generated menus and inputs.

use super::effect::EndReason;
use super::state::*;
use super::transition::*;
use super::*;
use crate::config::{
    Document, FlowMode, MainMenuItem, NextMenuRow, SubMenuEntry, SubMenuNode,
};
use crate::menu::{render_root, resolve_menu_node, MenuOptions};
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_flow_mode() -> impl Strategy<Value = FlowMode> {
    prop_oneof![Just(FlowMode::Close), Just(FlowMode::AwaitReply)]
}

/// A root menu of 1..6 entries, each either a leaf or a one-level menu of leaves
fn arb_document() -> impl Strategy<Value = Document> {
    proptest::collection::vec(
        (
            any::<bool>(),
            proptest::option::of(proptest::collection::vec(arb_flow_mode(), 1..4)),
            arb_flow_mode(),
        ),
        1..6,
    )
    .prop_map(|entries| {
        let mut doc = Document::default();
        doc.timeout_seconds = Some(30);
        for (index, (enabled, children, mode)) in entries.into_iter().enumerate() {
            let id = format!("m{index}");
            doc.main_menu.push(MainMenuItem {
                enabled: Some(enabled),
                ..MainMenuItem::new(id.clone(), format!("Entry {index}"))
            });
            match children {
                Some(modes) => {
                    let mut rows = Vec::new();
                    for (child, child_mode) in modes.into_iter().enumerate() {
                        let child_id = format!("{id}-{child}");
                        rows.push(NextMenuRow::new(child_id.clone(), format!("Child {child}")));
                        doc.sub_menus.insert(
                            child_id,
                            SubMenuEntry::Node(SubMenuNode::leaf("child text", child_mode)),
                        );
                    }
                    doc.sub_menus
                        .insert(id, SubMenuEntry::Node(SubMenuNode::menu("Choose", rows)));
                }
                None => {
                    doc.sub_menus
                        .insert(id, SubMenuEntry::Node(SubMenuNode::leaf("leaf text", mode)));
                }
            }
        }
        doc
    })
}

fn arb_follow_up() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,40}[a-zA-Z0-9]"
}

fn end_count(effects: &[Effect]) -> usize {
    effects
        .iter()
        .filter(|e| matches!(e, Effect::EndSession { .. }))
        .count()
}

proptest! {
    /// Root numbering is contiguous 1..N over exactly the enabled entries
    #[test]
    fn root_numbering_is_contiguous(doc in arb_document()) {
        let enabled: Vec<String> = doc
            .main_menu
            .iter()
            .filter(|item| item.is_enabled())
            .map(|item| item.id.clone())
            .collect();

        match render_root(&doc, true) {
            None => prop_assert!(enabled.is_empty()),
            Some(rendered) => {
                let pairs: Vec<(String, String)> = rendered
                    .options
                    .entries()
                    .map(|(token, id)| (token, id.to_string()))
                    .collect();
                let expected: Vec<(String, String)> = enabled
                    .iter()
                    .enumerate()
                    .map(|(i, id)| ((i + 1).to_string(), id.clone()))
                    .collect();
                prop_assert_eq!(pairs, expected);
            }
        }
    }

    /// Walking valid options always ends in a close leaf or an await state,
    /// and a close leaf always ends the session exactly once
    #[test]
    fn valid_walks_reach_a_leaf(doc in arb_document(), picks in proptest::collection::vec(0usize..8, 3)) {
        let ctx = ConvContext::new(&doc, 30);
        let start = transition(&ConvState::NoSession, &ctx, Event::inbound("hello")).unwrap();
        let mut state = start.new_state;

        for pick in picks {
            let ConvState::Menu { options } = &state else { break };
            let token = (pick % options.len() + 1).to_string();
            let result = transition(&state, &ctx.with_session_timeout(30), Event::inbound(token)).unwrap();

            prop_assert_eq!(result.new_state.is_live(), end_count(&result.effects) == 0);
            match &result.new_state {
                ConvState::Terminated => {
                    prop_assert_eq!(end_count(&result.effects), 1);
                    prop_assert_eq!(
                        result.effects.last(),
                        Some(&Effect::EndSession { reason: EndReason::Completed })
                    );
                }
                ConvState::AwaitingReply(_) | ConvState::Menu { .. } => {
                    prop_assert_eq!(end_count(&result.effects), 0);
                }
                ConvState::NoSession => prop_assert!(false, "a live session cannot fall back to no session"),
            }
            state = result.new_state;
        }
    }

    /// Exactly one follow-up of any content closes an awaiting session
    #[test]
    fn any_follow_up_closes(doc in arb_document(), text in arb_follow_up()) {
        let ctx = ConvContext::new(&doc, 30).with_session_timeout(180);
        let state = ConvState::AwaitingReply(AwaitingReply {
            menu_id: "m0".into(),
            success_reply: "ok".into(),
        });
        let result = transition(&state, &ctx, Event::inbound(text)).unwrap();
        prop_assert_eq!(result.new_state, ConvState::Terminated);
        prop_assert_eq!(end_count(&result.effects), 1);
        prop_assert_eq!(&result.effects[1], &Effect::send("ok"));
    }

    /// Tokens that are not displayed options never move the state
    #[test]
    fn unknown_tokens_leave_state_untouched(doc in arb_document(), token in "[a-z]{1,6}|[0-9]{2,3}") {
        prop_assume!(!token.eq_ignore_ascii_case(RESTART_KEYWORD));
        let state = ConvState::Menu { options: MenuOptions::from_ids(vec!["m0".to_string()]) };
        let ctx = ConvContext::new(&doc, 30).with_session_timeout(30);
        let result = transition(&state, &ctx, Event::inbound(token)).unwrap();
        prop_assert_eq!(&result.new_state, &state);
        prop_assert!(result.effects.contains(&Effect::send(INVALID_CHOICE_TEXT)));
        let keep_alive = Effect::ScheduleTimeout { seconds: 30 };
        prop_assert!(result.effects.contains(&keep_alive));
    }

    /// The transition function is deterministic
    #[test]
    fn transition_is_pure(doc in arb_document(), token in "[1-6]") {
        let ctx = ConvContext::new(&doc, 30);
        let state = transition(&ConvState::NoSession, &ctx, Event::inbound("hi")).unwrap().new_state;
        let first = transition(&state, &ctx, Event::inbound(token.clone()));
        let second = transition(&state, &ctx, Event::inbound(token));
        match (first, second) {
            (Ok(a), Ok(b)) => {
                prop_assert_eq!(a.new_state, b.new_state);
                prop_assert_eq!(a.effects, b.effects);
            }
            (Err(a), Err(b)) => prop_assert_eq!(a, b),
            _ => prop_assert!(false, "same input produced different outcomes"),
        }
    }

    /// A string leaf and an object leaf with default fields resolve identically
    #[test]
    fn string_leaf_equals_default_object_leaf(text in "[a-zA-Z .]{0,30}") {
        let mut doc = Document::default();
        doc.sub_menus.insert("s".into(), SubMenuEntry::Text(text.clone()));
        doc.sub_menus.insert(
            "o".into(),
            SubMenuEntry::Node(SubMenuNode { text: Some(text), ..SubMenuNode::default() }),
        );
        prop_assert_eq!(resolve_menu_node(&doc, "s"), resolve_menu_node(&doc, "o"));
    }
}
