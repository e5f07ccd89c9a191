//! Pure admin wizard transitions
//!
//! [`advance`] edits the in-memory document and says what to reply, where to
//! go next and whether to save. Invalid input always re-prompts from the same
//! state.

use super::screens;
use super::state::{LeafSetting, TextField, WizardState, WizardStep};
use crate::config::{Document, FlowMode};
use crate::menu::{
    has_await_reply_leaf, resolve_menu_node, set_await_timeout, set_flow_mode, set_success_reply,
    title_index, MenuChoice, MenuNode,
};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

pub const IDLE_TIMEOUT_RANGE: (u64, u64) = (10, 3600);
pub const AWAIT_TIMEOUT_RANGE: (u64, u64) = (10, 86_400);

const NO_LONGER_A_LEAF_TEXT: &str =
    "That entry is no longer a single response, so the setting was not changed.";

static TOGGLE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(\d+)\s+(on|off)\s*$").ok());

/// Feed one (trimmed, non-empty) admin message to the wizard
///
/// `default_timeout_seconds` is the idle timeout in effect when the document
/// sets none.
pub fn advance(
    state: &WizardState,
    doc: &mut Document,
    input: &str,
    default_timeout_seconds: u64,
) -> WizardStep {
    match state {
        WizardState::Idle => WizardStep::closed(screens::settings_menu()),
        WizardState::SettingsMenu => settings_choice(doc, input, default_timeout_seconds),
        WizardState::EditText(field) => edit_text(*field, doc, input),
        WizardState::EditIdleTimeout => edit_idle_timeout(doc, input),
        WizardState::ToggleMainMenu => toggle_main_menu(doc, input),
        WizardState::ReorderMainMenu => reorder_main_menu(doc, input),
        WizardState::PickTarget {
            purpose,
            trail,
            choices,
        } => pick_target(doc, *purpose, trail, choices, input),
        WizardState::EditLeaf { purpose, target } => edit_leaf(doc, *purpose, target, input),
    }
}

fn stay(state: &WizardState, reply: impl Into<String>) -> WizardStep {
    WizardStep::to(state.clone(), reply)
}

fn settings_choice(doc: &Document, input: &str, default_timeout_seconds: u64) -> WizardStep {
    let text_field = |field| WizardStep::to(WizardState::EditText(field), screens::text_prompt(field, doc));
    match input {
        "1" => text_field(TextField::Greeting),
        "2" => text_field(TextField::SessionEnd),
        "3" => text_field(TextField::Timeout),
        "4" => WizardStep::to(
            WizardState::EditIdleTimeout,
            screens::idle_timeout_prompt(doc.timeout_seconds_or(default_timeout_seconds)),
        ),
        "5" | "6" if doc.main_menu.is_empty() => stay(
            &WizardState::SettingsMenu,
            "The main menu has no entries yet.",
        ),
        "5" => WizardStep::to(WizardState::ToggleMainMenu, screens::toggle_prompt(doc)),
        "6" => WizardStep::to(WizardState::ReorderMainMenu, screens::reorder_prompt(doc)),
        "7" => start_picker(doc, LeafSetting::FlowMode),
        "8" => start_picker(doc, LeafSetting::AwaitTimeout),
        "9" => start_picker(doc, LeafSetting::SuccessReply),
        _ => stay(&WizardState::SettingsMenu, screens::invalid_settings_choice()),
    }
}

fn edit_text(field: TextField, doc: &mut Document, input: &str) -> WizardStep {
    let value = Some(input.to_string());
    match field {
        TextField::Greeting => doc.greeting_message = value,
        TextField::SessionEnd => doc.session_end_text = value,
        TextField::Timeout => doc.timeout_text = value,
    }
    WizardStep::saved(screens::text_saved(field))
}

/// Parse a whole number of seconds inside `range`
fn parse_seconds(input: &str, (min, max): (u64, u64)) -> Option<u64> {
    input
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|v| (min..=max).contains(v))
}

fn out_of_range(range: (u64, u64)) -> String {
    format!(
        "Please send a whole number of seconds between {} and {}.",
        range.0, range.1
    )
}

fn edit_idle_timeout(doc: &mut Document, input: &str) -> WizardStep {
    let Some(seconds) = parse_seconds(input, IDLE_TIMEOUT_RANGE) else {
        return stay(&WizardState::EditIdleTimeout, out_of_range(IDLE_TIMEOUT_RANGE));
    };
    doc.timeout_seconds = Some(seconds);
    WizardStep::saved(format!("Idle timeout set to {seconds} seconds."))
}

/// Parse `<index> <on|off>` into a zero-based index and the new flag
pub fn parse_toggle(input: &str, len: usize) -> Option<(usize, bool)> {
    let caps = TOGGLE_RE.as_ref()?.captures(input)?;
    let index: usize = caps[1].parse().ok()?;
    if index == 0 || index > len {
        return None;
    }
    Some((index - 1, caps[2].eq_ignore_ascii_case("on")))
}

fn toggle_main_menu(doc: &mut Document, input: &str) -> WizardStep {
    let Some((index, enabled)) = parse_toggle(input, doc.main_menu.len()) else {
        return stay(
            &WizardState::ToggleMainMenu,
            format!(
                "Please reply like `2 off`, using a number from 1 to {}.",
                doc.main_menu.len()
            ),
        );
    };
    let item = &mut doc.main_menu[index];
    item.enabled = Some(enabled);
    WizardStep::saved(format!(
        "{} is now {}.",
        item.title,
        if enabled { "on" } else { "off" }
    ))
}

/// Parse a permutation of `1..=len`; returns zero-based indices
///
/// Duplicates, out-of-range numbers and a wrong count are all rejected.
pub fn parse_permutation(input: &str, len: usize) -> Option<Vec<usize>> {
    let mut seen = HashSet::new();
    let mut order = Vec::with_capacity(len);
    for token in input
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
    {
        let index: usize = token.parse().ok()?;
        if index == 0 || index > len || !seen.insert(index) {
            return None;
        }
        order.push(index - 1);
    }
    (order.len() == len).then_some(order)
}

fn reorder_main_menu(doc: &mut Document, input: &str) -> WizardStep {
    let len = doc.main_menu.len();
    let Some(order) = parse_permutation(input, len) else {
        return stay(
            &WizardState::ReorderMainMenu,
            format!("Please send each number from 1 to {len} exactly once."),
        );
    };
    let reordered = order.iter().map(|i| doc.main_menu[*i].clone()).collect();
    doc.main_menu = reordered;
    WizardStep::saved(screens::reorder_saved(doc))
}

// ============================================================================
// Leaf picker
// ============================================================================

/// Whether an entry belongs in the picker for `purpose`
fn offers(doc: &Document, purpose: LeafSetting, id: &str) -> bool {
    match purpose {
        LeafSetting::SuccessReply => has_await_reply_leaf(doc, id),
        LeafSetting::FlowMode | LeafSetting::AwaitTimeout => resolve_menu_node(doc, id).is_some(),
    }
}

/// Choices one level below `parent`, or the root when `parent` is `None`
fn picker_choices(doc: &Document, purpose: LeafSetting, parent: Option<&str>) -> Vec<MenuChoice> {
    let candidates: Vec<MenuChoice> = match parent {
        None => {
            let titles = title_index(doc);
            doc.main_menu
                .iter()
                .map(|item| {
                    let title = titles.get(item.id.as_str()).copied().unwrap_or(&item.id);
                    MenuChoice::new(item.id.clone(), title)
                })
                .collect()
        }
        Some(id) => match resolve_menu_node(doc, id) {
            Some(MenuNode::Menu { next_menu, .. }) => next_menu,
            _ => Vec::new(),
        },
    };
    candidates
        .into_iter()
        .filter(|choice| offers(doc, purpose, &choice.id))
        .collect()
}

fn start_picker(doc: &Document, purpose: LeafSetting) -> WizardStep {
    let choices = picker_choices(doc, purpose, None);
    if choices.is_empty() {
        return stay(&WizardState::SettingsMenu, screens::nothing_to_pick(purpose));
    }
    let prompt = screens::picker_prompt(purpose, &choices, false);
    WizardStep::to(
        WizardState::PickTarget {
            purpose,
            trail: Vec::new(),
            choices,
        },
        prompt,
    )
}

fn pick_target(
    doc: &Document,
    purpose: LeafSetting,
    trail: &[String],
    choices: &[MenuChoice],
    input: &str,
) -> WizardStep {
    let current = WizardState::PickTarget {
        purpose,
        trail: trail.to_vec(),
        choices: choices.to_vec(),
    };

    if input == "0" {
        return match trail.split_last() {
            None => WizardStep::to(WizardState::SettingsMenu, screens::settings_menu()),
            Some((_, parents)) => {
                let choices = picker_choices(doc, purpose, parents.last().map(String::as_str));
                let prompt = screens::picker_prompt(purpose, &choices, !parents.is_empty());
                WizardStep::to(
                    WizardState::PickTarget {
                        purpose,
                        trail: parents.to_vec(),
                        choices,
                    },
                    prompt,
                )
            }
        };
    }

    let picked = input
        .parse::<usize>()
        .ok()
        .filter(|i| *i >= 1)
        .and_then(|i| choices.get(i - 1));
    let Some(choice) = picked else {
        return stay(
            &current,
            format!(
                "Please reply with a number from 1 to {}, or 0 to go back.",
                choices.len()
            ),
        );
    };

    match resolve_menu_node(doc, &choice.id) {
        Some(MenuNode::Leaf(leaf)) => WizardStep::to(
            WizardState::EditLeaf {
                purpose,
                target: choice.clone(),
            },
            screens::leaf_prompt(purpose, choice, &leaf),
        ),
        Some(MenuNode::Menu { .. }) => {
            let next = picker_choices(doc, purpose, Some(&choice.id));
            if next.is_empty() {
                return stay(&current, screens::nothing_to_pick(purpose));
            }
            let prompt = screens::picker_prompt(purpose, &next, true);
            let mut trail = trail.to_vec();
            trail.push(choice.id.clone());
            WizardStep::to(
                WizardState::PickTarget {
                    purpose,
                    trail,
                    choices: next,
                },
                prompt,
            )
        }
        None => stay(
            &current,
            "That entry no longer exists. Please choose another number.",
        ),
    }
}

fn edit_leaf(doc: &mut Document, purpose: LeafSetting, target: &MenuChoice, input: &str) -> WizardStep {
    let current = WizardState::EditLeaf {
        purpose,
        target: target.clone(),
    };
    match purpose {
        LeafSetting::FlowMode => {
            let mode = match input.to_ascii_lowercase().as_str() {
                "1" | "close" => FlowMode::Close,
                "2" | "await_reply" => FlowMode::AwaitReply,
                _ => return stay(&current, "Please reply with 1 (close) or 2 (await_reply)."),
            };
            if !set_flow_mode(doc, &target.id, mode) {
                return WizardStep::closed(NO_LONGER_A_LEAF_TEXT);
            }
            WizardStep::saved(format!(
                "Flow mode of {} set to {}.",
                target.title,
                mode.as_str()
            ))
        }
        LeafSetting::AwaitTimeout => {
            let Some(seconds) = parse_seconds(input, AWAIT_TIMEOUT_RANGE) else {
                return stay(&current, out_of_range(AWAIT_TIMEOUT_RANGE));
            };
            if !set_await_timeout(doc, &target.id, seconds) {
                return WizardStep::closed(NO_LONGER_A_LEAF_TEXT);
            }
            WizardStep::saved(format!(
                "{} now waits {seconds} seconds for a reply.",
                target.title
            ))
        }
        LeafSetting::SuccessReply => {
            if !set_success_reply(doc, &target.id, input) {
                return WizardStep::closed(NO_LONGER_A_LEAF_TEXT);
            }
            WizardStep::saved(format!("Success reply of {} updated.", target.title))
        }
    }
}
