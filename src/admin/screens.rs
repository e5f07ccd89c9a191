//! Text shown by the admin wizard

use super::state::{LeafSetting, TextField};
use crate::config::Document;
use crate::menu::{Leaf, MenuChoice, SettingTarget};
use std::fmt::Write as _;

pub const ACCESS_DENIED_TEXT: &str = "Sorry, this command is only available to administrators.";
pub const CANCELLED_TEXT: &str = "Settings flow cancelled.";
pub const NOTHING_TO_CANCEL_TEXT: &str = "There is no settings flow to cancel.";
pub const WIZARD_TIMEOUT_TEXT: &str =
    "The settings flow was cancelled automatically because there was no reply. Send /settings to start again.";
pub const SAVE_FAILED_TEXT: &str =
    "The settings could not be saved. Please try again, or send /cancel to stop.";

const CANCEL_HINT: &str = "Send /cancel to stop.";

pub fn settings_menu() -> String {
    [
        "*Settings*",
        "",
        "*1.* Greeting message",
        "*2.* Session end message",
        "*3.* Timeout message",
        "*4.* Idle timeout",
        "*5.* Enable or disable a main menu entry",
        "*6.* Reorder the main menu",
        "*7.* Flow mode of a menu entry",
        "*8.* Reply wait time of a menu entry",
        "*9.* Success reply of a menu entry",
        "",
        "Reply with a number. Send /cancel to stop.",
    ]
    .join("\n")
}

pub fn invalid_settings_choice() -> String {
    format!("Please reply with a number from 1 to 9.\n\n{}", settings_menu())
}

pub fn text_prompt(field: TextField, doc: &Document) -> String {
    let current = match field {
        TextField::Greeting => doc.greeting().unwrap_or("(none)"),
        TextField::SessionEnd => doc.session_end_text(),
        TextField::Timeout => doc.timeout_text(),
    };
    format!(
        "Current {}:\n\n{current}\n\nSend the new text. {CANCEL_HINT}",
        field.label()
    )
}

pub fn text_saved(field: TextField) -> String {
    let label = field.label();
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => format!("{}{} updated.", first.to_uppercase(), chars.as_str()),
        None => "Updated.".to_string(),
    }
}

pub fn idle_timeout_prompt(current: u64) -> String {
    format!(
        "Current idle timeout: {current} seconds.\n\nSend the new value in seconds (10 to 3600). {CANCEL_HINT}"
    )
}

fn main_menu_listing(doc: &Document, with_status: bool) -> String {
    let mut text = String::new();
    for (index, item) in doc.main_menu.iter().enumerate() {
        let _ = write!(text, "*{}.* {}", index + 1, item.title);
        if with_status {
            text.push_str(if item.is_enabled() { " (on)" } else { " (off)" });
        }
        text.push('\n');
    }
    text
}

pub fn toggle_prompt(doc: &Document) -> String {
    format!(
        "Main menu entries:\n\n{}\nReply with `<number> <on|off>`, for example `2 off`. {CANCEL_HINT}",
        main_menu_listing(doc, true)
    )
}

pub fn reorder_prompt(doc: &Document) -> String {
    let n = doc.main_menu.len();
    let example: Vec<String> = (1..=n).rev().map(|i| i.to_string()).collect();
    format!(
        "Current order:\n\n{}\nReply with all {n} numbers in the new order, for example `{}`. {CANCEL_HINT}",
        main_menu_listing(doc, false),
        example.join(" ")
    )
}

pub fn reorder_saved(doc: &Document) -> String {
    format!("Main menu reordered:\n\n{}", main_menu_listing(doc, false).trim_end())
}

pub fn picker_prompt(purpose: LeafSetting, choices: &[MenuChoice], nested: bool) -> String {
    let mut text = format!("Choose the menu entry whose {} you want to change:\n\n", purpose.label());
    for (index, choice) in choices.iter().enumerate() {
        let _ = writeln!(text, "*{}.* {}", index + 1, choice.title);
    }
    text.push('\n');
    if nested {
        text.push_str("Reply with a number, or 0 to go back. ");
    } else {
        text.push_str("Reply with a number, or 0 to return to settings. ");
    }
    text.push_str(CANCEL_HINT);
    text
}

pub fn nothing_to_pick(purpose: LeafSetting) -> String {
    match purpose {
        LeafSetting::SuccessReply => {
            "No menu entry waits for a reply, so there is no success reply to edit.".to_string()
        }
        _ => "There are no menu entries to edit.".to_string(),
    }
}

pub fn leaf_prompt(purpose: LeafSetting, target: &MenuChoice, leaf: &Leaf) -> String {
    match purpose {
        LeafSetting::FlowMode => format!(
            "*{}* currently uses flow mode `{}`.\n\n*1.* close - end the conversation after this entry\n*2.* await_reply - wait for one more message first\n\nReply with 1 or 2. {CANCEL_HINT}",
            target.title,
            leaf.flow_mode.as_str()
        ),
        LeafSetting::AwaitTimeout => format!(
            "*{}* waits {} seconds for a reply.\n\nSend the new value in seconds (10 to 86400). {CANCEL_HINT}",
            target.title, leaf.await_timeout_seconds
        ),
        LeafSetting::SuccessReply => format!(
            "Current success reply for *{}*:\n\n{}\n\nSend the new text. {CANCEL_HINT}",
            target.title, leaf.success_reply
        ),
    }
}

pub fn flows_listing(targets: &[SettingTarget]) -> String {
    if targets.is_empty() {
        return "No menu entries are configured.".to_string();
    }
    let mut text = String::from("*Menu entries*\n");
    for target in targets {
        let _ = write!(
            text,
            "\n- {} (`{}`): {}",
            target.title,
            target.id,
            target.flow_mode.as_str()
        );
        if target.flow_mode == crate::config::FlowMode::AwaitReply {
            let _ = write!(text, ", waits {}s", target.await_timeout_seconds);
        }
    }
    text
}

pub fn stats_report(rows: &[(u32, usize, usize)]) -> String {
    let mut text = String::from("*Statistics*\n");
    for (days, chats, sessions) in rows {
        let window = if *days == 1 {
            "Last 24 hours".to_string()
        } else {
            format!("Last {days} days")
        };
        let _ = write!(text, "\n{window}: {chats} messages, {sessions} sessions");
    }
    text
}
