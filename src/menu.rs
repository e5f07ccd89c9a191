//! Menu engine
//!
//! Pure functions over the configuration [`Document`]: resolving a node id to
//! a menu or a leaf, rendering numbered choices, and the leaf mutation helpers
//! used by the admin wizard.

use crate::config::{
    Document, FlowMode, SubMenuEntry, SubMenuNode, DEFAULT_AWAIT_TIMEOUT_SECONDS,
    DEFAULT_MENU_TEXT, DEFAULT_SUCCESS_REPLY,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

const ROOT_PROMPT: &str = "Please choose the service you need:";
const REPLY_HINT: &str = "Reply with the number of your choice (for example: 1).";

/// A selectable row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuChoice {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MenuChoice {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
        }
    }
}

/// Terminal node: response text plus completion policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub text: String,
    pub flow_mode: FlowMode,
    pub await_timeout_seconds: u64,
    pub success_reply: String,
}

/// A resolved node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuNode {
    Menu {
        text: String,
        next_menu: Vec<MenuChoice>,
    },
    Leaf(Leaf),
}

/// Resolve `id` against the document's sub-menus
///
/// A non-empty `nextMenu` always makes the node a menu, whatever else is set.
/// Missing or unrecognized entries resolve to `None`.
pub fn resolve_menu_node(doc: &Document, id: &str) -> Option<MenuNode> {
    match doc.sub_menus.get(id)? {
        SubMenuEntry::Text(text) => Some(MenuNode::Leaf(Leaf {
            text: text.clone(),
            flow_mode: FlowMode::Close,
            await_timeout_seconds: DEFAULT_AWAIT_TIMEOUT_SECONDS,
            success_reply: DEFAULT_SUCCESS_REPLY.to_string(),
        })),
        SubMenuEntry::Node(node) if node.is_menu() => Some(MenuNode::Menu {
            text: node
                .text
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MENU_TEXT.to_string()),
            next_menu: node
                .routable_rows()
                .map(|row| {
                    let title = row
                        .title
                        .clone()
                        .filter(|t| !t.trim().is_empty())
                        .unwrap_or_else(|| row.id.clone());
                    MenuChoice::new(row.id.clone(), title)
                })
                .collect(),
        }),
        SubMenuEntry::Node(node) => Some(MenuNode::Leaf(Leaf {
            text: node.text.clone().unwrap_or_default(),
            flow_mode: node.flow_mode.unwrap_or_default(),
            await_timeout_seconds: node
                .await_timeout_seconds
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_AWAIT_TIMEOUT_SECONDS),
            success_reply: node
                .success_reply
                .clone()
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SUCCESS_REPLY.to_string()),
        })),
        SubMenuEntry::Unrecognized(_) => None,
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Mapping from the displayed number to the node id it stands for
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuOptions(Vec<String>);

impl MenuOptions {
    pub fn from_ids(ids: impl IntoIterator<Item = String>) -> Self {
        Self(ids.into_iter().collect())
    }

    /// Look up a displayed token; only the canonical "1".."N" spellings match
    pub fn resolve(&self, token: &str) -> Option<&str> {
        let index: usize = token.parse().ok()?;
        if index == 0 || index.to_string() != token {
            return None;
        }
        self.0.get(index - 1).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `(token, id)` pairs in display order
    pub fn entries(&self) -> impl Iterator<Item = (String, &str)> {
        self.0
            .iter()
            .enumerate()
            .map(|(i, id)| ((i + 1).to_string(), id.as_str()))
    }
}

/// A menu ready to send, with the numbering it was rendered with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMenu {
    pub text: String,
    pub options: MenuOptions,
}

/// Number `choices` 1..N in display order under `header`
pub fn render_menu(header: &str, choices: &[MenuChoice]) -> RenderedMenu {
    let mut text = format!("{header}\n\n");
    for (index, choice) in choices.iter().enumerate() {
        let number = index + 1;
        let title = if choice.title.trim().is_empty() {
            format!("Menu {number}")
        } else {
            choice.title.clone()
        };
        let _ = write!(text, "*{number}.* {title}");
        if let Some(desc) = choice.description.as_deref().filter(|d| !d.is_empty()) {
            let _ = write!(text, " - {desc}");
        }
        text.push('\n');
    }
    text.push('\n');
    text.push_str(REPLY_HINT);

    RenderedMenu {
        text,
        options: MenuOptions::from_ids(choices.iter().map(|c| c.id.clone())),
    }
}

/// Render the root menu over enabled entries, optionally led by the greeting
///
/// Returns `None` when no entry is enabled.
pub fn render_root(doc: &Document, with_greeting: bool) -> Option<RenderedMenu> {
    let choices: Vec<MenuChoice> = doc
        .enabled_main_menu()
        .map(|item| MenuChoice {
            id: item.id.clone(),
            title: item.title.clone(),
            description: item.description.clone(),
        })
        .collect();
    if choices.is_empty() {
        return None;
    }

    let header = match doc.greeting().filter(|_| with_greeting) {
        Some(greeting) => format!("{greeting}\n\n{ROOT_PROMPT}"),
        None => ROOT_PROMPT.to_string(),
    };
    Some(render_menu(&header, &choices))
}

// ============================================================================
// Mutation helpers (admin wizard)
// ============================================================================

/// Upgrade a string leaf to object form and return it; `None` for menus and
/// missing ids
fn ensure_leaf_node<'a>(doc: &'a mut Document, id: &str) -> Option<&'a mut SubMenuNode> {
    let entry = doc.sub_menus.get_mut(id)?;
    if let SubMenuEntry::Text(text) = entry {
        *entry = SubMenuEntry::Node(SubMenuNode {
            text: Some(std::mem::take(text)),
            flow_mode: Some(FlowMode::Close),
            await_timeout_seconds: Some(DEFAULT_AWAIT_TIMEOUT_SECONDS),
            success_reply: Some(DEFAULT_SUCCESS_REPLY.to_string()),
            ..SubMenuNode::default()
        });
    }
    match entry {
        SubMenuEntry::Node(node) if !node.is_menu() => Some(node),
        _ => None,
    }
}

pub fn set_flow_mode(doc: &mut Document, id: &str, mode: FlowMode) -> bool {
    let Some(node) = ensure_leaf_node(doc, id) else {
        return false;
    };
    node.flow_mode = Some(mode);
    true
}

/// Zero resets to the default await timeout
pub fn set_await_timeout(doc: &mut Document, id: &str, seconds: u64) -> bool {
    let Some(node) = ensure_leaf_node(doc, id) else {
        return false;
    };
    node.await_timeout_seconds = Some(if seconds > 0 {
        seconds
    } else {
        DEFAULT_AWAIT_TIMEOUT_SECONDS
    });
    true
}

/// Blank text resets to the default success reply
pub fn set_success_reply(doc: &mut Document, id: &str, reply: &str) -> bool {
    let Some(node) = ensure_leaf_node(doc, id) else {
        return false;
    };
    let reply = reply.trim();
    node.success_reply = Some(if reply.is_empty() {
        DEFAULT_SUCCESS_REPLY.to_string()
    } else {
        reply.to_string()
    });
    true
}

// ============================================================================
// Queries (admin wizard)
// ============================================================================

/// A leaf as listed by the wizard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingTarget {
    pub id: String,
    pub title: String,
    pub flow_mode: FlowMode,
    pub await_timeout_seconds: u64,
    pub success_reply: String,
}

/// Display titles for every id named anywhere in the document
///
/// Root-menu titles first, then `nextMenu` rows, later rows overriding.
pub fn title_index(doc: &Document) -> HashMap<&str, &str> {
    let mut titles = HashMap::new();
    for item in &doc.main_menu {
        if !item.id.is_empty() && !item.title.is_empty() {
            titles.insert(item.id.as_str(), item.title.as_str());
        }
    }
    for entry in doc.sub_menus.values() {
        let SubMenuEntry::Node(node) = entry else {
            continue;
        };
        for row in node.routable_rows() {
            if let Some(title) = row.title.as_deref().filter(|t| !t.is_empty()) {
                titles.insert(row.id.as_str(), title);
            }
        }
    }
    titles
}

/// Every leaf-resolvable id with its display title, sorted by id
pub fn sub_menu_setting_targets(doc: &Document) -> Vec<SettingTarget> {
    let titles = title_index(doc);
    doc.sub_menus
        .keys()
        .filter_map(|id| match resolve_menu_node(doc, id)? {
            MenuNode::Leaf(leaf) => Some(SettingTarget {
                id: id.clone(),
                title: titles.get(id.as_str()).map_or_else(|| id.clone(), |t| (*t).to_string()),
                flow_mode: leaf.flow_mode,
                await_timeout_seconds: leaf.await_timeout_seconds,
                success_reply: leaf.success_reply,
            }),
            MenuNode::Menu { .. } => None,
        })
        .collect()
}

/// Whether the subtree rooted at `id` holds at least one `await_reply` leaf
///
/// Walks iteratively; cycles in the document are visited once.
pub fn has_await_reply_leaf(doc: &Document, id: &str) -> bool {
    let mut pending = vec![id.to_string()];
    let mut seen = HashSet::new();

    while let Some(current) = pending.pop() {
        if !seen.insert(current.clone()) {
            continue;
        }
        match resolve_menu_node(doc, &current) {
            Some(MenuNode::Leaf(leaf)) if leaf.flow_mode == FlowMode::AwaitReply => return true,
            Some(MenuNode::Menu { next_menu, .. }) => {
                pending.extend(next_menu.into_iter().map(|choice| choice.id));
            }
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MainMenuItem, NextMenuRow};

    fn sample_doc() -> Document {
        let mut doc = Document::default();
        doc.main_menu = vec![
            MainMenuItem::new("a", "Permits"),
            MainMenuItem {
                enabled: Some(false),
                ..MainMenuItem::new("b", "Hidden")
            },
            MainMenuItem::new("c", "Complaints"),
        ];
        doc.sub_menus.insert("a".into(), SubMenuEntry::Text("Bring your ID".into()));
        doc.sub_menus.insert(
            "c".into(),
            SubMenuEntry::Node(SubMenuNode::menu(
                "Complaint type:",
                vec![
                    NextMenuRow::new("c1", "Roads"),
                    NextMenuRow::new("c2", "Noise"),
                ],
            )),
        );
        doc.sub_menus.insert(
            "c1".into(),
            SubMenuEntry::Node(SubMenuNode {
                await_timeout_seconds: Some(120),
                success_reply: Some("Got it".into()),
                ..SubMenuNode::leaf("Describe the road issue", FlowMode::AwaitReply)
            }),
        );
        doc.sub_menus.insert(
            "c2".into(),
            SubMenuEntry::Node(SubMenuNode::leaf("Call the noise line", FlowMode::Close)),
        );
        doc
    }

    #[test]
    fn test_root_numbering_skips_disabled_entries() {
        let doc = sample_doc();
        let rendered = render_root(&doc, true).unwrap();
        let pairs: Vec<_> = rendered.options.entries().collect();
        assert_eq!(pairs, vec![("1".to_string(), "a"), ("2".to_string(), "c")]);
        assert_eq!(rendered.options.resolve("2"), Some("c"));
        assert!(rendered.text.contains("*2.* Complaints"));
        assert!(!rendered.text.contains("Hidden"));
    }

    #[test]
    fn test_option_tokens_must_be_canonical() {
        let options = MenuOptions::from_ids(vec!["x".into(), "y".into()]);
        assert_eq!(options.resolve("1"), Some("x"));
        assert_eq!(options.resolve("01"), None);
        assert_eq!(options.resolve("+1"), None);
        assert_eq!(options.resolve("0"), None);
        assert_eq!(options.resolve("3"), None);
        assert_eq!(options.resolve("one"), None);
    }

    #[test]
    fn test_greeting_leads_root_only_when_requested() {
        let mut doc = sample_doc();
        doc.greeting_message = Some("Welcome to City Hall".into());
        assert!(render_root(&doc, true).unwrap().text.starts_with("Welcome to City Hall\n\n"));
        assert!(render_root(&doc, false).unwrap().text.starts_with(ROOT_PROMPT));
    }

    #[test]
    fn test_root_without_enabled_entries() {
        let mut doc = sample_doc();
        for item in &mut doc.main_menu {
            item.enabled = Some(false);
        }
        assert!(render_root(&doc, true).is_none());
    }

    #[test]
    fn test_string_leaf_matches_default_object_leaf() {
        let mut doc = Document::default();
        doc.sub_menus.insert("s".into(), SubMenuEntry::Text("Hello".into()));
        doc.sub_menus.insert(
            "o".into(),
            SubMenuEntry::Node(SubMenuNode {
                text: Some("Hello".into()),
                ..SubMenuNode::default()
            }),
        );
        assert_eq!(resolve_menu_node(&doc, "s"), resolve_menu_node(&doc, "o"));
    }

    #[test]
    fn test_next_menu_wins_over_flow_mode() {
        let mut doc = Document::default();
        doc.sub_menus.insert(
            "m".into(),
            SubMenuEntry::Node(SubMenuNode {
                flow_mode: Some(FlowMode::AwaitReply),
                ..SubMenuNode::menu("", vec![NextMenuRow::new("x", "")])
            }),
        );
        match resolve_menu_node(&doc, "m") {
            Some(MenuNode::Menu { text, next_menu }) => {
                assert_eq!(text, DEFAULT_MENU_TEXT);
                assert_eq!(next_menu, vec![MenuChoice::new("x", "x")]);
            }
            other => panic!("expected menu, got {other:?}"),
        }
    }

    #[test]
    fn test_rows_without_id_do_not_make_a_menu() {
        let mut doc = Document::default();
        doc.sub_menus.insert(
            "n".into(),
            SubMenuEntry::Node(SubMenuNode::menu("Text", vec![NextMenuRow::new("", "Ghost")])),
        );
        assert!(matches!(resolve_menu_node(&doc, "n"), Some(MenuNode::Leaf(_))));
    }

    #[test]
    fn test_missing_id_resolves_to_none() {
        assert_eq!(resolve_menu_node(&sample_doc(), "nope"), None);
    }

    #[test]
    fn test_setters_coerce_string_leaf() {
        let mut doc = sample_doc();
        assert!(set_flow_mode(&mut doc, "a", FlowMode::AwaitReply));
        match &doc.sub_menus["a"] {
            SubMenuEntry::Node(node) => {
                assert_eq!(node.text.as_deref(), Some("Bring your ID"));
                assert_eq!(node.flow_mode, Some(FlowMode::AwaitReply));
                assert_eq!(node.await_timeout_seconds, Some(DEFAULT_AWAIT_TIMEOUT_SECONDS));
            }
            other => panic!("expected node, got {other:?}"),
        }
    }

    #[test]
    fn test_setters_refuse_menus_and_missing_ids() {
        let mut doc = sample_doc();
        let before = doc.clone();
        assert!(!set_flow_mode(&mut doc, "c", FlowMode::Close));
        assert!(!set_await_timeout(&mut doc, "c", 60));
        assert!(!set_success_reply(&mut doc, "missing", "x"));
        assert_eq!(doc, before);
    }

    #[test]
    fn test_setter_defaults() {
        let mut doc = sample_doc();
        assert!(set_await_timeout(&mut doc, "c2", 0));
        assert!(set_success_reply(&mut doc, "c2", "   "));
        let Some(MenuNode::Leaf(leaf)) = resolve_menu_node(&doc, "c2") else {
            panic!("c2 is a leaf")
        };
        assert_eq!(leaf.await_timeout_seconds, DEFAULT_AWAIT_TIMEOUT_SECONDS);
        assert_eq!(leaf.success_reply, DEFAULT_SUCCESS_REPLY);
    }

    #[test]
    fn test_setting_targets_use_cross_referenced_titles() {
        let targets = sub_menu_setting_targets(&sample_doc());
        let summary: Vec<_> = targets
            .iter()
            .map(|t| (t.id.as_str(), t.title.as_str(), t.flow_mode))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("a", "Permits", FlowMode::Close),
                ("c1", "Roads", FlowMode::AwaitReply),
                ("c2", "Noise", FlowMode::Close),
            ]
        );
    }

    #[test]
    fn test_has_await_reply_leaf() {
        let mut doc = sample_doc();
        assert!(has_await_reply_leaf(&doc, "c"));
        assert!(has_await_reply_leaf(&doc, "c1"));
        assert!(!has_await_reply_leaf(&doc, "a"));
        assert!(!has_await_reply_leaf(&doc, "missing"));

        set_flow_mode(&mut doc, "c1", FlowMode::Close);
        assert!(!has_await_reply_leaf(&doc, "c"));
    }

    #[test]
    fn test_has_await_reply_leaf_survives_cycles() {
        let mut doc = Document::default();
        doc.sub_menus.insert(
            "x".into(),
            SubMenuEntry::Node(SubMenuNode::menu("x", vec![NextMenuRow::new("y", "Y")])),
        );
        doc.sub_menus.insert(
            "y".into(),
            SubMenuEntry::Node(SubMenuNode::menu("y", vec![NextMenuRow::new("x", "X")])),
        );
        assert!(!has_await_reply_leaf(&doc, "x"));
    }
}
