//! The menu configuration document
//!
//! Persisted as camelCase JSON. Fields this crate does not know about are kept
//! in `extra` so that a load/mutate/save cycle never drops them.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const DEFAULT_TIMEOUT_TEXT: &str = "Thank you for contacting us. Your session has ended because there was no activity. Send a new message to start a new session.";
pub const DEFAULT_SESSION_END_TEXT: &str =
    "Thank you for using our public service line. Goodbye.";
pub const DEFAULT_SUCCESS_REPLY: &str = "Done. We have received your details.";
pub const DEFAULT_MENU_TEXT: &str = "Please choose a follow-up option:";
pub const DEFAULT_AWAIT_TIMEOUT_SECONDS: u64 = 180;

/// How a conversation continues after a leaf has been shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowMode {
    /// Conversation ends right after the leaf text
    #[default]
    Close,
    /// One more free-text message is captured before ending
    AwaitReply,
}

impl FlowMode {
    /// Lenient parse: anything other than `await_reply` is `Close`
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("await_reply") {
            FlowMode::AwaitReply
        } else {
            FlowMode::Close
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FlowMode::Close => "close",
            FlowMode::AwaitReply => "await_reply",
        }
    }
}

/// One entry of the root menu
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MainMenuItem {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub enabled: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MainMenuItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            enabled: None,
            extra: Map::new(),
        }
    }

    /// Only an explicit `false` hides an entry
    pub fn is_enabled(&self) -> bool {
        self.enabled != Some(false)
    }
}

/// A choice row inside a menu node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextMenuRow {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NextMenuRow {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: Some(title.into()),
            extra: Map::new(),
        }
    }
}

/// Object form of a sub-menu entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubMenuNode {
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub text: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub next_menu: Vec<NextMenuRow>,
    #[serde(
        default,
        alias = "mode",
        deserialize_with = "lenient_flow_mode",
        skip_serializing_if = "Option::is_none"
    )]
    pub flow_mode: Option<FlowMode>,
    #[serde(
        default,
        deserialize_with = "lenient_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub await_timeout_seconds: Option<u64>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub success_reply: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SubMenuNode {
    /// A leaf node with explicit flow settings
    pub fn leaf(text: impl Into<String>, flow_mode: FlowMode) -> Self {
        Self {
            text: Some(text.into()),
            flow_mode: Some(flow_mode),
            ..Self::default()
        }
    }

    /// An intermediate node offering `rows`
    pub fn menu(text: impl Into<String>, rows: Vec<NextMenuRow>) -> Self {
        Self {
            text: Some(text.into()),
            next_menu: rows,
            ..Self::default()
        }
    }

    /// Rows that carry an id; rows without one are ignored everywhere
    pub fn routable_rows(&self) -> impl Iterator<Item = &NextMenuRow> {
        self.next_menu.iter().filter(|row| !row.id.is_empty())
    }

    pub fn is_menu(&self) -> bool {
        self.routable_rows().next().is_some()
    }
}

/// A sub-menu entry as stored: the legacy string shorthand or the object form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubMenuEntry {
    /// Legacy shorthand: a leaf that always closes
    Text(String),
    Node(SubMenuNode),
    /// Anything else (null, numbers, arrays); resolves as missing
    Unrecognized(Value),
}

/// The whole configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default, deserialize_with = "lenient_main_menu")]
    pub main_menu: Vec<MainMenuItem>,
    #[serde(default, deserialize_with = "lenient_sub_menus")]
    pub sub_menus: BTreeMap<String, SubMenuEntry>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub greeting_message: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout_seconds: Option<u64>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout_text: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub session_end_text: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub admin_jids: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Document {
    /// Root menu entries shown to parties, in display order
    pub fn enabled_main_menu(&self) -> impl Iterator<Item = &MainMenuItem> {
        self.main_menu.iter().filter(|item| item.is_enabled())
    }

    /// Idle timeout for new sessions, or `fallback` when unset
    pub fn timeout_seconds_or(&self, fallback: u64) -> u64 {
        self.timeout_seconds.filter(|s| *s > 0).unwrap_or(fallback)
    }

    pub fn timeout_text(&self) -> &str {
        non_empty(self.timeout_text.as_deref()).unwrap_or(DEFAULT_TIMEOUT_TEXT)
    }

    pub fn session_end_text(&self) -> &str {
        non_empty(self.session_end_text.as_deref()).unwrap_or(DEFAULT_SESSION_END_TEXT)
    }

    pub fn greeting(&self) -> Option<&str> {
        non_empty(self.greeting_message.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

/// Accepts a positive number or numeric string; anything else becomes `None`
fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| seconds_from_value(&v)))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn seconds_from_value(value: &Value) -> Option<u64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if number.is_finite() && number > 0.0 {
        Some(number.ceil() as u64)
    } else {
        None
    }
}

fn text_from_value(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Strings and numbers are text; null or any other type is absent
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(text_from_value))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

/// Only a JSON boolean counts; `"false"` is not `false`
fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => Some(b),
        _ => None,
    })
}

/// A non-array is empty; elements that do not fit `T` are skipped
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Some(Value::Array(items)) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

/// Root entries without a usable id cannot be routed and are dropped
fn lenient_main_menu<'de, D>(deserializer: D) -> Result<Vec<MainMenuItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut items: Vec<MainMenuItem> = lenient_list(deserializer)?;
    items.retain(|item| !item.id.trim().is_empty());
    Ok(items)
}

fn lenient_sub_menus<'de, D>(deserializer: D) -> Result<BTreeMap<String, SubMenuEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(Value::Object(entries)) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(BTreeMap::new());
    };
    Ok(entries
        .into_iter()
        .filter_map(|(id, entry)| serde_json::from_value(entry).ok().map(|entry| (id, entry)))
        .collect())
}

fn lenient_flow_mode<'de, D>(deserializer: D) -> Result<Option<FlowMode>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(|v| match v {
        Value::String(s) => FlowMode::parse(&s),
        _ => FlowMode::Close,
    }))
}
