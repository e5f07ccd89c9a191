//! Admin slash commands and admin-list edits

use crate::config::Document;
use crate::identity::{normalize_to_primary, IdentityResolver};

/// A recognized admin command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Settings,
    Cancel,
    AddAdmin(String),
    DelAdmin(String),
    Admins,
    Flows,
    Stats,
}

impl Command {
    /// Parse a message whose first token is a known command (case-insensitive)
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (head, rest) = text
            .split_once(char::is_whitespace)
            .map_or((text, ""), |(h, r)| (h, r.trim()));
        let command = match head.to_ascii_lowercase().as_str() {
            "/settings" => Command::Settings,
            "/cancel" => Command::Cancel,
            "/addadmin" => Command::AddAdmin(rest.to_string()),
            "/deladmin" => Command::DelAdmin(rest.to_string()),
            "/admins" => Command::Admins,
            "/flows" => Command::Flows,
            "/stats" => Command::Stats,
            _ => return None,
        };
        Some(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Settings => "settings",
            Command::Cancel => "cancel",
            Command::AddAdmin(_) => "addadmin",
            Command::DelAdmin(_) => "deladmin",
            Command::Admins => "admins",
            Command::Flows => "flows",
            Command::Stats => "stats",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// Identities appended to the admin list
    Added(Vec<String>),
    AlreadyAdmin(String),
    InvalidNumber,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Entries removed from the admin list
    Removed(Vec<String>),
    NotAdmin(String),
    Protected,
    InvalidNumber,
}

async fn is_superadmin(resolver: &IdentityResolver, superadmin: &str, identity: &str) -> bool {
    let superadmin = superadmin.trim();
    !superadmin.is_empty()
        && resolver
            .matches_any(identity, &[superadmin.to_string()])
            .await
}

/// Whether `identity` is the superadmin or on the document's admin list
pub async fn is_admin(
    resolver: &IdentityResolver,
    doc: &Document,
    superadmin: &str,
    identity: &str,
) -> bool {
    is_superadmin(resolver, superadmin, identity).await
        || resolver.matches_any(identity, &doc.admin_jids).await
}

/// Add a number to the admin list, with its linked counterpart when known
pub async fn add_admin(
    resolver: &IdentityResolver,
    doc: &mut Document,
    superadmin: &str,
    raw: &str,
) -> AddOutcome {
    let Some(primary) = normalize_to_primary(raw) else {
        return AddOutcome::InvalidNumber;
    };
    if is_admin(resolver, doc, superadmin, &primary).await {
        return AddOutcome::AlreadyAdmin(primary);
    }

    let mut added = vec![primary.clone()];
    if let Some(linked) = resolver.linked_counterpart(&primary).await {
        if !doc.admin_jids.contains(&linked) {
            added.push(linked);
        }
    }
    doc.admin_jids.extend(added.iter().cloned());
    AddOutcome::Added(added)
}

/// Remove every admin entry denoting the same party as `raw`
pub async fn remove_admin(
    resolver: &IdentityResolver,
    doc: &mut Document,
    superadmin: &str,
    raw: &str,
) -> RemoveOutcome {
    let Some(primary) = normalize_to_primary(raw) else {
        return RemoveOutcome::InvalidNumber;
    };
    if is_superadmin(resolver, superadmin, &primary).await {
        return RemoveOutcome::Protected;
    }

    let target = [primary.clone()];
    let mut kept = Vec::with_capacity(doc.admin_jids.len());
    let mut removed = Vec::new();
    for entry in std::mem::take(&mut doc.admin_jids) {
        if resolver.matches_any(&entry, &target).await {
            removed.push(entry);
        } else {
            kept.push(entry);
        }
    }
    doc.admin_jids = kept;

    if removed.is_empty() {
        RemoveOutcome::NotAdmin(primary)
    } else {
        RemoveOutcome::Removed(removed)
    }
}

/// Human-readable admin list; one line per party
pub async fn list_admins(resolver: &IdentityResolver, doc: &Document, superadmin: &str) -> String {
    let mut lines = Vec::new();
    let mut shown = Vec::new();
    if !superadmin.trim().is_empty() {
        let number = resolver.display_number(superadmin).await;
        lines.push(format!("- {number} (superadmin)"));
        shown.push(number);
    }
    for entry in &doc.admin_jids {
        let number = resolver.display_number(entry).await;
        if number.is_empty() || shown.contains(&number) {
            continue;
        }
        lines.push(format!("- {number}"));
        shown.push(number);
    }

    if lines.is_empty() {
        "No administrators are configured.".to_string()
    } else {
        format!("*Administrators*\n\n{}", lines.join("\n"))
    }
}
