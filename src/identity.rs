//! Identity resolution
//!
//! Parties reach us through two identity namespaces: a phone-number address
//! (`<digits>@s.whatsapp.net`) and a device-linked id (`<digits>@lid`). The
//! alias store maps between the two by local id.

mod alias;

pub use alias::FileAliasStore;

use crate::runtime::AliasStore;
use std::collections::HashSet;
use std::sync::Arc;

pub const PRIMARY_DOMAIN: &str = "s.whatsapp.net";
pub const LINKED_DOMAIN: &str = "lid";

/// Which namespace an identity belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Phone-number address
    Primary,
    /// Device-linked opaque id
    Linked,
    /// Anything else (groups, broadcast lists, bare numbers)
    Other,
}

impl Namespace {
    pub fn of(identity: &str) -> Self {
        match identity.split_once('@').map(|(_, domain)| domain) {
            Some(PRIMARY_DOMAIN) => Namespace::Primary,
            Some(LINKED_DOMAIN) => Namespace::Linked,
            _ => Namespace::Other,
        }
    }

    /// Fully-qualified identity for `local` in this namespace
    pub fn qualify(self, local: &str) -> String {
        match self {
            Namespace::Primary => format!("{local}@{PRIMARY_DOMAIN}"),
            Namespace::Linked => format!("{local}@{LINKED_DOMAIN}"),
            Namespace::Other => local.to_string(),
        }
    }

    /// The namespace an alias lookup maps into
    pub fn counterpart(self) -> Option<Self> {
        match self {
            Namespace::Primary => Some(Namespace::Linked),
            Namespace::Linked => Some(Namespace::Primary),
            Namespace::Other => None,
        }
    }
}

/// Part before the `@`, or the whole string
pub fn local_part(identity: &str) -> &str {
    identity.split_once('@').map_or(identity, |(local, _)| local)
}

pub fn digits(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// Turn free admin input ("+62 812-345") into a primary identity
pub fn normalize_to_primary(value: &str) -> Option<String> {
    let digits = digits(value);
    (!digits.is_empty()).then(|| Namespace::Primary.qualify(&digits))
}

/// Maps inbound identities to session keys and allowlist tokens
#[derive(Clone)]
pub struct IdentityResolver {
    aliases: Arc<dyn AliasStore>,
}

impl IdentityResolver {
    pub fn new(aliases: Arc<dyn AliasStore>) -> Self {
        Self { aliases }
    }

    async fn alias_of(&self, namespace: Namespace, local: &str) -> Option<String> {
        if local.is_empty() {
            return None;
        }
        self.aliases
            .resolve_alias(namespace, local)
            .await
            .map(|mapped| digits(&mapped))
            .filter(|mapped| !mapped.is_empty())
    }

    /// Canonical session key for an identity; never fails
    ///
    /// Linked ids resolve to their primary digits when an alias is known and
    /// otherwise keep their own digits.
    pub async fn to_session_key(&self, identity: &str) -> String {
        let local_digits = digits(local_part(identity));
        if Namespace::of(identity) == Namespace::Linked {
            if let Some(phone) = self.alias_of(Namespace::Linked, &local_digits).await {
                return phone;
            }
        }
        if local_digits.is_empty() {
            identity.to_string()
        } else {
            local_digits
        }
    }

    /// Every token that denotes the same party as `identity`
    ///
    /// Self, local part, and the counterpart namespace's bare and qualified
    /// forms when the alias store knows them.
    pub async fn actor_tokens(&self, identity: &str) -> HashSet<String> {
        let mut tokens = HashSet::new();
        let identity = identity.trim();
        if identity.is_empty() {
            return tokens;
        }

        let local = local_part(identity);
        if !local.is_empty() {
            tokens.insert(local.to_string());
        }
        tokens.insert(identity.to_string());

        let namespace = Namespace::of(identity);
        if let Some(other) = namespace.counterpart() {
            if let Some(mapped) = self.alias_of(namespace, local).await {
                tokens.insert(other.qualify(&mapped));
                tokens.insert(mapped);
            }
        }
        tokens
    }

    /// Whether `identity` denotes the same party as any entry of `allowlist`
    pub async fn matches_any(&self, identity: &str, allowlist: &[String]) -> bool {
        let actor = self.actor_tokens(identity).await;
        if actor.is_empty() {
            return false;
        }
        for candidate in allowlist {
            let candidate = candidate.trim();
            if candidate.is_empty() {
                continue;
            }
            let candidate_tokens = self.actor_tokens(candidate).await;
            if !actor.is_disjoint(&candidate_tokens) {
                return true;
            }
        }
        false
    }

    /// Phone digits for display; linked ids go through the alias store
    pub async fn display_number(&self, identity: &str) -> String {
        let identity = identity.trim();
        let local = local_part(identity);
        if Namespace::of(identity) == Namespace::Linked {
            return self
                .alias_of(Namespace::Linked, local)
                .await
                .unwrap_or_else(|| local.to_string());
        }
        digits(local)
    }

    /// The linked identity paired with a primary one, if known
    pub async fn linked_counterpart(&self, primary: &str) -> Option<String> {
        let local = digits(local_part(primary));
        self.alias_of(Namespace::Primary, &local)
            .await
            .map(|lid| Namespace::Linked.qualify(&lid))
    }
}
