//! Process settings read from the environment

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the running service
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub menu_path: PathBuf,
    pub analytics_path: PathBuf,
    pub alias_dir: PathBuf,
    /// Always an administrator, cannot be removed
    pub superadmin: String,
    pub admin_flow_timeout: Duration,
    /// Idle timeout used when the document does not set one
    pub default_timeout_seconds: u64,
    /// Inbound messages older than this are dropped
    pub stale_after: Duration,
    /// Pause between a closing leaf and the session-end text
    pub close_pause: Duration,
    pub outbound_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 8080,
            menu_path: PathBuf::from("./data/menu.json"),
            analytics_path: PathBuf::from("./data/analytics.json"),
            alias_dir: PathBuf::from("./data/session"),
            superadmin: String::new(),
            admin_flow_timeout: Duration::from_secs(60),
            default_timeout_seconds: 30,
            stale_after: Duration::from_secs(60),
            close_pause: Duration::from_millis(1200),
            outbound_url: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; unset or invalid values keep defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let positive = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|v| *v > 0)
        };
        let path = |key: &str, fallback: PathBuf| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .map_or(fallback, PathBuf::from)
        };

        Self {
            port: lookup("SWITCHBOARD_PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            menu_path: path("SWITCHBOARD_MENU_PATH", defaults.menu_path),
            analytics_path: path("SWITCHBOARD_ANALYTICS_PATH", defaults.analytics_path),
            alias_dir: path("SWITCHBOARD_ALIAS_DIR", defaults.alias_dir),
            superadmin: lookup("SWITCHBOARD_SUPERADMIN")
                .map(|v| v.trim().to_string())
                .unwrap_or(defaults.superadmin),
            admin_flow_timeout: positive("SWITCHBOARD_ADMIN_FLOW_TIMEOUT_SECS")
                .map_or(defaults.admin_flow_timeout, Duration::from_secs),
            default_timeout_seconds: positive("SWITCHBOARD_DEFAULT_TIMEOUT_SECS")
                .unwrap_or(defaults.default_timeout_seconds),
            stale_after: positive("SWITCHBOARD_STALE_AFTER_SECS")
                .map_or(defaults.stale_after, Duration::from_secs),
            close_pause: lookup("SWITCHBOARD_CLOSE_PAUSE_MS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map_or(defaults.close_pause, Duration::from_millis),
            outbound_url: lookup("SWITCHBOARD_OUTBOUND_URL").filter(|v| !v.trim().is_empty()),
        }
    }
}
