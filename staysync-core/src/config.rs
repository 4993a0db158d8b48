//! Engine configuration.
//!
//! Loaded once into an immutable snapshot at startup; callers that want
//! fresh values call [`Config::load`] again. There is no global mutable
//! options cache.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{SyncError, SyncResult};

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
const DEFAULT_GUARD_TTL_MINS: i64 = 180;

/// Some OTAs rate-limit or outright block obviously non-browser agents.
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Configuration at ~/.config/staysync/config.toml. Every field has a
/// default, so a missing file is a valid zero-config install.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Politeness delay before each feed fetch, in milliseconds.
    #[serde(default)]
    pub inter_request_delay_ms: u64,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Cooperative debounce window between full sync runs.
    #[serde(default = "default_guard_ttl_mins")]
    pub sync_guard_ttl_mins: i64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("staysync")
        .join("staysync.db")
}

fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_guard_ttl_mins() -> i64 {
    DEFAULT_GUARD_TTL_MINS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: default_database_path(),
            inter_request_delay_ms: 0,
            fetch_timeout_secs: default_fetch_timeout_secs(),
            sync_guard_ttl_mins: default_guard_ttl_mins(),
            user_agent: default_user_agent(),
        }
    }
}

impl Config {
    pub fn config_path() -> SyncResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SyncError::Config("Could not determine config directory".into()))?
            .join("staysync");

        Ok(config_dir.join("config.toml"))
    }

    /// Load the configuration snapshot, falling back to defaults when no
    /// config file exists.
    pub fn load() -> SyncResult<Config> {
        let path = Config::config_path()?;
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path)?;
        Config::parse(&content)
    }

    fn parse(content: &str) -> SyncResult<Config> {
        toml::from_str(content)
            .map_err(|e| SyncError::Config(format!("Invalid config file: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.inter_request_delay_ms, 0);
        assert_eq!(config.fetch_timeout_secs, 30);
        assert_eq!(config.sync_guard_ttl_mins, 180);
        assert!(config.user_agent.starts_with("Mozilla/5.0"));
    }

    #[test]
    fn partial_config_overrides_only_named_fields() {
        let config = Config::parse("inter_request_delay_ms = 250\n").unwrap();
        assert_eq!(config.inter_request_delay_ms, 250);
        assert_eq!(config.fetch_timeout_secs, 30);
    }

    #[test]
    fn malformed_config_is_a_config_error() {
        assert!(matches!(
            Config::parse("fetch_timeout_secs = \"soon\""),
            Err(SyncError::Config(_))
        ));
    }
}
