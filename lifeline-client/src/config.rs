//! Client Configuration
//!
//! Configuration management for the Lifeline console client.

use anyhow::{Context, Result};
use lifeline_protocol::ReconcilerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Signed-in user identity
    #[serde(default)]
    pub user: UserConfig,

    /// Backend endpoints
    #[serde(default)]
    pub server: ServerConfig,

    /// Network behavior
    #[serde(default)]
    pub network: NetworkConfig,

    /// Reconciliation policies
    #[serde(default)]
    pub policies: ReconcilerConfig,
}

/// Signed-in user identity
///
/// Session persistence of "who is logged in" is out of the core's hands;
/// the config file stands in for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    pub id: i64,

    #[serde(default = "default_user_name")]
    pub name: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            id: 0,
            name: default_user_name(),
        }
    }
}

/// Backend endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Push channel WebSocket URL
    #[serde(default = "default_push_url")]
    pub push_url: String,

    /// REST backend base URL
    #[serde(default = "default_rest_url")]
    pub rest_url: String,

    /// Reverse-geocoding endpoint for alert notifications
    #[serde(default = "default_geocode_url")]
    pub geocode_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            push_url: default_push_url(),
            rest_url: default_rest_url(),
            geocode_url: default_geocode_url(),
        }
    }
}

/// Network behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Initial reconnect delay in seconds
    #[serde(default = "default_reconnect_initial")]
    pub reconnect_initial_secs: u64,

    /// Reconnect delay ceiling in seconds
    #[serde(default = "default_reconnect_max")]
    pub reconnect_max_secs: u64,

    /// REST request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            reconnect_initial_secs: default_reconnect_initial(),
            reconnect_max_secs: default_reconnect_max(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_user_name() -> String {
    "Anonymous".to_string()
}

fn default_push_url() -> String {
    "ws://127.0.0.1:5000/push".to_string()
}

fn default_rest_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_geocode_url() -> String {
    "https://nominatim.openstreetmap.org/reverse".to_string()
}

fn default_reconnect_initial() -> u64 {
    1
}

fn default_reconnect_max() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    10
}

impl Config {
    /// Default config file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lifeline")
            .join("config.toml")
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifeline_protocol::{HistoryPolicy, ServiceResponsePolicy};

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.user.id, 0);
        assert_eq!(config.user.name, "Anonymous");
        assert!(config.server.push_url.starts_with("ws://"));
        assert_eq!(config.policies.history, HistoryPolicy::Replace);
        assert_eq!(
            config.policies.service_responses,
            ServiceResponsePolicy::KeepAll
        );
    }

    #[test]
    fn test_parse_partial_config() {
        let parsed: Config = toml::from_str(
            r#"
            [user]
            id = 7
            name = "Grace"

            [policies]
            history = "merge"
            service_responses = "collapse_duplicates"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.user.id, 7);
        assert_eq!(parsed.policies.history, HistoryPolicy::Merge);
        assert_eq!(
            parsed.policies.service_responses,
            ServiceResponsePolicy::CollapseDuplicates
        );
        // Unspecified sections fall back to defaults
        assert_eq!(parsed.network.reconnect_max_secs, 30);
    }

    #[test]
    fn test_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.user.id, config.user.id);
        assert_eq!(parsed.server.rest_url, config.server.rest_url);
    }
}
