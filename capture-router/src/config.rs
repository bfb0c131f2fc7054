//! Configuration management for the capture engine.
//!
//! Loads configuration from TOML files and provides runtime defaults.

use relay_service::Platform;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub relay: RelayLinkConfig,

    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub adapters: AdaptersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Whether capture is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// First fallback poll after start
    #[serde(default = "default_short_poll")]
    pub short_poll_ms: u64,

    /// Second fallback poll after start
    #[serde(default = "default_medium_poll")]
    pub medium_poll_ms: u64,

    /// Wait after an apply click before emitting
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            short_poll_ms: default_short_poll(),
            medium_poll_ms: default_medium_poll(),
            settle_delay_ms: default_settle_delay(),
        }
    }
}

impl TimingConfig {
    pub fn short_poll(&self) -> Duration {
        Duration::from_millis(self.short_poll_ms)
    }

    pub fn medium_poll(&self) -> Duration {
        Duration::from_millis(self.medium_poll_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayLinkConfig {
    /// Unix socket of the relay server
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// How long to wait for one relay reply
    #[serde(default = "default_reply_timeout")]
    pub reply_timeout_secs: u64,
}

impl Default for RelayLinkConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            reply_timeout_secs: default_reply_timeout(),
        }
    }
}

impl RelayLinkConfig {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Hosts of the tracker web app, where credentials are synced from
    #[serde(default = "default_app_hosts")]
    pub app_hosts: Vec<String>,

    /// Page storage key holding the session token
    #[serde(default = "default_token_key")]
    pub token_key: String,

    /// Page storage key holding the user id
    #[serde(default = "default_uuid_key")]
    pub uuid_key: String,

    /// Backend origin sent along with credentials; the relay keeps its own when unset
    #[serde(default)]
    pub api_base: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            app_hosts: default_app_hosts(),
            token_key: default_token_key(),
            uuid_key: default_uuid_key(),
            api_base: None,
        }
    }
}

impl BridgeConfig {
    /// Whether a page host belongs to the tracker web app
    pub fn is_app_host(&self, host: &str) -> bool {
        let host = host.trim().to_lowercase();
        self.app_hosts
            .iter()
            .any(|h| h.trim().eq_ignore_ascii_case(&host))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdaptersConfig {
    /// Extra confirmation phrases, keyed by platform name
    #[serde(default)]
    pub extra_phrases: HashMap<String, Vec<String>>,
}

impl AdaptersConfig {
    /// Phrases configured for one platform; unknown platform names are ignored
    pub fn phrases_for(&self, platform: Platform) -> Vec<String> {
        self.extra_phrases
            .iter()
            .filter(|(name, _)| Platform::parse(name) == Some(platform))
            .flat_map(|(_, phrases)| phrases.iter().cloned())
            .collect()
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_short_poll() -> u64 {
    1500
}

fn default_medium_poll() -> u64 {
    4000
}

fn default_settle_delay() -> u64 {
    1200
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/apptrack-relay.sock")
}

fn default_reply_timeout() -> u64 {
    30
}

fn default_app_hosts() -> Vec<String> {
    vec!["localhost".to_string(), "127.0.0.1".to_string()]
}

fn default_token_key() -> String {
    "token".to_string()
}

fn default_uuid_key() -> String {
    "uuid".to_string()
}

impl CaptureConfig {
    /// Load configuration from the default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_config_path())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: PathBuf) -> Self {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("apptrack-capture")
            .join("config.toml")
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: PathBuf) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;

        std::fs::write(&path, contents)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }
}
