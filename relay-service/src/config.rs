//! Relay configuration, loaded from TOML with runtime defaults.

use crate::relay::DEFAULT_API_BASE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Path to the Unix socket page contexts connect to
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Path to the SQLite auth store
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Backend origin used until a sync supplies `apiBase`
    #[serde(default = "default_api_base")]
    pub default_api_base: String,

    /// Timeout for the outbound import request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            db_path: default_db_path(),
            default_api_base: default_api_base(),
            request_timeout_secs: default_request_timeout(),
            log_level: default_log_level(),
        }
    }
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/apptrack-relay.sock")
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("apptrack-relay")
        .join("auth.db")
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_request_timeout() -> u64 {
    15
}

fn default_log_level() -> String {
    "info".to_string()
}

impl RelayConfig {
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
            .join("apptrack-relay")
            .join("config.toml")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.default_api_base, "http://localhost:8000");
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert!(config.db_path.ends_with("apptrack-relay/auth.db"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: RelayConfig = toml::from_str(
            r#"
default_api_base = "https://api.example.com"
socket_path = "/tmp/test-relay.sock"
"#,
        )
        .unwrap();
        assert_eq!(config.default_api_base, "https://api.example.com");
        assert_eq!(config.socket_path, PathBuf::from("/tmp/test-relay.sock"));
        assert_eq!(config.request_timeout_secs, 15);
    }

    #[test]
    fn test_missing_or_broken_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let missing = RelayConfig::load_from_path(dir.path().join("absent.toml"));
        assert_eq!(missing.log_level, "info");

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "socket_path = [").unwrap();
        let config = RelayConfig::load_from_path(broken);
        assert_eq!(config.default_api_base, "http://localhost:8000");
    }
}
