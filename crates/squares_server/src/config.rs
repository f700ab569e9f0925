//! Server configuration.

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Environment variable that overrides the admin key.
pub const ADMIN_KEY_VAR: &str = "SQUARES_ADMIN_KEY";

/// Settings for `squares serve`.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ServerConfig {
    /// SQLite database file (created if missing).
    #[serde(default = "default_database_path")]
    database_path: String,

    /// Interface to bind.
    #[serde(default = "default_host")]
    host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    port: u16,

    /// Key expected in the admin header. Admin routes are closed without one.
    #[serde(default)]
    admin_key: Option<String>,
}

#[instrument]
fn default_database_path() -> String {
    "squares.db".to_string()
}

#[instrument]
fn default_host() -> String {
    "127.0.0.1".to_string()
}

#[instrument]
fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            host: default_host(),
            port: default_port(),
            admin_key: None,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        let config = Self::from_toml(&content)?;
        info!(database = %config.database_path, port = config.port, "Config loaded successfully");
        Ok(config)
    }

    /// Parses configuration from TOML text.
    #[instrument(skip(content))]
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content)
                .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Replaces the admin key with `SQUARES_ADMIN_KEY` when that is set.
    #[instrument(skip(self))]
    pub fn with_env_overrides(mut self) -> Self {
        match std::env::var(ADMIN_KEY_VAR) {
            Ok(key) if !key.trim().is_empty() => {
                debug!("Admin key taken from environment");
                self.admin_key = Some(key);
            }
            _ => {}
        }
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.trim().is_empty() {
            return Err(ConfigError::new("database_path must not be empty".to_string()));
        }
        if self.admin_key.as_deref().is_some_and(|key| key.trim().is_empty()) {
            return Err(ConfigError::new("admin_key must not be blank".to_string()));
        }
        Ok(())
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = ServerConfig::from_toml("port = 8080").unwrap();
        assert_eq!(config.port(), &8080);
        assert_eq!(config.database_path(), "squares.db");
        assert_eq!(config.host(), "127.0.0.1");
        assert!(config.admin_key().is_none());
    }

    #[test]
    fn test_blank_admin_key_rejected() {
        let err = ServerConfig::from_toml("admin_key = \"  \"").unwrap_err();
        assert!(err.message.contains("admin_key"));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        assert!(ServerConfig::from_toml("port = \"high\"").is_err());
    }
}
