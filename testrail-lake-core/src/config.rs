//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/testrail-lake/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/testrail-lake/` (~/.config/testrail-lake/)
//! - Data: `$XDG_DATA_HOME/testrail-lake/` (~/.local/share/testrail-lake/)
//! - State/Logs: `$XDG_STATE_HOME/testrail-lake/` (~/.local/state/testrail-lake/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable consulted when a connection omits its password
pub const PASSWORD_ENV: &str = "TESTRAIL_PASSWORD";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Pipeline tuning
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// TestRail connections, addressed by id from the run options
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

/// What the extractor does with a raw record it cannot parse
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParseErrorPolicy {
    /// Fail the subtask on the first malformed record
    #[default]
    Abort,
    /// Log the record and continue
    Skip,
}

/// Collect/extract/convert tuning
#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Page size for paginated endpoints (TestRail caps this at 250)
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Parent records fetched concurrently in fan-out collection
    #[serde(default = "default_fan_out_concurrency")]
    pub fan_out_concurrency: usize,

    /// Parse-error policy for extraction
    #[serde(default)]
    pub on_parse_error: ParseErrorPolicy,

    /// Rows fetched per cursor batch when streaming stored rows
    #[serde(default = "default_cursor_batch_size")]
    pub cursor_batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            fan_out_concurrency: default_fan_out_concurrency(),
            on_parse_error: ParseErrorPolicy::default(),
            cursor_batch_size: default_cursor_batch_size(),
        }
    }
}

impl PipelineConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.page_size > 250 {
            return Err(Error::Config(
                "pipeline.page_size must be between 1 and 250".to_string(),
            ));
        }
        if self.fan_out_concurrency == 0 {
            return Err(Error::Config(
                "pipeline.fan_out_concurrency must be at least 1".to_string(),
            ));
        }
        if self.cursor_batch_size == 0 {
            return Err(Error::Config(
                "pipeline.cursor_batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_page_size() -> usize {
    250
}

fn default_fan_out_concurrency() -> usize {
    4
}

fn default_cursor_batch_size() -> usize {
    500
}

/// A TestRail instance and the credentials used to reach it
#[derive(Debug, Deserialize, Clone)]
pub struct ConnectionConfig {
    /// Connection id referenced by run options and stored on every row
    pub id: i64,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Base URL of the instance (e.g., `https://example.testrail.io/`)
    pub endpoint: Option<String>,

    /// Account email or username
    pub username: Option<String>,

    /// Password or API key (falls back to `TESTRAIL_PASSWORD`)
    pub password: Option<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    60
}

impl ConnectionConfig {
    /// Password from the config file or the environment
    pub fn resolved_password(&self) -> Option<String> {
        self.password
            .clone()
            .or_else(|| std::env::var(PASSWORD_ENV).ok())
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.id <= 0 {
            return Err(Error::Config("connections.id must be positive".to_string()));
        }
        if self.endpoint.as_deref().map_or(true, str::is_empty) {
            return Err(Error::Config(format!(
                "connections.endpoint is required for connection {}",
                self.id
            )));
        }
        if self.username.as_deref().map_or(true, str::is_empty) {
            return Err(Error::Config(format!(
                "connections.username is required for connection {}",
                self.id
            )));
        }
        if self.resolved_password().map_or(true, |p| p.is_empty()) {
            return Err(Error::Config(format!(
                "connections.password (or {}) is required for connection {}",
                PASSWORD_ENV, self.id
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.pipeline.validate()?;
        Ok(config)
    }

    /// Look up a connection by id
    pub fn connection(&self, id: i64) -> Result<&ConnectionConfig> {
        self.connections
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::Config(format!("no connection with id {} configured", id)))
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/testrail-lake/config.toml` (~/.config/testrail-lake/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("testrail-lake").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/testrail-lake/` (~/.local/share/testrail-lake/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("testrail-lake")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/testrail-lake/` (~/.local/state/testrail-lake/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("testrail-lake")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/testrail-lake/data.db` (~/.local/share/testrail-lake/data.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/testrail-lake/testrail-lake.log`
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("testrail-lake.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.connections.is_empty());
        assert_eq!(config.pipeline.page_size, 250);
        assert_eq!(config.pipeline.fan_out_concurrency, 4);
        assert_eq!(config.pipeline.on_parse_error, ParseErrorPolicy::Abort);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[logging]
level = "debug"

[pipeline]
page_size = 100
on_parse_error = "skip"

[[connections]]
id = 1
name = "acme"
endpoint = "https://acme.testrail.io/"
username = "qa@acme.test"
password = "secret"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.pipeline.page_size, 100);
        assert_eq!(config.pipeline.on_parse_error, ParseErrorPolicy::Skip);
        assert_eq!(config.pipeline.cursor_batch_size, 500);

        let conn = config.connection(1).unwrap();
        assert_eq!(conn.name.as_deref(), Some("acme"));
        assert_eq!(conn.timeout_secs, 60);
        assert!(conn.validate().is_ok());
        assert!(config.connection(2).is_err());
    }

    #[test]
    fn test_pipeline_validation() {
        assert!(PipelineConfig::default().validate().is_ok());

        let config = PipelineConfig {
            page_size: 500,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            fan_out_concurrency: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_connection_validation() {
        let conn = ConnectionConfig {
            id: 3,
            name: None,
            endpoint: Some("https://acme.testrail.io/".to_string()),
            username: None,
            password: Some("secret".to_string()),
            timeout_secs: 30,
        };
        assert!(conn.validate().is_err());

        let conn = ConnectionConfig {
            username: Some("qa".to_string()),
            ..conn
        };
        assert!(conn.validate().is_ok());

        let conn = ConnectionConfig {
            endpoint: None,
            ..conn
        };
        assert!(conn.validate().is_err());
    }
}
