//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/flowstats/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/flowstats/` (~/.config/flowstats/)
//! - Data: `$XDG_DATA_HOME/flowstats/` (~/.local/share/flowstats/)
//! - State/Logs: `$XDG_STATE_HOME/flowstats/` (~/.local/state/flowstats/)

use crate::error::{Error, Result};
use crate::format::Locale;
use crate::period::{PeriodResolver, PeriodSelector};
use crate::types::TablePrefix;
use serde::Deserialize;
use std::path::PathBuf;

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
    /// Where the activity tables live
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Report defaults
    #[serde(default)]
    pub report: ReportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database location and table naming
#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    /// Database file (defaults to the XDG data directory)
    pub path: Option<PathBuf>,

    /// WordPress table prefix (`$table_prefix` in wp-config.php)
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,

    /// Site to report on when the tables come from a multisite network
    #[serde(default = "default_blog_id")]
    pub blog_id: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            table_prefix: default_table_prefix(),
            blog_id: default_blog_id(),
        }
    }
}

impl DatabaseConfig {
    /// Resolve the configured prefix for the configured site.
    pub fn table_prefix(&self) -> Result<TablePrefix> {
        TablePrefix::for_site(&self.table_prefix, self.blog_id)
    }

    /// Configured database path, or the default one.
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(Config::database_path)
    }
}

fn default_table_prefix() -> String {
    "wp_".to_string()
}

fn default_blog_id() -> u64 {
    1
}

/// Report defaults
#[derive(Debug, Deserialize)]
pub struct ReportConfig {
    /// Language for month labels
    #[serde(default)]
    pub locale: Locale,

    /// Site clock offset from UTC, in minutes
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// Period used when the caller doesn't pick one
    #[serde(default = "default_period")]
    pub default_period: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            utc_offset_minutes: 0,
            default_period: default_period(),
        }
    }
}

impl ReportConfig {
    /// Period resolver for the configured site offset.
    pub fn resolver(&self) -> Result<PeriodResolver> {
        PeriodResolver::from_offset_minutes(self.utc_offset_minutes)
    }
}

fn default_period() -> String {
    "last_1_months".to_string()
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
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
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration, returning the first problem found
    pub fn validate(&self) -> Result<()> {
        self.database
            .table_prefix()
            .map_err(|e| Error::Config(format!("database: {}", e)))?;
        self.report.resolver()?;
        self.report
            .default_period
            .parse::<PeriodSelector>()
            .map_err(|e| Error::Config(format!("report.default_period: {}", e)))?;
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/flowstats/config.toml` (~/.config/flowstats/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("flowstats").join("config.toml")
    }

    /// Returns the data directory path (for the SQLite database)
    ///
    /// `$XDG_DATA_HOME/flowstats/` (~/.local/share/flowstats/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("flowstats")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/flowstats/` (~/.local/state/flowstats/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("flowstats")
    }

    /// Returns the default database file path
    ///
    /// `$XDG_DATA_HOME/flowstats/activity.db`
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("activity.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/flowstats/flowstats.log`
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("flowstats.log")
    }
}
