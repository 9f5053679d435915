//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/foretask/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/foretask/` (~/.config/foretask/)
//! - Data: `$XDG_DATA_HOME/foretask/` (~/.local/share/foretask/)
//! - State/Logs: `$XDG_STATE_HOME/foretask/` (~/.local/state/foretask/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Env var that overrides `forecast.api_key` from the config file.
pub const API_KEY_ENV: &str = "FORECAST_API_KEY";

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
    /// Forecast API connection settings
    #[serde(default)]
    pub forecast: ForecastConfig,

    /// Task cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Polling/reconciliation settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Forecast API settings
#[derive(Debug, Deserialize, Clone)]
pub struct ForecastConfig {
    /// API key (can also be set via FORECAST_API_KEY)
    pub api_key: Option<String>,

    /// Email of the person the tracker acts as
    pub user_email: Option<String>,

    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Max retry attempts for transient fetch failures
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            user_email: None,
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl ForecastConfig {
    /// Resolve the API key, preferring the environment over the config file.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV).ok().or_else(|| self.api_key.clone())
    }

    /// Validate configuration, returning error message if invalid
    ///
    /// A missing key or email is a blocking configuration error; no network
    /// call may be attempted until both are present.
    pub fn validate(&self) -> Result<()> {
        if self.api_key().is_none() {
            return Err(Error::Config(format!(
                "forecast.api_key is required (config file or {})",
                API_KEY_ENV
            )));
        }
        if self.user_email.as_deref().map_or(true, |e| e.trim().is_empty()) {
            return Err(Error::Config(
                "forecast.user_email is required".to_string(),
            ));
        }
        Ok(())
    }

    /// The configured email, after `validate()` has passed.
    pub fn require_user_email(&self) -> Result<&str> {
        self.user_email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| Error::Config("forecast.user_email is required".to_string()))
    }
}

fn default_base_url() -> String {
    "https://api.forecast.it/api".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> usize {
    3
}

/// Task cache settings
#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Seconds a task snapshot stays fresh
    #[serde(default = "default_expiry_secs")]
    pub expiry_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiry_secs: default_expiry_secs(),
        }
    }
}

fn default_expiry_secs() -> u64 {
    3600
}

/// Polling intervals for the UI surfaces
#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Seconds between remote timer status reconciliations
    #[serde(default = "default_reconcile_secs")]
    pub reconcile_secs: u64,

    /// Seconds between shared-store re-reads in the menubar surface
    #[serde(default = "default_store_poll_secs")]
    pub store_poll_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reconcile_secs: default_reconcile_secs(),
            store_poll_secs: default_store_poll_secs(),
        }
    }
}

fn default_reconcile_secs() -> u64 {
    30
}

fn default_store_poll_secs() -> u64 {
    2
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

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/foretask/config.toml` (~/.config/foretask/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("foretask").join("config.toml")
    }

    /// Returns the data directory path (for the key-value store)
    ///
    /// `$XDG_DATA_HOME/foretask/` (~/.local/share/foretask/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("foretask")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/foretask/` (~/.local/state/foretask/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("foretask")
    }

    /// Returns the key-value store file path
    ///
    /// `$XDG_DATA_HOME/foretask/state.db` (~/.local/share/foretask/state.db)
    pub fn store_path() -> PathBuf {
        Self::data_dir().join("state.db")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
